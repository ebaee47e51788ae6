use async_trait::async_trait;
use checkout_shared::Masked;

use crate::{CoreError, CoreResult};

/// Decrypted provider credentials.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub api_key: Masked<String>,
    pub webhook_secret: Masked<String>,
}

/// Source of provider credentials. Read on every request, never cached by callers.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn gateway_settings(&self) -> CoreResult<GatewaySettings>;

    /// Key for provider API calls. Empty counts as not configured.
    async fn api_key(&self) -> CoreResult<Masked<String>> {
        let settings = self.gateway_settings().await?;
        if settings.api_key.expose().is_empty() {
            return Err(CoreError::SettingsError("gateway api key is not configured".to_string()));
        }
        Ok(settings.api_key)
    }

    /// Secret for webhook verification. Independent of the API key.
    async fn webhook_secret(&self) -> CoreResult<Masked<String>> {
        let settings = self.gateway_settings().await?;
        if settings.webhook_secret.expose().is_empty() {
            return Err(CoreError::SettingsError("gateway webhook secret is not configured".to_string()));
        }
        Ok(settings.webhook_secret)
    }
}
