use async_trait::async_trait;
use checkout_core::settings::{GatewaySettings, SettingsStore};
use checkout_core::CoreResult;

use crate::app_config::GatewayConfig;

/// Serves gateway credentials out of the loaded configuration.
pub struct ConfigSettingsStore {
    settings: GatewaySettings,
}

impl ConfigSettingsStore {
    pub fn new(settings: GatewaySettings) -> Self {
        Self { settings }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(GatewaySettings {
            api_key: config.api_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
        })
    }
}

#[async_trait]
impl SettingsStore for ConfigSettingsStore {
    async fn gateway_settings(&self) -> CoreResult<GatewaySettings> {
        Ok(self.settings.clone())
    }
}
