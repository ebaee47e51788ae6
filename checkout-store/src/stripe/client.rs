use async_trait::async_trait;
use checkout_core::customer::{Customer, CustomerRequest};
use checkout_core::payment::{
    CheckoutProvider, CheckoutSession, PaymentIntent, ProviderError, ProviderResult, SessionRequest,
};
use checkout_core::settings::SettingsStore;
use checkout_core::webhook::{self, WebhookError, WebhookEvent};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::params::{customer_params, email_query, session_params};
use super::wire::{ErrorEnvelope, SearchResult, StripeSession};

/// Stripe Checkout adapter. Holds no credentials, the API key is fetched
/// from the settings store for every call.
pub struct StripeClient {
    http: reqwest::Client,
    settings: Arc<dyn SettingsStore>,
    api_base_url: String,
    webhook_tolerance_secs: i64,
}

impl StripeClient {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        api_base_url: impl Into<String>,
        webhook_tolerance_secs: i64,
    ) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            http,
            settings,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            webhook_tolerance_secs,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.api_base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ProviderResult<T> {
        let api_key = self
            .settings
            .api_key()
            .await
            .map_err(|e| ProviderError::Settings(e.to_string()))?;

        let response = request
            .bearer_auth(api_key.expose())
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !status.is_success() {
            debug!("Stripe API returned {}: {}", status, body);
            return Err(map_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

/// Maps a non-2xx Stripe response to a tagged error, keeping Stripe's message.
pub(crate) fn map_error(status: StatusCode, body: &str) -> ProviderError {
    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match (envelope.error.kind, envelope.error.message) {
            (Some(kind), Some(message)) => format!("{}: {}", kind, message),
            (None, Some(message)) => message,
            (Some(kind), None) => kind,
            (None, None) => body.to_string(),
        },
        Err(_) => body.to_string(),
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Authentication(message),
        StatusCode::NOT_FOUND => ProviderError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::PAYMENT_REQUIRED => ProviderError::InvalidRequest(message),
        other => ProviderError::Api {
            status: other.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl CheckoutProvider for StripeClient {
    fn name(&self) -> &'static str {
        "Stripe Checkout"
    }

    fn identifier(&self) -> &'static str {
        "stripe-checkout"
    }

    async fn create_session(&self, request: &SessionRequest) -> ProviderResult<CheckoutSession> {
        let request = self
            .http
            .post(self.url("checkout/sessions"))
            .form(&session_params(request));
        let session: StripeSession = self.send(request).await?;
        Ok(session.into())
    }

    async fn retrieve_session(&self, session_id: &str) -> ProviderResult<CheckoutSession> {
        let request = self.http.get(self.url(&format!("checkout/sessions/{}", session_id)));
        let session: StripeSession = self.send(request).await?;
        Ok(session.into())
    }

    async fn retrieve_intent(&self, intent_id: &str) -> ProviderResult<PaymentIntent> {
        let request = self.http.get(self.url(&format!("payment_intents/{}", intent_id)));
        self.send(request).await
    }

    async fn capture_intent(&self, intent_id: &str) -> ProviderResult<PaymentIntent> {
        let request = self.http.post(self.url(&format!("payment_intents/{}/capture", intent_id)));
        self.send(request).await
    }

    async fn search_customers(&self, email: &str) -> ProviderResult<Vec<Customer>> {
        let request = self
            .http
            .get(self.url("customers/search"))
            .query(&[("query", email_query(email))]);
        let result: SearchResult<Customer> = self.send(request).await?;
        Ok(result.data)
    }

    async fn create_customer(&self, request: &CustomerRequest) -> ProviderResult<Customer> {
        let request = self
            .http
            .post(self.url("customers"))
            .form(&customer_params(request));
        self.send(request).await
    }

    fn construct_event(
        &self,
        payload: &[u8],
        signature_header: &str,
        secret: &str,
    ) -> Result<WebhookEvent, WebhookError> {
        webhook::construct_event(payload, signature_header, secret, self.webhook_tolerance_secs)
    }
}
