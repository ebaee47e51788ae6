use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::customer::{Customer, CustomerRequest};
use crate::webhook::{WebhookError, WebhookEvent};

/// Metadata key carrying the local order id on the provider's session.
pub const ORDER_ID_METADATA_KEY: &str = "order_id";

/// Payment intent lifecycle as reported by the provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::RequiresPaymentMethod => "requires_payment_method",
            IntentStatus::RequiresConfirmation => "requires_confirmation",
            IntentStatus::RequiresAction => "requires_action",
            IntentStatus::Processing => "processing",
            IntentStatus::RequiresCapture => "requires_capture",
            IntentStatus::Canceled => "canceled",
            IntentStatus::Succeeded => "succeeded",
        }
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status of a checkout session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

impl SessionPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPaymentStatus::Paid => "paid",
            SessionPaymentStatus::Unpaid => "unpaid",
            SessionPaymentStatus::NoPaymentRequired => "no_payment_required",
        }
    }
}

impl fmt::Display for SessionPaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMethod {
    #[default]
    Automatic,
    Manual,
}

impl CaptureMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureMethod::Automatic => "automatic",
            CaptureMethod::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String, // Provider's ID (e.g., cs_test_123)
    pub url: Option<String>,
    pub payment_intent: Option<String>,
    pub payment_status: SessionPaymentStatus,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    /// The local order this session was created for, if the metadata carries a valid id.
    pub fn order_id(&self) -> Option<Uuid> {
        self.metadata
            .get(ORDER_ID_METADATA_KEY)
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: IntentStatus,
    pub amount: i64,
    pub currency: String,
}

/// A tax-inclusive line on the hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItem {
    pub name: String,
    pub unit_amount: i64,
    pub quantity: u32,
    pub currency: String,
}

/// Tax-inclusive fixed-amount shipping rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShippingRate {
    pub display_name: String,
    pub amount: i64,
    pub currency: String,
}

/// Everything needed to open a hosted checkout session for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRequest {
    pub order_id: Uuid,
    pub customer_id: String,
    pub line_items: Vec<LineItem>,
    pub shipping: ShippingRate,
    pub success_url: String,
    pub cancel_url: String,
    pub capture_method: CaptureMethod,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("Network failure: {0}")]
    Network(String),
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Provider API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Failed to decode provider response: {0}")]
    Decode(String),
    #[error("Provider settings unavailable: {0}")]
    Settings(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Remote operations the hosted checkout flow needs from a payment backend.
///
/// Implementations are stateless and never retry; every remote error is
/// surfaced as a [`ProviderError`].
#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    /// Human readable provider name
    fn name(&self) -> &'static str;

    /// Stable identifier used in settings and routing
    fn identifier(&self) -> &'static str;

    /// Create a hosted checkout session
    async fn create_session(&self, request: &SessionRequest) -> ProviderResult<CheckoutSession>;

    /// Retrieve a checkout session by id
    async fn retrieve_session(&self, session_id: &str) -> ProviderResult<CheckoutSession>;

    /// Retrieve intent status
    async fn retrieve_intent(&self, intent_id: &str) -> ProviderResult<PaymentIntent>;

    /// Capture a previously authorized payment
    async fn capture_intent(&self, intent_id: &str) -> ProviderResult<PaymentIntent>;

    /// Exact-match customer lookup by email
    async fn search_customers(&self, email: &str) -> ProviderResult<Vec<Customer>>;

    async fn create_customer(&self, request: &CustomerRequest) -> ProviderResult<Customer>;

    /// Verify the signature header against the shared secret and decode the event.
    fn construct_event(
        &self,
        payload: &[u8],
        signature_header: &str,
        secret: &str,
    ) -> Result<WebhookEvent, WebhookError>;
}
