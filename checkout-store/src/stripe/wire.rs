use checkout_core::payment::{CheckoutSession, SessionPaymentStatus};
use serde::Deserialize;
use std::collections::HashMap;

/// A reference that Stripe returns either as a bare id or as the expanded object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Expandable {
    Id(String),
    Object(ExpandedObject),
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExpandedObject {
    id: String,
}

impl Expandable {
    pub(crate) fn into_id(self) -> String {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object(object) => object.id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StripeSession {
    id: String,
    url: Option<String>,
    payment_intent: Option<Expandable>,
    payment_status: SessionPaymentStatus,
    metadata: Option<HashMap<String, String>>,
}

impl From<StripeSession> for CheckoutSession {
    fn from(session: StripeSession) -> Self {
        CheckoutSession {
            id: session.id,
            url: session.url,
            payment_intent: session.payment_intent.map(Expandable::into_id),
            payment_status: session.payment_status,
            metadata: session.metadata.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResult<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}
