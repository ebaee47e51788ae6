//! Webhook events and the provider's HMAC signing scheme.
//!
//! A signature header looks like `t=1700000000,v1=<hex>,v1=<hex>`. Each `v1`
//! entry is an HMAC-SHA256 of `"{t}.{payload}"` keyed with the endpoint secret.
//! Verification passes when any `v1` entry matches and `t` is within tolerance.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED: &str = "checkout.session.async_payment_succeeded";

/// Maximum age of a signed event, in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    CheckoutSessionCompleted,
    CheckoutSessionAsyncPaymentSucceeded,
    Other(String),
}

impl EventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            CHECKOUT_SESSION_COMPLETED => EventKind::CheckoutSessionCompleted,
            CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED => EventKind::CheckoutSessionAsyncPaymentSucceeded,
            other => EventKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::CheckoutSessionCompleted => CHECKOUT_SESSION_COMPLETED,
            EventKind::CheckoutSessionAsyncPaymentSucceeded => CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED,
            EventKind::Other(name) => name,
        }
    }

    /// Events that settle a checkout and must be routed to reconciliation.
    pub fn completes_checkout(&self) -> bool {
        matches!(
            self,
            EventKind::CheckoutSessionCompleted | EventKind::CheckoutSessionAsyncPaymentSucceeded
        )
    }
}

/// A verified webhook event. `raw` keeps the full payload for evidence logging.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub id: String,
    pub kind: EventKind,
    pub created: i64,
    pub object_id: Option<String>,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookError {
    #[error("Invalid signature: {0}")]
    Signature(String),
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

#[derive(Deserialize)]
struct EventEnvelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    created: i64,
    data: EventData,
}

#[derive(Deserialize)]
struct EventData {
    object: Value,
}

/// Parsed `t=...,v1=...` header.
#[derive(Debug, Clone)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => {
                    let ts = value
                        .parse::<i64>()
                        .map_err(|_| WebhookError::Signature("malformed timestamp".to_string()))?;
                    timestamp = Some(ts);
                }
                // Entries that are not valid hex can never match, skip them
                "v1" => {
                    if let Ok(bytes) = hex::decode(value) {
                        signatures.push(bytes);
                    }
                }
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| WebhookError::Signature("missing timestamp".to_string()))?;

        if signatures.is_empty() {
            return Err(WebhookError::Signature("no v1 signatures found".to_string()));
        }

        Ok(Self { timestamp, signatures })
    }
}

fn mac_for(payload: &[u8], secret: &str, timestamp: i64) -> Result<HmacSha256, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| WebhookError::Signature(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Hex-encoded signature of `payload` at `timestamp`.
pub fn compute_signature(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, WebhookError> {
    let mac = mac_for(payload, secret, timestamp)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Builds a complete signature header, as the provider would send it.
pub fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, WebhookError> {
    let signature = compute_signature(payload, secret, timestamp)?;
    Ok(format!("t={},v1={}", timestamp, signature))
}

/// Checks the header against the payload. Comparison is constant-time.
pub fn verify_header(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), WebhookError> {
    let parsed = SignatureHeader::parse(header)?;

    let matched = parsed.signatures.iter().any(|candidate| {
        mac_for(payload, secret, parsed.timestamp)
            .map(|mac| mac.verify_slice(candidate).is_ok())
            .unwrap_or(false)
    });

    if !matched {
        return Err(WebhookError::Signature(
            "no signatures found matching the expected signature for payload".to_string(),
        ));
    }

    if tolerance_secs > 0 && (now - parsed.timestamp).abs() > tolerance_secs {
        return Err(WebhookError::Signature("timestamp outside the tolerance zone".to_string()));
    }

    Ok(())
}

/// Decodes an already verified payload.
pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, WebhookError> {
    let raw: Value = serde_json::from_slice(payload)
        .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

    let envelope: EventEnvelope = serde_json::from_value(raw.clone())
        .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

    let object_id = envelope
        .data
        .object
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(WebhookEvent {
        id: envelope.id,
        kind: EventKind::from_type(&envelope.event_type),
        created: envelope.created,
        object_id,
        raw,
    })
}

/// Verify then decode. Nothing from the payload is parsed before the signature checks out.
pub fn construct_event(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
) -> Result<WebhookEvent, WebhookError> {
    verify_header(payload, header, secret, tolerance_secs, chrono::Utc::now().timestamp())?;
    parse_event(payload)
}
