use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use checkout_core::webhook::WebhookError;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// POST /webhooks/checkout
/// Receive checkout session events from the payment provider.
///
/// 400 when the event cannot be authenticated (nothing is touched), 500 when
/// a completing event could not be reconciled so the provider redelivers it,
/// 200 otherwise.
pub async fn handle_checkout_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        tracing::debug!("Webhook rejected: missing {} header", SIGNATURE_HEADER);
        return (StatusCode::BAD_REQUEST, "Invalid signature");
    };

    let secret = match state.settings.webhook_secret().await {
        Ok(secret) => secret,
        Err(e) => {
            tracing::error!("Failed to load webhook secret: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Error processing webhook");
        }
    };

    let event = match state
        .provider
        .construct_event(&body, signature, secret.expose())
    {
        Ok(event) => event,
        Err(WebhookError::InvalidPayload(e)) => {
            tracing::debug!("Webhook rejected, invalid payload: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid payload");
        }
        Err(WebhookError::Signature(e)) => {
            tracing::debug!("Webhook rejected, invalid signature: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid signature");
        }
    };

    if !event.kind.completes_checkout() {
        tracing::debug!("Ignoring webhook event {} of type {}", event.id, event.kind.as_str());
        return (StatusCode::OK, "Webhook received");
    }

    let Some(session_id) = event.object_id.as_deref() else {
        tracing::debug!("Webhook {} carries no session id", event.id);
        return (StatusCode::BAD_REQUEST, "Invalid payload");
    };

    match state.reconciler.complete_webhook(session_id).await {
        Ok(order) => {
            tracing::info!(order_id = %order.id, "Order marked as paid");
            (StatusCode::OK, "Webhook received")
        }
        Err(e) => {
            tracing::error!(event = %event.raw, "Error processing webhook {}: {}", event.id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error processing webhook")
        }
    }
}
