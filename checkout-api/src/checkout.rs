use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use checkout_core::order::Order;
use checkout_order::PaymentResult;
use serde_json::json;
use uuid::Uuid;
use crate::error::AppError;
use crate::state::AppState;

async fn load_order(state: &AppState, order_id: Uuid) -> Result<Order, AppError> {
    state
        .orders
        .get_order(order_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError(format!("Order {} not found", order_id)))
}

/// Returns the customer session key, minting a cookie for first-time visitors.
fn customer_session(jar: CookieJar, cookie_name: &str) -> (CookieJar, String) {
    if let Some(cookie) = jar.get(cookie_name) {
        let key = cookie.value().to_string();
        return (jar, key);
    }

    let key = Uuid::new_v4().to_string();
    let cookie = Cookie::build((cookie_name.to_string(), key.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    (jar.add(cookie), key)
}

pub fn status_for(result: &PaymentResult) -> StatusCode {
    match result {
        PaymentResult::Success { .. } => StatusCode::OK,
        PaymentResult::Pending => StatusCode::ACCEPTED,
        PaymentResult::Failure { .. } => StatusCode::PAYMENT_REQUIRED,
        PaymentResult::Redirect { .. } => StatusCode::SEE_OTHER,
    }
}

/// POST /v1/orders/{order_id}/checkout
/// Open a hosted checkout session and send the customer to it.
pub async fn start_checkout(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let order = load_order(&state, order_id).await?;

    if order.is_paid() {
        return Err(AppError::ConflictError(format!("Order {} is already paid", order_id)));
    }

    let (jar, session_key) = customer_session(jar, &state.session_cookie);

    let result = state
        .checkout
        .process(&order, &session_key)
        .await
        .map_err(AppError::from_checkout)?;

    match result {
        PaymentResult::Redirect { url } => Ok((jar, Redirect::to(&url)).into_response()),
        other => {
            tracing::warn!("Checkout for order {} not started: {:?}", order_id, other.failure_reason());
            Ok((jar, (StatusCode::UNPROCESSABLE_ENTITY, Json(other))).into_response())
        }
    }
}

/// GET /v1/checkout/{order_id}/return
/// The customer came back from the hosted page.
pub async fn return_from_checkout(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let order = load_order(&state, order_id).await?;
    let session_key = jar.get(&state.session_cookie).map(|c| c.value().to_string());

    let result = state.checkout.complete(&order, session_key.as_deref()).await;

    match &result {
        PaymentResult::Success { .. } => tracing::info!("Payment for order {} succeeded", order_id),
        PaymentResult::Failure { reason, .. } => {
            tracing::warn!("Payment for order {} failed: {}", order_id, reason)
        }
        _ => {}
    }

    Ok((status_for(&result), Json(result)).into_response())
}

/// GET /v1/checkout/{order_id}/cancel
/// The customer abandoned the hosted page.
pub async fn cancel_checkout(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    jar: CookieJar,
) -> Result<Json<serde_json::Value>, AppError> {
    let dropped = match jar.get(&state.session_cookie) {
        Some(cookie) => state
            .checkout
            .cancel(cookie.value())
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?,
        None => None,
    };

    Ok(Json(json!({
        "order_id": order_id,
        "status": "canceled",
        "session_discarded": dropped.is_some(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_for_result() {
        assert_eq!(status_for(&PaymentResult::success(json!({}))), StatusCode::OK);
        assert_eq!(status_for(&PaymentResult::pending()), StatusCode::ACCEPTED);
        assert_eq!(status_for(&PaymentResult::fail("x", json!({}))), StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn test_customer_session_reuses_existing_cookie() {
        let jar = CookieJar::new().add(Cookie::new("checkout_session", "abc"));
        let (_, key) = customer_session(jar, "checkout_session");
        assert_eq!(key, "abc");

        let (jar, key) = customer_session(CookieJar::new(), "checkout_session");
        assert_eq!(jar.get("checkout_session").map(|c| c.value().to_string()), Some(key));
    }
}
