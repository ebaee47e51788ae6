use checkout_core::order::Order;
use checkout_core::payment::{CheckoutProvider, IntentStatus, SessionPaymentStatus};
use checkout_core::repository::{OrderRepository, RepositoryError};
use checkout_core::ProviderError;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::result::PaymentResult;

pub const FAILED_TO_FIND_SESSION: &str = "failed to find session";
pub const FAILED_TO_CAPTURE: &str = "failed to capture payment intent";
pub const FAILED_TO_RETRIEVE_INTENT: &str = "failed to retrieve payment intent";
pub const SESSION_ORDER_MISMATCH: &str = "session does not belong to order";

/// Unrecoverable errors of the webhook path. The caller must abort the request
/// and let the provider redeliver.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Failed to find session {session_id}: {source}")]
    SessionLookup {
        session_id: String,
        #[source]
        source: ProviderError,
    },

    #[error("Session {0} carries no order reference")]
    MissingOrderReference(String),

    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Payment not paid for session {session_id} (payment_status={status})")]
    PaymentNotPaid {
        session_id: String,
        status: SessionPaymentStatus,
    },

    #[error("Order store failure: {0}")]
    Repository(RepositoryError),
}

/// Drives an order's payment state from provider observations.
///
/// Both entry points end in the same conditional update on the order record,
/// so they can run any number of times, in any order, concurrently.
pub struct Reconciler {
    provider: Arc<dyn CheckoutProvider>,
    orders: Arc<dyn OrderRepository>,
}

impl Reconciler {
    pub fn new(provider: Arc<dyn CheckoutProvider>, orders: Arc<dyn OrderRepository>) -> Self {
        Self { provider, orders }
    }

    /// Synchronous return path.
    ///
    /// `reference` is the pending session id consumed from the customer's
    /// session by the caller. Never errors: every outcome is a [`PaymentResult`].
    /// On a succeeded intent the order is marked paid through the same guard
    /// the webhook path uses.
    pub async fn complete(&self, order: &Order, reference: Option<&str>) -> PaymentResult {
        // 1. Pending reference
        let Some(session_id) = reference else {
            warn!("No pending checkout reference for order {}", order.id);
            return PaymentResult::fail(FAILED_TO_FIND_SESSION, json!({ "key": null }));
        };

        // 2. Session and its intent
        let session = match self.provider.retrieve_session(session_id).await {
            Ok(session) => session,
            Err(e) => {
                warn!("Failed to retrieve session {} for order {}: {}", session_id, order.id, e);
                return PaymentResult::fail(
                    FAILED_TO_FIND_SESSION,
                    json!({ "key": session_id, "error": e.to_string() }),
                );
            }
        };

        let Some(intent_id) = session.payment_intent.clone() else {
            warn!("Session {} has no payment intent", session_id);
            return PaymentResult::fail(FAILED_TO_FIND_SESSION, json!({ "key": session_id }));
        };

        if session.order_id() != Some(order.id) {
            warn!(
                "Session {} belongs to {:?}, not order {}",
                session_id,
                session.order_id(),
                order.id
            );
            return PaymentResult::fail(
                SESSION_ORDER_MISMATCH,
                json!({ "key": session_id, "metadata": session.metadata }),
            );
        }

        // 3. Intent
        let mut intent = match self.provider.retrieve_intent(&intent_id).await {
            Ok(intent) => intent,
            Err(e) => {
                warn!("Failed to retrieve intent {}: {}", intent_id, e);
                return PaymentResult::fail(
                    FAILED_TO_RETRIEVE_INTENT,
                    json!({ "key": session_id, "intent": intent_id, "error": e.to_string() }),
                );
            }
        };

        // 4. Deferred capture
        if intent.status == IntentStatus::RequiresCapture {
            intent = match self.provider.capture_intent(&intent_id).await {
                Ok(captured) => captured,
                Err(e) => {
                    warn!("Capture of intent {} failed: {}", intent_id, e);
                    return PaymentResult::fail(
                        FAILED_TO_CAPTURE,
                        json!({ "status": IntentStatus::RequiresCapture, "intent": intent_id, "error": e.to_string() }),
                    );
                }
            };
            info!("Captured intent {} -> {}", intent_id, intent.status);
        }

        // 5-7. Branch on the resulting status
        match intent.status {
            IntentStatus::Processing => {
                info!("Intent {} still processing, order {} stays pending", intent_id, order.id);
                PaymentResult::pending()
            }
            IntentStatus::Succeeded => {
                let transitioned = self.settle(order.id).await;
                PaymentResult::success(json!({
                    "intent": intent,
                    "session_id": session_id,
                    "order_marked_paid": transitioned,
                }))
            }
            IntentStatus::Canceled => {
                match self.orders.mark_failed(order.id).await {
                    Ok(true) => info!("Order {} marked as failed, intent {} canceled", order.id, intent_id),
                    Ok(false) => debug!("Order {} not pending, failure not recorded", order.id),
                    Err(e) => error!("Failed to mark order {} as failed: {}", order.id, e),
                }
                PaymentResult::fail(
                    FAILED_TO_CAPTURE,
                    json!({ "status": intent.status, "intent": intent }),
                )
            }
            other => PaymentResult::fail(
                FAILED_TO_CAPTURE,
                json!({ "status": other, "intent": intent }),
            ),
        }
    }

    /// Asynchronous webhook path for a completed checkout session.
    pub async fn complete_webhook(&self, session_id: &str) -> Result<Order, ReconcileError> {
        // 1. Session
        let session = self
            .provider
            .retrieve_session(session_id)
            .await
            .map_err(|source| ReconcileError::SessionLookup {
                session_id: session_id.to_string(),
                source,
            })?;

        // 2. Order via metadata
        let order_id = session
            .order_id()
            .ok_or_else(|| ReconcileError::MissingOrderReference(session.id.clone()))?;

        let order = self.load_order(order_id).await?;

        // 3. Idempotency guard
        if order.is_paid() {
            debug!("Order {} already paid, webhook for {} is a no-op", order_id, session_id);
            return Ok(order);
        }

        // 4. Only a paid session may settle the order
        if session.payment_status != SessionPaymentStatus::Paid {
            return Err(ReconcileError::PaymentNotPaid {
                session_id: session.id,
                status: session.payment_status,
            });
        }

        // 5. Conditional transition
        let transitioned = self
            .orders
            .mark_paid(order_id)
            .await
            .map_err(ReconcileError::Repository)?;

        if !transitioned {
            debug!("Order {} was settled concurrently", order_id);
        }

        self.load_order(order_id).await
    }

    /// Marks the order paid after a succeeded intent. Store errors are logged
    /// and left for the webhook path to settle.
    async fn settle(&self, order_id: Uuid) -> bool {
        match self.orders.mark_paid(order_id).await {
            Ok(true) => {
                info!("Order {} marked as paid on return", order_id);
                true
            }
            Ok(false) => {
                debug!("Order {} was already paid", order_id);
                false
            }
            Err(e) => {
                error!("Failed to mark order {} as paid on return: {}", order_id, e);
                false
            }
        }
    }

    async fn load_order(&self, order_id: Uuid) -> Result<Order, ReconcileError> {
        self.orders
            .get_order(order_id)
            .await
            .map_err(ReconcileError::Repository)?
            .ok_or(ReconcileError::OrderNotFound(order_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_core::PaymentState;
    use crate::mock::{sample_order, InMemoryOrderRepository, MockCheckoutProvider};

    struct Fixture {
        provider: Arc<MockCheckoutProvider>,
        orders: Arc<InMemoryOrderRepository>,
        reconciler: Reconciler,
        order: Order,
    }

    fn fixture() -> Fixture {
        let provider = Arc::new(MockCheckoutProvider::new());
        let orders = Arc::new(InMemoryOrderRepository::new());
        let order = sample_order();
        orders.insert(order.clone());
        let reconciler = Reconciler::new(provider.clone(), orders.clone());
        Fixture { provider, orders, reconciler, order }
    }

    #[tokio::test]
    async fn test_missing_reference_fails() {
        let f = fixture();
        let result = f.reconciler.complete(&f.order, None).await;
        assert_eq!(result.failure_reason(), Some(FAILED_TO_FIND_SESSION));
        assert_eq!(f.orders.state_writes(), 0);
    }

    #[tokio::test]
    async fn test_unknown_session_fails() {
        let f = fixture();
        let result = f.reconciler.complete(&f.order, Some("cs_missing")).await;
        assert_eq!(result.failure_reason(), Some(FAILED_TO_FIND_SESSION));
    }

    #[tokio::test]
    async fn test_session_without_intent_fails_without_mutation() {
        let f = fixture();
        let session_id = f.provider.open_session(f.order.id);

        let result = f.reconciler.complete(&f.order, Some(&session_id)).await;

        assert_eq!(result.failure_reason(), Some(FAILED_TO_FIND_SESSION));
        assert_eq!(f.orders.payment_state(f.order.id), Some(PaymentState::Pending));
        assert_eq!(f.orders.state_writes(), 0);
    }

    #[tokio::test]
    async fn test_session_for_other_order_fails() {
        let f = fixture();
        let session_id = f.provider.open_session(Uuid::new_v4());
        f.provider.attach_intent(&session_id, IntentStatus::Succeeded);

        let result = f.reconciler.complete(&f.order, Some(&session_id)).await;

        assert_eq!(result.failure_reason(), Some(SESSION_ORDER_MISMATCH));
        assert_eq!(f.orders.state_writes(), 0);
    }

    #[tokio::test]
    async fn test_requires_capture_is_captured_once() {
        let f = fixture();
        let session_id = f.provider.open_session(f.order.id);
        let intent_id = f.provider.attach_intent(&session_id, IntentStatus::RequiresCapture);
        f.provider.set_capture_result(&intent_id, IntentStatus::Succeeded);

        let result = f.reconciler.complete(&f.order, Some(&session_id)).await;

        assert!(result.is_success());
        assert_eq!(f.provider.capture_calls(), 1);
        assert_eq!(f.orders.payment_state(f.order.id), Some(PaymentState::Paid));
    }

    #[tokio::test]
    async fn test_capture_result_drives_branching() {
        let f = fixture();
        let session_id = f.provider.open_session(f.order.id);
        let intent_id = f.provider.attach_intent(&session_id, IntentStatus::RequiresCapture);
        f.provider.set_capture_result(&intent_id, IntentStatus::Processing);

        let result = f.reconciler.complete(&f.order, Some(&session_id)).await;

        assert_eq!(result, PaymentResult::Pending);
        assert_eq!(f.provider.capture_calls(), 1);
        assert_eq!(f.orders.payment_state(f.order.id), Some(PaymentState::Pending));
    }

    #[tokio::test]
    async fn test_processing_is_pending() {
        let f = fixture();
        let session_id = f.provider.open_session(f.order.id);
        f.provider.attach_intent(&session_id, IntentStatus::Processing);

        let result = f.reconciler.complete(&f.order, Some(&session_id)).await;

        assert_eq!(result, PaymentResult::Pending);
        assert_eq!(f.provider.capture_calls(), 0);
        assert_eq!(f.orders.state_writes(), 0);
    }

    #[tokio::test]
    async fn test_unsettled_status_fails_with_status_evidence() {
        let f = fixture();
        let session_id = f.provider.open_session(f.order.id);
        f.provider.attach_intent(&session_id, IntentStatus::RequiresPaymentMethod);

        let result = f.reconciler.complete(&f.order, Some(&session_id)).await;

        match result {
            PaymentResult::Failure { reason, evidence } => {
                assert_eq!(reason, FAILED_TO_CAPTURE);
                assert_eq!(evidence["status"], "requires_payment_method");
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(f.orders.payment_state(f.order.id), Some(PaymentState::Pending));
    }

    #[tokio::test]
    async fn test_canceled_intent_marks_order_failed() {
        let f = fixture();
        let session_id = f.provider.open_session(f.order.id);
        f.provider.attach_intent(&session_id, IntentStatus::Canceled);

        let result = f.reconciler.complete(&f.order, Some(&session_id)).await;

        assert!(result.is_failure());
        assert_eq!(f.orders.payment_state(f.order.id), Some(PaymentState::Failed));
    }

    #[tokio::test]
    async fn test_webhook_marks_paid_once() {
        let f = fixture();
        let session_id = f.provider.open_session(f.order.id);
        f.provider.attach_intent(&session_id, IntentStatus::Succeeded);
        f.provider.set_session_payment_status(&session_id, SessionPaymentStatus::Paid);

        let first = f.reconciler.complete_webhook(&session_id).await.unwrap();
        assert_eq!(first.payment_state, PaymentState::Paid);

        let second = f.reconciler.complete_webhook(&session_id).await.unwrap();
        assert_eq!(second.payment_state, PaymentState::Paid);
        assert_eq!(f.orders.state_writes(), 1);
    }

    /// Holds every `mark_paid` at a barrier so two reconciliations both pass
    /// the paid guard before either writes.
    struct RacingOrderRepository {
        inner: Arc<InMemoryOrderRepository>,
        barrier: tokio::sync::Barrier,
        lost: std::sync::atomic::AtomicUsize,
    }

    impl RacingOrderRepository {
        fn new(inner: Arc<InMemoryOrderRepository>) -> Self {
            Self {
                inner,
                barrier: tokio::sync::Barrier::new(2),
                lost: std::sync::atomic::AtomicUsize::new(0),
            }
        }

        fn lost(&self) -> usize {
            self.lost.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl OrderRepository for RacingOrderRepository {
        async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
            self.inner.get_order(id).await
        }

        async fn mark_paid(&self, id: Uuid) -> Result<bool, RepositoryError> {
            self.barrier.wait().await;
            let transitioned = self.inner.mark_paid(id).await?;
            if !transitioned {
                self.lost.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
            Ok(transitioned)
        }

        async fn mark_failed(&self, id: Uuid) -> Result<bool, RepositoryError> {
            self.inner.mark_failed(id).await
        }
    }

    fn racing_fixture() -> (Fixture, Arc<RacingOrderRepository>, Reconciler) {
        let f = fixture();
        let racing = Arc::new(RacingOrderRepository::new(f.orders.clone()));
        let reconciler = Reconciler::new(f.provider.clone(), racing.clone());
        (f, racing, reconciler)
    }

    #[tokio::test]
    async fn test_racing_webhooks_settle_once() {
        let (f, racing, reconciler) = racing_fixture();
        let session_id = f.provider.open_session(f.order.id);
        f.provider.set_session_payment_status(&session_id, SessionPaymentStatus::Paid);

        let (a, b) = tokio::join!(
            reconciler.complete_webhook(&session_id),
            reconciler.complete_webhook(&session_id)
        );

        assert_eq!(a.unwrap().payment_state, PaymentState::Paid);
        assert_eq!(b.unwrap().payment_state, PaymentState::Paid);
        assert_eq!(racing.lost(), 1);
        assert_eq!(f.orders.state_writes(), 1);
    }

    #[tokio::test]
    async fn test_return_racing_webhook_settles_once() {
        let (f, racing, reconciler) = racing_fixture();
        let session_id = f.provider.open_session(f.order.id);
        f.provider.attach_intent(&session_id, IntentStatus::Succeeded);
        f.provider.set_session_payment_status(&session_id, SessionPaymentStatus::Paid);

        let (returned, delivered) = tokio::join!(
            reconciler.complete(&f.order, Some(&session_id)),
            reconciler.complete_webhook(&session_id)
        );

        assert!(returned.is_success());
        assert_eq!(delivered.unwrap().payment_state, PaymentState::Paid);
        assert_eq!(racing.lost(), 1);
        assert_eq!(f.orders.state_writes(), 1);
        assert_eq!(f.orders.payment_state(f.order.id), Some(PaymentState::Paid));
    }

    #[tokio::test]
    async fn test_webhook_for_unpaid_session_is_fatal() {
        let f = fixture();
        let session_id = f.provider.open_session(f.order.id);

        let err = f.reconciler.complete_webhook(&session_id).await.unwrap_err();

        assert!(matches!(err, ReconcileError::PaymentNotPaid { status: SessionPaymentStatus::Unpaid, .. }));
        assert_eq!(f.orders.state_writes(), 0);
    }

    #[tokio::test]
    async fn test_webhook_on_paid_order_skips_status_check() {
        let f = fixture();
        f.orders.mark_paid(f.order.id).await.unwrap();
        let session_id = f.provider.open_session(f.order.id);

        // Session still reports unpaid, the guard returns before the check
        let order = f.reconciler.complete_webhook(&session_id).await.unwrap();
        assert_eq!(order.payment_state, PaymentState::Paid);
        assert_eq!(f.orders.state_writes(), 1);
    }

    #[tokio::test]
    async fn test_webhook_unknown_session_and_order() {
        let f = fixture();
        let err = f.reconciler.complete_webhook("cs_missing").await.unwrap_err();
        assert!(matches!(err, ReconcileError::SessionLookup { .. }));

        let orphan = Uuid::new_v4();
        let session_id = f.provider.open_session(orphan);
        f.provider.set_session_payment_status(&session_id, SessionPaymentStatus::Paid);
        let err = f.reconciler.complete_webhook(&session_id).await.unwrap_err();
        assert!(matches!(err, ReconcileError::OrderNotFound(id) if id == orphan));
    }

    #[tokio::test]
    async fn test_failed_order_can_still_be_paid_by_webhook() {
        let f = fixture();
        f.orders.mark_failed(f.order.id).await.unwrap();
        let session_id = f.provider.open_session(f.order.id);
        f.provider.set_session_payment_status(&session_id, SessionPaymentStatus::Paid);

        let order = f.reconciler.complete_webhook(&session_id).await.unwrap();
        assert_eq!(order.payment_state, PaymentState::Paid);
    }

    #[tokio::test]
    async fn test_return_then_webhook_scenario() {
        let f = fixture();
        let session_id = f.provider.open_session(f.order.id);
        let intent_id = f.provider.attach_intent(&session_id, IntentStatus::RequiresCapture);
        f.provider.set_capture_result(&intent_id, IntentStatus::Succeeded);

        let result = f.reconciler.complete(&f.order, Some(&session_id)).await;
        assert!(result.is_success());
        assert_eq!(f.provider.capture_calls(), 1);

        f.provider.set_session_payment_status(&session_id, SessionPaymentStatus::Paid);
        let order = f.reconciler.complete_webhook(&session_id).await.unwrap();
        assert_eq!(order.payment_state, PaymentState::Paid);

        let again = f.reconciler.complete_webhook(&session_id).await.unwrap();
        assert_eq!(again.payment_state, PaymentState::Paid);
        assert_eq!(f.orders.state_writes(), 1);
    }
}
