use checkout_core::order::Order;
use checkout_core::payment::CheckoutProvider;
use checkout_core::repository::{PendingReferenceStore, RepositoryError};
use checkout_core::ProviderError;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::customer_resolver::CustomerResolver;
use crate::reconciler::{Reconciler, FAILED_TO_FIND_SESSION};
use crate::result::PaymentResult;
use crate::session_builder::{CheckoutError, ReturnUrls, SessionBuilder};

pub const FAILED_TO_CREATE_CUSTOMER: &str = "failed to create customer";

/// Customer-facing half of the hosted checkout: start, return and cancel.
pub struct CheckoutService {
    provider: Arc<dyn CheckoutProvider>,
    pending: Arc<dyn PendingReferenceStore>,
    reconciler: Arc<Reconciler>,
    resolver: CustomerResolver,
    builder: SessionBuilder,
    urls: ReturnUrls,
}

impl CheckoutService {
    pub fn new(
        provider: Arc<dyn CheckoutProvider>,
        pending: Arc<dyn PendingReferenceStore>,
        reconciler: Arc<Reconciler>,
        builder: SessionBuilder,
        urls: ReturnUrls,
    ) -> Self {
        Self {
            resolver: CustomerResolver::new(provider.clone()),
            provider,
            pending,
            reconciler,
            builder,
            urls,
        }
    }

    /// Opens a hosted checkout session for `order` and remembers it for the
    /// customer session. Any earlier pending reference is replaced.
    pub async fn process(
        &self,
        order: &Order,
        customer_session: &str,
    ) -> Result<PaymentResult, CheckoutError> {
        // 1. Nothing remote for an order that cannot be checked out
        self.builder.validate(order)?;

        // 2. Remote customer
        let customer = match self
            .resolver
            .resolve(
                &order.customer.email,
                &order.customer.billing_address,
                &order.customer.shipping_address,
            )
            .await
        {
            Ok(customer) => customer,
            Err(e) => {
                warn!("Customer resolution failed for order {}: {}", order.id, e);
                return Ok(PaymentResult::fail(
                    FAILED_TO_CREATE_CUSTOMER,
                    json!({ "customer": null, "error": e.to_string() }),
                ));
            }
        };

        // 3. Session
        let request = self.builder.build(order, &customer.id, &self.urls)?;
        let session = self.provider.create_session(&request).await?;

        let url = session.url.clone().ok_or_else(|| {
            ProviderError::Decode(format!("session {} has no redirect url", session.id))
        })?;

        // 4. Remember the attempt for the return path
        self.pending
            .put(customer_session, &session.id)
            .await
            .map_err(CheckoutError::PendingStore)?;

        info!(
            "{} session {} created for order {}",
            self.provider.name(),
            session.id,
            order.id
        );

        Ok(PaymentResult::redirect(url))
    }

    /// Return path. Consumes the pending reference, then reconciles.
    pub async fn complete(&self, order: &Order, customer_session: Option<&str>) -> PaymentResult {
        let reference = match customer_session {
            Some(key) => match self.pending.take(key).await {
                Ok(reference) => reference,
                Err(e) => {
                    warn!("Failed to read pending reference for order {}: {}", order.id, e);
                    return PaymentResult::fail(
                        FAILED_TO_FIND_SESSION,
                        json!({ "key": null, "customer_session": key, "error": e.to_string() }),
                    );
                }
            },
            None => None,
        };

        self.reconciler.complete(order, reference.as_deref()).await
    }

    /// Customer abandoned the hosted page. Drops the pending reference.
    pub async fn cancel(&self, customer_session: &str) -> Result<Option<String>, RepositoryError> {
        let dropped = self.pending.take(customer_session).await?;
        if let Some(session_id) = &dropped {
            info!("Checkout session {} abandoned", session_id);
        }
        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_core::payment::IntentStatus;
    use checkout_core::PaymentState;
    use crate::mock::{sample_order, InMemoryOrderRepository, InMemoryPendingStore, MockCheckoutProvider};

    struct Fixture {
        provider: Arc<MockCheckoutProvider>,
        orders: Arc<InMemoryOrderRepository>,
        pending: Arc<InMemoryPendingStore>,
        service: CheckoutService,
    }

    fn fixture() -> Fixture {
        let provider = Arc::new(MockCheckoutProvider::new());
        let orders = Arc::new(InMemoryOrderRepository::new());
        let pending = Arc::new(InMemoryPendingStore::new());
        let reconciler = Arc::new(Reconciler::new(provider.clone(), orders.clone()));
        let service = CheckoutService::new(
            provider.clone(),
            pending.clone(),
            reconciler,
            SessionBuilder::default(),
            ReturnUrls::new("https://shop.example/{order_id}/return", "https://shop.example/{order_id}/cancel"),
        );
        Fixture { provider, orders, pending, service }
    }

    #[tokio::test]
    async fn test_process_redirects_and_stores_reference() {
        let f = fixture();
        let order = sample_order();

        let result = f.service.process(&order, "browser-1").await.unwrap();

        let PaymentResult::Redirect { url } = result else {
            panic!("expected redirect, got {:?}", result);
        };
        let requests = f.provider.session_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].order_id, order.id);

        let stored = f.pending.peek("browser-1").unwrap();
        assert!(url.ends_with(&stored));
    }

    #[tokio::test]
    async fn test_process_replaces_previous_reference() {
        let f = fixture();
        let order = sample_order();

        f.service.process(&order, "browser-1").await.unwrap();
        let first = f.pending.peek("browser-1").unwrap();
        f.service.process(&order, "browser-1").await.unwrap();
        let second = f.pending.peek("browser-1").unwrap();

        assert_ne!(first, second);
        assert_eq!(f.pending.len(), 1);
    }

    #[tokio::test]
    async fn test_process_fails_without_customer() {
        let f = fixture();
        f.provider.fail_customer_creation();
        let order = sample_order();

        let result = f.service.process(&order, "browser-1").await.unwrap();

        assert_eq!(result.failure_reason(), Some(FAILED_TO_CREATE_CUSTOMER));
        assert!(f.provider.session_requests().is_empty());
        assert!(f.pending.peek("browser-1").is_none());
    }

    #[tokio::test]
    async fn test_process_rejects_invalid_order_before_remote_session() {
        let f = fixture();
        let mut order = sample_order();
        order.lines.clear();

        let err = f.service.process(&order, "browser-1").await.unwrap_err();

        assert!(err.is_validation());
        assert!(f.provider.session_requests().is_empty());
        assert!(f.provider.customer_requests().is_empty());
        assert!(f.pending.is_empty());
    }

    #[tokio::test]
    async fn test_process_skips_customer_lookup_for_unshippable_order() {
        let f = fixture();
        f.provider.insert_customer("ada@example.com", "cus_known");
        let mut order = sample_order();
        order.shipping.method_name = None;

        let err = f.service.process(&order, "browser-1").await.unwrap_err();

        assert!(matches!(err, CheckoutError::InvalidShipping(_)));
        assert!(f.provider.customer_requests().is_empty());
        assert!(f.provider.session_requests().is_empty());
    }

    struct BrokenPendingStore;

    #[async_trait::async_trait]
    impl PendingReferenceStore for BrokenPendingStore {
        async fn put(&self, _: &str, _: &str) -> Result<(), RepositoryError> {
            Err("connection refused".into())
        }

        async fn take(&self, _: &str) -> Result<Option<String>, RepositoryError> {
            Err("connection refused".into())
        }
    }

    #[tokio::test]
    async fn test_complete_keeps_store_error_as_evidence() {
        let provider = Arc::new(MockCheckoutProvider::new());
        let orders = Arc::new(InMemoryOrderRepository::new());
        let reconciler = Arc::new(Reconciler::new(provider.clone(), orders.clone()));
        let service = CheckoutService::new(
            provider,
            Arc::new(BrokenPendingStore),
            reconciler,
            SessionBuilder::default(),
            ReturnUrls::new("https://shop.example/ok", "https://shop.example/cancel"),
        );
        let order = sample_order();
        orders.insert(order.clone());

        let result = service.complete(&order, Some("browser-1")).await;

        match result {
            PaymentResult::Failure { reason, evidence } => {
                assert_eq!(reason, FAILED_TO_FIND_SESSION);
                assert_eq!(evidence["error"], "connection refused");
                assert_eq!(evidence["customer_session"], "browser-1");
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(orders.payment_state(order.id), Some(PaymentState::Pending));
    }

    #[tokio::test]
    async fn test_complete_consumes_reference_once() {
        let f = fixture();
        let order = sample_order();
        f.orders.insert(order.clone());

        f.service.process(&order, "browser-1").await.unwrap();
        let session_id = f.pending.peek("browser-1").unwrap();
        f.provider.attach_intent(&session_id, IntentStatus::Succeeded);

        let first = f.service.complete(&order, Some("browser-1")).await;
        assert!(first.is_success());
        assert_eq!(f.orders.payment_state(order.id), Some(PaymentState::Paid));

        let second = f.service.complete(&order, Some("browser-1")).await;
        assert_eq!(second.failure_reason(), Some(FAILED_TO_FIND_SESSION));
        assert_eq!(f.orders.state_writes(), 1);
    }

    #[tokio::test]
    async fn test_cancel_drops_reference() {
        let f = fixture();
        let order = sample_order();
        f.service.process(&order, "browser-1").await.unwrap();

        let dropped = f.service.cancel("browser-1").await.unwrap();
        assert!(dropped.is_some());
        assert!(f.pending.peek("browser-1").is_none());
        assert!(f.service.cancel("browser-1").await.unwrap().is_none());
    }
}
