use async_trait::async_trait;
use uuid::Uuid;

use crate::order::Order;

pub type RepositoryError = Box<dyn std::error::Error + Send + Sync>;

/// Fixed key prefix of the pending transaction reference slot.
pub const PENDING_REFERENCE_KEY: &str = "checkout:pending";

pub fn pending_reference_key(customer_session: &str) -> String {
    format!("{}:{}", PENDING_REFERENCE_KEY, customer_session)
}

/// Repository trait for order data access
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn get_order(
        &self,
        id: Uuid,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Atomically moves an order that is not yet paid to `Paid`.
    /// Returns `true` only for the call that performed the transition.
    async fn mark_paid(
        &self,
        id: Uuid,
    ) -> Result<bool, RepositoryError>;

    /// Atomically moves a `Pending` order to `Failed`.
    /// Returns `false` when the order was not pending.
    async fn mark_failed(
        &self,
        id: Uuid,
    ) -> Result<bool, RepositoryError>;
}

/// Per customer session slot passing the session id from checkout start to the return path.
#[async_trait]
pub trait PendingReferenceStore: Send + Sync {
    /// Stores the reference, replacing any previous one for the same customer session.
    async fn put(
        &self,
        customer_session: &str,
        session_id: &str,
    ) -> Result<(), RepositoryError>;

    /// Reads and removes the reference in one step.
    async fn take(
        &self,
        customer_session: &str,
    ) -> Result<Option<String>, RepositoryError>;
}
