//! In-memory stand-ins for the provider, the order store and the pending
//! reference slot. Used by the tests of this crate and of the API crate.

use async_trait::async_trait;
use checkout_core::customer::{Address, Customer, CustomerRequest};
use checkout_core::order::{Order, OrderCustomer, OrderLine, PaymentState, ShippingSelection};
use checkout_core::payment::{
    CheckoutProvider, CheckoutSession, IntentStatus, PaymentIntent, ProviderError, ProviderResult,
    SessionPaymentStatus, SessionRequest, ORDER_ID_METADATA_KEY,
};
use checkout_core::repository::{OrderRepository, PendingReferenceStore, RepositoryError};
use checkout_core::webhook::{self, WebhookError, WebhookEvent, DEFAULT_TOLERANCE_SECS};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct MockCheckoutProvider {
    sessions: Mutex<HashMap<String, CheckoutSession>>,
    intents: Mutex<HashMap<String, PaymentIntent>>,
    capture_results: Mutex<HashMap<String, IntentStatus>>,
    customers: Mutex<Vec<(String, Customer)>>,
    session_requests: Mutex<Vec<SessionRequest>>,
    customer_requests: Mutex<Vec<CustomerRequest>>,
    sequence: AtomicUsize,
    capture_calls: AtomicUsize,
    fail_customer_creation: AtomicBool,
}

impl MockCheckoutProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}_test_{}", prefix, n)
    }

    /// Registers an unpaid session without an intent, as the provider returns it right after creation.
    pub fn open_session(&self, order_id: Uuid) -> String {
        let id = self.next_id("cs");
        let session = CheckoutSession {
            id: id.clone(),
            url: Some(format!("https://checkout.example.test/pay/{}", id)),
            payment_intent: None,
            payment_status: SessionPaymentStatus::Unpaid,
            metadata: HashMap::from([(ORDER_ID_METADATA_KEY.to_string(), order_id.to_string())]),
        };
        lock(&self.sessions).insert(id.clone(), session);
        id
    }

    /// Creates an intent in `status` and links it to the session. Returns the intent id.
    pub fn attach_intent(&self, session_id: &str, status: IntentStatus) -> String {
        let intent_id = self.next_id("pi");
        lock(&self.intents).insert(
            intent_id.clone(),
            PaymentIntent {
                id: intent_id.clone(),
                status,
                amount: 3490,
                currency: "eur".to_string(),
            },
        );
        if let Some(session) = lock(&self.sessions).get_mut(session_id) {
            session.payment_intent = Some(intent_id.clone());
        }
        intent_id
    }

    /// Status the intent moves to when captured. Defaults to `succeeded`.
    pub fn set_capture_result(&self, intent_id: &str, status: IntentStatus) {
        lock(&self.capture_results).insert(intent_id.to_string(), status);
    }

    pub fn set_session_payment_status(&self, session_id: &str, status: SessionPaymentStatus) {
        if let Some(session) = lock(&self.sessions).get_mut(session_id) {
            session.payment_status = status;
        }
    }

    pub fn insert_customer(&self, email: &str, customer_id: &str) {
        lock(&self.customers).push((
            email.to_string(),
            Customer {
                id: customer_id.to_string(),
                email: Some(email.to_string()),
            },
        ));
    }

    pub fn fail_customer_creation(&self) {
        self.fail_customer_creation.store(true, Ordering::SeqCst);
    }

    pub fn capture_calls(&self) -> usize {
        self.capture_calls.load(Ordering::SeqCst)
    }

    pub fn session_requests(&self) -> Vec<SessionRequest> {
        lock(&self.session_requests).clone()
    }

    pub fn customer_requests(&self) -> Vec<CustomerRequest> {
        lock(&self.customer_requests).clone()
    }
}

#[async_trait]
impl CheckoutProvider for MockCheckoutProvider {
    fn name(&self) -> &'static str {
        "Mock Checkout"
    }

    fn identifier(&self) -> &'static str {
        "mock-checkout"
    }

    async fn create_session(&self, request: &SessionRequest) -> ProviderResult<CheckoutSession> {
        lock(&self.session_requests).push(request.clone());
        let id = self.open_session(request.order_id);
        self.retrieve_session(&id).await
    }

    async fn retrieve_session(&self, session_id: &str) -> ProviderResult<CheckoutSession> {
        lock(&self.sessions)
            .get(session_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("No such checkout.session: '{}'", session_id)))
    }

    async fn retrieve_intent(&self, intent_id: &str) -> ProviderResult<PaymentIntent> {
        lock(&self.intents)
            .get(intent_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("No such payment_intent: '{}'", intent_id)))
    }

    async fn capture_intent(&self, intent_id: &str) -> ProviderResult<PaymentIntent> {
        self.capture_calls.fetch_add(1, Ordering::SeqCst);

        let next = lock(&self.capture_results)
            .get(intent_id)
            .copied()
            .unwrap_or(IntentStatus::Succeeded);

        let mut intents = lock(&self.intents);
        let intent = intents
            .get_mut(intent_id)
            .ok_or_else(|| ProviderError::NotFound(format!("No such payment_intent: '{}'", intent_id)))?;

        if intent.status != IntentStatus::RequiresCapture {
            return Err(ProviderError::InvalidRequest(format!(
                "This PaymentIntent could not be captured because it has a status of {}.",
                intent.status
            )));
        }

        intent.status = next;
        Ok(intent.clone())
    }

    async fn search_customers(&self, email: &str) -> ProviderResult<Vec<Customer>> {
        Ok(lock(&self.customers)
            .iter()
            .filter(|(known, _)| known == email)
            .map(|(_, customer)| customer.clone())
            .collect())
    }

    async fn create_customer(&self, request: &CustomerRequest) -> ProviderResult<Customer> {
        if self.fail_customer_creation.load(Ordering::SeqCst) {
            return Err(ProviderError::InvalidRequest("Invalid email address".to_string()));
        }

        lock(&self.customer_requests).push(request.clone());
        let id = self.next_id("cus");
        self.insert_customer(&request.email, &id);

        Ok(Customer {
            id,
            email: Some(request.email.clone()),
        })
    }

    fn construct_event(
        &self,
        payload: &[u8],
        signature_header: &str,
        secret: &str,
    ) -> Result<WebhookEvent, WebhookError> {
        webhook::construct_event(payload, signature_header, secret, DEFAULT_TOLERANCE_SECS)
    }
}

/// Order store with the same conditional-update semantics as the SQL one.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: Mutex<HashMap<Uuid, Order>>,
    state_writes: AtomicUsize,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: Order) {
        lock(&self.orders).insert(order.id, order);
    }

    pub fn payment_state(&self, id: Uuid) -> Option<PaymentState> {
        lock(&self.orders).get(&id).map(|order| order.payment_state)
    }

    /// Number of payment state changes applied so far.
    pub fn state_writes(&self) -> usize {
        self.state_writes.load(Ordering::SeqCst)
    }

    fn transition(&self, id: Uuid, allowed: impl Fn(PaymentState) -> bool, to: PaymentState) -> bool {
        let mut orders = lock(&self.orders);
        match orders.get_mut(&id) {
            Some(order) if allowed(order.payment_state) => {
                order.payment_state = to;
                order.updated_at = Utc::now();
                self.state_writes.fetch_add(1, Ordering::SeqCst);
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        Ok(lock(&self.orders).get(&id).cloned())
    }

    async fn mark_paid(&self, id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.transition(id, |state| state != PaymentState::Paid, PaymentState::Paid))
    }

    async fn mark_failed(&self, id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.transition(id, |state| state == PaymentState::Pending, PaymentState::Failed))
    }
}

#[derive(Default)]
pub struct InMemoryPendingStore {
    slots: Mutex<HashMap<String, String>>,
}

impl InMemoryPendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads without consuming.
    pub fn peek(&self, customer_session: &str) -> Option<String> {
        lock(&self.slots).get(customer_session).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.slots).is_empty()
    }
}

#[async_trait]
impl PendingReferenceStore for InMemoryPendingStore {
    async fn put(&self, customer_session: &str, session_id: &str) -> Result<(), RepositoryError> {
        lock(&self.slots).insert(customer_session.to_string(), session_id.to_string());
        Ok(())
    }

    async fn take(&self, customer_session: &str) -> Result<Option<String>, RepositoryError> {
        Ok(lock(&self.slots).remove(customer_session))
    }
}

pub fn sample_address() -> Address {
    Address {
        name: "Ada Lovelace".to_string(),
        company: None,
        lines: vec!["12 St James's Square".to_string()],
        city: "London".to_string(),
        postal_code: "SW1Y 4JH".to_string(),
        country_code: "GB".to_string(),
        state: Some("Greater London".to_string()),
    }
}

/// A pending EUR order with two lines and paid shipping.
pub fn sample_order() -> Order {
    let now = Utc::now();
    Order {
        id: Uuid::new_v4(),
        customer: OrderCustomer {
            email: "ada@example.com".to_string(),
            billing_address: sample_address(),
            shipping_address: sample_address(),
        },
        currency: "EUR".to_string(),
        lines: vec![
            OrderLine {
                name: "Difference Engine Poster".to_string(),
                unit_price_post_taxes: 1250,
                quantity: 2,
                total_post_taxes: 2500,
            },
            OrderLine {
                name: "Punch Card Set".to_string(),
                unit_price_post_taxes: 500,
                quantity: 1,
                total_post_taxes: 500,
            },
        ],
        shipping: ShippingSelection {
            method_name: Some("Standard Parcel".to_string()),
            total_post_taxes: 490,
        },
        payment_state: PaymentState::Pending,
        created_at: now,
        updated_at: now,
    }
}
