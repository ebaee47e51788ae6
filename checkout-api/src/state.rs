use std::sync::Arc;
use checkout_core::payment::CheckoutProvider;
use checkout_core::repository::OrderRepository;
use checkout_core::settings::SettingsStore;
use checkout_order::{CheckoutService, Reconciler};

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<dyn OrderRepository>,
    pub settings: Arc<dyn SettingsStore>,
    pub provider: Arc<dyn CheckoutProvider>,
    pub reconciler: Arc<Reconciler>,
    pub checkout: Arc<CheckoutService>,
    /// Name of the cookie carrying the customer session key.
    pub session_cookie: String,
}
