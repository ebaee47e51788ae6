pub mod result;
pub mod session_builder;
pub mod customer_resolver;
pub mod reconciler;
pub mod checkout;
pub mod mock;

pub use result::PaymentResult;
pub use session_builder::{CheckoutError, ReturnUrls, SessionBuilder};
pub use customer_resolver::CustomerResolver;
pub use reconciler::{ReconcileError, Reconciler};
pub use checkout::CheckoutService;
