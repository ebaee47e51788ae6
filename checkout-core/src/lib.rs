pub mod customer;
pub mod order;
pub mod payment;
pub mod repository;
pub mod settings;
pub mod webhook;

pub use order::{Order, PaymentState};
pub use payment::{CheckoutProvider, ProviderError, ProviderResult};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Settings unavailable: {0}")]
    SettingsError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
