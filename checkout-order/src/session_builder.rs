use checkout_core::order::Order;
use checkout_core::payment::{CaptureMethod, LineItem, SessionRequest, ShippingRate};
use checkout_core::ProviderError;
use checkout_core::repository::RepositoryError;
use uuid::Uuid;

const ORDER_ID_PLACEHOLDER: &str = "{order_id}";

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("Order has no currency code")]
    MissingCurrency,

    #[error("Order has no line items")]
    EmptyOrder,

    #[error("Invalid line item #{index}: {reason}")]
    InvalidLineItem {
        index: usize,
        reason: String,
    },

    #[error("Invalid shipping selection: {0}")]
    InvalidShipping(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Pending reference store failure: {0}")]
    PendingStore(RepositoryError),
}

impl CheckoutError {
    /// True when the order itself cannot be checked out, as opposed to a remote failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CheckoutError::MissingCurrency
                | CheckoutError::EmptyOrder
                | CheckoutError::InvalidLineItem { .. }
                | CheckoutError::InvalidShipping(_)
        )
    }
}

/// Success/cancel URL templates. `{order_id}` is replaced per order.
#[derive(Debug, Clone)]
pub struct ReturnUrls {
    pub success_url: String,
    pub cancel_url: String,
}

impl ReturnUrls {
    pub fn new(success_url: impl Into<String>, cancel_url: impl Into<String>) -> Self {
        Self {
            success_url: success_url.into(),
            cancel_url: cancel_url.into(),
        }
    }

    pub fn for_order(&self, order_id: Uuid) -> (String, String) {
        let id = order_id.to_string();
        (
            self.success_url.replace(ORDER_ID_PLACEHOLDER, &id),
            self.cancel_url.replace(ORDER_ID_PLACEHOLDER, &id),
        )
    }
}

/// Assembles the session request for an order. Pure, performs no remote calls.
#[derive(Debug, Clone, Default)]
pub struct SessionBuilder {
    capture_method: CaptureMethod,
}

impl SessionBuilder {
    pub fn new(capture_method: CaptureMethod) -> Self {
        Self { capture_method }
    }

    /// Checks that the order can be turned into a session request. Runs
    /// before any remote call.
    pub fn validate(&self, order: &Order) -> Result<(), CheckoutError> {
        self.priced_items(order).map(|_| ())
    }

    pub fn build(
        &self,
        order: &Order,
        customer_id: &str,
        urls: &ReturnUrls,
    ) -> Result<SessionRequest, CheckoutError> {
        let (line_items, shipping) = self.priced_items(order)?;
        let (success_url, cancel_url) = urls.for_order(order.id);

        Ok(SessionRequest {
            order_id: order.id,
            customer_id: customer_id.to_string(),
            line_items,
            shipping,
            success_url,
            cancel_url,
            capture_method: self.capture_method,
        })
    }

    fn priced_items(&self, order: &Order) -> Result<(Vec<LineItem>, ShippingRate), CheckoutError> {
        let currency = order.currency.trim().to_lowercase();
        if currency.is_empty() {
            return Err(CheckoutError::MissingCurrency);
        }

        if order.lines.is_empty() {
            return Err(CheckoutError::EmptyOrder);
        }

        let mut line_items = Vec::with_capacity(order.lines.len());
        for (index, line) in order.lines.iter().enumerate() {
            if line.name.trim().is_empty() {
                return Err(CheckoutError::InvalidLineItem {
                    index,
                    reason: "missing product name".to_string(),
                });
            }
            if line.quantity == 0 {
                return Err(CheckoutError::InvalidLineItem {
                    index,
                    reason: "quantity must be at least 1".to_string(),
                });
            }
            if line.unit_price_post_taxes <= 0 {
                return Err(CheckoutError::InvalidLineItem {
                    index,
                    reason: format!("unit amount must be positive, got {}", line.unit_price_post_taxes),
                });
            }

            line_items.push(LineItem {
                name: line.name.clone(),
                unit_amount: line.unit_price_post_taxes,
                quantity: line.quantity,
                currency: currency.clone(),
            });
        }

        let display_name = order
            .shipping
            .method_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| CheckoutError::InvalidShipping("missing shipping method name".to_string()))?;

        if order.shipping.total_post_taxes < 0 {
            return Err(CheckoutError::InvalidShipping(format!(
                "shipping amount must not be negative, got {}",
                order.shipping.total_post_taxes
            )));
        }

        let shipping = ShippingRate {
            display_name: display_name.to_string(),
            amount: order.shipping.total_post_taxes,
            currency,
        };

        Ok((line_items, shipping))
    }
}
