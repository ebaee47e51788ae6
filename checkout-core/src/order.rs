use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::customer::Address;

/// Payment state of an order. Only this field is written by the checkout flow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Pending,
    Paid,
    Failed,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Pending => "pending",
            PaymentState::Paid => "paid",
            PaymentState::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentState {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentState::Pending),
            "paid" => Ok(PaymentState::Paid),
            "failed" => Ok(PaymentState::Failed),
            other => Err(crate::CoreError::ValidationError(format!(
                "unknown payment state: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCustomer {
    pub email: String,
    pub billing_address: Address,
    pub shipping_address: Address,
}

/// An individual product within an order. Amounts are tax-inclusive minor units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub name: String,
    pub unit_price_post_taxes: i64,
    pub quantity: u32,
    pub total_post_taxes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingSelection {
    pub method_name: Option<String>,
    pub total_post_taxes: i64,
}

/// Read-only snapshot of an order as seen by the checkout flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer: OrderCustomer,
    pub currency: String,
    pub lines: Vec<OrderLine>,
    pub shipping: ShippingSelection,
    pub payment_state: PaymentState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_paid(&self) -> bool {
        self.payment_state == PaymentState::Paid
    }
}
