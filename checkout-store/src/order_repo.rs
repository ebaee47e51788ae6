use async_trait::async_trait;
use checkout_core::customer::Address;
use checkout_core::order::{Order, OrderCustomer, OrderLine, PaymentState, ShippingSelection};
use checkout_core::repository::{OrderRepository, RepositoryError};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

pub struct StoreOrderRepository {
    pool: PgPool,
}

impl StoreOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    customer_email: String,
    billing_address: Json<Address>,
    shipping_address: Json<Address>,
    currency: String,
    shipping_method: Option<String>,
    shipping_total: i64,
    payment_state: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderLineRow {
    name: String,
    unit_price: i64,
    quantity: i32,
    total: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum RowError {
    #[error("order line {0} has a negative quantity")]
    NegativeQuantity(String),
}

impl TryFrom<OrderLineRow> for OrderLine {
    type Error = RowError;

    fn try_from(row: OrderLineRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|_| RowError::NegativeQuantity(row.name.clone()))?;
        Ok(OrderLine {
            name: row.name,
            unit_price_post_taxes: row.unit_price,
            quantity,
            total_post_taxes: row.total,
        })
    }
}

#[async_trait]
impl OrderRepository for StoreOrderRepository {
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, customer_email, billing_address, shipping_address, currency,
                   shipping_method, shipping_total, payment_state, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, OrderLineRow>(
            "SELECT name, unit_price, quantity, total FROM order_lines WHERE order_id = $1 ORDER BY position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(OrderLine::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Order {
            id: row.id,
            customer: OrderCustomer {
                email: row.customer_email,
                billing_address: row.billing_address.0,
                shipping_address: row.shipping_address.0,
            },
            currency: row.currency,
            lines,
            shipping: ShippingSelection {
                method_name: row.shipping_method,
                total_post_taxes: row.shipping_total,
            },
            payment_state: row.payment_state.parse::<PaymentState>()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }

    async fn mark_paid(&self, id: Uuid) -> Result<bool, RepositoryError> {
        // Conditional update, only one concurrent caller sees a row change
        let result = sqlx::query(
            "UPDATE orders SET payment_state = 'paid', updated_at = NOW() WHERE id = $1 AND payment_state <> 'paid'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_failed(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET payment_state = 'failed', updated_at = NOW() WHERE id = $1 AND payment_state = 'pending'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
