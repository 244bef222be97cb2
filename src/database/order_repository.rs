use crate::domain::{Order, OrderPlacement, OrderStatus};
use crate::store::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub number: String,
    pub basket_id: i64,
    pub user_id: i64,
    pub currency: String,
    pub total_incl_tax: Decimal,
    pub total_excl_tax: Decimal,
    pub shipping_incl_tax: Decimal,
    pub shipping_method: String,
    pub status: String,
    pub date_placed: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<OrderStatus>()
            .map_err(|e| StoreError::invalid_data(e).with_context(format!("order {}", row.number)))?;

        Ok(Order {
            id: row.id,
            number: row.number,
            basket_id: row.basket_id,
            user_id: row.user_id,
            currency: row.currency,
            total_incl_tax: row.total_incl_tax,
            total_excl_tax: row.total_excl_tax,
            shipping_incl_tax: row.shipping_incl_tax,
            shipping_method: row.shipping_method,
            status,
            date_placed: row.date_placed,
        })
    }
}

/// Order Repository for placed orders, their payment events and sources
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_number(&self, order_number: &str) -> StoreResult<Option<Order>> {
        sqlx::query_as::<_, OrderRow>(
            "SELECT id, number, basket_id, user_id, currency, total_incl_tax, total_excl_tax,
                    shipping_incl_tax, shipping_method, status, date_placed
             FROM orders WHERE number = $1",
        )
        .bind(order_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?
        .map(Order::try_from)
        .transpose()
    }

    /// Insert the order with its `paid` payment event and payment source.
    ///
    /// A taken order number surfaces as a unique constraint violation.
    pub async fn insert_placement(
        conn: &mut PgConnection,
        placement: &OrderPlacement,
        placed_at: DateTime<Utc>,
    ) -> StoreResult<Order> {
        let order = placement.build_order(placed_at);

        sqlx::query(
            "INSERT INTO orders (id, number, basket_id, user_id, currency, total_incl_tax, total_excl_tax,
                                 shipping_incl_tax, shipping_method, status, date_placed)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(order.id)
        .bind(&order.number)
        .bind(order.basket_id)
        .bind(order.user_id)
        .bind(&order.currency)
        .bind(order.total_incl_tax)
        .bind(order.total_excl_tax)
        .bind(order.shipping_incl_tax)
        .bind(&order.shipping_method)
        .bind(order.status.as_str())
        .bind(order.date_placed)
        .execute(&mut *conn)
        .await
        .map_err(|e| StoreError::from_sqlx(e).with_context(format!("order {}", order.number)))?;

        let event = placement.build_payment_event(placed_at);
        sqlx::query(
            "INSERT INTO payment_events (id, order_number, event_type, amount, reference, processor_name, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(event.id)
        .bind(&event.order_number)
        .bind(&event.event_type)
        .bind(event.amount)
        .bind(&event.reference)
        .bind(&event.processor_name)
        .bind(event.created_at)
        .execute(&mut *conn)
        .await
        .map_err(StoreError::from_sqlx)?;

        let source = placement.build_source();
        sqlx::query(
            "INSERT INTO payment_sources (id, order_number, source_type, currency, amount_allocated,
                                          amount_debited, reference, card_type, label)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(source.id)
        .bind(&source.order_number)
        .bind(&source.source_type)
        .bind(&source.currency)
        .bind(source.amount_allocated)
        .bind(source.amount_debited)
        .bind(&source.reference)
        .bind(&source.card_type)
        .bind(&source.label)
        .execute(&mut *conn)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(order)
    }
}
