use crate::domain::{Basket, BasketLine, BasketStatus, Product, User};
use crate::store::{StoreError, StoreResult};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};

/// Basket row as stored
#[derive(Debug, Clone, FromRow)]
pub struct BasketRow {
    pub id: i64,
    pub order_number: String,
    pub owner_id: i64,
    pub owner_username: String,
    pub owner_email: String,
    pub currency: String,
    pub status: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct BasketLineRow {
    pub product_id: i64,
    pub product_title: String,
    pub course_id: Option<String>,
    pub quantity: i32,
    pub unit_price_excl_tax: Decimal,
    pub unit_price_incl_tax: Decimal,
}

impl BasketRow {
    pub fn into_basket(self, lines: Vec<BasketLineRow>) -> StoreResult<Basket> {
        let status = self
            .status
            .parse::<BasketStatus>()
            .map_err(|e| StoreError::invalid_data(e).with_context(format!("basket {}", self.id)))?;

        let lines = lines
            .into_iter()
            .map(|line| {
                let quantity = u32::try_from(line.quantity).map_err(|_| {
                    StoreError::invalid_data(format!("negative quantity {}", line.quantity))
                })?;
                Ok(BasketLine {
                    product: Product {
                        id: line.product_id,
                        title: line.product_title,
                        course_id: line.course_id,
                    },
                    quantity,
                    unit_price_excl_tax: line.unit_price_excl_tax,
                    unit_price_incl_tax: line.unit_price_incl_tax,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Basket {
            id: self.id,
            order_number: self.order_number,
            owner: User {
                id: self.owner_id,
                username: self.owner_username,
                email: self.owner_email,
            },
            currency: self.currency,
            status,
            lines,
        })
    }
}

/// Basket Repository for reading checkout baskets
pub struct BasketRepository {
    pool: PgPool,
}

impl BasketRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a basket with its lines
    pub async fn find_by_id(&self, basket_id: i64) -> StoreResult<Option<Basket>> {
        let row = sqlx::query_as::<_, BasketRow>(
            "SELECT id, order_number, owner_id, owner_username, owner_email, currency, status
             FROM baskets WHERE id = $1",
        )
        .bind(basket_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, BasketLineRow>(
            "SELECT product_id, product_title, course_id, quantity, unit_price_excl_tax, unit_price_incl_tax
             FROM basket_lines WHERE basket_id = $1 ORDER BY id ASC",
        )
        .bind(basket_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        row.into_basket(lines).map(Some)
    }

    /// Lock a basket row for the rest of the transaction and return its status
    pub async fn lock_status(
        conn: &mut PgConnection,
        basket_id: i64,
    ) -> StoreResult<Option<BasketStatus>> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM baskets WHERE id = $1 FOR UPDATE")
                .bind(basket_id)
                .fetch_optional(&mut *conn)
                .await
                .map_err(StoreError::from_sqlx)?;

        status
            .map(|s| s.parse::<BasketStatus>().map_err(StoreError::invalid_data))
            .transpose()
    }

    pub async fn mark_submitted(conn: &mut PgConnection, basket_id: i64) -> StoreResult<()> {
        let result = sqlx::query("UPDATE baskets SET status = $2 WHERE id = $1 AND status <> $2")
            .bind(basket_id)
            .bind(BasketStatus::Submitted.as_str())
            .execute(&mut *conn)
            .await
            .map_err(StoreError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::duplicate(
                "baskets.status",
                format!("{} submitted", basket_id),
            ));
        }
        Ok(())
    }
}
