use crate::database::basket_repository::BasketRepository;
use crate::database::order_repository::OrderRepository;
use crate::database::processor_response_repository::ProcessorResponseRepository;
use crate::domain::{BasketStatus, NewProcessorResponse, Order, OrderPlacement, ProcessorResponseRecord};
use crate::store::{ResponseLedger, StoreError, StoreResult, UnitOfWork};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::Mutex;
use tracing::{debug, error as log_error};

fn completed() -> StoreError {
    StoreError::transaction("Transaction already completed")
}

/// Database transaction wrapper for atomic operations
///
/// Runs at SERIALIZABLE isolation. Dropping it without `commit` rolls back.
pub struct DatabaseTransaction {
    transaction: Mutex<Option<Transaction<'static, Postgres>>>,
}

impl DatabaseTransaction {
    /// Begin a new transaction
    pub async fn begin(pool: &PgPool) -> StoreResult<Self> {
        debug!("Beginning database transaction");

        let mut transaction = pool.begin().await.map_err(|e| {
            log_error!("Failed to begin transaction: {}", e);
            StoreError::from_sqlx(e)
        })?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *transaction)
            .await
            .map_err(StoreError::from_sqlx)?;

        Ok(Self {
            transaction: Mutex::new(Some(transaction)),
        })
    }
}

#[async_trait]
impl ResponseLedger for DatabaseTransaction {
    async fn record_response(
        &self,
        response: NewProcessorResponse,
    ) -> StoreResult<ProcessorResponseRecord> {
        let mut guard = self.transaction.lock().await;
        let tx = guard.as_mut().ok_or_else(completed)?;
        ProcessorResponseRepository::insert(&mut **tx, response).await
    }
}

#[async_trait]
impl UnitOfWork for DatabaseTransaction {
    fn ledger(&self) -> &dyn ResponseLedger {
        self
    }

    async fn place_order(&self, placement: OrderPlacement) -> StoreResult<Order> {
        let mut guard = self.transaction.lock().await;
        let tx = guard.as_mut().ok_or_else(completed)?;
        let basket_id = placement.basket.id;

        match BasketRepository::lock_status(&mut **tx, basket_id).await? {
            None => return Err(StoreError::not_found("Basket", basket_id.to_string())),
            Some(BasketStatus::Submitted) => {
                return Err(StoreError::duplicate(
                    "baskets.status",
                    format!("{} submitted", basket_id),
                ))
            }
            Some(_) => {}
        }

        let order = OrderRepository::insert_placement(&mut **tx, &placement, Utc::now()).await?;
        BasketRepository::mark_submitted(&mut **tx, basket_id).await?;

        debug!("Placed order {} for basket {}", order.number, basket_id);
        Ok(order)
    }

    async fn commit(&self) -> StoreResult<()> {
        let tx = self.transaction.lock().await.take().ok_or_else(completed)?;
        debug!("Committing transaction");

        tx.commit().await.map_err(|e| {
            log_error!("Failed to commit transaction: {}", e);
            StoreError::from_sqlx(e)
        })
    }

    async fn rollback(&self) -> StoreResult<()> {
        let tx = self.transaction.lock().await.take().ok_or_else(completed)?;
        debug!("Rolling back transaction");

        tx.rollback().await.map_err(|e| {
            log_error!("Failed to rollback transaction: {}", e);
            StoreError::from_sqlx(e)
        })
    }
}
