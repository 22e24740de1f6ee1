use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use super::{OrderStore, PaymentConfirmation};
use crate::routes::order::models::OrderModel;
use crate::routes::order::schemas::{Order, OrderStatus, PaymentMethod, PaymentStatus};
use crate::routes::payment::models::{PaymentRecordModel, RefundRecordModel};
use crate::routes::payment::schemas::{PaymentRecord, RefundRecord};

const ORDER_COLUMNS: &str = "id, user_id, items, subtotal_amount, vat_amount, total_amount, \
     currency, status, payment_status, payment_method, payment_intent_id, shipping, metadata, \
     refund_id, refunded_amount, paid_at, created_at, updated_at";

#[derive(Debug, Clone, Copy)]
enum OrderTable {
    Temporary,
    Permanent,
}

impl OrderTable {
    fn name(&self) -> &'static str {
        match self {
            OrderTable::Temporary => "temp_orders",
            OrderTable::Permanent => "orders",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn insert_order_query(table: OrderTable) -> String {
    format!(
        r#"
        INSERT INTO {} ({})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        "#,
        table.name(),
        ORDER_COLUMNS
    )
}

#[tracing::instrument(name = "insert order", skip(transaction, order), fields(order_id = %order.id))]
async fn insert_order(
    transaction: &mut Transaction<'_, Postgres>,
    table: OrderTable,
    order: &Order,
) -> Result<(), anyhow::Error> {
    let query = insert_order_query(table);
    sqlx::query(&query)
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(Json(&order.items))
        .bind(order.subtotal_amount)
        .bind(order.vat_amount)
        .bind(order.total_amount)
        .bind(&order.currency)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(order.payment_method)
        .bind(&order.payment_intent_id)
        .bind(order.shipping.as_ref().map(Json))
        .bind(Json(&order.metadata))
        .bind(&order.refund_id)
        .bind(order.refunded_amount)
        .bind(order.paid_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut **transaction)
        .await
        .map_err(|e| {
            tracing::error!("Failed to execute query: {:?}", e);
            anyhow::Error::new(e).context(format!(
                "A database failure occurred while saving order into {}",
                table.name()
            ))
        })?;
    Ok(())
}

#[tracing::instrument(name = "insert payment record", skip(transaction))]
async fn insert_payment_record(
    transaction: &mut Transaction<'_, Postgres>,
    payment: &PaymentRecord,
) -> Result<(), anyhow::Error> {
    sqlx::query(
        r#"
        INSERT INTO payments (id, order_id, payment_intent_id, amount, currency, status, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (payment_intent_id) DO NOTHING
        "#,
    )
    .bind(payment.id)
    .bind(&payment.order_id)
    .bind(&payment.payment_intent_id)
    .bind(payment.amount)
    .bind(&payment.currency)
    .bind(&payment.status)
    .bind(payment.created_at)
    .execute(&mut **transaction)
    .await
    .map_err(|e| {
        tracing::error!("Failed to execute query: {:?}", e);
        anyhow::Error::new(e).context("A database failure occurred while saving payment record")
    })?;
    Ok(())
}

impl PgOrderStore {
    async fn fetch_order_from(
        &self,
        table: OrderTable,
        order_id: &str,
    ) -> Result<Option<Order>, anyhow::Error> {
        let query = format!("SELECT {} FROM {} WHERE id = $1", ORDER_COLUMNS, table.name());
        let row = sqlx::query_as::<_, OrderModel>(&query)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to execute query: {:?}", e);
                anyhow::Error::new(e).context(format!(
                    "A database failure occurred while fetching order from {}",
                    table.name()
                ))
            })?;
        Ok(row.map(|model| model.into_schema()))
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    #[tracing::instrument(name = "save temporary order", skip(self, order), fields(order_id = %order.id))]
    async fn save_temp_order(&self, order: &Order) -> Result<(), anyhow::Error> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .context("Failed to acquire a Postgres connection from the pool")?;
        insert_order(&mut transaction, OrderTable::Temporary, order).await?;
        transaction
            .commit()
            .await
            .context("Failed to commit SQL transaction to store a temporary order")?;
        Ok(())
    }

    #[tracing::instrument(name = "delete temporary order", skip(self))]
    async fn delete_temp_order(&self, order_id: &str) -> Result<bool, anyhow::Error> {
        let result = sqlx::query("DELETE FROM temp_orders WHERE id = $1")
            .bind(order_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to execute query: {:?}", e);
                anyhow::Error::new(e)
                    .context("A database failure occurred while deleting temporary order")
            })?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(name = "save order", skip(self, order), fields(order_id = %order.id))]
    async fn save_order(&self, order: &Order) -> Result<(), anyhow::Error> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .context("Failed to acquire a Postgres connection from the pool")?;
        insert_order(&mut transaction, OrderTable::Permanent, order).await?;
        transaction
            .commit()
            .await
            .context("Failed to commit SQL transaction to store an order")?;
        Ok(())
    }

    #[tracing::instrument(name = "fetch order", skip(self))]
    async fn fetch_order(&self, order_id: &str) -> Result<Option<Order>, anyhow::Error> {
        self.fetch_order_from(OrderTable::Permanent, order_id).await
    }

    #[tracing::instrument(name = "fetch order by payment intent", skip(self))]
    async fn fetch_order_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, anyhow::Error> {
        let query = format!(
            "SELECT {} FROM orders WHERE payment_intent_id = $1 LIMIT 1",
            ORDER_COLUMNS
        );
        let row = sqlx::query_as::<_, OrderModel>(&query)
            .bind(payment_intent_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to execute query: {:?}", e);
                anyhow::Error::new(e)
                    .context("A database failure occurred while fetching order by payment intent")
            })?;
        Ok(row.map(|model| model.into_schema()))
    }

    #[tracing::instrument(name = "fetch orders by user", skip(self))]
    async fn fetch_orders_by_user(&self, user_id: &str) -> Result<Vec<Order>, anyhow::Error> {
        let query = format!(
            "SELECT {} FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
            ORDER_COLUMNS
        );
        let rows = sqlx::query_as::<_, OrderModel>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to execute query: {:?}", e);
                anyhow::Error::new(e)
                    .context("A database failure occurred while fetching user orders")
            })?;
        Ok(rows.into_iter().map(|model| model.into_schema()).collect())
    }

    #[tracing::instrument(name = "confirm order payment", skip(self, payment))]
    async fn confirm_payment(
        &self,
        order_id: &str,
        payment: &PaymentRecord,
    ) -> Result<PaymentConfirmation, anyhow::Error> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .context("Failed to acquire a Postgres connection from the pool")?;
        let now = Utc::now();

        let query = format!(
            "SELECT {} FROM temp_orders WHERE id = $1 FOR UPDATE",
            ORDER_COLUMNS
        );
        let temp_order = sqlx::query_as::<_, OrderModel>(&query)
            .bind(order_id)
            .fetch_optional(&mut *transaction)
            .await
            .map_err(|e| {
                tracing::error!("Failed to execute query: {:?}", e);
                anyhow::Error::new(e)
                    .context("A database failure occurred while locking temporary order")
            })?;

        let confirmation = match temp_order {
            Some(model) => {
                let order = model.into_schema().into_paid(now);
                insert_order(&mut transaction, OrderTable::Permanent, &order).await?;
                sqlx::query("DELETE FROM temp_orders WHERE id = $1")
                    .bind(order_id)
                    .execute(&mut *transaction)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to execute query: {:?}", e);
                        anyhow::Error::new(e)
                            .context("A database failure occurred while deleting temporary order")
                    })?;
                PaymentConfirmation::Promoted(order)
            }
            None => {
                let query = format!(
                    r#"
                    UPDATE orders
                    SET payment_status = CASE
                            WHEN payment_status IN ('refunded', 'partially_refunded') THEN payment_status
                            ELSE $2
                        END,
                        payment_method = $3,
                        paid_at = COALESCE(paid_at, $4),
                        updated_at = $4
                    WHERE id = $1
                    RETURNING {}
                    "#,
                    ORDER_COLUMNS
                );
                let updated = sqlx::query_as::<_, OrderModel>(&query)
                    .bind(order_id)
                    .bind(PaymentStatus::Paid)
                    .bind(PaymentMethod::Card)
                    .bind(now)
                    .fetch_optional(&mut *transaction)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to execute query: {:?}", e);
                        anyhow::Error::new(e)
                            .context("A database failure occurred while marking order paid")
                    })?;
                match updated {
                    Some(model) => PaymentConfirmation::AlreadyPermanent(model.into_schema()),
                    None => return Ok(PaymentConfirmation::Missing),
                }
            }
        };

        insert_payment_record(&mut transaction, payment).await?;
        transaction
            .commit()
            .await
            .context("Failed to commit SQL transaction to confirm order payment")?;
        Ok(confirmation)
    }

    #[tracing::instrument(name = "record refund", skip(self))]
    async fn record_refund(
        &self,
        refund: &RefundRecord,
        payment_status: PaymentStatus,
        total_refunded: i64,
    ) -> Result<Option<Order>, anyhow::Error> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .context("Failed to acquire a Postgres connection from the pool")?;
        let query = format!("SELECT {} FROM orders WHERE id = $1 FOR UPDATE", ORDER_COLUMNS);
        let locked = sqlx::query_as::<_, OrderModel>(&query)
            .bind(&refund.order_id)
            .fetch_optional(&mut *transaction)
            .await
            .map_err(|e| {
                tracing::error!("Failed to execute query: {:?}", e);
                anyhow::Error::new(e).context("A database failure occurred while locking order")
            })?;
        let Some(current) = locked else {
            return Ok(None);
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO refunds (id, order_id, payment_intent_id, charge_id, amount, reason, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&refund.id)
        .bind(&refund.order_id)
        .bind(&refund.payment_intent_id)
        .bind(&refund.charge_id)
        .bind(refund.amount)
        .bind(&refund.reason)
        .bind(&refund.status)
        .bind(refund.created_at)
        .execute(&mut *transaction)
        .await
        .map_err(|e| {
            tracing::error!("Failed to execute query: {:?}", e);
            anyhow::Error::new(e).context("A database failure occurred while saving refund record")
        })?
        .rows_affected();

        // A refund id seen before has already been applied to the order totals.
        let model = if inserted == 0 {
            tracing::info!("Refund {} already recorded", refund.id);
            current
        } else {
            let query = format!(
                r#"
                UPDATE orders
                SET payment_status = $2, refund_id = $3, refunded_amount = $4, updated_at = $5
                WHERE id = $1
                RETURNING {}
                "#,
                ORDER_COLUMNS
            );
            sqlx::query_as::<_, OrderModel>(&query)
                .bind(&refund.order_id)
                .bind(payment_status)
                .bind(&refund.id)
                .bind(total_refunded)
                .bind(Utc::now())
                .fetch_one(&mut *transaction)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to execute query: {:?}", e);
                    anyhow::Error::new(e)
                        .context("A database failure occurred while updating order refund status")
                })?
        };

        transaction
            .commit()
            .await
            .context("Failed to commit SQL transaction to record a refund")?;
        Ok(Some(model.into_schema()))
    }

    #[tracing::instrument(name = "update order status", skip(self))]
    async fn update_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<Option<Order>, anyhow::Error> {
        let query = format!(
            "UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
            ORDER_COLUMNS
        );
        let updated = sqlx::query_as::<_, OrderModel>(&query)
            .bind(order_id)
            .bind(status)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to execute query: {:?}", e);
                anyhow::Error::new(e)
                    .context("A database failure occurred while updating order status")
            })?;
        Ok(updated.map(|model| model.into_schema()))
    }

    #[tracing::instrument(name = "fetch payment records", skip(self))]
    async fn fetch_payments(&self, order_id: &str) -> Result<Vec<PaymentRecord>, anyhow::Error> {
        let rows = sqlx::query_as::<_, PaymentRecordModel>(
            r#"
            SELECT id, order_id, payment_intent_id, amount, currency, status, created_at
            FROM payments WHERE order_id = $1 ORDER BY created_at
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to execute query: {:?}", e);
            anyhow::Error::new(e).context("A database failure occurred while fetching payments")
        })?;
        Ok(rows.into_iter().map(|model| model.into_schema()).collect())
    }

    #[tracing::instrument(name = "fetch refund records", skip(self))]
    async fn fetch_refunds(&self, order_id: &str) -> Result<Vec<RefundRecord>, anyhow::Error> {
        let rows = sqlx::query_as::<_, RefundRecordModel>(
            r#"
            SELECT id, order_id, payment_intent_id, charge_id, amount, reason, status, created_at
            FROM refunds WHERE order_id = $1 ORDER BY created_at
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to execute query: {:?}", e);
            anyhow::Error::new(e).context("A database failure occurred while fetching refunds")
        })?;
        Ok(rows.into_iter().map(|model| model.into_schema()).collect())
    }

    #[tracing::instrument(name = "clear user cart", skip(self))]
    async fn clear_cart(&self, user_id: &str) -> Result<u64, anyhow::Error> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to execute query: {:?}", e);
                anyhow::Error::new(e).context("A database failure occurred while clearing cart")
            })?;
        Ok(result.rows_affected())
    }
}
