mod memory;
mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::routes::order::schemas::{Order, OrderStatus, PaymentStatus};
use crate::routes::payment::schemas::{PaymentRecord, RefundRecord};

pub use memory::MemoryOrderStore;
pub use postgres::PgOrderStore;

/// Result of confirming a card payment for an order id.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentConfirmation {
    /// The temporary order was moved into the permanent store.
    Promoted(Order),
    /// No temporary order; the permanent one was updated in place.
    AlreadyPermanent(Order),
    /// Neither store knows the id.
    Missing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub user_id: String,
    pub product_id: String,
    pub name: String,
    pub price: i64,
    pub quantity: u32,
    pub size: Option<String>,
    pub color: Option<String>,
}

/// Persistence for temporary orders, permanent orders, payment and refund records and carts.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn save_temp_order(&self, order: &Order) -> Result<(), anyhow::Error>;

    /// Returns whether a record was removed.
    async fn delete_temp_order(&self, order_id: &str) -> Result<bool, anyhow::Error>;

    async fn save_order(&self, order: &Order) -> Result<(), anyhow::Error>;

    async fn fetch_order(&self, order_id: &str) -> Result<Option<Order>, anyhow::Error>;

    async fn fetch_order_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, anyhow::Error>;

    /// Newest first.
    async fn fetch_orders_by_user(&self, user_id: &str) -> Result<Vec<Order>, anyhow::Error>;

    /// Moves the temporary order into the permanent store marked paid, writes the payment
    /// record and deletes the temporary record as one unit. When no temporary record exists
    /// the permanent order is marked paid in place; refund states are left untouched.
    async fn confirm_payment(
        &self,
        order_id: &str,
        payment: &PaymentRecord,
    ) -> Result<PaymentConfirmation, anyhow::Error>;

    /// Sets the order's refund state and appends the refund record. A refund id that was
    /// already recorded leaves the order untouched and the current order is returned.
    /// `Ok(None)` when the order does not exist.
    async fn record_refund(
        &self,
        refund: &RefundRecord,
        payment_status: PaymentStatus,
        total_refunded: i64,
    ) -> Result<Option<Order>, anyhow::Error>;

    async fn update_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<Option<Order>, anyhow::Error>;

    async fn fetch_payments(&self, order_id: &str) -> Result<Vec<PaymentRecord>, anyhow::Error>;

    async fn fetch_refunds(&self, order_id: &str) -> Result<Vec<RefundRecord>, anyhow::Error>;

    /// Removes every cart item of the user in one statement. Returns the removed count.
    async fn clear_cart(&self, user_id: &str) -> Result<u64, anyhow::Error>;
}
