use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{CartItem, OrderStore, PaymentConfirmation};
use crate::routes::order::schemas::{Order, OrderStatus, PaymentStatus};
use crate::routes::payment::schemas::{PaymentRecord, RefundRecord};

#[derive(Default)]
struct MemoryState {
    temp_orders: HashMap<String, Order>,
    orders: HashMap<String, Order>,
    payments: Vec<PaymentRecord>,
    refunds: Vec<RefundRecord>,
    carts: HashMap<String, Vec<CartItem>>,
}

/// Process-local store. Every operation holds one lock, so multi-record changes are atomic.
#[derive(Default)]
pub struct MemoryOrderStore {
    state: Mutex<MemoryState>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_cart_item(&self, item: CartItem) {
        let mut state = self.state.lock().await;
        state
            .carts
            .entry(item.user_id.clone())
            .or_default()
            .push(item);
    }

    pub async fn cart_items(&self, user_id: &str) -> Vec<CartItem> {
        let state = self.state.lock().await;
        state.carts.get(user_id).cloned().unwrap_or_default()
    }

    pub async fn temp_order(&self, order_id: &str) -> Option<Order> {
        self.state.lock().await.temp_orders.get(order_id).cloned()
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    pub async fn temp_order_count(&self) -> usize {
        self.state.lock().await.temp_orders.len()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn save_temp_order(&self, order: &Order) -> Result<(), anyhow::Error> {
        let mut state = self.state.lock().await;
        state.temp_orders.insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn delete_temp_order(&self, order_id: &str) -> Result<bool, anyhow::Error> {
        Ok(self
            .state
            .lock()
            .await
            .temp_orders
            .remove(order_id)
            .is_some())
    }

    async fn save_order(&self, order: &Order) -> Result<(), anyhow::Error> {
        let mut state = self.state.lock().await;
        state.orders.insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn fetch_order(&self, order_id: &str) -> Result<Option<Order>, anyhow::Error> {
        Ok(self.state.lock().await.orders.get(order_id).cloned())
    }

    async fn fetch_order_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, anyhow::Error> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .find(|order| order.payment_intent_id.as_deref() == Some(payment_intent_id))
            .cloned())
    }

    async fn fetch_orders_by_user(&self, user_id: &str) -> Result<Vec<Order>, anyhow::Error> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|order| order.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn confirm_payment(
        &self,
        order_id: &str,
        payment: &PaymentRecord,
    ) -> Result<PaymentConfirmation, anyhow::Error> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let confirmation = match state.temp_orders.remove(order_id) {
            Some(temp_order) => {
                let order = temp_order.into_paid(now);
                state.orders.insert(order.id.clone(), order.clone());
                PaymentConfirmation::Promoted(order)
            }
            None => match state.orders.get_mut(order_id) {
                Some(order) => {
                    if !order.payment_status.is_refunded() {
                        order.payment_status = PaymentStatus::Paid;
                        order.paid_at = order.paid_at.or(Some(now));
                        order.updated_at = now;
                    }
                    PaymentConfirmation::AlreadyPermanent(order.clone())
                }
                None => return Ok(PaymentConfirmation::Missing),
            },
        };
        let recorded = state
            .payments
            .iter()
            .any(|record| record.payment_intent_id == payment.payment_intent_id);
        if !recorded {
            state.payments.push(payment.clone());
        }
        Ok(confirmation)
    }

    async fn record_refund(
        &self,
        refund: &RefundRecord,
        payment_status: PaymentStatus,
        total_refunded: i64,
    ) -> Result<Option<Order>, anyhow::Error> {
        let mut state = self.state.lock().await;
        if !state.orders.contains_key(&refund.order_id) {
            return Ok(None);
        }
        if state.refunds.iter().any(|record| record.id == refund.id) {
            return Ok(state.orders.get(&refund.order_id).cloned());
        }
        state.refunds.push(refund.clone());
        Ok(state.orders.get_mut(&refund.order_id).map(|order| {
            order.payment_status = payment_status;
            order.refund_id = Some(refund.id.clone());
            order.refunded_amount = Some(total_refunded);
            order.updated_at = Utc::now();
            order.clone()
        }))
    }

    async fn update_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<Option<Order>, anyhow::Error> {
        let mut state = self.state.lock().await;
        Ok(state.orders.get_mut(order_id).map(|order| {
            order.status = status;
            order.updated_at = Utc::now();
            order.clone()
        }))
    }

    async fn fetch_payments(&self, order_id: &str) -> Result<Vec<PaymentRecord>, anyhow::Error> {
        let state = self.state.lock().await;
        Ok(state
            .payments
            .iter()
            .filter(|record| record.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn fetch_refunds(&self, order_id: &str) -> Result<Vec<RefundRecord>, anyhow::Error> {
        let state = self.state.lock().await;
        Ok(state
            .refunds
            .iter()
            .filter(|record| record.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn clear_cart(&self, user_id: &str) -> Result<u64, anyhow::Error> {
        let mut state = self.state.lock().await;
        Ok(state
            .carts
            .remove(user_id)
            .map(|items| items.len() as u64)
            .unwrap_or(0))
    }
}
