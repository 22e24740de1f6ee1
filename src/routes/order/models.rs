use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;

use super::schemas::{Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ShippingDetails};

#[derive(Debug, FromRow)]
pub struct OrderModel {
    pub id: String,
    pub user_id: Option<String>,
    pub items: Json<Vec<OrderItem>>,
    pub subtotal_amount: i64,
    pub vat_amount: i64,
    pub total_amount: i64,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub payment_intent_id: Option<String>,
    pub shipping: Option<Json<ShippingDetails>>,
    pub metadata: Json<HashMap<String, Value>>,
    pub refund_id: Option<String>,
    pub refunded_amount: Option<i64>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderModel {
    pub fn into_schema(self) -> Order {
        Order {
            id: self.id,
            user_id: self.user_id,
            items: self.items.0,
            subtotal_amount: self.subtotal_amount,
            vat_amount: self.vat_amount,
            total_amount: self.total_amount,
            currency: self.currency,
            status: self.status,
            payment_status: self.payment_status,
            payment_method: self.payment_method,
            payment_intent_id: self.payment_intent_id,
            shipping: self.shipping.map(|shipping| shipping.0),
            metadata: self.metadata.0,
            refund_id: self.refund_id,
            refunded_amount: self.refunded_amount,
            paid_at: self.paid_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
