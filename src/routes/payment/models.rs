use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::schemas::{PaymentRecord, RefundRecord};

#[derive(Debug, FromRow)]
pub struct PaymentRecordModel {
    pub id: Uuid,
    pub order_id: String,
    pub payment_intent_id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl PaymentRecordModel {
    pub fn into_schema(self) -> PaymentRecord {
        PaymentRecord {
            id: self.id,
            order_id: self.order_id,
            payment_intent_id: self.payment_intent_id,
            amount: self.amount,
            currency: self.currency,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct RefundRecordModel {
    pub id: String,
    pub order_id: String,
    pub payment_intent_id: Option<String>,
    pub charge_id: Option<String>,
    pub amount: i64,
    pub reason: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl RefundRecordModel {
    pub fn into_schema(self) -> RefundRecord {
        RefundRecord {
            id: self.id,
            order_id: self.order_id,
            payment_intent_id: self.payment_intent_id,
            charge_id: self.charge_id,
            amount: self.amount,
            reason: self.reason,
            status: self.status,
            created_at: self.created_at,
        }
    }
}
