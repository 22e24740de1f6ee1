use std::collections::HashMap;

use actix_http::Payload;
use actix_web::web::Json;
use actix_web::{FromRequest, HttpRequest};
use chrono::{DateTime, Utc};
use futures_util::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::constants::MAX_ORDER_AMOUNT;
use crate::errors::GenericError;
use crate::payment_client::{PaymentIntentStatus, RefundReason};
use crate::routes::order::schemas::{OrderItem, PaymentStatus, ShippingDetails};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VatBreakdown {
    pub subtotal: i64,
    pub vat: i64,
    pub total: i64,
}

#[derive(Deserialize, Debug, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentRequest {
    #[validate(range(
        min = 1,
        max = MAX_ORDER_AMOUNT,
        message = "amount must be between 1 and 99999999"
    ))]
    pub amount: Option<i64>,
    #[validate(length(equal = 3, message = "currency must be a three-letter code"))]
    pub currency: Option<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub cart_items: Vec<OrderItem>,
    pub shipping: Option<ShippingDetails>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: HashMap<String, Value>,
}

impl FromRequest for CreatePaymentIntentRequest {
    type Error = GenericError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let fut = Json::<Self>::from_request(req, payload);

        Box::pin(async move {
            match fut.await {
                Ok(json) => Ok(json.into_inner()),
                Err(e) => Err(GenericError::ValidationError(e.to_string())),
            }
        })
    }
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentData {
    pub client_secret: Option<String>,
    pub payment_intent_id: String,
    pub order_id: String,
    pub subtotal_amount: i64,
    pub vat_amount: i64,
    pub total_amount: i64,
    pub currency: String,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentStatusData {
    pub id: String,
    pub status: PaymentIntentStatus,
    pub amount: i64,
    pub currency: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub payment_intent_id: Option<String>,
    pub amount: Option<i64>,
    pub reason: Option<RefundReason>,
}

impl FromRequest for RefundRequest {
    type Error = GenericError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let fut = Json::<Self>::from_request(req, payload);

        Box::pin(async move {
            match fut.await {
                Ok(json) => Ok(json.into_inner()),
                Err(e) => Err(GenericError::ValidationError(e.to_string())),
            }
        })
    }
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefundData {
    pub refund_id: String,
    pub status: Option<String>,
    pub amount: i64,
    pub payment_status: PaymentStatus,
    pub order_id: Option<String>,
}

/// Append-only record of a confirmed card payment. One per payment intent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    #[schema(value_type = String)]
    pub id: Uuid,
    pub order_id: String,
    pub payment_intent_id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only record of a refund issued against an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefundRecord {
    pub id: String,
    pub order_id: String,
    pub payment_intent_id: Option<String>,
    pub charge_id: Option<String>,
    pub amount: i64,
    pub reason: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Envelope of a processor callback. `data.object` stays untyped until the event kind is known.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEventKind {
    PaymentIntentSucceeded,
    PaymentIntentPaymentFailed,
    ChargeRefunded,
    Other,
}

impl WebhookEvent {
    pub fn kind(&self) -> WebhookEventKind {
        match self.event_type.as_str() {
            "payment_intent.succeeded" => WebhookEventKind::PaymentIntentSucceeded,
            "payment_intent.payment_failed" => WebhookEventKind::PaymentIntentPaymentFailed,
            "charge.refunded" => WebhookEventKind::ChargeRefunded,
            _ => WebhookEventKind::Other,
        }
    }
}

/// What the reconciler did with a verified event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    OrderPromoted,
    OrderAlreadyPermanent,
    TempOrderDeleted,
    TempOrderAbsent,
    RefundRecorded,
    Ignored,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: WebhookOutcome,
}
