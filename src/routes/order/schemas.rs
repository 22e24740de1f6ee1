use std::collections::HashMap;

use actix_http::Payload;
use actix_web::web::Json;
use actix_web::{FromRequest, HttpRequest};
use chrono::{DateTime, Utc};
use futures_util::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::Validate;

use crate::constants::{
    CUSTOMER_EMAIL_METADATA_KEY, CUSTOMER_NAME_METADATA_KEY, MAX_ORDER_AMOUNT,
};
use crate::errors::GenericError;
use crate::routes::payment::schemas::{PaymentRecord, RefundRecord};

/// Fulfilment stage of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", label)
    }
}

/// Payment stage of an order. Independent from [`OrderStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    PartiallyRefunded,
    Failed,
}

impl PaymentStatus {
    pub fn is_refunded(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Refunded | PaymentStatus::PartiallyRefunded
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Cod,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    pub name: String,
    pub price: i64,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShippingDetails {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// Shared shape of temporary and permanent order records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: Option<String>,
    pub items: Vec<OrderItem>,
    pub subtotal_amount: i64,
    pub vat_amount: i64,
    pub total_amount: i64,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub payment_intent_id: Option<String>,
    pub shipping: Option<ShippingDetails>,
    #[schema(value_type = Object)]
    pub metadata: HashMap<String, Value>,
    pub refund_id: Option<String>,
    pub refunded_amount: Option<i64>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Copy of a temporary order as it is stored once its card payment is confirmed.
    pub fn into_paid(self, paid_at: DateTime<Utc>) -> Self {
        Self {
            payment_status: PaymentStatus::Paid,
            payment_method: PaymentMethod::Card,
            paid_at: Some(paid_at),
            updated_at: paid_at,
            ..self
        }
    }

    pub fn customer_email(&self) -> Option<&str> {
        self.metadata
            .get(CUSTOMER_EMAIL_METADATA_KEY)
            .and_then(|value| value.as_str())
            .or_else(|| self.shipping.as_ref().and_then(|s| s.email.as_deref()))
    }

    pub fn customer_name(&self) -> Option<&str> {
        self.metadata
            .get(CUSTOMER_NAME_METADATA_KEY)
            .and_then(|value| value.as_str())
            .or_else(|| self.shipping.as_ref().and_then(|s| s.name.as_deref()))
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    pub order: Order,
    pub payments: Vec<PaymentRecord>,
    pub refunds: Vec<RefundRecord>,
}

#[derive(Deserialize, Debug, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CodOrderRequest {
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

impl FromRequest for CodOrderRequest {
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

#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusUpdateRequest {
    pub status: OrderStatus,
    #[serde(default = "default_notify_customer")]
    pub notify_customer: bool,
}

fn default_notify_customer() -> bool {
    true
}

impl FromRequest for OrderStatusUpdateRequest {
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
pub struct OrderStatusUpdateData {
    pub order: Order,
    pub email_sent: bool,
}

/// Subject and copy of the e-mail sent when an order changes fulfilment stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEmailTemplate {
    pub subject: &'static str,
    pub heading: &'static str,
    pub message: &'static str,
}
