use utoipa::OpenApi;

use crate::payment_client::{PaymentIntentStatus, RefundReason};
use crate::routes::order::handlers as order_handlers;
use crate::routes::order::schemas::{
    CodOrderRequest, Order, OrderDetail, OrderItem, OrderStatus, OrderStatusUpdateData,
    OrderStatusUpdateRequest, PaymentMethod, PaymentStatus, ShippingDetails,
};
use crate::routes::payment::handlers as payment_handlers;
use crate::routes::payment::schemas::{
    CreatePaymentIntentRequest, PaymentIntentData, PaymentIntentStatusData, PaymentRecord,
    RefundData, RefundRecord, RefundRequest, VatBreakdown, WebhookAck, WebhookOutcome,
};
use crate::routes::util::handlers as util_handlers;

#[derive(OpenApi)]
#[openapi(
    paths(
        payment_handlers::create_payment_intent,
        payment_handlers::payment_intent_status,
        payment_handlers::refund_payment,
        payment_handlers::payment_webhook,
        order_handlers::cod_order,
        order_handlers::order_detail,
        order_handlers::user_order_list,
        order_handlers::order_status_update,
        order_handlers::order_status_email,
        util_handlers::health_check,
    ),
    components(schemas(
        CreatePaymentIntentRequest,
        PaymentIntentData,
        PaymentIntentStatusData,
        PaymentIntentStatus,
        RefundRequest,
        RefundReason,
        RefundData,
        PaymentRecord,
        RefundRecord,
        VatBreakdown,
        WebhookAck,
        WebhookOutcome,
        CodOrderRequest,
        Order,
        OrderDetail,
        OrderItem,
        OrderStatus,
        PaymentStatus,
        PaymentMethod,
        ShippingDetails,
        OrderStatusUpdateRequest,
        OrderStatusUpdateData,
    )),
    tags(
        (name = "Storefront Checkout REST API", description = "Order lifecycle and payment reconciliation endpoints")
    ),
)]
pub struct ApiDoc {}
