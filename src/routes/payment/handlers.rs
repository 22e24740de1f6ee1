use actix_web::{web, HttpRequest};

use super::schemas::{
    CreatePaymentIntentRequest, PaymentIntentData, PaymentIntentStatusData, RefundData,
    RefundRequest, WebhookAck,
};
use super::utils::{
    fetch_payment_intent_status, initiate_payment, process_refund, reconcile_webhook_event,
    verify_webhook_event,
};
use crate::configuration::WebhookSettings;
use crate::constants::STRIPE_SIGNATURE_HEADER;
use crate::errors::GenericError;
use crate::order_store::OrderStore;
use crate::payment_client::PaymentProcessor;
use crate::schemas::GenericResponse;
use utoipa::TupleUnit;

#[utoipa::path(
    post,
    path = "/api/payment/create-intent",
    tag = "Payment",
    description = "Computes VAT, creates a payment intent for the total and records a temporary order.",
    summary = "Payment Intent Creation Request",
    request_body(content = CreatePaymentIntentRequest, description = "Request Body"),
    responses(
        (status=200, description= "Payment intent created", body= GenericResponse<PaymentIntentData>),
        (status=400, description= "Invalid Request body", body= GenericResponse<TupleUnit>),
        (status=500, description= "Internal Server Error", body= GenericResponse<TupleUnit>),
        (status=502, description= "Payment processor failure", body= GenericResponse<TupleUnit>),
    )
)]
#[tracing::instrument(name = "create payment intent", skip(processor, store), fields(user_id = ?body.user_id))]
pub async fn create_payment_intent(
    body: CreatePaymentIntentRequest,
    processor: web::Data<dyn PaymentProcessor>,
    store: web::Data<dyn OrderStore>,
) -> Result<web::Json<GenericResponse<PaymentIntentData>>, GenericError> {
    let data = initiate_payment(&**processor, &**store, body).await?;
    Ok(web::Json(GenericResponse::success(
        "Successfully created payment intent",
        Some(data),
    )))
}

#[utoipa::path(
    get,
    path = "/api/payment/{payment_intent_id}",
    tag = "Payment",
    description = "Fetches the current state of a payment intent from the processor.",
    summary = "Payment Intent Status Request",
    params(
        ("payment_intent_id" = String, Path, description = "Processor payment intent id")
    ),
    responses(
        (status=200, description= "Payment intent status", body= GenericResponse<PaymentIntentStatusData>),
        (status=404, description= "Payment intent not found", body= GenericResponse<TupleUnit>),
        (status=502, description= "Payment processor failure", body= GenericResponse<TupleUnit>),
    )
)]
#[tracing::instrument(name = "payment intent status", skip(processor))]
pub async fn payment_intent_status(
    path: web::Path<String>,
    processor: web::Data<dyn PaymentProcessor>,
) -> Result<web::Json<GenericResponse<PaymentIntentStatusData>>, GenericError> {
    let payment_intent_id = path.into_inner();
    let data = fetch_payment_intent_status(&**processor, &payment_intent_id).await?;
    Ok(web::Json(GenericResponse::success(
        "Successfully fetched payment intent",
        Some(data),
    )))
}

#[utoipa::path(
    post,
    path = "/api/payment/refund",
    tag = "Payment",
    description = "Refunds a payment intent fully or partially and records the refund against its order.",
    summary = "Refund Request",
    request_body(content = RefundRequest, description = "Request Body"),
    responses(
        (status=200, description= "Refund issued", body= GenericResponse<RefundData>),
        (status=400, description= "Invalid Request body or no charge to refund", body= GenericResponse<TupleUnit>),
        (status=404, description= "Payment intent not found", body= GenericResponse<TupleUnit>),
        (status=502, description= "Payment processor failure", body= GenericResponse<TupleUnit>),
    )
)]
#[tracing::instrument(name = "refund payment", skip(processor, store))]
pub async fn refund_payment(
    body: RefundRequest,
    processor: web::Data<dyn PaymentProcessor>,
    store: web::Data<dyn OrderStore>,
) -> Result<web::Json<GenericResponse<RefundData>>, GenericError> {
    let data = process_refund(&**processor, &**store, body).await?;
    Ok(web::Json(GenericResponse::success(
        "Successfully processed refund",
        Some(data),
    )))
}

#[utoipa::path(
    post,
    path = "/api/payment/webhook",
    tag = "Payment",
    description = "Receives signed payment processor events. The raw body is verified before it is parsed.",
    summary = "Payment Webhook",
    request_body(content = String, description = "Raw event body", content_type = "application/json"),
    params(
        ("stripe-signature" = String, Header, description = "t=<timestamp>,v1=<hex hmac>")
    ),
    responses(
        (status=200, description= "Event acknowledged", body= GenericResponse<WebhookAck>),
        (status=400, description= "Signature verification failed or malformed event", body= GenericResponse<TupleUnit>),
        (status=500, description= "Event processing failed", body= GenericResponse<TupleUnit>),
    )
)]
#[tracing::instrument(name = "payment webhook", skip(req, body, store, webhook_setting))]
pub async fn payment_webhook(
    req: HttpRequest,
    body: web::Bytes,
    store: web::Data<dyn OrderStore>,
    webhook_setting: web::Data<WebhookSettings>,
) -> Result<web::Json<GenericResponse<WebhookAck>>, GenericError> {
    let signature_header = req
        .headers()
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let event = verify_webhook_event(&body, signature_header, &webhook_setting)?;
    let outcome = reconcile_webhook_event(&store.into_inner(), event).await?;
    Ok(web::Json(GenericResponse::success(
        "Webhook received",
        Some(WebhookAck {
            received: true,
            outcome,
        }),
    )))
}
