use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;
use validator::Validate;

use super::errors::{PaymentError, WebhookError};
use super::schemas::{
    CreatePaymentIntentRequest, PaymentIntentData, PaymentIntentStatusData, PaymentRecord,
    RefundData, RefundRecord, RefundRequest, VatBreakdown, WebhookEvent, WebhookEventKind,
    WebhookOutcome,
};
use crate::configuration::WebhookSettings;
use crate::constants::{DEFAULT_CURRENCY, ORDER_ID_METADATA_KEY, USER_ID_METADATA_KEY, VAT_RATE};
use crate::order_store::{OrderStore, PaymentConfirmation};
use crate::payment_client::{
    verify_webhook_signature, Charge, CreatePaymentIntentParams, CreateRefundParams,
    PaymentIntent, PaymentProcessor, WebhookSignatureError,
};
use crate::routes::order::schemas::{Order, OrderStatus, PaymentMethod, PaymentStatus};
use crate::utils::stringify_metadata;

/// Additive VAT on a minor-unit amount. The float product is rounded half away from zero.
pub fn compute_vat_breakdown(amount: i64) -> VatBreakdown {
    let vat = (amount as f64 * VAT_RATE).round() as i64;
    VatBreakdown {
        subtotal: amount,
        vat,
        total: amount + vat,
    }
}

/// Normalised three-letter currency code, `aed` when absent.
pub fn resolve_currency(currency: Option<&str>) -> String {
    currency
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
}

/// Tax fields stamped on both the processor intent and the stored order.
pub fn tax_metadata(breakdown: &VatBreakdown) -> HashMap<String, Value> {
    HashMap::from([
        ("subtotalAmount".to_string(), Value::from(breakdown.subtotal)),
        ("vatAmount".to_string(), Value::from(breakdown.vat)),
        ("totalAmount".to_string(), Value::from(breakdown.total)),
        ("vatRate".to_string(), Value::from(VAT_RATE)),
    ])
}

/// `refunded` once the whole original amount has been returned.
pub fn refund_payment_status(refunded_amount: i64, original_amount: i64) -> PaymentStatus {
    if refunded_amount >= original_amount {
        PaymentStatus::Refunded
    } else {
        PaymentStatus::PartiallyRefunded
    }
}

#[tracing::instrument(name = "initiate payment", skip(processor, store, request))]
pub async fn initiate_payment(
    processor: &dyn PaymentProcessor,
    store: &dyn OrderStore,
    request: CreatePaymentIntentRequest,
) -> Result<PaymentIntentData, PaymentError> {
    let Some(amount) = request.amount else {
        return Err(PaymentError::ValidationError(
            "amount is required".to_string(),
        ));
    };
    let Some(user_id) = request.user_id.clone() else {
        return Err(PaymentError::ValidationError(
            "userId is required".to_string(),
        ));
    };
    request
        .validate()
        .map_err(|e| PaymentError::ValidationError(e.to_string()))?;

    let currency = resolve_currency(request.currency.as_deref());
    let breakdown = compute_vat_breakdown(amount);

    let mut order_metadata = request.metadata;
    order_metadata.extend(tax_metadata(&breakdown));
    order_metadata.insert(
        USER_ID_METADATA_KEY.to_string(),
        Value::String(user_id.clone()),
    );

    let intent = processor
        .create_payment_intent(&CreatePaymentIntentParams {
            amount: breakdown.total,
            currency: currency.clone(),
            metadata: stringify_metadata(&order_metadata),
        })
        .await
        .map_err(|e| PaymentError::UpstreamError("Failed to create payment intent".to_string(), e))?;

    let now = Utc::now();
    let order = Order {
        id: Uuid::new_v4().to_string(),
        user_id: Some(user_id),
        items: request.cart_items,
        subtotal_amount: breakdown.subtotal,
        vat_amount: breakdown.vat,
        total_amount: breakdown.total,
        currency: currency.clone(),
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Pending,
        payment_method: PaymentMethod::Card,
        payment_intent_id: Some(intent.id.clone()),
        shipping: request.shipping,
        metadata: order_metadata,
        refund_id: None,
        refunded_amount: None,
        paid_at: None,
        created_at: now,
        updated_at: now,
    };
    store.save_temp_order(&order).await.map_err(|e| {
        PaymentError::DatabaseError("Failed to store temporary order".to_string(), e)
    })?;

    let order_reference = HashMap::from([(ORDER_ID_METADATA_KEY.to_string(), order.id.clone())]);
    if let Err(e) = processor
        .update_payment_intent_metadata(&intent.id, &order_reference)
        .await
    {
        // The temporary order exists but the intent cannot be traced back to it.
        tracing::error!(
            "Failed to attach order {} to payment intent {}: {:?}",
            order.id,
            intent.id,
            e
        );
    }

    Ok(PaymentIntentData {
        client_secret: intent.client_secret,
        payment_intent_id: intent.id,
        order_id: order.id,
        subtotal_amount: breakdown.subtotal,
        vat_amount: breakdown.vat,
        total_amount: breakdown.total,
        currency,
    })
}

#[tracing::instrument(name = "fetch payment intent status", skip(processor))]
pub async fn fetch_payment_intent_status(
    processor: &dyn PaymentProcessor,
    payment_intent_id: &str,
) -> Result<PaymentIntentStatusData, PaymentError> {
    let intent = processor
        .retrieve_payment_intent(payment_intent_id)
        .await
        .map_err(|e| {
            PaymentError::UpstreamError("Failed to retrieve payment intent".to_string(), e)
        })?
        .ok_or_else(|| {
            PaymentError::NotFoundError(format!(
                "Payment intent {} not found",
                payment_intent_id
            ))
        })?;
    Ok(PaymentIntentStatusData {
        id: intent.id,
        status: intent.status,
        amount: intent.amount,
        currency: intent.currency,
        metadata: intent.metadata,
    })
}

/// Order a refund applies to: the intent's `orderId` metadata, else the order that
/// references the intent.
async fn resolve_refund_order(
    store: &dyn OrderStore,
    intent: &PaymentIntent,
) -> Result<Option<Order>, anyhow::Error> {
    if let Some(order_id) = intent.metadata.get(ORDER_ID_METADATA_KEY) {
        if let Some(order) = store.fetch_order(order_id).await? {
            return Ok(Some(order));
        }
    }
    store.fetch_order_by_payment_intent(&intent.id).await
}

#[tracing::instrument(name = "process refund", skip(processor, store))]
pub async fn process_refund(
    processor: &dyn PaymentProcessor,
    store: &dyn OrderStore,
    request: RefundRequest,
) -> Result<RefundData, PaymentError> {
    let Some(payment_intent_id) = request.payment_intent_id else {
        return Err(PaymentError::ValidationError(
            "paymentIntentId is required".to_string(),
        ));
    };
    if matches!(request.amount, Some(amount) if amount <= 0) {
        return Err(PaymentError::ValidationError(
            "amount must be positive".to_string(),
        ));
    }

    let intent = processor
        .retrieve_payment_intent(&payment_intent_id)
        .await
        .map_err(|e| {
            PaymentError::UpstreamError("Failed to retrieve payment intent".to_string(), e)
        })?
        .ok_or_else(|| {
            PaymentError::NotFoundError(format!(
                "Payment intent {} not found",
                payment_intent_id
            ))
        })?;
    let Some(charge_id) = intent.latest_charge.clone() else {
        return Err(PaymentError::NoChargeError(
            "No charge found for this payment intent".to_string(),
        ));
    };

    let refund = processor
        .create_refund(&CreateRefundParams {
            payment_intent_id: intent.id.clone(),
            amount: request.amount,
            reason: request.reason,
        })
        .await
        .map_err(|e| PaymentError::UpstreamError("Failed to create refund".to_string(), e))?;

    let order = match resolve_refund_order(store, &intent).await {
        Ok(order) => order,
        Err(e) => {
            tracing::error!("Failed to look up order for refund {}: {:?}", refund.id, e);
            None
        }
    };
    let previously_refunded = order
        .as_ref()
        .and_then(|order| order.refunded_amount)
        .unwrap_or(0);
    let total_refunded = previously_refunded + refund.amount;
    let mut payment_status = refund_payment_status(total_refunded, intent.amount);

    let order_id = match order {
        Some(order) => {
            let record = RefundRecord {
                id: refund.id.clone(),
                order_id: order.id.clone(),
                payment_intent_id: Some(intent.id.clone()),
                charge_id: refund.charge.clone().or(Some(charge_id)),
                amount: refund.amount,
                reason: refund.reason.clone(),
                status: refund.status.clone().unwrap_or_else(|| "pending".to_string()),
                created_at: Utc::now(),
            };
            // The refund already happened upstream; a local failure must not hide that.
            match store
                .record_refund(&record, payment_status, total_refunded)
                .await
            {
                Ok(Some(updated)) => payment_status = updated.payment_status,
                Ok(None) => tracing::warn!(
                    "Order {} disappeared before refund {} was recorded",
                    order.id,
                    refund.id
                ),
                Err(e) => tracing::error!(
                    "Refund {} issued but order {} was not updated: {:?}",
                    refund.id,
                    order.id,
                    e
                ),
            }
            Some(order.id)
        }
        None => {
            tracing::warn!(
                "Refund {} issued for payment intent {} without a matching order",
                refund.id,
                intent.id
            );
            None
        }
    };

    Ok(RefundData {
        refund_id: refund.id,
        status: refund.status,
        amount: refund.amount,
        payment_status,
        order_id,
    })
}

/// Checks the signature over the untouched body, then parses the event.
pub fn verify_webhook_event(
    payload: &[u8],
    signature_header: Option<&str>,
    webhook_setting: &WebhookSettings,
) -> Result<WebhookEvent, WebhookError> {
    let signature_header = signature_header.ok_or(WebhookSignatureError::MissingHeader)?;
    verify_webhook_signature(
        payload,
        signature_header,
        &webhook_setting.signing_secret,
        webhook_setting.tolerance_seconds,
        Utc::now().timestamp(),
    )?;
    serde_json::from_slice::<WebhookEvent>(payload).map_err(WebhookError::PayloadError)
}

pub(crate) fn clear_cart_in_background(store: Arc<dyn OrderStore>, user_id: String) {
    tokio::spawn(
        async move {
            match store.clear_cart(&user_id).await {
                Ok(removed) => tracing::info!("Cleared {} cart items for user {}", removed, user_id),
                Err(e) => tracing::error!("Failed to clear cart for user {}: {:?}", user_id, e),
            }
        }
        .instrument(tracing::Span::current()),
    );
}

#[tracing::instrument(name = "handle payment success", skip(store, intent), fields(payment_intent_id = %intent.id))]
async fn handle_payment_succeeded(
    store: &Arc<dyn OrderStore>,
    intent: PaymentIntent,
) -> Result<WebhookOutcome, anyhow::Error> {
    let Some(order_id) = intent.metadata.get(ORDER_ID_METADATA_KEY).cloned() else {
        tracing::warn!("Payment intent {} carries no order id", intent.id);
        return Ok(WebhookOutcome::Ignored);
    };
    let payment = PaymentRecord {
        id: Uuid::new_v4(),
        order_id: order_id.clone(),
        payment_intent_id: intent.id.clone(),
        amount: intent.amount,
        currency: intent.currency.clone(),
        status: "succeeded".to_string(),
        created_at: Utc::now(),
    };
    let (order, outcome) = match store.confirm_payment(&order_id, &payment).await? {
        PaymentConfirmation::Promoted(order) => {
            tracing::info!("Order {} promoted to permanent store", order.id);
            (order, WebhookOutcome::OrderPromoted)
        }
        PaymentConfirmation::AlreadyPermanent(order) => {
            tracing::info!("Order {} already permanent, marked paid in place", order.id);
            (order, WebhookOutcome::OrderAlreadyPermanent)
        }
        PaymentConfirmation::Missing => {
            return Err(anyhow!(
                "Order {} not found in temporary or permanent store",
                order_id
            ));
        }
    };

    let user_id = order
        .user_id
        .clone()
        .or_else(|| intent.metadata.get(USER_ID_METADATA_KEY).cloned());
    if let Some(user_id) = user_id {
        clear_cart_in_background(Arc::clone(store), user_id);
    }
    Ok(outcome)
}

#[tracing::instrument(name = "handle payment failure", skip(store, intent), fields(payment_intent_id = %intent.id))]
async fn handle_payment_failed(
    store: &dyn OrderStore,
    intent: PaymentIntent,
) -> Result<WebhookOutcome, anyhow::Error> {
    let Some(order_id) = intent.metadata.get(ORDER_ID_METADATA_KEY) else {
        tracing::warn!("Payment intent {} carries no order id", intent.id);
        return Ok(WebhookOutcome::Ignored);
    };
    if store.delete_temp_order(order_id).await? {
        tracing::info!("Temporary order {} deleted after failed payment", order_id);
        Ok(WebhookOutcome::TempOrderDeleted)
    } else {
        tracing::info!("No temporary order {} to delete", order_id);
        Ok(WebhookOutcome::TempOrderAbsent)
    }
}

#[tracing::instrument(name = "handle charge refund", skip(store, charge), fields(charge_id = %charge.id))]
async fn handle_charge_refunded(
    store: &dyn OrderStore,
    charge: Charge,
) -> Result<WebhookOutcome, anyhow::Error> {
    let Some(payment_intent_id) = charge.payment_intent.as_deref() else {
        tracing::warn!("Charge {} has no payment intent", charge.id);
        return Ok(WebhookOutcome::Ignored);
    };
    let Some(order) = store.fetch_order_by_payment_intent(payment_intent_id).await? else {
        tracing::warn!("No order found for payment intent {}", payment_intent_id);
        return Ok(WebhookOutcome::Ignored);
    };

    let payment_status = refund_payment_status(charge.amount_refunded, charge.amount);
    let latest_refund = charge.latest_refund();
    let record = RefundRecord {
        id: latest_refund
            .map(|refund| refund.id.clone())
            .unwrap_or_else(|| format!("{}-{}", charge.id, charge.amount_refunded)),
        order_id: order.id.clone(),
        payment_intent_id: Some(payment_intent_id.to_string()),
        charge_id: Some(charge.id.clone()),
        amount: latest_refund
            .map(|refund| refund.amount)
            .unwrap_or(charge.amount_refunded),
        reason: latest_refund.and_then(|refund| refund.reason.clone()),
        status: latest_refund
            .and_then(|refund| refund.status.clone())
            .unwrap_or_else(|| "succeeded".to_string()),
        created_at: Utc::now(),
    };
    match store
        .record_refund(&record, payment_status, charge.amount_refunded)
        .await?
    {
        Some(order) => {
            tracing::info!(
                "Order {} payment status set to {:?}",
                order.id,
                order.payment_status
            );
            Ok(WebhookOutcome::RefundRecorded)
        }
        None => {
            tracing::warn!("Order {} disappeared before the refund was recorded", order.id);
            Ok(WebhookOutcome::Ignored)
        }
    }
}

#[tracing::instrument(name = "reconcile webhook event", skip(store, event), fields(event_id = %event.id, event_type = %event.event_type))]
pub async fn reconcile_webhook_event(
    store: &Arc<dyn OrderStore>,
    event: WebhookEvent,
) -> Result<WebhookOutcome, WebhookError> {
    let event_id = event.id.clone();
    let processing_error = |e: anyhow::Error| WebhookError::ProcessingError(event_id.clone(), e);
    match event.kind() {
        WebhookEventKind::PaymentIntentSucceeded => {
            let intent: PaymentIntent = serde_json::from_value(event.data.object)
                .map_err(|e| processing_error(e.into()))?;
            handle_payment_succeeded(store, intent)
                .await
                .map_err(processing_error)
        }
        WebhookEventKind::PaymentIntentPaymentFailed => {
            let intent: PaymentIntent = serde_json::from_value(event.data.object)
                .map_err(|e| processing_error(e.into()))?;
            handle_payment_failed(&**store, intent)
                .await
                .map_err(processing_error)
        }
        WebhookEventKind::ChargeRefunded => {
            let charge: Charge = serde_json::from_value(event.data.object)
                .map_err(|e| processing_error(e.into()))?;
            handle_charge_refunded(&**store, charge)
                .await
                .map_err(processing_error)
        }
        WebhookEventKind::Other => {
            tracing::info!("Unhandled event type {}", event.event_type);
            Ok(WebhookOutcome::Ignored)
        }
    }
}
