use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use super::errors::OrderError;
use super::schemas::{
    CodOrderRequest, Order, OrderDetail, OrderItem, OrderStatus, OrderStatusUpdateData,
    OrderStatusUpdateRequest, PaymentMethod, PaymentStatus, StatusEmailTemplate,
};
use crate::constants::{MAX_ORDER_AMOUNT, USER_ID_METADATA_KEY};
use crate::email_client::GenericEmailService;
use crate::order_store::OrderStore;
use crate::routes::payment::utils::{
    clear_cart_in_background, compute_vat_breakdown, resolve_currency, tax_metadata,
};
use crate::utils::format_minor_amount;

pub fn status_email_template(status: OrderStatus) -> StatusEmailTemplate {
    match status {
        OrderStatus::Processing => StatusEmailTemplate {
            subject: "Your order is being processed",
            heading: "We're preparing your order",
            message: "Good news! Your order has been confirmed and our team is now preparing it for shipment.",
        },
        OrderStatus::Shipped => StatusEmailTemplate {
            subject: "Your order has shipped",
            heading: "Your order is on its way",
            message: "Your order has left our warehouse and is on its way to you.",
        },
        OrderStatus::Delivered => StatusEmailTemplate {
            subject: "Your order has been delivered",
            heading: "Your order has arrived",
            message: "Your order has been delivered. We hope you enjoy your purchase.",
        },
        OrderStatus::Cancelled => StatusEmailTemplate {
            subject: "Your order has been cancelled",
            heading: "Your order was cancelled",
            message: "Your order has been cancelled. If you were charged, a refund will be issued to your original payment method.",
        },
        OrderStatus::Pending => StatusEmailTemplate {
            subject: "Update on your order",
            heading: "Your order has been updated",
            message: "There is an update on your order. You can review its details below.",
        },
    }
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn item_label(item: &OrderItem) -> String {
    let variants: Vec<&str> = [item.size.as_deref(), item.color.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    if variants.is_empty() {
        format!("{} x{}", item.name, item.quantity)
    } else {
        format!("{} ({}) x{}", item.name, variants.join(", "), item.quantity)
    }
}

/// Returns the `(html, text)` bodies of a status e-mail.
pub fn render_status_email(order: &Order, template: &StatusEmailTemplate) -> (String, String) {
    let greeting = match order.customer_name() {
        Some(name) => format!("Hi {},", name),
        None => "Hi there,".to_string(),
    };
    let total = format_minor_amount(order.total_amount, &order.currency);
    let items: Vec<String> = order.items.iter().map(item_label).collect();

    let text = format!(
        "{}\n\n{}\n\nOrder: {}\nStatus: {}\n{}\nTotal: {}\n",
        greeting,
        template.message,
        order.id,
        order.status,
        items
            .iter()
            .map(|item| format!("- {}\n", item))
            .collect::<String>(),
        total
    );

    let html_items: String = items
        .iter()
        .map(|item| format!("<li>{}</li>", escape_html(item)))
        .collect();
    let html = format!(
        "<html><body><h1>{}</h1><p>{}</p><p>{}</p>\
         <p><strong>Order:</strong> {}<br/><strong>Status:</strong> {}</p>\
         <ul>{}</ul><p><strong>Total:</strong> {}</p></body></html>",
        escape_html(template.heading),
        escape_html(&greeting),
        escape_html(template.message),
        escape_html(&order.id),
        order.status,
        html_items,
        escape_html(&total)
    );
    (html, text)
}

#[tracing::instrument(name = "send order status email", skip(email_client, order), fields(order_id = %order.id, status = %order.status))]
pub async fn send_order_status_email(
    email_client: &dyn GenericEmailService,
    order: &Order,
) -> Result<(), OrderError> {
    let Some(recipient) = order.customer_email() else {
        return Err(OrderError::ValidationError(format!(
            "Order {} has no customer email",
            order.id
        )));
    };
    let template = status_email_template(order.status);
    let (html, text) = render_status_email(order, &template);
    email_client
        .send_html_email(recipient, template.subject, html, text)
        .await
        .map_err(|e| OrderError::EmailError("Failed to send order status email".to_string(), e))
}

#[tracing::instrument(name = "place cod order", skip(store, request))]
pub async fn place_cod_order(
    store: &Arc<dyn OrderStore>,
    request: CodOrderRequest,
) -> Result<Order, OrderError> {
    request
        .validate()
        .map_err(|e| OrderError::ValidationError(e.to_string()))?;
    let amount = match request.amount {
        Some(amount) => amount,
        None if !request.cart_items.is_empty() => request
            .cart_items
            .iter()
            .try_fold(0i64, |sum, item| {
                item.price
                    .checked_mul(i64::from(item.quantity))
                    .and_then(|line| sum.checked_add(line))
            })
            .filter(|amount| *amount <= MAX_ORDER_AMOUNT)
            .ok_or_else(|| {
                OrderError::ValidationError(
                    "cart total exceeds the maximum order amount".to_string(),
                )
            })?,
        None => {
            return Err(OrderError::ValidationError(
                "amount or cartItems is required".to_string(),
            ))
        }
    };
    if amount <= 0 {
        return Err(OrderError::ValidationError(
            "amount must be positive".to_string(),
        ));
    }

    let breakdown = compute_vat_breakdown(amount);
    let mut metadata = request.metadata;
    metadata.extend(tax_metadata(&breakdown));
    if let Some(user_id) = &request.user_id {
        metadata.insert(
            USER_ID_METADATA_KEY.to_string(),
            Value::String(user_id.to_owned()),
        );
    }

    let now = Utc::now();
    let order = Order {
        id: Uuid::new_v4().to_string(),
        user_id: request.user_id,
        items: request.cart_items,
        subtotal_amount: breakdown.subtotal,
        vat_amount: breakdown.vat,
        total_amount: breakdown.total,
        currency: resolve_currency(request.currency.as_deref()),
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Pending,
        payment_method: PaymentMethod::Cod,
        payment_intent_id: None,
        shipping: request.shipping,
        metadata,
        refund_id: None,
        refunded_amount: None,
        paid_at: None,
        created_at: now,
        updated_at: now,
    };
    store
        .save_order(&order)
        .await
        .map_err(|e| OrderError::DatabaseError("Failed to store order".to_string(), e))?;

    if let Some(user_id) = &order.user_id {
        clear_cart_in_background(Arc::clone(store), user_id.to_owned());
    }
    Ok(order)
}

#[tracing::instrument(name = "fetch order detail", skip(store))]
pub async fn fetch_order_detail(
    store: &dyn OrderStore,
    order_id: &str,
) -> Result<OrderDetail, OrderError> {
    let order = store
        .fetch_order(order_id)
        .await
        .map_err(|e| OrderError::DatabaseError("Failed to fetch order".to_string(), e))?
        .ok_or_else(|| OrderError::NotFoundError(format!("Order {} not found", order_id)))?;
    let (payments, refunds) =
        futures::future::try_join(store.fetch_payments(order_id), store.fetch_refunds(order_id))
            .await
            .map_err(|e| {
                OrderError::DatabaseError("Failed to fetch order payment history".to_string(), e)
            })?;
    Ok(OrderDetail {
        order,
        payments,
        refunds,
    })
}

#[tracing::instrument(name = "fetch user orders", skip(store))]
pub async fn fetch_user_order_list(
    store: &dyn OrderStore,
    user_id: &str,
) -> Result<Vec<Order>, OrderError> {
    store
        .fetch_orders_by_user(user_id)
        .await
        .map_err(|e| OrderError::DatabaseError("Failed to fetch user orders".to_string(), e))
}

/// Applies a fulfilment status change. The customer e-mail is best-effort: a failure is
/// logged and reported as `email_sent: false`.
#[tracing::instrument(name = "change order status", skip(store, email_client))]
pub async fn change_order_status(
    store: &dyn OrderStore,
    email_client: &dyn GenericEmailService,
    order_id: &str,
    request: OrderStatusUpdateRequest,
) -> Result<OrderStatusUpdateData, OrderError> {
    let order = store
        .update_order_status(order_id, request.status)
        .await
        .map_err(|e| OrderError::DatabaseError("Failed to update order status".to_string(), e))?
        .ok_or_else(|| OrderError::NotFoundError(format!("Order {} not found", order_id)))?;

    let email_sent = if request.notify_customer {
        match send_order_status_email(email_client, &order).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Status email for order {} not sent: {:?}", order.id, e);
                false
            }
        }
    } else {
        false
    };
    Ok(OrderStatusUpdateData { order, email_sent })
}

#[tracing::instrument(name = "resend order status email", skip(store, email_client))]
pub async fn resend_order_status_email(
    store: &dyn OrderStore,
    email_client: &dyn GenericEmailService,
    order_id: &str,
) -> Result<Order, OrderError> {
    let order = store
        .fetch_order(order_id)
        .await
        .map_err(|e| OrderError::DatabaseError("Failed to fetch order".to_string(), e))?
        .ok_or_else(|| OrderError::NotFoundError(format!("Order {} not found", order_id)))?;
    send_order_status_email(email_client, &order).await?;
    Ok(order)
}
