use serde_json::{json, Value};
use storefront_checkout::order_store::OrderStore;
use storefront_checkout::routes::order::schemas::PaymentStatus;

use crate::helpers::{create_checkout, intent_event, intent_with_charge, spawn_app, TestApp};

async fn paid_order(app: &TestApp) -> (String, String) {
    let (order_id, payment_intent_id) = create_checkout(app, "user_1").await;
    app.post_signed_webhook(&intent_event(
        "payment_intent.succeeded",
        &payment_intent_id,
        &order_id,
    ))
    .await;
    app.processor
        .insert_intent(intent_with_charge(&payment_intent_id, Some(&order_id)));
    (order_id, payment_intent_id)
}

#[actix_web::test]
async fn half_refund_marks_order_partially_refunded() {
    let app = spawn_app().await;
    let (order_id, payment_intent_id) = paid_order(&app).await;

    let response = app
        .post_json(
            "/api/payment/refund",
            &json!({ "paymentIntentId": payment_intent_id, "amount": 5250, "reason": "requested_by_customer" }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["amount"], 5250);
    assert_eq!(body["data"]["paymentStatus"], "partially_refunded");
    assert_eq!(body["data"]["orderId"], order_id.as_str());

    let order = app.store.fetch_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::PartiallyRefunded);
    assert_eq!(app.store.fetch_refunds(&order_id).await.unwrap().len(), 1);
}

#[actix_web::test]
async fn full_refund_marks_order_refunded() {
    let app = spawn_app().await;
    let (order_id, payment_intent_id) = paid_order(&app).await;

    let response = app
        .post_json(
            "/api/payment/refund",
            &json!({ "paymentIntentId": payment_intent_id }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["amount"], 10500);
    assert_eq!(body["data"]["paymentStatus"], "refunded");

    let order = app.store.fetch_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Refunded);
}

#[actix_web::test]
async fn refund_without_charge_is_rejected() {
    let app = spawn_app().await;
    let (_, payment_intent_id) = create_checkout(&app, "user_1").await;

    let response = app
        .post_json(
            "/api/payment/refund",
            &json!({ "paymentIntentId": payment_intent_id }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);
    assert!(app.processor.refunds.lock().unwrap().is_empty());
}

#[actix_web::test]
async fn refund_requires_payment_intent_id() {
    let app = spawn_app().await;

    let response = app
        .post_json("/api/payment/refund", &json!({ "amount": 100 }))
        .await;

    assert_eq!(response.status().as_u16(), 400);
}
