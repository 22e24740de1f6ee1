use serde_json::Value;
use storefront_checkout::order_store::OrderStore;
use storefront_checkout::routes::order::schemas::PaymentStatus;

use crate::helpers::{create_checkout, intent_event, refund_event, spawn_app};

#[actix_web::test]
async fn payment_success_promotes_temporary_order() {
    let app = spawn_app().await;
    let (order_id, payment_intent_id) = create_checkout(&app, "user_1").await;

    let response = app
        .post_signed_webhook(&intent_event(
            "payment_intent.succeeded",
            &payment_intent_id,
            &order_id,
        ))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["received"], true);
    assert_eq!(body["data"]["outcome"], "order_promoted");

    assert!(app.store.temp_order(&order_id).await.is_none());
    let order = app.store.fetch_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.total_amount, 10500);
    assert_eq!(app.store.fetch_payments(&order_id).await.unwrap().len(), 1);
}

#[actix_web::test]
async fn duplicate_payment_success_keeps_one_order() {
    let app = spawn_app().await;
    let (order_id, payment_intent_id) = create_checkout(&app, "user_1").await;
    let event = intent_event("payment_intent.succeeded", &payment_intent_id, &order_id);

    let first = app.post_signed_webhook(&event).await;
    let second = app.post_signed_webhook(&event).await;

    assert_eq!(first.status().as_u16(), 200);
    assert_eq!(second.status().as_u16(), 200);
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["data"]["outcome"], "order_already_permanent");
    assert_eq!(app.store.order_count().await, 1);
    assert_eq!(app.store.temp_order_count().await, 0);
    assert_eq!(app.store.fetch_payments(&order_id).await.unwrap().len(), 1);
}

#[actix_web::test]
async fn payment_failure_deletes_temporary_order() {
    let app = spawn_app().await;
    let (order_id, payment_intent_id) = create_checkout(&app, "user_1").await;

    let response = app
        .post_signed_webhook(&intent_event(
            "payment_intent.payment_failed",
            &payment_intent_id,
            &order_id,
        ))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    assert!(app.store.temp_order(&order_id).await.is_none());
    assert!(app.store.fetch_order(&order_id).await.unwrap().is_none());
}

#[actix_web::test]
async fn invalid_signature_is_rejected_without_mutation() {
    let app = spawn_app().await;
    let (order_id, payment_intent_id) = create_checkout(&app, "user_1").await;
    let body =
        intent_event("payment_intent.succeeded", &payment_intent_id, &order_id).to_string();

    let unsigned = app.post_webhook(&body, None).await;
    let forged = app
        .post_webhook(&body, Some("t=1700000000,v1=deadbeef"))
        .await;

    assert_eq!(unsigned.status().as_u16(), 400);
    assert_eq!(forged.status().as_u16(), 400);
    assert!(app.store.temp_order(&order_id).await.is_some());
    assert!(app.store.fetch_order(&order_id).await.unwrap().is_none());
}

#[actix_web::test]
async fn success_for_unknown_order_fails_so_processor_retries() {
    let app = spawn_app().await;

    let response = app
        .post_signed_webhook(&intent_event(
            "payment_intent.succeeded",
            "pi_orphan",
            "order_missing",
        ))
        .await;

    assert_eq!(response.status().as_u16(), 500);
}

#[actix_web::test]
async fn charge_refund_updates_payment_status() {
    let app = spawn_app().await;
    let (order_id, payment_intent_id) = create_checkout(&app, "user_1").await;
    app.post_signed_webhook(&intent_event(
        "payment_intent.succeeded",
        &payment_intent_id,
        &order_id,
    ))
    .await;

    let response = app
        .post_signed_webhook(&refund_event(&payment_intent_id, 10500, 5250))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let order = app.store.fetch_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::PartiallyRefunded);

    app.post_signed_webhook(&refund_event(&payment_intent_id, 10500, 10500))
        .await;
    let order = app.store.fetch_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Refunded);
    assert_eq!(order.refunded_amount, Some(10500));
}
