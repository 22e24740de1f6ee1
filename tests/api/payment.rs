use serde_json::{json, Value};
use storefront_checkout::order_store::OrderStore;
use storefront_checkout::routes::order::schemas::{PaymentMethod, PaymentStatus};

use crate::helpers::{create_checkout, spawn_app};

#[actix_web::test]
async fn create_intent_returns_client_secret_and_tax_breakdown() {
    let app = spawn_app().await;

    let response = app
        .post_json(
            "/api/payment/create-intent",
            &json!({
                "amount": 10000,
                "userId": "user_1",
                "cartItems": [{ "name": "Linen Abaya", "price": 5000, "quantity": 2 }]
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], true);
    assert_eq!(body["data"]["subtotalAmount"], 10000);
    assert_eq!(body["data"]["vatAmount"], 500);
    assert_eq!(body["data"]["totalAmount"], 10500);
    assert_eq!(body["data"]["currency"], "aed");
    assert!(body["data"]["clientSecret"].as_str().is_some());

    let order_id = body["data"]["orderId"].as_str().unwrap();
    let payment_intent_id = body["data"]["paymentIntentId"].as_str().unwrap();
    let temp_order = app.store.temp_order(order_id).await.unwrap();
    assert_eq!(temp_order.total_amount, 10500);
    assert_eq!(temp_order.payment_status, PaymentStatus::Pending);
    assert_eq!(temp_order.payment_method, PaymentMethod::Card);

    let intent = app.processor.intent(payment_intent_id).unwrap();
    assert_eq!(intent.amount, 10500);
    assert_eq!(intent.metadata.get("orderId").map(String::as_str), Some(order_id));
    assert_eq!(intent.metadata.get("userId").map(String::as_str), Some("user_1"));
}

#[actix_web::test]
async fn create_intent_rejects_incomplete_requests() {
    let app = spawn_app().await;
    let test_cases = vec![
        (json!({ "userId": "user_1" }), "missing amount"),
        (json!({ "amount": 10000 }), "missing userId"),
        (json!({ "amount": 0, "userId": "user_1" }), "zero amount"),
        (
            json!({ "amount": 100, "userId": "user_1", "currency": "dirham" }),
            "invalid currency",
        ),
        (json!({ "amount": "ten", "userId": "user_1" }), "non numeric amount"),
    ];

    for (body, description) in test_cases {
        let response = app.post_json("/api/payment/create-intent", &body).await;
        assert_eq!(
            response.status().as_u16(),
            400,
            "The API did not fail with 400 when the payload had {}.",
            description
        );
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], false);
    }
    assert_eq!(app.store.temp_order_count().await, 0);
}

#[actix_web::test]
async fn processor_failure_surfaces_as_bad_gateway_without_temp_order() {
    let app = spawn_app().await;
    *app.processor.fail_create.lock().unwrap() = true;

    let response = app
        .post_json(
            "/api/payment/create-intent",
            &json!({ "amount": 10000, "userId": "user_1" }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 502);
    assert_eq!(app.store.temp_order_count().await, 0);
}

#[actix_web::test]
async fn intent_status_is_fetched_from_processor() {
    let app = spawn_app().await;
    let (order_id, payment_intent_id) = create_checkout(&app, "user_1").await;

    let response = app
        .get(&format!("/api/payment/{}", payment_intent_id))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["id"], payment_intent_id.as_str());
    assert_eq!(body["data"]["status"], "requires_payment_method");
    assert_eq!(body["data"]["amount"], 10500);
    assert_eq!(body["data"]["metadata"]["orderId"], order_id.as_str());
}

#[actix_web::test]
async fn unknown_intent_status_is_not_found() {
    let app = spawn_app().await;

    let response = app.get("/api/payment/pi_does_not_exist").await;

    assert_eq!(response.status().as_u16(), 404);
}
