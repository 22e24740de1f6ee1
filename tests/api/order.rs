use serde_json::{json, Value};
use storefront_checkout::order_store::OrderStore;

use crate::helpers::{create_checkout, intent_event, spawn_app, TestApp};

async fn place_cod_order(app: &TestApp, user_id: &str) -> String {
    let response = app
        .post_json(
            "/api/orders/cod",
            &json!({
                "userId": user_id,
                "cartItems": [{ "name": "Silk Scarf", "price": 3000, "quantity": 1, "color": "Olive" }],
                "shipping": { "name": "Mariam Haddad", "email": "mariam@example.com", "city": "Dubai" }
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    body["data"]["id"].as_str().unwrap().to_string()
}

#[actix_web::test]
async fn cod_order_is_stored_as_permanent_pending_order() {
    let app = spawn_app().await;

    let order_id = place_cod_order(&app, "user_1").await;

    let response = app.get(&format!("/api/orders/{}", order_id)).await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["order"]["paymentMethod"], "cod");
    assert_eq!(body["data"]["order"]["paymentStatus"], "pending");
    assert_eq!(body["data"]["order"]["subtotalAmount"], 3000);
    assert_eq!(body["data"]["order"]["vatAmount"], 150);
    assert_eq!(body["data"]["order"]["totalAmount"], 3150);
    assert_eq!(body["data"]["payments"], json!([]));
}

#[actix_web::test]
async fn paid_order_detail_includes_payment_record() {
    let app = spawn_app().await;
    let (order_id, payment_intent_id) = create_checkout(&app, "user_1").await;
    app.post_signed_webhook(&intent_event(
        "payment_intent.succeeded",
        &payment_intent_id,
        &order_id,
    ))
    .await;

    let response = app.get(&format!("/api/orders/{}", order_id)).await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["order"]["paymentStatus"], "paid");
    assert_eq!(body["data"]["payments"][0]["paymentIntentId"], payment_intent_id.as_str());
}

#[actix_web::test]
async fn unknown_order_is_not_found() {
    let app = spawn_app().await;

    let response = app.get("/api/orders/does-not-exist").await;

    assert_eq!(response.status().as_u16(), 404);
}

#[actix_web::test]
async fn user_orders_exclude_other_users() {
    let app = spawn_app().await;
    place_cod_order(&app, "user_1").await;
    place_cod_order(&app, "user_1").await;
    place_cod_order(&app, "user_2").await;

    let response = app.get("/api/orders/user/user_1").await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    let orders = body["data"].as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert!(orders.iter().all(|order| order["userId"] == "user_1"));
}

#[actix_web::test]
async fn status_update_emails_customer() {
    let app = spawn_app().await;
    let order_id = place_cod_order(&app, "user_1").await;

    let response = app
        .put_json(
            &format!("/api/orders/{}/status", order_id),
            &json!({ "status": "shipped" }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["order"]["status"], "shipped");
    assert_eq!(body["data"]["emailSent"], true);
    let order = app.store.fetch_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status.to_string(), "shipped");
    let sent = app.email_client.sent.lock().unwrap().clone();
    assert_eq!(
        sent,
        vec![(
            "mariam@example.com".to_string(),
            "Your order has shipped".to_string()
        )]
    );
}

#[actix_web::test]
async fn status_update_can_skip_email() {
    let app = spawn_app().await;
    let order_id = place_cod_order(&app, "user_1").await;

    let response = app
        .put_json(
            &format!("/api/orders/{}/status", order_id),
            &json!({ "status": "processing", "notifyCustomer": false }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 200);
    assert!(app.email_client.sent.lock().unwrap().is_empty());
}

#[actix_web::test]
async fn unknown_status_value_is_rejected() {
    let app = spawn_app().await;
    let order_id = place_cod_order(&app, "user_1").await;

    let response = app
        .put_json(
            &format!("/api/orders/{}/status", order_id),
            &json!({ "status": "teleported" }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);
}

#[actix_web::test]
async fn manual_status_email_is_sent() {
    let app = spawn_app().await;
    let order_id = place_cod_order(&app, "user_1").await;

    let response = app
        .post_json(&format!("/api/orders/{}/status-email", order_id), &json!({}))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let sent = app.email_client.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, "Update on your order");
}
