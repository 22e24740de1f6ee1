use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use secrecy::SecretString;
use serde_json::{json, Value};
use storefront_checkout::{
    configuration::{ApplicationSettings, WebhookSettings},
    email_client::GenericEmailService,
    order_store::MemoryOrderStore,
    payment_client::{
        generate_signature_header, CreatePaymentIntentParams, CreateRefundParams, PaymentIntent,
        PaymentIntentStatus, PaymentProcessor, Refund,
    },
    startup::{AppServices, Application},
    telemetry::{get_subscriber, init_subscriber},
};

pub const WEBHOOK_SECRET: &str = "whsec_integration_secret";

static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let test_log = std::env::var("TEST_LOG")
        .map(|value| value == "true")
        .unwrap_or(false);
    if test_log {
        let subscriber = get_subscriber(default_filter_level, std::io::stdout);
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber(default_filter_level, std::io::sink);
        init_subscriber(subscriber);
    }
});

/// Payment processor double. Intents live in memory and can be seeded by tests.
#[derive(Default)]
pub struct FakePaymentProcessor {
    pub intents: Mutex<HashMap<String, PaymentIntent>>,
    pub refunds: Mutex<Vec<CreateRefundParams>>,
    pub fail_create: Mutex<bool>,
}

impl FakePaymentProcessor {
    pub fn insert_intent(&self, intent: PaymentIntent) {
        self.intents
            .lock()
            .unwrap()
            .insert(intent.id.clone(), intent);
    }

    pub fn intent(&self, payment_intent_id: &str) -> Option<PaymentIntent> {
        self.intents.lock().unwrap().get(payment_intent_id).cloned()
    }
}

#[async_trait]
impl PaymentProcessor for FakePaymentProcessor {
    async fn create_payment_intent(
        &self,
        params: &CreatePaymentIntentParams,
    ) -> Result<PaymentIntent, anyhow::Error> {
        if *self.fail_create.lock().unwrap() {
            return Err(anyhow::anyhow!("Your card was declined (card_declined)"));
        }
        let mut intents = self.intents.lock().unwrap();
        let id = format!("pi_test_{}", intents.len() + 1);
        let intent = PaymentIntent {
            id: id.clone(),
            amount: params.amount,
            currency: params.currency.clone(),
            status: PaymentIntentStatus::RequiresPaymentMethod,
            client_secret: Some(format!("{}_secret_abc", id)),
            metadata: params.metadata.clone(),
            latest_charge: None,
        };
        intents.insert(id, intent.clone());
        Ok(intent)
    }

    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<PaymentIntent>, anyhow::Error> {
        Ok(self.intent(payment_intent_id))
    }

    async fn update_payment_intent_metadata(
        &self,
        payment_intent_id: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<PaymentIntent, anyhow::Error> {
        let mut intents = self.intents.lock().unwrap();
        let intent = intents
            .get_mut(payment_intent_id)
            .ok_or_else(|| anyhow::anyhow!("No such payment_intent: {}", payment_intent_id))?;
        intent.metadata.extend(metadata.clone());
        Ok(intent.clone())
    }

    async fn create_refund(&self, params: &CreateRefundParams) -> Result<Refund, anyhow::Error> {
        let amount = match params.amount {
            Some(amount) => amount,
            None => self
                .intent(&params.payment_intent_id)
                .map(|intent| intent.amount)
                .unwrap_or_default(),
        };
        let mut refunds = self.refunds.lock().unwrap();
        refunds.push(params.clone());
        Ok(Refund {
            id: format!("re_test_{}", refunds.len()),
            amount,
            status: Some("succeeded".to_string()),
            charge: Some("ch_test_1".to_string()),
            payment_intent: Some(params.payment_intent_id.clone()),
            reason: params.reason.map(|reason| reason.as_str().to_string()),
        })
    }
}

#[derive(Default)]
pub struct FakeEmailClient {
    pub sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl GenericEmailService for FakeEmailClient {
    async fn send_text_email(
        &self,
        to: &str,
        subject: &str,
        _body: String,
    ) -> Result<(), anyhow::Error> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string()));
        Ok(())
    }

    async fn send_html_email(
        &self,
        to: &str,
        subject: &str,
        _html_body: String,
        text_body: String,
    ) -> Result<(), anyhow::Error> {
        self.send_text_email(to, subject, text_body).await
    }
}

#[allow(dead_code)]
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub store: Arc<MemoryOrderStore>,
    pub processor: Arc<FakePaymentProcessor>,
    pub email_client: Arc<FakeEmailClient>,
    pub api_client: reqwest::Client,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.api_client
            .post(format!("{}{}", &self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn put_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.api_client
            .put(format!("{}{}", &self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.api_client
            .get(format!("{}{}", &self.address, path))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_webhook(&self, body: &str, signature: Option<&str>) -> reqwest::Response {
        let mut request = self
            .api_client
            .post(format!("{}/api/payment/webhook", &self.address))
            .header("Content-Type", "application/json")
            .body(body.to_string());
        if let Some(signature) = signature {
            request = request.header("Stripe-Signature", signature);
        }
        request.send().await.expect("Failed to execute request.")
    }

    pub async fn post_signed_webhook(&self, event: &Value) -> reqwest::Response {
        let body = event.to_string();
        let signature = generate_signature_header(
            body.as_bytes(),
            &SecretString::from(WEBHOOK_SECRET.to_string()),
            Utc::now().timestamp(),
        )
        .expect("Failed to sign webhook body");
        self.post_webhook(&body, Some(&signature)).await
    }
}

pub fn intent_event(event_type: &str, payment_intent_id: &str, order_id: &str) -> Value {
    json!({
        "id": format!("evt_{}_{}", event_type, payment_intent_id),
        "object": "event",
        "type": event_type,
        "data": {
            "object": {
                "id": payment_intent_id,
                "object": "payment_intent",
                "amount": 10500,
                "currency": "aed",
                "status": "succeeded",
                "client_secret": format!("{}_secret_abc", payment_intent_id),
                "metadata": { "orderId": order_id, "userId": "user_1" },
                "latest_charge": "ch_test_1"
            }
        }
    })
}

pub fn refund_event(payment_intent_id: &str, amount: i64, amount_refunded: i64) -> Value {
    json!({
        "id": format!("evt_refund_{}", amount_refunded),
        "object": "event",
        "type": "charge.refunded",
        "data": {
            "object": {
                "id": "ch_test_1",
                "object": "charge",
                "amount": amount,
                "amount_refunded": amount_refunded,
                "currency": "aed",
                "payment_intent": payment_intent_id,
                "refunded": amount == amount_refunded,
                "refunds": {
                    "data": [{
                        "id": format!("re_hook_{}", amount_refunded),
                        "amount": amount_refunded,
                        "status": "succeeded",
                        "charge": "ch_test_1",
                        "payment_intent": payment_intent_id
                    }]
                }
            }
        }
    })
}

pub fn intent_with_charge(payment_intent_id: &str, order_id: Option<&str>) -> PaymentIntent {
    let mut metadata = HashMap::new();
    if let Some(order_id) = order_id {
        metadata.insert("orderId".to_string(), order_id.to_string());
    }
    PaymentIntent {
        id: payment_intent_id.to_string(),
        amount: 10500,
        currency: "aed".to_string(),
        status: PaymentIntentStatus::Succeeded,
        client_secret: None,
        metadata,
        latest_charge: Some("ch_test_1".to_string()),
    }
}

/// Creates an intent through the API and returns `(order_id, payment_intent_id)`.
pub async fn create_checkout(app: &TestApp, user_id: &str) -> (String, String) {
    let response = app
        .post_json(
            "/api/payment/create-intent",
            &json!({
                "amount": 10000,
                "userId": user_id,
                "cartItems": [{ "name": "Linen Abaya", "price": 5000, "quantity": 2, "size": "M" }],
                "metadata": { "customerEmail": "mariam@example.com", "customerName": "Mariam Haddad" }
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.expect("Invalid JSON response");
    (
        body["data"]["orderId"].as_str().unwrap().to_string(),
        body["data"]["paymentIntentId"].as_str().unwrap().to_string(),
    )
}

pub async fn spawn_app() -> TestApp {
    Lazy::force(&TRACING);

    let application_setting = ApplicationSettings {
        port: 0,
        host: "127.0.0.1".to_string(),
        workers: 1,
        json_log: false,
        log_level: "info".to_string(),
        cors_origins: vec![],
    };
    let webhook_setting = WebhookSettings {
        signing_secret: SecretString::from(WEBHOOK_SECRET.to_string()),
        tolerance_seconds: 300,
    };
    let store = Arc::new(MemoryOrderStore::new());
    let processor = Arc::new(FakePaymentProcessor::default());
    let email_client = Arc::new(FakeEmailClient::default());
    let services = AppServices {
        order_store: store.clone(),
        payment_processor: processor.clone(),
        email_client: email_client.clone(),
    };

    let application =
        Application::build_with_services(application_setting, webhook_setting, services)
            .expect("Failed to build application.");
    let port = application.port();
    let address = format!("http://127.0.0.1:{}", port);
    actix_web::rt::spawn(application.run_until_stopped());

    TestApp {
        address,
        port,
        store,
        processor,
        email_client,
        api_client: reqwest::Client::new(),
    }
}
