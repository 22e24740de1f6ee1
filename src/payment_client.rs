use std::collections::HashMap;

use anyhow::anyhow;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::Sha256;
use utoipa::ToSchema;

use crate::configuration::PaymentSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentIntentStatus,
    pub client_secret: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub latest_charge: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Charge {
    pub id: String,
    pub amount: i64,
    pub amount_refunded: i64,
    pub currency: String,
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub refunded: bool,
    pub refunds: Option<RefundList>,
}

impl Charge {
    /// Most recent refund attached to the charge, when the processor included it.
    pub fn latest_refund(&self) -> Option<&Refund> {
        self.refunds.as_ref().and_then(|list| list.data.first())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundList {
    #[serde(default)]
    pub data: Vec<Refund>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    pub amount: i64,
    pub status: Option<String>,
    pub charge: Option<String>,
    pub payment_intent: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RefundReason {
    Duplicate,
    Fraudulent,
    RequestedByCustomer,
}

impl RefundReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundReason::Duplicate => "duplicate",
            RefundReason::Fraudulent => "fraudulent",
            RefundReason::RequestedByCustomer => "requested_by_customer",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreatePaymentIntentParams {
    pub amount: i64,
    pub currency: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct CreateRefundParams {
    pub payment_intent_id: String,
    pub amount: Option<i64>,
    pub reason: Option<RefundReason>,
}

/// Operations the checkout flow needs from the external payment processor.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_payment_intent(
        &self,
        params: &CreatePaymentIntentParams,
    ) -> Result<PaymentIntent, anyhow::Error>;

    /// `Ok(None)` when the processor does not know the intent.
    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<PaymentIntent>, anyhow::Error>;

    async fn update_payment_intent_metadata(
        &self,
        payment_intent_id: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<PaymentIntent, anyhow::Error>;

    async fn create_refund(&self, params: &CreateRefundParams) -> Result<Refund, anyhow::Error>;
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
    code: Option<String>,
}

#[derive(Debug)]
pub struct StripeClient {
    http_client: Client,
    base_url: String,
    secret_key: SecretString,
}

impl StripeClient {
    #[tracing::instrument(skip(payment_setting))]
    pub fn new(payment_setting: &PaymentSettings) -> Result<Self, anyhow::Error> {
        tracing::info!("Establishing connection to the payment processor.");
        let http_client = Client::builder()
            .timeout(payment_setting.timeout())
            .build()?;
        Ok(Self {
            http_client,
            base_url: payment_setting.base_url.trim_end_matches('/').to_string(),
            secret_key: payment_setting.secret_key.clone(),
        })
    }

    fn metadata_form(metadata: &HashMap<String, String>) -> Vec<(String, String)> {
        metadata
            .iter()
            .map(|(key, value)| (format!("metadata[{}]", key), value.to_owned()))
            .collect()
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, anyhow::Error> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|err| anyhow!(format!("Failed to parse response: {}", err)));
        }
        let message = match response.json::<StripeErrorBody>().await {
            Ok(body) => format!(
                "{} ({})",
                body.error
                    .message
                    .unwrap_or_else(|| "Payment processor error".to_string()),
                body.error.code.unwrap_or_else(|| status.to_string())
            ),
            Err(_) => format!("Payment processor responded with {}", status),
        };
        Err(anyhow!(message))
    }
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    #[tracing::instrument(name = "create stripe payment intent", skip(self))]
    async fn create_payment_intent(
        &self,
        params: &CreatePaymentIntentParams,
    ) -> Result<PaymentIntent, anyhow::Error> {
        let url = format!("{}/payment_intents", self.base_url);
        let mut form = vec![
            ("amount".to_string(), params.amount.to_string()),
            ("currency".to_string(), params.currency.to_owned()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        form.extend(Self::metadata_form(&params.metadata));
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .form(&form)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    #[tracing::instrument(name = "retrieve stripe payment intent", skip(self))]
    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<PaymentIntent>, anyhow::Error> {
        let url = format!("{}/payment_intents/{}", self.base_url, payment_intent_id);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::parse_response(response).await.map(Some)
    }

    #[tracing::instrument(name = "update stripe payment intent metadata", skip(self))]
    async fn update_payment_intent_metadata(
        &self,
        payment_intent_id: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<PaymentIntent, anyhow::Error> {
        let url = format!("{}/payment_intents/{}", self.base_url, payment_intent_id);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .form(&Self::metadata_form(metadata))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    #[tracing::instrument(name = "create stripe refund", skip(self))]
    async fn create_refund(&self, params: &CreateRefundParams) -> Result<Refund, anyhow::Error> {
        let url = format!("{}/refunds", self.base_url);
        let mut form = vec![(
            "payment_intent".to_string(),
            params.payment_intent_id.to_owned(),
        )];
        if let Some(amount) = params.amount {
            form.push(("amount".to_string(), amount.to_string()));
        }
        if let Some(reason) = params.reason {
            form.push(("reason".to_string(), reason.as_str().to_string()));
        }
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .form(&form)
            .send()
            .await?;
        Self::parse_response(response).await
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum WebhookSignatureError {
    #[error("Missing Stripe-Signature header")]
    MissingHeader,
    #[error("Invalid Stripe-Signature header")]
    MalformedHeader,
    #[error("Webhook signature mismatch")]
    Mismatch,
    #[error("Webhook timestamp outside the tolerance window")]
    TimestampOutOfTolerance,
}

fn webhook_mac(
    secret: &SecretString,
    timestamp: &str,
    payload: &[u8],
) -> Result<Hmac<Sha256>, WebhookSignatureError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|_| WebhookSignatureError::Mismatch)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Verifies a `Stripe-Signature` header (`t=<unix ts>,v1=<hex hmac>[,v1=...]`) against the
/// untouched request body. The body must not have been parsed or re-encoded.
pub fn verify_webhook_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &SecretString,
    tolerance_seconds: i64,
    now: i64,
) -> Result<(), WebhookSignatureError> {
    let mut timestamp = None;
    let mut signatures = vec![];
    for part in signature_header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = Some(t);
        } else if let Some(v) = part.strip_prefix("v1=") {
            signatures.push(v);
        }
    }
    let timestamp = timestamp.ok_or(WebhookSignatureError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(WebhookSignatureError::MalformedHeader);
    }
    let signed_at: i64 = timestamp
        .parse()
        .map_err(|_| WebhookSignatureError::MalformedHeader)?;

    let mac = webhook_mac(secret, timestamp, payload)?;
    let matched = signatures
        .iter()
        .filter_map(|signature| hex::decode(signature).ok())
        .any(|signature| mac.clone().verify_slice(&signature).is_ok());
    if !matched {
        return Err(WebhookSignatureError::Mismatch);
    }

    if (now - signed_at).abs() > tolerance_seconds {
        return Err(WebhookSignatureError::TimestampOutOfTolerance);
    }
    Ok(())
}

/// Builds the header value the processor would send for `payload` signed at `timestamp`.
pub fn generate_signature_header(
    payload: &[u8],
    secret: &SecretString,
    timestamp: i64,
) -> Result<String, WebhookSignatureError> {
    let timestamp = timestamp.to_string();
    let mac = webhook_mac(secret, &timestamp, payload)?;
    Ok(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}
