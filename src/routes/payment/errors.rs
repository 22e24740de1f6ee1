use crate::errors::GenericError;
use crate::payment_client::WebhookSignatureError;
use crate::utils::error_chain_fmt;

#[allow(clippy::enum_variant_names)]
#[derive(thiserror::Error)]
pub enum PaymentError {
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    NotFoundError(String),
    #[error("{0}")]
    NoChargeError(String),
    #[error("{0}")]
    UpstreamError(String, anyhow::Error),
    #[error("{0}")]
    DatabaseError(String, anyhow::Error),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl From<PaymentError> for GenericError {
    fn from(err: PaymentError) -> GenericError {
        match err {
            PaymentError::ValidationError(message) => GenericError::ValidationError(message),
            PaymentError::NotFoundError(message) => GenericError::NotFoundError(message),
            PaymentError::NoChargeError(message) => GenericError::NoChargeError(message),
            PaymentError::UpstreamError(message, error) => {
                GenericError::UpstreamError(message, error)
            }
            PaymentError::DatabaseError(message, error) => {
                GenericError::DatabaseError(message, error)
            }
            PaymentError::UnexpectedError(error) => GenericError::UnexpectedError(error),
        }
    }
}

#[allow(clippy::enum_variant_names)]
#[derive(thiserror::Error)]
pub enum WebhookError {
    #[error("Webhook signature verification failed: {0}")]
    SignatureError(#[from] WebhookSignatureError),
    #[error("Invalid webhook payload: {0}")]
    PayloadError(#[source] serde_json::Error),
    #[error("Failed to process webhook event {0}")]
    ProcessingError(String, #[source] anyhow::Error),
}

impl std::fmt::Debug for WebhookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl From<WebhookError> for GenericError {
    fn from(err: WebhookError) -> GenericError {
        match err {
            WebhookError::SignatureError(e) => {
                GenericError::SignatureVerificationError(format!("Webhook Error: {}", e))
            }
            WebhookError::PayloadError(e) => {
                GenericError::ValidationError(format!("Invalid webhook payload: {}", e))
            }
            // Always 500 so the processor redelivers the event.
            WebhookError::ProcessingError(event_id, error) => GenericError::DatabaseError(
                format!("Failed to process webhook event {}", event_id),
                error,
            ),
        }
    }
}
