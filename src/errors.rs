use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use crate::schemas::GenericResponse;
use crate::utils::error_chain_fmt;

#[allow(clippy::enum_variant_names)]
#[derive(thiserror::Error)]
pub enum GenericError {
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    NotFoundError(String),
    #[error("{0}")]
    SignatureVerificationError(String),
    #[error("{0}")]
    NoChargeError(String),
    #[error("{0}")]
    UpstreamError(String, anyhow::Error),
    #[error("{0}")]
    DatabaseError(String, anyhow::Error),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for GenericError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for GenericError {
    fn status_code(&self) -> StatusCode {
        match self {
            GenericError::ValidationError(_) => StatusCode::BAD_REQUEST,
            GenericError::NotFoundError(_) => StatusCode::NOT_FOUND,
            GenericError::SignatureVerificationError(_) => StatusCode::BAD_REQUEST,
            GenericError::NoChargeError(_) => StatusCode::BAD_REQUEST,
            GenericError::UpstreamError(_, _) => StatusCode::BAD_GATEWAY,
            GenericError::DatabaseError(_, _) => StatusCode::INTERNAL_SERVER_ERROR,
            GenericError::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let status_code_str = status_code.as_str();
        let inner_error_msg = match self {
            GenericError::ValidationError(message)
            | GenericError::NotFoundError(message)
            | GenericError::SignatureVerificationError(message)
            | GenericError::NoChargeError(message) => message.to_string(),
            GenericError::UpstreamError(message, error)
            | GenericError::DatabaseError(message, error) => {
                tracing::error!("{}: {:?}", message, error);
                message.to_string()
            }
            GenericError::UnexpectedError(error) => {
                tracing::error!("Unexpected error: {:?}", error);
                error.to_string()
            }
        };

        HttpResponse::build(status_code).json(GenericResponse::error(
            &inner_error_msg,
            status_code_str,
            Some(()),
        ))
    }
}
