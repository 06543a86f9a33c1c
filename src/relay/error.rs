use axum::http::StatusCode;
use std::time::Duration;
use thiserror::Error;

use crate::llm::Provider;

pub const INVALID_PROVIDER_BODY: &str = "Invalid provider";
pub const INVALID_REQUEST_BODY: &str = "Invalid request";
pub const INTERNAL_ERROR_BODY: &str = "Error";

/// Failure of a relay call.
///
/// Callers only ever see [`RelayError::status`] and
/// [`RelayError::public_message`]; the detail goes to the log.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid provider: '{0}'")]
    InvalidProvider(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("No API key configured for provider {0}")]
    MissingApiKey(Provider),
    #[error("Upstream call failed: {0}")]
    Upstream(String),
    #[error("Upstream call exceeded {0:?}")]
    Timeout(Duration),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidProvider(_) | RelayError::InvalidRequest(_) =>
                StatusCode::BAD_REQUEST,
            RelayError::MissingApiKey(_) | RelayError::Upstream(_) | RelayError::Timeout(_) =>
                StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn public_message(&self) -> &'static str {
        match self {
            RelayError::InvalidProvider(_) => INVALID_PROVIDER_BODY,
            RelayError::InvalidRequest(_) => INVALID_REQUEST_BODY,
            _ => INTERNAL_ERROR_BODY,
        }
    }
}
