// Error types shared by the dispatcher, the authorization gate and the facades

use serde::Serialize;
use thiserror::Error;

pub const ACTIVATION_PORTAL_URL: &str = "https://portal.itwhip.com";

// Errors produced while building a client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("API key required. Visit https://portal.itwhip.com to verify your property.")]
    MissingCredential,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

// Structured rejection returned when a privileged call is attempted by a
// property that is not activated
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationRequired {
    pub error_code: String,
    pub message: String,
    pub solution: String,
    pub potential_revenue: String,
}

impl Default for ActivationRequired {
    fn default() -> Self {
        Self {
            error_code: "PROPERTY_NOT_ACTIVATED".to_string(),
            message: "Property must be verified and activated.".to_string(),
            solution: format!("Visit {ACTIVATION_PORTAL_URL} to activate instant rides"),
            potential_revenue: "$67,433/month".to_string(),
        }
    }
}

// Errors surfaced by a single dispatch or by a facade built on top of it
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("API error: {status_code} - {message}")]
    ApiResponseError { status_code: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("No HTTP transport available")]
    TransportUnavailable,

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("{}", .0.message)]
    PropertyNotActivated(ActivationRequired),

    #[error("{code}: {message}")]
    ServiceUnavailable { code: String, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// What the dispatcher does with a failure of a given kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorRoute {
    Propagate,
    Fallback,
}

impl ApiError {
    /// Routing table for dispatch failures. Only failures where the request
    /// never reached the remote service are replaced by a fallback envelope.
    pub fn route(&self) -> ErrorRoute {
        match self {
            ApiError::NetworkError(_) | ApiError::TransportUnavailable => ErrorRoute::Fallback,
            ApiError::Timeout(_)
            | ApiError::ApiResponseError { .. }
            | ApiError::MalformedResponse(_)
            | ApiError::TransportError(_)
            | ApiError::PropertyNotActivated(_)
            | ApiError::ServiceUnavailable { .. }
            | ApiError::InvalidRequest(_) => ErrorRoute::Propagate,
        }
    }

    pub fn error_code(&self) -> &str {
        match self {
            ApiError::Timeout(_) => "TIMEOUT",
            ApiError::ApiResponseError { .. } => "API_ERROR",
            ApiError::MalformedResponse(_) => "MALFORMED_RESPONSE",
            ApiError::NetworkError(_) => "NETWORK_ERROR",
            ApiError::TransportUnavailable => "TRANSPORT_UNAVAILABLE",
            ApiError::TransportError(_) => "TRANSPORT_ERROR",
            ApiError::PropertyNotActivated(rejection) => &rejection.error_code,
            ApiError::ServiceUnavailable { code, .. } => code,
            ApiError::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }
}
