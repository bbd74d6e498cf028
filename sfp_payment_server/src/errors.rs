use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use sfp_payment_engine::PaymentGatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The request is not valid. {0}")]
    ValidationError(String),
    #[error("The request conflicts with the current state of the order. {0}")]
    Conflict(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::ForbiddenPeer => StatusCode::FORBIDDEN,
                _ => StatusCode::BAD_REQUEST,
            },
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

/// Reasons a webhook call is refused before any processing happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("No webhook signature was provided.")]
    MissingSignature,
    #[error("The webhook signature header is malformed. {0}")]
    MalformedSignature(String),
    #[error("The webhook signature is invalid.")]
    InvalidSignature,
    #[error("The webhook timestamp is outside the accepted tolerance.")]
    StaleTimestamp,
    #[error("Requests from this address are not allowed.")]
    ForbiddenPeer,
}

/// Maps engine errors onto HTTP errors for the admin and customer APIs. The webhook route handles the webhook-specific
/// cases (unknown orders and invalid transitions are acknowledged) before falling back to this mapping.
impl From<PaymentGatewayError> for ServerError {
    fn from(e: PaymentGatewayError) -> Self {
        match e {
            PaymentGatewayError::DatabaseError(_) => Self::BackendError(e.to_string()),
            PaymentGatewayError::OrderNotFound(_) | PaymentGatewayError::RefundNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            PaymentGatewayError::ValidationError(_) | PaymentGatewayError::InvalidAmount { .. } => {
                Self::ValidationError(e.to_string())
            },
            PaymentGatewayError::OrderAlreadyExists(_) |
            PaymentGatewayError::InvalidTransition(_) |
            PaymentGatewayError::InvalidRefundTransition { .. } |
            PaymentGatewayError::InvariantViolation { .. } => Self::Conflict(e.to_string()),
        }
    }
}
