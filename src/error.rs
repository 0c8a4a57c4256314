use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::billing::BillingError;

/// The main error type for Kakasaku handlers
#[derive(Debug, thiserror::Error)]
pub enum KakasakuError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payment gateway error: {0}")]
    BadGateway(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
    error_id: String,
}

impl KakasakuError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message that is safe to show a client.
    ///
    /// Client errors and gateway refusals carry their message, since the
    /// donor needs to know what to fix. Server-side details are only logged.
    fn safe_message(&self) -> String {
        match self {
            Self::NotFound(_) | Self::BadRequest(_) | Self::Conflict(_) | Self::BadGateway(_) => {
                self.to_string()
            }
            Self::ServiceUnavailable(_) => {
                "Payment gateway is unavailable, please try again later".to_string()
            }
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for KakasakuError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                status = status.as_u16(),
                error_id = %error_id,
                error = %self,
                "Request failed"
            );
        } else {
            tracing::warn!(
                status = status.as_u16(),
                error_id = %error_id,
                error = %self,
                "Request rejected"
            );
        }

        let body = Json(ErrorResponse {
            error: self.safe_message(),
            error_id,
        });
        (status, body).into_response()
    }
}

/// Result type alias for Kakasaku handlers
pub type Result<T> = std::result::Result<T, KakasakuError>;

impl From<BillingError> for KakasakuError {
    fn from(err: BillingError) -> Self {
        let message = err.to_string();
        match err {
            BillingError::PeriodParse { .. }
            | BillingError::Sequencing { .. }
            | BillingError::EmptySelection
            | BillingError::InvalidRedirect { .. } => Self::BadRequest(message),

            BillingError::PackageNotFound { .. }
            | BillingError::NoSubscription { .. }
            | BillingError::PaymentNotFound { .. } => Self::NotFound(message),

            BillingError::SubscriptionInactive { .. }
            | BillingError::SubscriptionExists { .. }
            | BillingError::DuplicateBill { .. }
            | BillingError::PeriodConflict { .. } => Self::Conflict(message),

            BillingError::GatewayRequest { .. } => Self::BadGateway(message),
            BillingError::Reconciliation { .. } => Self::ServiceUnavailable(message),

            BillingError::Storage { .. } | BillingError::Internal { .. } => Self::Internal(message),
        }
    }
}
