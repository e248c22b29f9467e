//! Error responses.
//!
//! Every failure is answered with `{ "error": <reason>, "message": <text> }`.
//! The x402 endpoint distinguishes causes by status; the direct endpoint
//! answers every rejection with `400`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use linkpay::settlement::{ApiErrorBody, ErrorReason};
use linkpay_ledger::LedgerError;

/// An error response.
#[derive(Debug, thiserror::Error)]
#[error("{reason}: {message}")]
pub struct ApiError {
    status: StatusCode,
    reason: ErrorReason,
    message: String,
}

impl ApiError {
    /// A malformed request.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            reason: ErrorReason::InvalidRequest,
            message: message.into(),
        }
    }

    /// Maps a ledger error for the x402 endpoints.
    #[must_use]
    pub fn x402(err: LedgerError) -> Self {
        let status = match err.reason() {
            ErrorReason::NotFound => StatusCode::NOT_FOUND,
            ErrorReason::Unavailable | ErrorReason::SoldOut | ErrorReason::InvalidProof => {
                StatusCode::PAYMENT_REQUIRED
            }
            ErrorReason::Replay => StatusCode::CONFLICT,
            ErrorReason::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorReason::InternalError | ErrorReason::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::from_ledger(status, &err)
    }

    /// Maps a ledger error for the direct payment endpoint.
    #[must_use]
    pub fn direct(err: LedgerError) -> Self {
        let status = if err.is_internal() {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::BAD_REQUEST
        };
        Self::from_ledger(status, &err)
    }

    fn from_ledger(status: StatusCode, err: &LedgerError) -> Self {
        let message = if err.is_internal() {
            tracing::error!(error = %err, "ledger failure");
            "internal server error".to_owned()
        } else {
            err.to_string()
        };
        Self {
            status,
            reason: err.reason(),
            message,
        }
    }

    /// HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Reason tag of the response.
    #[must_use]
    pub const fn reason(&self) -> ErrorReason {
        self.reason
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.reason,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
