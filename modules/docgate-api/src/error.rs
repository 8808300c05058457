//! Gateway error taxonomy and its HTTP mapping.
//!
//! Internal detail goes to the log; callers only ever see the fixed
//! `{"message": ...}` bodies below.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use docgate_common::{OperationKind, ResourceId};
use docgate_dispatch::DispatchError;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::jwt::AuthError;

pub const BAD_INPUT: &str = "bad input";
pub const UNAUTHORIZED: &str = "unauthorized";
pub const VERIFICATION_FAILED: &str = "unable to verify credentials";
pub const OPERATION_FAILED: &str = "operation failed";
pub const INTERNAL_ERROR: &str = "internal error";

#[derive(Debug, Error)]
pub enum ApiError {
    /// Required field missing or of the wrong type
    #[error("bad input: {0}")]
    Validation(String),

    /// Missing or malformed Authorization header
    #[error("missing or malformed bearer credential")]
    Unauthorized,

    /// Credential present but rejected by the verifier
    #[error("claim verification failed: {0}")]
    Verification(#[from] AuthError),

    /// Bus could not deliver or did not get a reply in time
    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    /// Worker replied with ERROR
    #[error("{kind} {resource_id} failed: {message}")]
    Store {
        kind: OperationKind,
        resource_id: ResourceId,
        message: String,
    },

    /// Anything else that went wrong while handling the request
    #[error("internal fault: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Verification(_)
            | ApiError::Dispatch(_)
            | ApiError::Store { .. }
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => BAD_INPUT,
            ApiError::Unauthorized => UNAUTHORIZED,
            ApiError::Verification(_) => VERIFICATION_FAILED,
            ApiError::Dispatch(_) | ApiError::Store { .. } => OPERATION_FAILED,
            ApiError::Internal(_) => INTERNAL_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Validation(_) => debug!(error = %self, "Rejected request"),
            ApiError::Unauthorized => warn!("Unauthorized request"),
            ApiError::Verification(_) | ApiError::Dispatch(_) | ApiError::Store { .. } => {
                warn!(error = %self, "Request failed")
            }
            ApiError::Internal(_) => error!(error = %self, "Request failed"),
        }
        message_response(self.status(), self.public_message())
    }
}

/// `{"message": ...}` body with the given status.
pub fn message_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "message": message }))).into_response()
}
