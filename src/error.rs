//! Error taxonomy for store-mutating and gateway-backed operations.

use thiserror::Error;

use crate::gateway::GatewayError;

/// Generic user-facing text for gateway failures
pub const DEFAULT_ERROR_MESSAGE: &str =
    "An unexpected error occurred. Please try again later.";

/// Failures of single operator-initiated operations
#[derive(Debug, Error)]
pub enum OperationError {
    /// Missing or malformed operator input; nothing was attempted
    #[error("{0}")]
    Validation(String),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// The entity exists but is not in a state that allows the operation
    #[error("{0}")]
    Conflict(String),

    #[error("cannot move suggestion from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The gateway answered but the reply did not match the expected shape
    #[error("the analysis service returned an unexpected format")]
    UnusableAnswer,
}

impl OperationError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        OperationError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Message safe to show an operator
    pub fn user_message(&self) -> String {
        match self {
            OperationError::Gateway(_) => DEFAULT_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

pub type OperationResult<T> = Result<T, OperationError>;
