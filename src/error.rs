use std::io;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("validation error: {message}")]
    Validation {
        message: String,
        status: Option<u16>,
    },
    #[error("authentication rejected: {message}")]
    Auth {
        message: String,
        status: Option<u16>,
    },
    #[error("not found: {message}")]
    NotFound {
        message: String,
        status: Option<u16>,
    },
    #[error("invalid status transition: {message}")]
    InvalidTransition {
        message: String,
        status: Option<u16>,
    },
    #[error("remote unavailable: {message}")]
    RemoteUnavailable {
        message: String,
        status: Option<u16>,
    },
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    #[error("result truncated after {pages} pages ({fetched} records fetched)")]
    TruncatedResult { pages: usize, fetched: usize },
    #[error("remote error ({status}): {message}")]
    Remote { status: u16, message: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            status: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Configuration(_) => ErrorKind::Configuration,
            AppError::Validation { .. } => ErrorKind::Validation,
            AppError::Auth { .. } => ErrorKind::Auth,
            AppError::NotFound { .. } => ErrorKind::NotFound,
            AppError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            AppError::RemoteUnavailable { .. } => ErrorKind::RemoteUnavailable,
            AppError::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
            AppError::TruncatedResult { .. } => ErrorKind::TruncatedResult,
            AppError::Remote { .. } => ErrorKind::Remote,
            AppError::Io(_) => ErrorKind::Io,
        }
    }

    /// HTTP status reported by the remote, when the error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::Validation { status, .. }
            | AppError::Auth { status, .. }
            | AppError::NotFound { status, .. }
            | AppError::InvalidTransition { status, .. }
            | AppError::RemoteUnavailable { status, .. } => *status,
            AppError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Validation,
    Auth,
    NotFound,
    InvalidTransition,
    RemoteUnavailable,
    UnsupportedOperation,
    TruncatedResult,
    Remote,
    Io,
}

/// Error shape handed back to the calling protocol layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl From<&AppError> for OperationError {
    fn from(error: &AppError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            status: error.status(),
        }
    }
}

impl From<AppError> for OperationError {
    fn from(error: AppError) -> Self {
        Self::from(&error)
    }
}
