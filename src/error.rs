//! Error types for the HR orchestrator.

use serde::Serialize;

use crate::workflow::WorkflowReport;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// What went wrong at a backend, independent of which backend it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The entity being created is already there.
    AlreadyExists,
    /// The entity being read or removed is not there.
    NotFound,
    /// The name is already held by someone else, so it cannot be reused.
    Conflict,
    /// The backend could not be reached or refused the credentials.
    BackendUnavailable,
    /// A lookup matched more than one candidate.
    Ambiguous,
    /// Anything the adapter could not classify.
    Unknown,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AlreadyExists => "already_exists",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::BackendUnavailable => "backend_unavailable",
            Self::Ambiguous => "ambiguous",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// A failed adapter call.
///
/// `message` is already phrased for the workflow log, e.g.
/// `AWS: IAM User 'ada.lovelace' already exists.`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct AdapterError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AdapterError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BackendUnavailable, message)
    }

    pub fn ambiguous(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Ambiguous, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

/// Workflow-level failures that end a request with an error payload.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A required step failed; the report holds every outcome recorded so far.
    #[error("{source}")]
    Aborted {
        report: Box<WorkflowReport>,
        source: AdapterError,
    },
}
