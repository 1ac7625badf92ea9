//! Error taxonomy for the resolution engine.
//!
//! Every raised error carries a machine-readable [`ErrorKind`], a
//! human-readable message, and a context map of the identifiers relevant
//! to the failure (record id, field, strategy, operation name).

use std::collections::BTreeMap;

pub type Result<T> = std::result::Result<T, ResolverError>;

/// Machine-readable discriminant, independent of the error's message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Validation,
    MergeConflict,
    Unmerge,
    QueueItemNotFound,
    InvalidStatusTransition,
    ServiceTimeout,
    ServiceUnavailable,
    ServiceNetwork,
}

/// A context map of identifiers relevant to the failure (record id,
/// field, strategy, operation name, ...).
pub type ErrorContext = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("configuration error: {message}")]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("validation error: {message}")]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("merge conflict on field '{field}': {message}")]
    MergeConflict {
        field: String,
        message: String,
        context: ErrorContext,
    },

    #[error("unmerge failed: {message}")]
    Unmerge {
        message: String,
        context: ErrorContext,
    },

    #[error("queue item not found: {id}")]
    QueueItemNotFound { id: String },

    #[error(
        "invalid queue status transition for item {id}: {from:?} -> {to:?}"
    )]
    InvalidStatusTransition {
        id: String,
        from: String,
        to: String,
    },

    #[error("external service '{service}' timed out after {elapsed_ms}ms")]
    ServiceTimeout { service: String, elapsed_ms: u64 },

    #[error("external service '{service}' unavailable (circuit open)")]
    ServiceUnavailable { service: String },

    #[error("external service '{service}' network error: {message}")]
    ServiceNetwork { service: String, message: String },

    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

impl ResolverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolverError::Configuration { .. } => ErrorKind::Configuration,
            ResolverError::Validation { .. } => ErrorKind::Validation,
            ResolverError::MergeConflict { .. } => ErrorKind::MergeConflict,
            ResolverError::Unmerge { .. } => ErrorKind::Unmerge,
            ResolverError::QueueItemNotFound { .. } => ErrorKind::QueueItemNotFound,
            ResolverError::InvalidStatusTransition { .. } => ErrorKind::InvalidStatusTransition,
            ResolverError::ServiceTimeout { .. } => ErrorKind::ServiceTimeout,
            ResolverError::ServiceUnavailable { .. } => ErrorKind::ServiceUnavailable,
            ResolverError::ServiceNetwork { .. } => ErrorKind::ServiceNetwork,
            ResolverError::Upstream(_) => ErrorKind::Validation,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        ResolverError::Configuration {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn configuration_with(message: impl Into<String>, context: ErrorContext) -> Self {
        ResolverError::Configuration {
            message: message.into(),
            context,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ResolverError::Validation {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn validation_with(message: impl Into<String>, context: ErrorContext) -> Self {
        ResolverError::Validation {
            message: message.into(),
            context,
        }
    }
}

/// Convenience macro for building an [`ErrorContext`] inline.
#[macro_export]
macro_rules! ctx {
    ($($key:expr => $value:expr),* $(,)?) => {{
        let mut map = $crate::error::ErrorContext::new();
        $(map.insert($key.to_string(), $value.to_string());)*
        map
    }};
}
