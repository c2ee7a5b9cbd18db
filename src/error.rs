//! Error types for the kcsync reconciliation system.
//!
//! Errors are grouped by the area that raises them: configuration, tracking
//! state, the remote Keycloak API, identifier parsing, and reconciliation.
//! Remote errors are classified once by the transport and are carried through
//! the engine unchanged.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::membership::MemberId;

/// The main error type for kcsync.
#[derive(Debug, Error)]
pub enum KcSyncError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Tracking state errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Keycloak API errors.
    #[error("Keycloak API error: {0}")]
    Remote(#[from] RemoteError),

    /// Tracking identifier errors.
    #[error("{0}")]
    Identity(#[from] IdentityError),

    /// Reconciliation errors.
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// Two entries target the same tracking identifier.
    #[error("Duplicate membership entry: {tracking_id}")]
    DuplicateEntry {
        /// The duplicated tracking identifier.
        tracking_id: String,
    },
}

/// Tracking state errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// State is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// State version mismatch.
    #[error("State version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected state version.
        expected: String,
        /// Found state version.
        found: String,
    },
}

/// Keycloak API errors, classified by the transport.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The addressed entity does not exist (HTTP 404).
    #[error("Not found: {resource}")]
    NotFound {
        /// Path or description of the missing entity.
        resource: String,
    },

    /// A uniqueness constraint was violated (HTTP 409).
    #[error("Conflict on {resource}: {message}")]
    Conflict {
        /// Path or description of the conflicting entity.
        resource: String,
        /// Message returned by the server.
        message: String,
    },

    /// Authentication failed.
    #[error("Keycloak authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("Keycloak API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from API.
        message: String,
    },

    /// Rate limited.
    #[error("Keycloak API rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Network error.
    #[error("Network error communicating with Keycloak: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from API.
    #[error("Invalid response from Keycloak API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Errors raised while encoding or decoding tracking identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// The identifier does not have the expected structure.
    #[error("Invalid identifier '{input}'. Supported format: {expected}")]
    Malformed {
        /// The rejected input.
        input: String,
        /// The expected layout, e.g. `{realm}/{kind}/{parentId}`.
        expected: &'static str,
    },

    /// A segment contains the delimiter and cannot be encoded.
    #[error("{segment} '{value}' must not contain '/'")]
    DelimiterInSegment {
        /// Name of the offending segment.
        segment: &'static str,
        /// The offending value.
        value: String,
    },

    /// A segment holds characters outside ASCII.
    #[error("{segment} '{value}' must be plain ASCII")]
    NonAsciiSegment {
        /// Name of the offending segment.
        segment: &'static str,
        /// The offending value.
        value: String,
    },

    /// A segment is empty and cannot be encoded.
    #[error("{segment} must not be empty")]
    EmptySegment {
        /// Name of the empty segment.
        segment: &'static str,
    },

    /// The relation kind segment is not a known kind.
    #[error("Unknown relation kind '{kind}'")]
    UnknownRelation {
        /// The unrecognized kind.
        kind: String,
    },
}

/// Which half of a delta was being applied when a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyPhase {
    /// Removing members that are no longer desired.
    Remove,
    /// Adding members that are missing.
    Add,
}

impl fmt::Display for ApplyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remove => write!(f, "remove"),
            Self::Add => write!(f, "add"),
        }
    }
}

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The parent disappeared out-of-band; local tracking should be cleared.
    #[error("Parent of {tracking_id} no longer exists")]
    ParentGone {
        /// The tracking identifier whose parent is gone.
        tracking_id: String,
    },

    /// Some operations of a delta were not applied.
    #[error(
        "Failed to {phase} '{failed_member}' ({} operation(s) not applied): {source}",
        remaining.len()
    )]
    PartialApply {
        /// Phase that was running when the failure occurred.
        phase: ApplyPhase,
        /// Member whose operation failed.
        failed_member: MemberId,
        /// Operations not applied, failed member first, in plan order.
        remaining: Vec<(ApplyPhase, MemberId)>,
        /// The underlying failure.
        #[source]
        source: Box<KcSyncError>,
    },
}

/// Result type alias for kcsync operations.
pub type Result<T> = std::result::Result<T, KcSyncError>;

impl KcSyncError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable by the transport.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Remote(RemoteError::RateLimited { .. } | RemoteError::NetworkError { .. })
        )
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Remote(RemoteError::RateLimited { retry_after_secs }) => Some(*retry_after_secs),
            Self::Remote(RemoteError::NetworkError { .. }) => Some(1),
            _ => None,
        }
    }

    /// Returns true if the remote reported the addressed entity as missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Remote(RemoteError::NotFound { .. }))
    }

    /// Returns true if the remote reported a uniqueness conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Remote(RemoteError::Conflict { .. }))
    }

    /// Returns true if the parent of a reconciliation disappeared.
    #[must_use]
    pub const fn is_parent_gone(&self) -> bool {
        matches!(self, Self::Reconcile(ReconcileError::ParentGone { .. }))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl StateError {
    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

impl RemoteError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(KcSyncError::Remote(RemoteError::network("reset")).is_retryable());
        assert!(
            KcSyncError::Remote(RemoteError::RateLimited {
                retry_after_secs: 3
            })
            .is_retryable()
        );
        assert!(!KcSyncError::Remote(RemoteError::api_error(500, "boom")).is_retryable());
        assert!(
            !KcSyncError::Remote(RemoteError::NotFound {
                resource: String::from("/groups/x")
            })
            .is_retryable()
        );
    }

    #[test]
    fn test_malformed_message_names_format() {
        let err = IdentityError::Malformed {
            input: String::from("a/b"),
            expected: "{realm}/{kind}/{parentId}",
        };
        let message = err.to_string();
        assert!(message.contains("a/b"));
        assert!(message.contains("{realm}/{kind}/{parentId}"));
    }

    #[test]
    fn test_partial_apply_reports_remaining_count() {
        let err = ReconcileError::PartialApply {
            phase: ApplyPhase::Remove,
            failed_member: MemberId::from("bob"),
            remaining: vec![
                (ApplyPhase::Remove, MemberId::from("bob")),
                (ApplyPhase::Add, MemberId::from("carol")),
            ],
            source: Box::new(KcSyncError::Remote(RemoteError::api_error(500, "boom"))),
        };
        let message = err.to_string();
        assert!(message.contains("remove 'bob'"));
        assert!(message.contains("2 operation(s)"));
    }
}
