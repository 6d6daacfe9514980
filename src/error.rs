//! Error types for the LSK resolution engine.
//!
//! One public enum covers every failure the engine surfaces. Variants map
//! onto transport status at the collaborator boundary via
//! [`LskError::is_caller_error`].

use thiserror::Error;

/// Result alias used throughout the crate.
pub type LskResult<T> = Result<T, LskError>;

/// Failures surfaced by the resolution engine and the record ingestion flow.
#[derive(Debug, Error)]
pub enum LskError {
    /// A required string input was empty.
    #[error("invalid argument: '{field}' must be non-empty")]
    InvalidArgument { field: &'static str },

    /// A matched placeholder had an empty segment, or a reference body did
    /// not parse as a placeholder.
    #[error("invalid placeholder '{placeholder}': {reason}")]
    InvalidPlaceholder { placeholder: String, reason: String },

    /// Database failure while acquiring the range lock or reading the
    /// current maximum.
    #[error("allocation failed for {context}")]
    AllocationFailed {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    /// A `REF:{…}` body has no corresponding placeholder in the same
    /// document.
    #[error("cannot resolve reference '{reference}': target placeholder '{target}' was not found in the document")]
    UnresolvedReference { reference: String, target: String },

    /// Audit insert affected a row count other than one, or failed outright.
    #[error("audit write failed: {reason}")]
    AuditWriteFailed {
        reason: String,
        #[source]
        source: Option<sqlx::Error>,
    },

    /// The record ingestion input was not well-formed XML.
    #[error("XML parse error at byte {position}: {message}")]
    XmlParse { position: u64, message: String },

    /// Database failure while persisting parsed records or reserving a
    /// counter block.
    #[error("data persistence failed: {reason}")]
    Persistence {
        reason: String,
        #[source]
        source: Option<sqlx::Error>,
    },

    /// Any other unexpected failure.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl LskError {
    /// Whether the failure was caused by the caller's input.
    ///
    /// The HTTP collaborator maps caller errors to 400 and everything else
    /// to 500.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            LskError::InvalidArgument { .. }
                | LskError::InvalidPlaceholder { .. }
                | LskError::UnresolvedReference { .. }
                | LskError::XmlParse { .. }
        )
    }
}
