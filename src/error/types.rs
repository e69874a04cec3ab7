//! Error types for the logging gateway.

use thiserror::Error;

/// Main error type for the gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration errors. Fatal at construction time only.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Scoping configuration errors. Non-fatal: scoping is disabled and a
    /// warning is logged, the caller is never unwound.
    #[error("Scoping configuration error: {message}")]
    ScopingConfig { message: String },

    /// Sanitization errors. Per-entry, contained inside the pipeline.
    #[error("Sanitization error: {kind}")]
    Sanitize { kind: SanitizeErrorKind },

    /// Unknown shadow run. Surfaced only from `export` and `disable`.
    #[error("Shadow run not found: {run_id}")]
    ShadowNotFound { run_id: String },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Sanitization error kinds.
#[derive(Error, Debug)]
pub enum SanitizeErrorKind {
    /// The metadata walk revisited a composite node or exceeded the hard
    /// recursion ceiling. The entry is degraded to a masked placeholder.
    #[error("Traversal overrun at depth {depth}")]
    TraversalOverrun { depth: usize },
}
