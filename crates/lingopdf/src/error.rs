//! Central error type for the translation pipeline.
//!
//! Every failure that can cross a component boundary is a [`LingoError`].
//! Each variant maps onto one of the stable string codes surfaced to
//! callers (`code()`), and carries a retryability classification
//! (`is_retryable()`) used by the OCR and translation clients.

use std::time::Duration;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LingoError>;

/// Pipeline error with a stable, transport-independent code.
#[derive(Debug, thiserror::Error)]
pub enum LingoError {
    /// File extension or header is not a PDF.
    #[error("unsupported format: {message}")]
    FormatUnsupported { message: String },

    /// The document carries an encryption dictionary.
    #[error("document is encrypted")]
    Encrypted,

    /// Structural damage: missing `%%EOF`, broken xref, unparseable body.
    #[error("document is corrupted: {message}")]
    Corrupted { message: String },

    /// The remote service rejected our credentials (HTTP 401/403).
    #[error("authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// No credentials were configured for a service that requires them.
    #[error("authentication required: {message}")]
    AuthenticationRequired { message: String },

    /// The remote service throttled us (HTTP 429).
    #[error("rate limited by remote service")]
    RateLimited {
        /// Server-suggested wait, from the `Retry-After` header.
        retry_after: Option<Duration>,
    },

    /// The remote service failed transiently (HTTP 5xx).
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String },

    /// A remote call exceeded its deadline.
    #[error("processing timed out after {seconds} s")]
    Timeout { seconds: u64 },

    /// The remote service answered with something we cannot parse.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// Caller-supplied input violates a contract (size, count, language code).
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// A referenced entity (job, choice, session, file) does not exist.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// The job was cancelled at a suspension point.
    #[error("cancelled")]
    Cancelled,

    /// Configuration key failed validation at startup.
    #[error("configuration error for {key}: {message}")]
    Configuration { key: String, message: String },

    /// User-choice store failure.
    #[error("storage error: {message}")]
    Storage { message: String },

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else; terminal.
    #[error("{message}")]
    Internal { message: String },
}

impl LingoError {
    /// Stable string code usable across transports.
    pub fn code(&self) -> &'static str {
        match self {
            Self::FormatUnsupported { .. } => "FORMAT_UNSUPPORTED",
            Self::Encrypted => "ENCRYPTED",
            Self::Corrupted { .. } => "CORRUPTED",
            Self::AuthenticationFailed { .. } => "AUTHENTICATION_FAILED",
            Self::AuthenticationRequired { .. } => "AUTHENTICATION_REQUIRED",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            Self::Timeout { .. } => "PROCESSING_TIMEOUT",
            Self::Protocol { .. } => "PROTOCOL_ERROR",
            Self::InvalidInput { .. } | Self::Configuration { .. } => "INVALID_INPUT",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Cancelled => "CANCELLED",
            Self::Storage { .. } | Self::Io(_) | Self::Internal { .. } => "INTERNAL",
        }
    }

    /// Whether a retry with backoff may succeed.
    ///
    /// Only transient remote-side classes are retryable; everything else
    /// fails fast per the propagation policy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::ServiceUnavailable { .. } | Self::Timeout { .. }
        )
    }

    /// Message safe to surface to users: stable code plus redacted detail.
    ///
    /// Tokens and filesystem paths never appear here; the full message is
    /// available to internal logs via `Display`.
    pub fn user_message(&self) -> String {
        format!("{}: {}", self.code(), crate::utils::redact(&self.to_string()))
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for LingoError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol {
            message: err.to_string(),
        }
    }
}

impl From<rusqlite::Error> for LingoError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }
}

impl From<lopdf::Error> for LingoError {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(io_err) => Self::Io(io_err),
            other => Self::Corrupted {
                message: other.to_string(),
            },
        }
    }
}
