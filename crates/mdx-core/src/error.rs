//! Typed error definitions for the MDX normalization layer.
//!
//! Provides [`MdxError`] for domain-specific errors that are more informative
//! than plain `anyhow::Error` strings. All variants implement `std::error::Error`
//! via `thiserror`, so they integrate seamlessly with `anyhow::Result`.

use thiserror::Error;

use crate::types::ErrorCode;

/// Domain-specific errors for the MDX normalization layer.
#[derive(Debug, Error)]
pub enum MdxError {
    /// A canonical param, value, or endpoint has no wire mapping for this
    /// venue. Caller configuration error; not retryable.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// A frame or body does not match any known wire shape. Indicates a
    /// venue protocol change and is surfaced, never silently absorbed.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The venue returned a structured error. The original numeric code and
    /// message are preserved in `message` for diagnosis.
    #[error("platform error ({code:?}): {message}")]
    Platform {
        /// Canonical error code mapped via the venue's error table.
        code: ErrorCode,
        /// Venue message plus original code (and request echo, if present).
        message: String,
    },

    /// HTTP or WebSocket transport failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl MdxError {
    /// Shorthand for a `Platform` error built from a decoded [`ApiError`](crate::types::ApiError).
    pub fn platform(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Platform { code, message: message.into() }
    }
}
