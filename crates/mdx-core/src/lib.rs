//! # mdx-core
//!
//! Core crate for the MDX normalization layer, providing:
//!
//! - **Types** (`types`) — the canonical vocabulary (endpoints, params,
//!   intervals, directions, error codes) and entity shapes (trade, candle)
//! - **Configuration** (`config`) — JSON config deserialization
//! - **Error types** (`error`) — domain-specific `MdxError` via thiserror
//! - **Time utilities** (`time_util`) — epoch-ms timestamps and venue
//!   wall-clock reconstruction
//! - **Logging** (`logging`) — tracing-based structured logging
//!
//! Everything here is venue-independent; converters in `mdx-convert` translate
//! between this model and venue wire formats.

pub mod config;
pub mod error;
pub mod logging;
pub mod time_util;
pub mod types;

// Re-export types at crate root for convenience.
pub use error::MdxError;
pub use types::*;
