//! # mdx-client
//!
//! Transport drivers for the MDX normalization layer.
//!
//! Clients own transport mechanics only — connect, send, receive, reconnect —
//! and delegate every encode/decode step to their converter. They never
//! inspect wire field names themselves.
//!
//! - [`rest::RestClient`] — request/response calls over HTTP (`reqwest`)
//! - [`stream::StreamClient`] — WebSocket subscriptions with auto-reconnect
//!   (`tokio-tungstenite`)

pub mod rest;
pub mod stream;

pub use rest::RestClient;
pub use stream::{OnEntity, PingConfig, StreamClient};
