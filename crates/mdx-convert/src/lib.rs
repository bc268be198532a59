//! # mdx-convert
//!
//! Bidirectional canonical↔wire mapping for market-data venues.
//!
//! ## Architecture
//!
//! Per-venue behavior is pure data: each venue module under [`venues`] builds
//! a [`request::RequestSpec`] and a [`stream::StreamSpec`] out of immutable
//! lookup tables (endpoint → path/channel, param name → wire name, param
//! value → wire value, wire field → canonical field, wire error code →
//! canonical error code) plus a small closed set of hooks for behavior no
//! table can express (frame decompression, channel pattern matching, row
//! transforms, row vetoes).
//!
//! The two converter flavors drive those tables:
//!
//! - [`request::RequestConverter`] — builds REST paths + query params and
//!   parses JSON response bodies into canonical entities.
//! - [`stream::StreamConverter`] — builds WebSocket subscription payloads and
//!   decodes inbound frames, filtering control traffic (acks, heartbeats).
//!
//! Transport lives in `mdx-client`; nothing here performs I/O.

pub mod decode;
pub mod json_util;
pub mod request;
pub mod stream;
pub mod table;
pub mod venues;
