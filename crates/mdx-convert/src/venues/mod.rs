//! Venue adapters — per-venue lookup tables and hooks.
//!
//! Each venue module exposes `rest_converter()` and `stream_converter()`
//! factories. Adding a venue means adding tables, not subclassing anything.

pub mod binance;
pub mod okex;

use mdx_core::MdxError;

use crate::request::RequestConverter;
use crate::stream::StreamConverter;

/// Create a REST converter by venue name.
pub fn rest_converter(venue: &str) -> Result<RequestConverter, MdxError> {
    match venue.to_lowercase().as_str() {
        "okex" => Ok(okex::rest_converter()),
        "binance" => Ok(binance::rest_converter()),
        other => Err(MdxError::Unsupported(format!("unknown venue: {other}"))),
    }
}

/// Create a stream converter by venue name.
pub fn stream_converter(venue: &str) -> Result<StreamConverter, MdxError> {
    match venue.to_lowercase().as_str() {
        "okex" => Ok(okex::stream_converter()),
        "binance" => Ok(binance::stream_converter()),
        other => Err(MdxError::Unsupported(format!("unknown venue: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_by_name() {
        assert!(rest_converter("okex").is_ok());
        assert!(stream_converter("Binance").is_ok());
        assert!(matches!(rest_converter("mtgox"), Err(MdxError::Unsupported(_))));
    }
}
