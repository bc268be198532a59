//! Canonical entity shapes handed back to callers.
//!
//! Prices and amounts stay as strings: the layer normalizes field names and
//! timestamps, not numeric precision. Timestamps are always epoch
//! milliseconds UTC, whatever the venue's native encoding was.

use serde::{Deserialize, Serialize};

use super::enums::{Direction, EntityKind, ErrorCode, Interval};

/// A single executed trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Venue-assigned trade identifier.
    pub item_id: String,
    /// Epoch milliseconds, UTC.
    pub timestamp_ms: i64,
    pub symbol: String,
    pub price: String,
    pub amount: String,
    pub direction: Direction,
}

/// A single OHLC candle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// Epoch milliseconds, UTC (candle open time).
    pub timestamp_ms: i64,
    pub price_open: String,
    pub price_high: String,
    pub price_low: String,
    pub price_close: String,
    /// Base volume or trade count, whichever the venue provides.
    pub volume_or_count: String,
    pub symbol: String,
    pub interval: Interval,
}

/// A structured error returned by a venue, mapped to the canonical code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    /// Venue message with the original numeric code (and request echo, when
    /// the venue supplies one) appended for diagnosis.
    pub message: String,
}

/// Tagged sum over the decodable entity shapes.
///
/// Capability checks ("does this row carry a symbol") are resolved by
/// matching the variant, never by field probing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entity {
    Trade(Trade),
    Candle(Candle),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Trade(_) => EntityKind::Trade,
            Self::Candle(_) => EntityKind::Candle,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Self::Trade(t) => &t.symbol,
            Self::Candle(c) => &c.symbol,
        }
    }

    pub fn timestamp_ms(&self) -> i64 {
        match self {
            Self::Trade(t) => t.timestamp_ms,
            Self::Candle(c) => c.timestamp_ms,
        }
    }
}
