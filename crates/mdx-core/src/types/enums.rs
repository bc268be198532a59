//! Enumerations forming the canonical market-data vocabulary.
//!
//! These are the venue-independent names every converter translates to and
//! from. They are a fixed vocabulary: venues map a subset of it to wire
//! strings and declare the rest unsupported.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// Logical market-data feed, independent of venue and transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Trade,
    TradeHistory,
    Candle,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trade => write!(f, "trade"),
            Self::TradeHistory => write!(f, "trade_history"),
            Self::Candle => write!(f, "candle"),
        }
    }
}

// ---------------------------------------------------------------------------
// Canonical parameter names
// ---------------------------------------------------------------------------

/// Canonical request/response field identifier.
///
/// Each venue maps a subset of these to wire names; an explicit `None` in a
/// venue table means "declared unsupported" and the param is silently
/// omitted, while a param missing from the table entirely is a caller
/// configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamName {
    Limit,
    IsUseMaxLimit,
    Sorting,
    FromItem,
    ToItem,
    FromTime,
    ToTime,
    Interval,
    Symbol,
    ItemId,
    Timestamp,
    Price,
    Amount,
    Direction,
    PriceOpen,
    PriceHigh,
    PriceLow,
    PriceClose,
    TradesCount,
}

// ---------------------------------------------------------------------------
// Candle intervals
// ---------------------------------------------------------------------------

/// Canonical candle granularity.
///
/// The `Display`/`FromStr` token (`"1m"`, `"4h"`, `"1M"`, ...) is the
/// canonical string form used as the key in venue value tables. Venues map a
/// subset; requesting an unmapped granularity fails fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    Min1,
    Min3,
    Min5,
    Min15,
    Min30,
    Hrs1,
    Hrs2,
    Hrs4,
    Hrs6,
    Hrs8,
    Hrs12,
    Day1,
    Day3,
    Week1,
    Month1,
}

impl Interval {
    /// All canonical granularities, in ascending order.
    pub const ALL: [Interval; 15] = [
        Self::Min1,
        Self::Min3,
        Self::Min5,
        Self::Min15,
        Self::Min30,
        Self::Hrs1,
        Self::Hrs2,
        Self::Hrs4,
        Self::Hrs6,
        Self::Hrs8,
        Self::Hrs12,
        Self::Day1,
        Self::Day3,
        Self::Week1,
        Self::Month1,
    ];

    /// Canonical token (also the `Display` output).
    pub fn token(&self) -> &'static str {
        match self {
            Self::Min1 => "1m",
            Self::Min3 => "3m",
            Self::Min5 => "5m",
            Self::Min15 => "15m",
            Self::Min30 => "30m",
            Self::Hrs1 => "1h",
            Self::Hrs2 => "2h",
            Self::Hrs4 => "4h",
            Self::Hrs6 => "6h",
            Self::Hrs8 => "8h",
            Self::Hrs12 => "12h",
            Self::Day1 => "1d",
            Self::Day3 => "3d",
            Self::Week1 => "1w",
            Self::Month1 => "1M",
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

impl std::str::FromStr for Interval {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.iter().copied().find(|i| i.token() == s).ok_or(())
    }
}

// ---------------------------------------------------------------------------
// Trade direction
// ---------------------------------------------------------------------------

/// Buy or sell direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// Parse the canonical lowercase vocabulary (`"buy"` / `"sell"`).
    ///
    /// Venue-specific spellings are normalized by the venue's row transform
    /// hook before this is reached.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "buy" => Some(Self::Buy),
            "sell" => Some(Self::Sell),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Canonical error codes
// ---------------------------------------------------------------------------

/// Canonical error code a venue's structured error maps to.
///
/// Wire codes absent from a venue's error table map to
/// [`ErrorCode::UnknownPlatformError`]; the original numeric code is kept in
/// the error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    UnknownPlatformError,
    WrongSymbol,
    WrongParam,
    RateLimit,
}

// ---------------------------------------------------------------------------
// Entity kinds
// ---------------------------------------------------------------------------

/// Discriminant keying the per-venue field lookup tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Trade,
    Candle,
    Error,
}

impl Endpoint {
    /// The entity kind this endpoint produces.
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            Self::Trade | Self::TradeHistory => EntityKind::Trade,
            Self::Candle => EntityKind::Candle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_token_round_trip() {
        for interval in Interval::ALL {
            assert_eq!(interval.token().parse::<Interval>(), Ok(interval));
        }
    }

    #[test]
    fn unknown_interval_token_rejected() {
        assert!("7m".parse::<Interval>().is_err());
    }

    #[test]
    fn direction_canonical_vocabulary_only() {
        assert_eq!(Direction::from_wire("buy"), Some(Direction::Buy));
        assert_eq!(Direction::from_wire("sell"), Some(Direction::Sell));
        assert_eq!(Direction::from_wire("Buy"), None);
    }

    #[test]
    fn endpoint_entity_kinds() {
        assert_eq!(Endpoint::Trade.entity_kind(), EntityKind::Trade);
        assert_eq!(Endpoint::TradeHistory.entity_kind(), EntityKind::Trade);
        assert_eq!(Endpoint::Candle.entity_kind(), EntityKind::Candle);
    }
}
