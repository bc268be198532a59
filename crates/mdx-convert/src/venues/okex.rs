//! OKEx v1 adapter.
//!
//! REST: `trades.do` / `kline.do` with form-style query params, millisecond
//! timestamps, positional kline rows.
//!
//! Stream: deflate-compressed frames routed by a `table` field with a `data`
//! envelope. Trades arrive with ISO timestamps and `Buy`/`Sell` direction
//! spellings; synthetic index trades (symbol prefixed with `.`) post price
//! marks, not fills, and are dropped. Kline rows carry only a venue-local
//! `HH:MM:SS` wall clock (UTC+8) that is recombined with the current date.

use std::io::Read;

use flate2::read::DeflateDecoder;
use regex::Regex;

use mdx_core::{Endpoint, Entity, EntityKind, ErrorCode, MdxError, ParamName};

use crate::request::{RequestConverter, RequestSpec};
use crate::stream::{
    ChannelMatch, StreamConverter, StreamHooks, StreamSpec, SubscribeShape,
};
use crate::table::{ChannelTemplate, EntityMap, ErrorMap, FieldMap, TimestampUnit, ValueTable};

/// Kline frames encode the venue's local wall clock at this fixed offset.
const UTC_OFFSET_HOURS: i32 = 8;

/// Interval tokens supported by the v1 kline API. `8h`, `3d` and `1M` exist
/// canonically but have no wire form here.
pub fn interval_values() -> ValueTable {
    ValueTable::new([
        ("1m", Some("1min")),
        ("3m", Some("3min")),
        ("5m", Some("5min")),
        ("15m", Some("15min")),
        ("30m", Some("30min")),
        ("1h", Some("1hour")),
        ("2h", Some("2hour")),
        ("4h", Some("4hour")),
        ("6h", Some("6hour")),
        ("8h", None),
        ("12h", Some("12hour")),
        ("1d", Some("1day")),
        ("3d", None),
        ("1w", Some("1week")),
        ("1M", None),
    ])
}

fn error_codes() -> ahash::AHashMap<i64, ErrorCode> {
    [
        (10012, ErrorCode::WrongSymbol),
        (10000, ErrorCode::WrongParam),
        (10001, ErrorCode::RateLimit),
    ]
    .into_iter()
    .collect()
}

pub fn rest_converter() -> RequestConverter {
    RequestConverter::new(RequestSpec {
        base_url: "https://www.okex.com/api/v{version}/",
        version: "1",
        endpoints: [
            (Endpoint::Trade, "trades.do"),
            (Endpoint::TradeHistory, "trades.do"),
            (Endpoint::Candle, "kline.do"),
        ]
        .into_iter()
        .collect(),
        param_names: [
            (ParamName::Symbol, Some("symbol")),
            (ParamName::Limit, Some("size")),
            (ParamName::IsUseMaxLimit, None),
            (ParamName::Sorting, None),
            (ParamName::FromItem, Some("since")),
            (ParamName::ToItem, None),
            (ParamName::FromTime, Some("since")),
            (ParamName::ToTime, None),
            (ParamName::Interval, Some("type")),
        ]
        .into_iter()
        .collect(),
        param_values: [(ParamName::Interval, interval_values())].into_iter().collect(),
        entities: [
            (
                EntityKind::Trade,
                EntityMap {
                    fields: FieldMap::Named(vec![
                        ("tid", ParamName::ItemId),
                        ("date_ms", ParamName::Timestamp),
                        ("price", ParamName::Price),
                        ("amount", ParamName::Amount),
                        ("type", ParamName::Direction),
                    ]),
                    timestamp: TimestampUnit::Milliseconds,
                },
            ),
            (
                EntityKind::Candle,
                EntityMap {
                    fields: FieldMap::Positional(vec![
                        ParamName::Timestamp,
                        ParamName::PriceOpen,
                        ParamName::PriceHigh,
                        ParamName::PriceLow,
                        ParamName::PriceClose,
                        ParamName::TradesCount,
                    ]),
                    timestamp: TimestampUnit::Milliseconds,
                },
            ),
        ]
        .into_iter()
        .collect(),
        error: ErrorMap { code_field: Some("error_code"), message_field: None },
        error_codes: error_codes(),
    })
}

pub fn stream_converter() -> StreamConverter {
    StreamConverter::new(StreamSpec {
        base_url: "wss://real.okex.com:10440/ws/v{version}",
        version: "1",
        channels: [
            (Endpoint::Trade, ChannelTemplate::new("trade:{symbol}")),
            (Endpoint::Candle, ChannelTemplate::new("kline_{interval}:{symbol}")),
        ]
        .into_iter()
        .collect(),
        param_values: [(ParamName::Interval, interval_values())].into_iter().collect(),
        entities: [
            (
                EntityKind::Trade,
                EntityMap {
                    fields: FieldMap::Named(vec![
                        ("trdMatchID", ParamName::ItemId),
                        ("timestamp", ParamName::Timestamp),
                        ("symbol", ParamName::Symbol),
                        ("price", ParamName::Price),
                        ("size", ParamName::Amount),
                        ("side", ParamName::Direction),
                    ]),
                    timestamp: TimestampUnit::Iso,
                },
            ),
            (
                EntityKind::Candle,
                EntityMap {
                    fields: FieldMap::Positional(vec![
                        ParamName::Timestamp,
                        ParamName::PriceOpen,
                        ParamName::PriceHigh,
                        ParamName::PriceLow,
                        ParamName::PriceClose,
                        ParamName::TradesCount,
                    ]),
                    timestamp: TimestampUnit::LocalTimeOfDay {
                        utc_offset_hours: UTC_OFFSET_HOURS,
                    },
                },
            ),
        ]
        .into_iter()
        .collect(),
        error: ErrorMap { code_field: Some("status"), message_field: Some("error") },
        error_codes: error_codes(),
        channel_field: Some("table"),
        envelope_field: Some("data"),
        ack_field: Some("event"),
        request_echo_field: Some("request"),
        subscribe_shape: SubscribeShape::EventChannelSymbol { symbol_prefix: Some("t") },
        lowercase_symbol_in_channel: false,
        hooks: StreamHooks {
            decompress: Some(Box::new(inflate_frame)),
            channel_matcher: Some(channel_matcher()),
            row_transform: Some(Box::new(normalize_side)),
            row_veto: Some(Box::new(is_index_trade)),
        },
    })
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

/// Each frame is an independently deflate-compressed unit; no inflate state
/// is carried between frames.
fn inflate_frame(frame: &[u8]) -> Result<String, MdxError> {
    let mut decoder = DeflateDecoder::new(frame);
    let mut text = String::new();
    decoder
        .read_to_string(&mut text)
        .map_err(|e| MdxError::Protocol(format!("deflate decode failed: {e}")))?;
    Ok(text)
}

/// The stream multiplexes trade and kline channels onto one `table` field:
/// `trade` (optionally `trade:SYMBOL`) and `kline_{wire interval}:SYMBOL`.
fn channel_matcher() -> crate::stream::ChannelMatcherFn {
    let trade_re = Regex::new(r"^trade(?::(?P<sym>.+))?$").unwrap();
    let kline_re = Regex::new(r"^kline_(?P<iv>[0-9a-z]+):(?P<sym>.+)$").unwrap();
    let intervals = interval_values();

    Box::new(move |channel: &str| {
        if let Some(caps) = trade_re.captures(channel) {
            return Some(ChannelMatch {
                endpoint: Endpoint::Trade,
                symbol: caps.name("sym").map(|m| m.as_str().to_string()),
                interval: None,
            });
        }
        if let Some(caps) = kline_re.captures(channel) {
            let interval = intervals
                .canonical(caps.name("iv")?.as_str())
                .and_then(|token| token.parse().ok())?;
            return Some(ChannelMatch {
                endpoint: Endpoint::Candle,
                symbol: caps.name("sym").map(|m| m.as_str().to_string()),
                interval: Some(interval),
            });
        }
        None
    })
}

/// The venue spells direction `Buy`/`Sell`; the canonical vocabulary is
/// lowercase.
fn normalize_side(row: &mut serde_json::Value, _matched: &ChannelMatch) {
    if let Some(side) = row.get_mut("side") {
        if let Some(s) = side.as_str() {
            *side = serde_json::Value::String(s.to_lowercase());
        }
    }
}

/// Indices (symbols starting with `.`) post trades at intervals to the trade
/// feed with a size of 0, only to indicate a changing price. They are not
/// real fills and must not be forwarded.
fn is_index_trade(entity: &Entity) -> bool {
    matches!(entity, Entity::Trade(t) if t.symbol.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_patterns() {
        let matcher = channel_matcher();

        let m = matcher("trade").unwrap();
        assert_eq!(m.endpoint, Endpoint::Trade);
        assert_eq!(m.symbol, None);

        let m = matcher("trade:BTC_USD").unwrap();
        assert_eq!(m.symbol.as_deref(), Some("BTC_USD"));

        let m = matcher("kline_15min:eth_usd").unwrap();
        assert_eq!(m.endpoint, Endpoint::Candle);
        assert_eq!(m.interval, Some(mdx_core::Interval::Min15));
        assert_eq!(m.symbol.as_deref(), Some("eth_usd"));

        assert!(matcher("depth:BTC_USD").is_none());
        // Wire token the interval table doesn't know.
        assert!(matcher("kline_7min:BTC_USD").is_none());
    }

    #[test]
    fn inflate_round_trip() {
        use flate2::{Compression, write::DeflateEncoder};
        use std::io::Write;

        let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"{\"table\":\"trade\"}").unwrap();
        let compressed = enc.finish().unwrap();
        assert_eq!(inflate_frame(&compressed).unwrap(), "{\"table\":\"trade\"}");
    }

    #[test]
    fn truncated_deflate_is_protocol_error() {
        assert!(matches!(inflate_frame(&[0x78, 0x9c, 0x01]), Err(MdxError::Protocol(_))));
    }
}
