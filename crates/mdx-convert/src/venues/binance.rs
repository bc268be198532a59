//! Binance adapter — tables only, no custom decoding code.
//!
//! REST: `aggTrades` / `klines` with native millisecond timestamps and
//! positional kline rows. Stream: raw streams routed by the `e` event field;
//! kline payloads sit inside a `k` envelope. Direction arrives as the
//! buyer-is-maker boolean and is expressed as a value table rather than a
//! hook.

use mdx_core::{Endpoint, EntityKind, ErrorCode, MdxError, ParamName};

use crate::request::{RequestConverter, RequestSpec};
use crate::stream::{
    ChannelMatch, StreamConverter, StreamHooks, StreamSpec, SubscribeShape,
};
use crate::table::{ChannelTemplate, EntityMap, ErrorMap, FieldMap, TimestampUnit, ValueTable};

/// Every canonical granularity has a wire form; the tokens coincide with the
/// canonical ones.
pub fn interval_values() -> ValueTable {
    ValueTable::new([
        ("1m", Some("1m")),
        ("3m", Some("3m")),
        ("5m", Some("5m")),
        ("15m", Some("15m")),
        ("30m", Some("30m")),
        ("1h", Some("1h")),
        ("2h", Some("2h")),
        ("4h", Some("4h")),
        ("6h", Some("6h")),
        ("8h", Some("8h")),
        ("12h", Some("12h")),
        ("1d", Some("1d")),
        ("3d", Some("3d")),
        ("1w", Some("1w")),
        ("1M", Some("1M")),
    ])
}

/// `m == true` means the buyer was the maker, i.e. the taker sold.
fn direction_values() -> ValueTable {
    ValueTable::new([("sell", Some("true")), ("buy", Some("false"))])
}

fn error_codes() -> ahash::AHashMap<i64, ErrorCode> {
    [
        (-1121, ErrorCode::WrongSymbol),
        (-1100, ErrorCode::WrongParam),
        (-1003, ErrorCode::RateLimit),
    ]
    .into_iter()
    .collect()
}

fn trade_fields() -> EntityMap {
    EntityMap {
        fields: FieldMap::Named(vec![
            ("a", ParamName::ItemId),
            ("T", ParamName::Timestamp),
            ("s", ParamName::Symbol),
            ("p", ParamName::Price),
            ("q", ParamName::Amount),
            ("m", ParamName::Direction),
        ]),
        timestamp: TimestampUnit::Milliseconds,
    }
}

pub fn rest_converter() -> RequestConverter {
    RequestConverter::new(RequestSpec {
        base_url: "https://api.binance.com/api/v{version}/",
        version: "1",
        endpoints: [
            (Endpoint::Trade, "aggTrades"),
            (Endpoint::TradeHistory, "aggTrades"),
            (Endpoint::Candle, "klines"),
        ]
        .into_iter()
        .collect(),
        param_names: [
            (ParamName::Symbol, Some("symbol")),
            (ParamName::Limit, Some("limit")),
            (ParamName::IsUseMaxLimit, None),
            (ParamName::Sorting, None),
            (ParamName::FromItem, Some("fromId")),
            (ParamName::ToItem, None),
            (ParamName::FromTime, Some("startTime")),
            (ParamName::ToTime, Some("endTime")),
            (ParamName::Interval, Some("interval")),
        ]
        .into_iter()
        .collect(),
        param_values: [
            (ParamName::Interval, interval_values()),
            (ParamName::Direction, direction_values()),
        ]
        .into_iter()
        .collect(),
        entities: [
            (EntityKind::Trade, trade_fields()),
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
        error: ErrorMap { code_field: Some("code"), message_field: Some("msg") },
        error_codes: error_codes(),
    })
}

pub fn stream_converter() -> StreamConverter {
    StreamConverter::new(StreamSpec {
        base_url: "wss://stream.binance.com:9443/ws",
        version: "1",
        channels: [
            (Endpoint::Trade, ChannelTemplate::new("{symbol}@aggTrade")),
            (Endpoint::Candle, ChannelTemplate::new("{symbol}@kline_{interval}")),
        ]
        .into_iter()
        .collect(),
        param_values: [
            (ParamName::Interval, interval_values()),
            (ParamName::Direction, direction_values()),
        ]
        .into_iter()
        .collect(),
        entities: [
            (EntityKind::Trade, trade_fields()),
            (
                EntityKind::Candle,
                EntityMap {
                    fields: FieldMap::Named(vec![
                        ("t", ParamName::Timestamp),
                        ("o", ParamName::PriceOpen),
                        ("h", ParamName::PriceHigh),
                        ("l", ParamName::PriceLow),
                        ("c", ParamName::PriceClose),
                        ("v", ParamName::TradesCount),
                        ("s", ParamName::Symbol),
                        ("i", ParamName::Interval),
                    ]),
                    timestamp: TimestampUnit::Milliseconds,
                },
            ),
        ]
        .into_iter()
        .collect(),
        error: ErrorMap { code_field: Some("code"), message_field: Some("msg") },
        error_codes: error_codes(),
        channel_field: Some("e"),
        envelope_field: Some("k"),
        ack_field: Some("result"),
        request_echo_field: None,
        subscribe_shape: SubscribeShape::MethodParams,
        lowercase_symbol_in_channel: true,
        hooks: StreamHooks {
            decompress: None,
            channel_matcher: Some(Box::new(match_event)),
            row_transform: None,
            row_veto: None,
        },
    })
}

/// The `e` field multiplexes event types; symbol and interval live in the
/// payload itself.
fn match_event(channel: &str) -> Option<ChannelMatch> {
    match channel {
        "aggTrade" => Some(ChannelMatch::bare(Endpoint::Trade)),
        "kline" => Some(ChannelMatch::bare(Endpoint::Candle)),
        _ => None,
    }
}
