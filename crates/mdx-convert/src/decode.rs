//! Generic row decoding: wire payload row → canonical entity.
//!
//! Both converter flavors funnel through [`decode_row`], so REST bodies and
//! stream frames share one field-mapping and timestamp-normalization path.

use ahash::AHashMap;
use chrono::Utc;

use mdx_core::{
    Candle, Direction, Entity, EntityKind, Interval, MdxError, ParamName, Trade, time_util,
};

use crate::json_util::{parse_str_f64, parse_str_i64, value_to_string};
use crate::table::{EntityMap, FieldMap, TimestampUnit, ValueTable};

/// Context a row cannot supply itself: fields derived from the request params
/// or from pattern-matching the channel identifier.
pub struct RowContext<'a> {
    pub symbol: Option<&'a str>,
    pub interval: Option<Interval>,
    /// Per-param value tables, used to reverse-map wire field values
    /// (interval tokens, direction spellings) back to canonical form.
    pub values: &'a AHashMap<ParamName, ValueTable>,
}

/// Decode one payload row into the entity kind implied by the endpoint.
pub fn decode_row(
    emap: &EntityMap,
    kind: EntityKind,
    row: &serde_json::Value,
    ctx: &RowContext<'_>,
) -> Result<Entity, MdxError> {
    let fields = extract_fields(&emap.fields, row)?;
    match kind {
        EntityKind::Trade => decode_trade(emap, &fields, ctx).map(Entity::Trade),
        EntityKind::Candle => decode_candle(emap, &fields, ctx).map(Entity::Candle),
        EntityKind::Error => Err(MdxError::Protocol("error rows are not entities".into())),
    }
}

/// Apply the field map, producing canonical param → raw value.
///
/// Named maps tolerate absent wire fields (the context may supply them);
/// positional maps require an array row.
fn extract_fields<'v>(
    map: &FieldMap,
    row: &'v serde_json::Value,
) -> Result<AHashMap<ParamName, &'v serde_json::Value>, MdxError> {
    let mut out = AHashMap::new();
    match map {
        FieldMap::Named(pairs) => {
            let obj = row
                .as_object()
                .ok_or_else(|| MdxError::Protocol(format!("expected object row, got {row}")))?;
            for (wire, param) in pairs {
                if let Some(v) = obj.get(*wire) {
                    out.insert(*param, v);
                }
            }
        }
        FieldMap::Positional(params) => {
            let arr = row
                .as_array()
                .ok_or_else(|| MdxError::Protocol(format!("expected array row, got {row}")))?;
            for (param, v) in params.iter().zip(arr.iter()) {
                out.insert(*param, v);
            }
        }
    }
    Ok(out)
}

fn decode_trade(
    emap: &EntityMap,
    fields: &AHashMap<ParamName, &serde_json::Value>,
    ctx: &RowContext<'_>,
) -> Result<Trade, MdxError> {
    Ok(Trade {
        item_id: string_field(fields, ParamName::ItemId)?,
        timestamp_ms: timestamp_field(fields, emap.timestamp)?,
        symbol: symbol_field(fields, ctx)?,
        price: string_field(fields, ParamName::Price)?,
        amount: string_field(fields, ParamName::Amount)?,
        direction: direction_field(fields, ctx)?,
    })
}

fn decode_candle(
    emap: &EntityMap,
    fields: &AHashMap<ParamName, &serde_json::Value>,
    ctx: &RowContext<'_>,
) -> Result<Candle, MdxError> {
    Ok(Candle {
        timestamp_ms: timestamp_field(fields, emap.timestamp)?,
        price_open: string_field(fields, ParamName::PriceOpen)?,
        price_high: string_field(fields, ParamName::PriceHigh)?,
        price_low: string_field(fields, ParamName::PriceLow)?,
        price_close: string_field(fields, ParamName::PriceClose)?,
        volume_or_count: string_field(fields, ParamName::TradesCount)?,
        symbol: symbol_field(fields, ctx)?,
        interval: interval_field(fields, ctx)?,
    })
}

// ---------------------------------------------------------------------------
// Field readers
// ---------------------------------------------------------------------------

fn string_field(
    fields: &AHashMap<ParamName, &serde_json::Value>,
    param: ParamName,
) -> Result<String, MdxError> {
    let v = fields
        .get(&param)
        .ok_or_else(|| MdxError::Protocol(format!("row is missing {param:?}")))?;
    value_to_string(v)
}

/// Symbol from the row, falling back to request/channel context.
fn symbol_field(
    fields: &AHashMap<ParamName, &serde_json::Value>,
    ctx: &RowContext<'_>,
) -> Result<String, MdxError> {
    if let Some(v) = fields.get(&ParamName::Symbol) {
        return value_to_string(v);
    }
    ctx.symbol
        .map(str::to_string)
        .ok_or_else(|| MdxError::Protocol("row carries no symbol and none in context".into()))
}

/// Interval from the row (wire token reverse-mapped through the venue's
/// value table), falling back to request/channel context.
fn interval_field(
    fields: &AHashMap<ParamName, &serde_json::Value>,
    ctx: &RowContext<'_>,
) -> Result<Interval, MdxError> {
    if let Some(v) = fields.get(&ParamName::Interval) {
        let wire = value_to_string(v)?;
        let canonical = ctx
            .values
            .get(&ParamName::Interval)
            .and_then(|t| t.canonical(&wire))
            .ok_or_else(|| MdxError::Protocol(format!("unknown interval token {wire:?}")))?;
        return canonical
            .parse()
            .map_err(|_| MdxError::Protocol(format!("bad canonical interval {canonical:?}")));
    }
    ctx.interval
        .ok_or_else(|| MdxError::Protocol("row carries no interval and none in context".into()))
}

/// Direction from the row, reverse-mapped through a venue value table when
/// one exists (e.g. a buyer-maker boolean), then parsed against the
/// canonical buy/sell vocabulary.
fn direction_field(
    fields: &AHashMap<ParamName, &serde_json::Value>,
    ctx: &RowContext<'_>,
) -> Result<Direction, MdxError> {
    let raw = string_field(fields, ParamName::Direction)?;
    let canonical = match ctx.values.get(&ParamName::Direction) {
        Some(table) => table
            .canonical(&raw)
            .ok_or_else(|| MdxError::Protocol(format!("unknown direction value {raw:?}")))?,
        None => raw.as_str(),
    };
    Direction::from_wire(canonical)
        .ok_or_else(|| MdxError::Protocol(format!("unknown direction value {canonical:?}")))
}

fn timestamp_field(
    fields: &AHashMap<ParamName, &serde_json::Value>,
    unit: TimestampUnit,
) -> Result<i64, MdxError> {
    let v = fields
        .get(&ParamName::Timestamp)
        .ok_or_else(|| MdxError::Protocol("row is missing Timestamp".into()))?;
    normalize_timestamp(v, unit)
}

/// Normalize a wire timestamp to epoch milliseconds UTC.
pub fn normalize_timestamp(v: &serde_json::Value, unit: TimestampUnit) -> Result<i64, MdxError> {
    match unit {
        TimestampUnit::Milliseconds => parse_str_i64(Some(v))
            .ok_or_else(|| MdxError::Protocol(format!("bad ms timestamp {v}"))),
        TimestampUnit::Seconds => parse_str_f64(Some(v))
            .map(|s| (s * 1000.0).round() as i64)
            .ok_or_else(|| MdxError::Protocol(format!("bad seconds timestamp {v}"))),
        TimestampUnit::Iso => {
            let s = v
                .as_str()
                .ok_or_else(|| MdxError::Protocol(format!("bad ISO timestamp {v}")))?;
            time_util::ms_from_iso(s)
        }
        TimestampUnit::LocalTimeOfDay { utc_offset_hours } => {
            let s = v
                .as_str()
                .ok_or_else(|| MdxError::Protocol(format!("bad time-of-day {v}")))?;
            time_util::ms_from_local_time(s, utc_offset_hours, Utc::now())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_values() -> AHashMap<ParamName, ValueTable> {
        AHashMap::new()
    }

    #[test]
    fn named_trade_row() {
        let values = no_values();
        let ctx = RowContext { symbol: None, interval: None, values: &values };
        let emap = EntityMap {
            fields: FieldMap::Named(vec![
                ("tid", ParamName::ItemId),
                ("date_ms", ParamName::Timestamp),
                ("price", ParamName::Price),
                ("amount", ParamName::Amount),
                ("type", ParamName::Direction),
                ("symbol", ParamName::Symbol),
            ]),
            timestamp: TimestampUnit::Milliseconds,
        };
        let row = serde_json::json!({
            "tid": 170000, "date_ms": 1533124800500i64, "price": "4500.1",
            "amount": 0.25, "type": "buy", "symbol": "btc_usd"
        });
        let entity = decode_row(&emap, EntityKind::Trade, &row, &ctx).unwrap();
        let Entity::Trade(t) = entity else { panic!("expected trade") };
        assert_eq!(t.item_id, "170000");
        assert_eq!(t.timestamp_ms, 1_533_124_800_500);
        assert_eq!(t.price, "4500.1");
        assert_eq!(t.amount, "0.25");
        assert_eq!(t.direction, Direction::Buy);
        assert_eq!(t.symbol, "btc_usd");
    }

    #[test]
    fn positional_candle_row_with_context() {
        let values = no_values();
        let ctx =
            RowContext { symbol: Some("btc_usd"), interval: Some(Interval::Min1), values: &values };
        let emap = EntityMap {
            fields: FieldMap::Positional(vec![
                ParamName::Timestamp,
                ParamName::PriceOpen,
                ParamName::PriceHigh,
                ParamName::PriceLow,
                ParamName::PriceClose,
                ParamName::TradesCount,
            ]),
            timestamp: TimestampUnit::Milliseconds,
        };
        let row = serde_json::json!([1533124800000i64, "4500", "4550", "4480", "4520", "230"]);
        let Entity::Candle(c) = decode_row(&emap, EntityKind::Candle, &row, &ctx).unwrap() else {
            panic!("expected candle")
        };
        assert_eq!(c.timestamp_ms, 1_533_124_800_000);
        assert_eq!(c.price_open, "4500");
        assert_eq!(c.volume_or_count, "230");
        assert_eq!(c.symbol, "btc_usd");
        assert_eq!(c.interval, Interval::Min1);
    }

    #[test]
    fn seconds_timestamp_scaled_to_ms() {
        let ms = normalize_timestamp(&serde_json::json!(1533124800.5), TimestampUnit::Seconds)
            .unwrap();
        assert_eq!(ms, 1_533_124_800_500);
    }

    #[test]
    fn direction_through_value_table() {
        // Buyer-maker boolean: "true" means the buyer was the maker, i.e. a sell.
        let mut values = AHashMap::new();
        values.insert(
            ParamName::Direction,
            ValueTable::new([("sell", Some("true")), ("buy", Some("false"))]),
        );
        let ctx = RowContext { symbol: Some("BTCUSDT"), interval: None, values: &values };
        let emap = EntityMap {
            fields: FieldMap::Named(vec![
                ("a", ParamName::ItemId),
                ("T", ParamName::Timestamp),
                ("p", ParamName::Price),
                ("q", ParamName::Amount),
                ("m", ParamName::Direction),
            ]),
            timestamp: TimestampUnit::Milliseconds,
        };
        let row = serde_json::json!({"a": 1, "T": 1533124800000i64, "p": "1", "q": "2", "m": true});
        let Entity::Trade(t) = decode_row(&emap, EntityKind::Trade, &row, &ctx).unwrap() else {
            panic!("expected trade")
        };
        assert_eq!(t.direction, Direction::Sell);
    }

    #[test]
    fn missing_required_field_is_protocol_error() {
        let values = no_values();
        let ctx = RowContext { symbol: None, interval: None, values: &values };
        let emap = EntityMap {
            fields: FieldMap::Named(vec![
                ("tid", ParamName::ItemId),
                ("date_ms", ParamName::Timestamp),
                ("price", ParamName::Price),
                ("amount", ParamName::Amount),
                ("type", ParamName::Direction),
            ]),
            timestamp: TimestampUnit::Milliseconds,
        };
        let row = serde_json::json!({"tid": 1});
        assert!(matches!(
            decode_row(&emap, EntityKind::Trade, &row, &ctx),
            Err(MdxError::Protocol(_))
        ));
    }
}
