//! Lookup table building blocks shared by both converter flavors.
//!
//! All tables are read-only after construction. A param or value missing from
//! a table means "unsupported for this venue" and is surfaced as
//! [`MdxError::Unsupported`], never silently dropped.

use ahash::AHashMap;

use mdx_core::{ApiError, ErrorCode, MdxError, ParamName};

use crate::json_util::parse_str_i64;

/// Canonical request parameters: canonical name → canonical string value.
///
/// Interval values use the canonical token form (`"1m"`, `"4h"`, ...).
pub type Params = AHashMap<ParamName, String>;

// ---------------------------------------------------------------------------
// Channel templates
// ---------------------------------------------------------------------------

/// A wire channel name pattern with at most two placeholders:
/// `{symbol}` and `{interval}`.
#[derive(Debug, Clone)]
pub struct ChannelTemplate(&'static str);

impl ChannelTemplate {
    pub const fn new(pattern: &'static str) -> Self {
        Self(pattern)
    }

    /// Whether the pattern contains an `{interval}` placeholder.
    pub fn needs_interval(&self) -> bool {
        self.0.contains("{interval}")
    }

    /// Substitute placeholders into the pattern.
    pub fn render(&self, symbol: &str, interval: Option<&str>) -> Result<String, MdxError> {
        let mut out = self.0.replace("{symbol}", symbol);
        if self.needs_interval() {
            let interval = interval.ok_or_else(|| {
                MdxError::Unsupported(format!("channel {:?} requires an interval", self.0))
            })?;
            out = out.replace("{interval}", interval);
        }
        Ok(out)
    }

    /// The raw pattern (used for exact matching of placeholder-free channels).
    pub fn pattern(&self) -> &'static str {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Value tables
// ---------------------------------------------------------------------------

/// Canonical value → wire value mapping for one param.
///
/// An explicit `None` on the wire side declares the canonical value
/// unsupported on this venue; looking it up is a hard failure, the request
/// is never sent with a best-effort literal.
#[derive(Debug, Clone)]
pub struct ValueTable {
    forward: AHashMap<&'static str, Option<&'static str>>,
}

impl ValueTable {
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, Option<&'static str>)>,
    {
        Self { forward: entries.into_iter().collect() }
    }

    /// Map a canonical value to its wire form.
    pub fn wire(&self, param: ParamName, canonical: &str) -> Result<&'static str, MdxError> {
        match self.forward.get(canonical) {
            Some(Some(wire)) => Ok(wire),
            _ => Err(MdxError::Unsupported(format!(
                "value {canonical:?} for {param:?} has no wire mapping on this venue"
            ))),
        }
    }

    /// Reverse-map a wire value to its canonical form.
    pub fn canonical(&self, wire: &str) -> Option<&'static str> {
        self.forward
            .iter()
            .find(|(_, w)| **w == Some(wire))
            .map(|(c, _)| *c)
    }
}

// ---------------------------------------------------------------------------
// Field maps
// ---------------------------------------------------------------------------

/// Wire field → canonical field mapping for one entity kind.
#[derive(Debug, Clone)]
pub enum FieldMap {
    /// Object-shaped payload rows: wire field name → canonical param.
    Named(Vec<(&'static str, ParamName)>),
    /// Array-shaped payload rows: canonical param per position, order fixed
    /// per venue. Trailing wire elements without a mapping are ignored.
    Positional(Vec<ParamName>),
}

/// Native timestamp encoding of a venue feed. Everything is normalized to
/// epoch milliseconds UTC before being attached to an entity.
#[derive(Debug, Clone, Copy)]
pub enum TimestampUnit {
    Milliseconds,
    Seconds,
    /// ISO-8601 / RFC 3339 string.
    Iso,
    /// Bare `"HH:MM:SS"` wall clock in the venue's fixed-offset local zone.
    LocalTimeOfDay { utc_offset_hours: i32 },
}

/// Field map plus timestamp encoding for one entity kind.
#[derive(Debug, Clone)]
pub struct EntityMap {
    pub fields: FieldMap,
    pub timestamp: TimestampUnit,
}

// ---------------------------------------------------------------------------
// Error tables
// ---------------------------------------------------------------------------

/// Where a venue's structured error carries its code and message.
#[derive(Debug, Clone, Default)]
pub struct ErrorMap {
    pub code_field: Option<&'static str>,
    pub message_field: Option<&'static str>,
}

/// Decode a structured venue error object into an [`ApiError`].
///
/// Unknown wire codes map to [`ErrorCode::UnknownPlatformError`]; the
/// original numeric code is embedded in the message so no diagnosis requires
/// re-capturing traffic.
pub fn decode_platform_error(
    obj: &serde_json::Map<String, serde_json::Value>,
    error_map: &ErrorMap,
    error_codes: &AHashMap<i64, ErrorCode>,
) -> ApiError {
    let wire_code = error_map.code_field.and_then(|f| parse_str_i64(obj.get(f)));

    let code = wire_code
        .and_then(|c| error_codes.get(&c).copied())
        .unwrap_or(ErrorCode::UnknownPlatformError);

    let mut message = error_map
        .message_field
        .and_then(|f| obj.get(f))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    if let Some(wire_code) = wire_code {
        if !message.is_empty() {
            message.push(' ');
        }
        message.push_str(&format!("(platform code {wire_code})"));
    }

    ApiError { code, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_renders_symbol_and_interval() {
        let t = ChannelTemplate::new("kline_{interval}:{symbol}");
        assert!(t.needs_interval());
        assert_eq!(t.render("btc_usd", Some("1min")).unwrap(), "kline_1min:btc_usd");
    }

    #[test]
    fn template_without_interval_fails_when_required() {
        let t = ChannelTemplate::new("kline_{interval}:{symbol}");
        assert!(matches!(t.render("btc_usd", None), Err(MdxError::Unsupported(_))));
    }

    #[test]
    fn value_table_round_trip() {
        let t = ValueTable::new([("1m", Some("1min")), ("8h", None)]);
        assert_eq!(t.wire(ParamName::Interval, "1m").unwrap(), "1min");
        assert_eq!(t.canonical("1min"), Some("1m"));
    }

    #[test]
    fn value_table_declared_unsupported_is_hard_failure() {
        let t = ValueTable::new([("1m", Some("1min")), ("8h", None)]);
        assert!(matches!(t.wire(ParamName::Interval, "8h"), Err(MdxError::Unsupported(_))));
        assert!(matches!(t.wire(ParamName::Interval, "3d"), Err(MdxError::Unsupported(_))));
    }

    #[test]
    fn platform_error_unknown_code_keeps_original() {
        let obj = serde_json::json!({"error_code": 99999});
        let map = ErrorMap { code_field: Some("error_code"), message_field: None };
        let err = decode_platform_error(obj.as_object().unwrap(), &map, &AHashMap::new());
        assert_eq!(err.code, ErrorCode::UnknownPlatformError);
        assert!(err.message.contains("99999"));
    }
}
