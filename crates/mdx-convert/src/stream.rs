//! WebSocket-flavored converter: canonical subscribe intent → wire
//! subscription payload, and inbound frame → canonical entities.
//!
//! Decode pipeline per frame:
//!
//! 1. subscription ack → control
//! 2. heartbeat sentinel → control
//! 3. error shape → platform error (request echo appended verbatim)
//! 4. channel routing — the channel identifier embedded in the frame is
//!    authoritative over the endpoint the caller subscribed to
//! 5. envelope unwrap
//! 6. venue row transform (field reconstruction before generic decode)
//! 7. generic field-map decode + row veto
//! 8. entities, or control if every row was vetoed

use std::sync::Mutex;

use ahash::AHashMap;
use tracing::warn;

use mdx_core::{ApiError, Endpoint, Entity, EntityKind, ErrorCode, Interval, MdxError, ParamName};

use crate::decode::{RowContext, decode_row};
use crate::table::{
    ChannelTemplate, EntityMap, ErrorMap, Params, ValueTable, decode_platform_error,
};

/// Heartbeat sentinel found at index 1 of array-shaped control frames.
const HEARTBEAT_SENTINEL: &str = "hb";

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

/// Decompress a binary frame before any parsing. Frames are independent;
/// no decompression state is carried across frames.
pub type DecompressFn = Box<dyn Fn(&[u8]) -> Result<String, MdxError> + Send + Sync>;

/// Decode a multiplexed channel identifier into endpoint + derived fields.
/// Returning `None` means the channel matches no known pattern, which is a
/// protocol error (venue protocol change), never a silent drop.
pub type ChannelMatcherFn = Box<dyn Fn(&str) -> Option<ChannelMatch> + Send + Sync>;

/// Rewrite a payload row before generic decoding (normalize venue-specific
/// spellings, reshape awkward fields).
pub type RowTransformFn = Box<dyn Fn(&mut serde_json::Value, &ChannelMatch) + Send + Sync>;

/// Veto a decoded row entirely (e.g. synthetic index quotes). `true` drops
/// the row; sibling rows in the same frame survive.
pub type RowVetoFn = Box<dyn Fn(&Entity) -> bool + Send + Sync>;

/// The closed set of per-venue extension hooks, selected at construction.
#[derive(Default)]
pub struct StreamHooks {
    pub decompress: Option<DecompressFn>,
    pub channel_matcher: Option<ChannelMatcherFn>,
    pub row_transform: Option<RowTransformFn>,
    pub row_veto: Option<RowVetoFn>,
}

/// Result of matching a channel identifier: the true endpoint plus any
/// fields the channel name itself carries.
#[derive(Debug, Clone)]
pub struct ChannelMatch {
    pub endpoint: Endpoint,
    pub symbol: Option<String>,
    pub interval: Option<Interval>,
}

impl ChannelMatch {
    /// A match carrying nothing but the endpoint.
    pub fn bare(endpoint: Endpoint) -> Self {
        Self { endpoint, symbol: None, interval: None }
    }
}

// ---------------------------------------------------------------------------
// Subscribe shapes
// ---------------------------------------------------------------------------

/// Outbound subscription message shape. All venues express the same
/// canonical subscribe intent; only the JSON wrapping differs.
#[derive(Debug, Clone)]
pub enum SubscribeShape {
    /// `{"event": "subscribe", "channel": ..., "symbol": ...}`, with an
    /// optional venue prefix glued onto the symbol field.
    EventChannelSymbol { symbol_prefix: Option<&'static str> },
    /// `{"event": "subscribe", "channel": ...}`.
    EventChannel,
    /// `{"method": "SUBSCRIBE", "params": [...], "id": 1}`.
    MethodParams,
}

// ---------------------------------------------------------------------------
// Spec + converter
// ---------------------------------------------------------------------------

/// Immutable per-venue WebSocket wire description.
pub struct StreamSpec {
    /// WS base URL with a `{version}` placeholder.
    pub base_url: &'static str,
    pub version: &'static str,
    /// Endpoint → channel template.
    pub channels: AHashMap<Endpoint, ChannelTemplate>,
    /// Canonical value → wire value tables (interval tokens, direction
    /// spellings), shared by encode and decode.
    pub param_values: AHashMap<ParamName, ValueTable>,
    /// Wire field → canonical field maps per entity kind.
    pub entities: AHashMap<EntityKind, EntityMap>,
    pub error: ErrorMap,
    pub error_codes: AHashMap<i64, ErrorCode>,
    /// Object field naming the channel a frame belongs to (e.g. `"table"`).
    pub channel_field: Option<&'static str>,
    /// Object field wrapping the payload rows (e.g. `"data"`).
    pub envelope_field: Option<&'static str>,
    /// Object field whose presence marks a subscription acknowledgment.
    pub ack_field: Option<&'static str>,
    /// Object field echoing the original request on error frames; appended
    /// to the error message verbatim.
    pub request_echo_field: Option<&'static str>,
    pub subscribe_shape: SubscribeShape,
    /// Lowercase the symbol when rendering channel names (some venues use
    /// lowercase stream names for uppercase symbols).
    pub lowercase_symbol_in_channel: bool,
    pub hooks: StreamHooks,
}

/// Outcome of decoding one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// One or more market entities.
    Entities(Vec<Entity>),
    /// The venue pushed a structured error; the stream itself stays up.
    Platform(ApiError),
    /// Control traffic (ack, heartbeat) or a frame whose every row was
    /// vetoed — nothing for the caller.
    Control,
}

/// Translates subscribe intents and inbound frames for one venue's stream.
///
/// The only mutable state is the cached most-recent subscription params,
/// protected by a mutex with last-write-wins semantics: the cache holds the
/// "most recently intended" params, not a merge.
pub struct StreamConverter {
    spec: StreamSpec,
    cached_params: Mutex<Params>,
}

impl StreamConverter {
    pub fn new(spec: StreamSpec) -> Self {
        Self { spec, cached_params: Mutex::new(Params::new()) }
    }

    /// WS URL with the version substituted.
    pub fn url(&self) -> String {
        self.spec.base_url.replace("{version}", self.spec.version)
    }

    /// Snapshot of the cached subscription params (mainly for tests).
    pub fn cached_params(&self) -> Params {
        self.lock_cache().clone()
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, Params> {
        self.cached_params
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Run the venue's decompression hook on a binary frame.
    ///
    /// Venues without a hook fall back to UTF-8 interpretation.
    pub fn decompress(&self, frame: &[u8]) -> Result<String, MdxError> {
        match &self.spec.hooks.decompress {
            Some(hook) => hook(frame),
            None => String::from_utf8(frame.to_vec())
                .map_err(|e| MdxError::Protocol(format!("binary frame is not UTF-8: {e}"))),
        }
    }

    // -----------------------------------------------------------------------
    // Encode
    // -----------------------------------------------------------------------

    /// Build the wire subscription message for an endpoint + symbol.
    ///
    /// A non-empty `params` replaces the cached set; an empty `params`
    /// reuses the most recent non-empty set verbatim (venues that echo prior
    /// parameters on every subscribe call rely on this).
    pub fn build_subscription(
        &self,
        endpoint: Endpoint,
        symbol: &str,
        params: &Params,
    ) -> Result<String, MdxError> {
        let effective = {
            let mut cache = self.lock_cache();
            if params.is_empty() {
                cache.clone()
            } else {
                *cache = params.clone();
                params.clone()
            }
        };

        let template = self.spec.channels.get(&endpoint).ok_or_else(|| {
            MdxError::Unsupported(format!("endpoint {endpoint:?} has no channel on this venue"))
        })?;

        let wire_interval = if template.needs_interval() {
            let token = effective.get(&ParamName::Interval).ok_or_else(|| {
                MdxError::Unsupported(format!("channel for {endpoint:?} requires an interval"))
            })?;
            let table = self.spec.param_values.get(&ParamName::Interval).ok_or_else(|| {
                MdxError::Unsupported("venue has no interval value table".into())
            })?;
            Some(table.wire(ParamName::Interval, token)?)
        } else {
            None
        };

        let rendered_symbol = if self.spec.lowercase_symbol_in_channel {
            symbol.to_lowercase()
        } else {
            symbol.to_string()
        };
        let channel = template.render(&rendered_symbol, wire_interval)?;

        let msg = match &self.spec.subscribe_shape {
            SubscribeShape::EventChannelSymbol { symbol_prefix } => {
                let wire_symbol = match symbol_prefix {
                    Some(prefix) => format!("{prefix}{symbol}"),
                    None => symbol.to_string(),
                };
                serde_json::json!({
                    "event": "subscribe",
                    "channel": channel,
                    "symbol": wire_symbol,
                })
            }
            SubscribeShape::EventChannel => {
                serde_json::json!({"event": "subscribe", "channel": channel})
            }
            SubscribeShape::MethodParams => {
                serde_json::json!({"method": "SUBSCRIBE", "params": [channel], "id": 1})
            }
        };
        Ok(msg.to_string())
    }

    // -----------------------------------------------------------------------
    // Decode
    // -----------------------------------------------------------------------

    /// Decode one inbound frame.
    ///
    /// `subscribed` is only a fallback: when the frame embeds a channel
    /// identifier, that identifier decides the endpoint.
    pub fn decode(&self, subscribed: Endpoint, frame: &str) -> Result<Decoded, MdxError> {
        let v: serde_json::Value = serde_json::from_str(frame)
            .map_err(|e| MdxError::Protocol(format!("frame is not JSON: {e}")))?;
        self.decode_value(subscribed, &v)
    }

    fn decode_value(
        &self,
        subscribed: Endpoint,
        v: &serde_json::Value,
    ) -> Result<Decoded, MdxError> {
        if let Some(arr) = v.as_array() {
            return self.decode_array_frame(subscribed, arr);
        }

        let obj = v
            .as_object()
            .ok_or_else(|| MdxError::Protocol(format!("unrecognized frame shape: {v}")))?;

        // Error shape takes precedence: ack-shaped frames may carry errors.
        if let Some(field) = self.spec.error.message_field {
            if obj.contains_key(field) {
                let mut err =
                    decode_platform_error(obj, &self.spec.error, &self.spec.error_codes);
                if let Some(echo) = self.spec.request_echo_field.and_then(|f| obj.get(f)) {
                    err.message.push_str(&format!(" request: {echo}"));
                }
                return Ok(Decoded::Platform(err));
            }
        }

        // Subscription acknowledgment.
        if let Some(field) = self.spec.ack_field {
            let is_data = self.spec.channel_field.is_some_and(|cf| obj.contains_key(cf));
            if obj.contains_key(field) && !is_data {
                return Ok(Decoded::Control);
            }
        }

        // Channel routing — the embedded identifier is authoritative.
        let matched = match self
            .spec
            .channel_field
            .and_then(|cf| obj.get(cf))
            .and_then(|c| c.as_str())
        {
            Some(channel) => self.match_channel(channel)?,
            None => ChannelMatch::bare(subscribed),
        };

        // Envelope unwrap.
        let payload = self
            .spec
            .envelope_field
            .and_then(|f| obj.get(f))
            .unwrap_or(v);
        let rows: Vec<&serde_json::Value> = match payload.as_array() {
            Some(arr) => arr.iter().collect(),
            None => vec![payload],
        };

        self.decode_rows(&matched, rows)
    }

    /// Array frames are either the heartbeat sentinel or a transport
    /// envelope around object frames.
    fn decode_array_frame(
        &self,
        subscribed: Endpoint,
        arr: &[serde_json::Value],
    ) -> Result<Decoded, MdxError> {
        if arr.get(1).and_then(|v| v.as_str()) == Some(HEARTBEAT_SENTINEL) {
            return Ok(Decoded::Control);
        }
        if !arr.is_empty() && arr.iter().all(|e| e.is_object()) {
            let mut out = Vec::new();
            for element in arr {
                match self.decode_value(subscribed, element)? {
                    Decoded::Entities(mut entities) => out.append(&mut entities),
                    platform @ Decoded::Platform(_) => return Ok(platform),
                    Decoded::Control => {}
                }
            }
            return Ok(if out.is_empty() { Decoded::Control } else { Decoded::Entities(out) });
        }
        Err(MdxError::Protocol(format!(
            "unrecognized array frame of {} elements",
            arr.len()
        )))
    }

    fn match_channel(&self, channel: &str) -> Result<ChannelMatch, MdxError> {
        if let Some(matcher) = &self.spec.hooks.channel_matcher {
            return matcher(channel).ok_or_else(|| {
                MdxError::Protocol(format!("channel {channel:?} matches no known pattern"))
            });
        }
        // Without a matcher hook, only placeholder-free channel names can be
        // recognized, by exact comparison against the channel table.
        self.spec
            .channels
            .iter()
            .find(|(_, t)| !t.pattern().contains('{') && t.pattern() == channel)
            .map(|(endpoint, _)| ChannelMatch::bare(*endpoint))
            .ok_or_else(|| {
                MdxError::Protocol(format!("channel {channel:?} matches no known pattern"))
            })
    }

    fn decode_rows(
        &self,
        matched: &ChannelMatch,
        rows: Vec<&serde_json::Value>,
    ) -> Result<Decoded, MdxError> {
        let kind = matched.endpoint.entity_kind();
        let emap = self.spec.entities.get(&kind).ok_or_else(|| {
            MdxError::Unsupported(format!("no field map for {kind:?} on this venue"))
        })?;
        let ctx = RowContext {
            symbol: matched.symbol.as_deref(),
            interval: matched.interval,
            values: &self.spec.param_values,
        };

        let mut out = Vec::with_capacity(rows.len());
        let mut first_err: Option<MdxError> = None;
        for row in rows {
            let mut row = row.clone();
            if let Some(transform) = &self.spec.hooks.row_transform {
                transform(&mut row, matched);
            }
            match decode_row(emap, kind, &row, &ctx) {
                Ok(entity) => {
                    if self.spec.hooks.row_veto.as_ref().is_some_and(|veto| veto(&entity)) {
                        continue;
                    }
                    out.push(entity);
                }
                Err(e) => {
                    warn!("skipping undecodable {kind:?} row: {e}");
                    first_err.get_or_insert(e);
                }
            }
        }

        if out.is_empty() {
            // Nothing decoded: surface the first failure if any row had one.
            // A frame of nothing but vetoed rows is plain control traffic.
            if let Some(e) = first_err {
                return Err(e);
            }
            return Ok(Decoded::Control);
        }
        Ok(Decoded::Entities(out))
    }
}
