//! REST-flavored converter: canonical request → URL path + query params, and
//! JSON response body → canonical entities.

use ahash::AHashMap;
use tracing::warn;

use mdx_core::{Endpoint, Entity, EntityKind, ErrorCode, Interval, MdxError, ParamName};

use crate::decode::{RowContext, decode_row};
use crate::table::{EntityMap, ErrorMap, Params, ValueTable, decode_platform_error};

/// Immutable per-venue REST wire description.
pub struct RequestSpec {
    /// REST base URL with a `{version}` placeholder.
    pub base_url: &'static str,
    /// API version substituted into `base_url`.
    pub version: &'static str,
    /// Endpoint → wire path.
    pub endpoints: AHashMap<Endpoint, &'static str>,
    /// Canonical param → wire name. `None` declares the param unsupported
    /// (silently omitted); a param missing from the table entirely is a
    /// caller configuration error.
    pub param_names: AHashMap<ParamName, Option<&'static str>>,
    /// Canonical value → wire value tables, keyed by param.
    pub param_values: AHashMap<ParamName, ValueTable>,
    /// Wire field → canonical field maps per entity kind.
    pub entities: AHashMap<EntityKind, EntityMap>,
    /// Where an error body carries its code and message.
    pub error: ErrorMap,
    /// Wire error code → canonical error code.
    pub error_codes: AHashMap<i64, ErrorCode>,
}

/// A venue-ready request: path relative to the base URL plus query params.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRequest {
    pub path: String,
    /// Wire-name/wire-value pairs, sorted by name for determinism.
    pub query: Vec<(String, String)>,
}

/// Translates canonical requests and responses for one venue's REST API.
pub struct RequestConverter {
    spec: RequestSpec,
}

impl RequestConverter {
    pub fn new(spec: RequestSpec) -> Self {
        Self { spec }
    }

    /// REST base URL with the version substituted.
    pub fn base_url(&self) -> String {
        self.spec.base_url.replace("{version}", self.spec.version)
    }

    /// Build the wire path and query for an endpoint.
    ///
    /// Params explicitly declared unsupported (`None` wire name) are omitted;
    /// params with no table entry at all fail with `Unsupported`, as does a
    /// value the venue's value table cannot express.
    pub fn build_request(
        &self,
        endpoint: Endpoint,
        params: &Params,
    ) -> Result<WireRequest, MdxError> {
        let path = self.spec.endpoints.get(&endpoint).ok_or_else(|| {
            MdxError::Unsupported(format!("endpoint {endpoint:?} has no path on this venue"))
        })?;

        let mut query = Vec::with_capacity(params.len());
        for (param, value) in params {
            let wire_name = match self.spec.param_names.get(param) {
                Some(Some(name)) => *name,
                // Declared unsupported: omit without failing the request.
                Some(None) => continue,
                None => {
                    return Err(MdxError::Unsupported(format!(
                        "param {param:?} is not mapped on this venue"
                    )));
                }
            };
            let wire_value = match self.spec.param_values.get(param) {
                Some(table) => table.wire(*param, value)?.to_string(),
                None => value.clone(),
            };
            query.push((wire_name.to_string(), wire_value));
        }
        query.sort();

        Ok(WireRequest { path: path.to_string(), query })
    }

    /// Parse a raw response body into entities, or fail with the venue's
    /// structured error mapped to a canonical code.
    ///
    /// `params` supplies context the rows may omit (symbol, interval). A row
    /// that fails to decode is skipped with a warning; siblings survive.
    pub fn parse_response(
        &self,
        endpoint: Endpoint,
        body: &str,
        params: &Params,
    ) -> Result<Vec<Entity>, MdxError> {
        let v: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| MdxError::Protocol(format!("response is not JSON: {e}")))?;

        if let Some(obj) = v.as_object() {
            let is_error = self.spec.error.code_field.is_some_and(|f| obj.contains_key(f))
                || self.spec.error.message_field.is_some_and(|f| obj.contains_key(f));
            if is_error {
                let err = decode_platform_error(obj, &self.spec.error, &self.spec.error_codes);
                return Err(MdxError::Platform { code: err.code, message: err.message });
            }
        }

        let kind = endpoint.entity_kind();
        let emap = self.spec.entities.get(&kind).ok_or_else(|| {
            MdxError::Unsupported(format!("no field map for {kind:?} on this venue"))
        })?;

        let interval = params
            .get(&ParamName::Interval)
            .and_then(|t| t.parse::<Interval>().ok());
        let ctx = RowContext {
            symbol: params.get(&ParamName::Symbol).map(String::as_str),
            interval,
            values: &self.spec.param_values,
        };

        let rows: Vec<&serde_json::Value> = match v.as_array() {
            Some(arr) => arr.iter().collect(),
            None => vec![&v],
        };

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            match decode_row(emap, kind, row, &ctx) {
                Ok(entity) => out.push(entity),
                Err(e) => warn!("skipping undecodable {kind:?} row: {e}"),
            }
        }
        Ok(out)
    }
}
