//! Shared JSON parsing helpers used by both converter flavors.
//!
//! Venues encode numeric values inconsistently — sometimes as JSON strings
//! (`"30000.5"`), sometimes as native numbers — so every reader here accepts
//! both.

use mdx_core::MdxError;

/// Parse a JSON value (string or number) as `i64`.
#[inline]
pub fn parse_str_i64(v: Option<&serde_json::Value>) -> Option<i64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        s.parse().ok()
    } else {
        v.as_i64()
    }
}

/// Parse a JSON value (string or number) as `f64`.
#[inline]
pub fn parse_str_f64(v: Option<&serde_json::Value>) -> Option<f64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        fast_float2::parse(s).ok()
    } else {
        v.as_f64()
    }
}

/// Render a scalar JSON value as its string form.
///
/// Entities carry prices and amounts as strings; this is the single place
/// where a venue's string-or-number encoding collapses to one shape.
pub fn value_to_string(v: &serde_json::Value) -> Result<String, MdxError> {
    match v {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(MdxError::Protocol(format!("expected scalar, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i64_from_string_or_number() {
        let s: serde_json::Value = serde_json::json!("1533124800500");
        let n: serde_json::Value = serde_json::json!(1533124800500i64);
        assert_eq!(parse_str_i64(Some(&s)), Some(1_533_124_800_500));
        assert_eq!(parse_str_i64(Some(&n)), Some(1_533_124_800_500));
        assert_eq!(parse_str_i64(None), None);
    }

    #[test]
    fn scalar_to_string() {
        assert_eq!(value_to_string(&serde_json::json!("4500.1")).unwrap(), "4500.1");
        assert_eq!(value_to_string(&serde_json::json!(4500.1)).unwrap(), "4500.1");
        assert_eq!(value_to_string(&serde_json::json!(true)).unwrap(), "true");
        assert!(value_to_string(&serde_json::json!([1, 2])).is_err());
    }
}
