//! REST driver: venue-agnostic fetch operations over HTTP.
//!
//! Every request is built by the converter and every body is handed back to
//! it; the client contributes only the HTTP call, bounded by a per-client
//! timeout.

use std::time::Duration;

use tracing::debug;

use mdx_convert::request::RequestConverter;
use mdx_convert::table::Params;
use mdx_core::{Candle, Endpoint, Entity, Interval, MdxError, ParamName, Trade};

/// HTTP client for one venue's market-data REST API.
///
/// Calls are independent, stateless request/response pairs; the only shared
/// state is the converter's read-only lookup tables, so a single client may
/// serve concurrent calls.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    converter: RequestConverter,
}

impl RestClient {
    /// Create a client using the converter's own base URL.
    pub fn new(converter: RequestConverter, timeout: Duration) -> Result<Self, MdxError> {
        let base_url = converter.base_url();
        Self::with_base_url(converter, base_url, timeout)
    }

    /// Create a client against an explicit base URL (testing, mirrors).
    pub fn with_base_url(
        converter: RequestConverter,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, MdxError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MdxError::Transport(format!("http client init failed: {e}")))?;
        Ok(Self { http, base_url, converter })
    }

    /// Most recent trades for a symbol.
    pub async fn fetch_trades(
        &self,
        symbol: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Trade>, MdxError> {
        let mut params = Params::new();
        params.insert(ParamName::Symbol, symbol.to_string());
        if let Some(limit) = limit {
            params.insert(ParamName::Limit, limit.to_string());
        }
        let entities = self.fetch(Endpoint::Trade, params).await?;
        Ok(Self::trades(entities))
    }

    /// Historical trades, optionally resuming from a trade id or time.
    pub async fn fetch_trades_history(
        &self,
        symbol: &str,
        limit: Option<u32>,
        from_item: Option<&str>,
        from_time: Option<i64>,
    ) -> Result<Vec<Trade>, MdxError> {
        let mut params = Params::new();
        params.insert(ParamName::Symbol, symbol.to_string());
        if let Some(limit) = limit {
            params.insert(ParamName::Limit, limit.to_string());
        }
        if let Some(from_item) = from_item {
            params.insert(ParamName::FromItem, from_item.to_string());
        }
        if let Some(from_time) = from_time {
            params.insert(ParamName::FromTime, from_time.to_string());
        }
        let entities = self.fetch(Endpoint::TradeHistory, params).await?;
        Ok(Self::trades(entities))
    }

    /// Candles for a symbol at a canonical granularity.
    pub async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        limit: Option<u32>,
    ) -> Result<Vec<Candle>, MdxError> {
        let mut params = Params::new();
        params.insert(ParamName::Symbol, symbol.to_string());
        params.insert(ParamName::Interval, interval.token().to_string());
        if let Some(limit) = limit {
            params.insert(ParamName::Limit, limit.to_string());
        }
        let entities = self.fetch(Endpoint::Candle, params).await?;
        Ok(entities
            .into_iter()
            .filter_map(|e| match e {
                Entity::Candle(c) => Some(c),
                _ => None,
            })
            .collect())
    }

    /// Build, send, and parse one request.
    async fn fetch(&self, endpoint: Endpoint, params: Params) -> Result<Vec<Entity>, MdxError> {
        let wire = self.converter.build_request(endpoint, &params)?;
        let url = format!("{}{}", self.base_url, wire.path);
        debug!("GET {url} {:?}", wire.query);

        let resp = self
            .http
            .get(&url)
            .query(&wire.query)
            .send()
            .await
            .map_err(|e| MdxError::Transport(format!("request to {url} failed: {e}")))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| MdxError::Transport(format!("reading body from {url} failed: {e}")))?;

        match self.converter.parse_response(endpoint, &body, &params) {
            // A non-2xx status whose body isn't a structured venue error is a
            // transport-level failure, not a protocol change.
            Err(MdxError::Protocol(e)) if !status.is_success() => {
                Err(MdxError::Transport(format!("HTTP {status} from {url}: {e}")))
            }
            other => other,
        }
    }

    fn trades(entities: Vec<Entity>) -> Vec<Trade> {
        entities
            .into_iter()
            .filter_map(|e| match e {
                Entity::Trade(t) => Some(t),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdx_convert::venues;

    #[test]
    fn base_url_has_version_substituted() {
        let client = RestClient::new(
            venues::rest_converter("okex").unwrap(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.base_url, "https://www.okex.com/api/v1/");
    }

    #[tokio::test]
    async fn unsupported_interval_fails_before_any_request() {
        // Points at an unroutable base URL: if the converter didn't abort,
        // the call would fail with a transport error instead.
        let client = RestClient::with_base_url(
            venues::rest_converter("okex").unwrap(),
            "http://127.0.0.1:1/".to_string(),
            Duration::from_millis(100),
        )
        .unwrap();
        let err = client.fetch_candles("btc_usd", Interval::Hrs8, None).await.unwrap_err();
        assert!(matches!(err, MdxError::Unsupported(_)));
    }
}
