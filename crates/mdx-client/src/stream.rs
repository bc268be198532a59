//! WebSocket driver with auto-reconnect and ping keep-alive.
//!
//! The client runs one tokio task per stream connection that:
//!
//! 1. Connects to the venue WebSocket endpoint (TLS).
//! 2. Sends one wire subscription message per subscribed tuple.
//! 3. Reads frames, decompresses binary ones via the converter's venue hook,
//!    and hands every payload to [`StreamConverter::decode`].
//! 4. Sends periodic ping messages when configured.
//! 5. Automatically reconnects on disconnection with exponential backoff,
//!    replaying the recorded subscriptions.
//!
//! A frame that fails to decode is logged and does not stall the stream;
//! stopping the client halts further decode calls.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use mdx_convert::stream::{Decoded, StreamConverter};
use mdx_convert::table::Params;
use mdx_core::{Endpoint, Entity, MdxError};

/// Callback invoked for each decoded entity.
pub type OnEntity = Arc<dyn Fn(Entity) + Send + Sync>;

/// Keep-alive configuration (text payload, venue-specific).
#[derive(Debug, Clone)]
pub struct PingConfig {
    pub interval: Duration,
    pub payload: String,
}

/// One subscribed (endpoint, wire message) tuple, replayed on reconnect.
type Subscriptions = Arc<Mutex<Vec<(Endpoint, String)>>>;

/// WebSocket client for one venue's market-data stream.
pub struct StreamClient {
    converter: Arc<StreamConverter>,
    url: String,
    ping: Option<PingConfig>,
    subscriptions: Subscriptions,
    outbound_tx: Option<mpsc::Sender<String>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl StreamClient {
    /// Create a new (not yet started) client using the converter's own URL.
    pub fn new(converter: StreamConverter, ping: Option<PingConfig>) -> Self {
        let url = converter.url();
        Self::with_url(converter, url, ping)
    }

    /// Create a client against an explicit URL (testing, mirrors).
    pub fn with_url(converter: StreamConverter, url: String, ping: Option<PingConfig>) -> Self {
        Self {
            converter: Arc::new(converter),
            url,
            ping,
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            outbound_tx: None,
            shutdown_tx: None,
            task: None,
        }
    }

    /// Record a subscription and, when connected, send it immediately.
    ///
    /// The wire message is built by the converter; on reconnect every
    /// recorded subscription is replayed in order.
    pub async fn subscribe(
        &self,
        endpoint: Endpoint,
        symbol: &str,
        params: &Params,
    ) -> Result<(), MdxError> {
        let msg = self.converter.build_subscription(endpoint, symbol, params)?;
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((endpoint, msg.clone()));
        if let Some(tx) = &self.outbound_tx {
            tx.send(msg)
                .await
                .map_err(|e| MdxError::Transport(format!("subscribe send failed: {e}")))?;
        }
        Ok(())
    }

    /// Start the connection task; `on_entity` receives every decoded entity.
    pub fn start(&mut self, on_entity: OnEntity) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (outbound_tx, outbound_rx) = mpsc::channel::<String>(64);

        let converter = Arc::clone(&self.converter);
        let subscriptions = Arc::clone(&self.subscriptions);
        let url = self.url.clone();
        let ping = self.ping.clone();

        let task = tokio::spawn(async move {
            connection_loop(url, converter, subscriptions, ping, on_entity, outbound_rx, shutdown_rx)
                .await;
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.outbound_tx = Some(outbound_tx);
        self.task = Some(task);
    }

    /// Stop the connection and wait for the task to finish. No decode runs
    /// after this returns.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.outbound_tx = None;
    }
}

/// Decode one inbound text payload and forward entities to the callback.
///
/// Platform errors and decode failures are logged; neither terminates the
/// stream.
fn handle_frame(
    converter: &StreamConverter,
    fallback: Endpoint,
    text: &str,
    on_entity: &OnEntity,
) {
    match converter.decode(fallback, text) {
        Ok(Decoded::Entities(entities)) => {
            for entity in entities {
                on_entity(entity);
            }
        }
        Ok(Decoded::Platform(err)) => {
            warn!("venue error on stream ({:?}): {}", err.code, err.message);
        }
        Ok(Decoded::Control) => {}
        Err(e) => error!("frame decode failed: {e}"),
    }
}

/// The endpoint used when a frame carries no channel identifier: the most
/// recently subscribed one.
fn fallback_endpoint(subscriptions: &Subscriptions) -> Endpoint {
    subscriptions
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .last()
        .map(|(endpoint, _)| *endpoint)
        .unwrap_or(Endpoint::Trade)
}

/// Main connection loop — connects, subscribes, reads, pings, reconnects.
#[allow(clippy::too_many_arguments)]
async fn connection_loop(
    url: String,
    converter: Arc<StreamConverter>,
    subscriptions: Subscriptions,
    ping: Option<PingConfig>,
    on_entity: OnEntity,
    mut outbound_rx: mpsc::Receiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut backoff = Duration::from_millis(100);
    let max_backoff = Duration::from_secs(30);

    loop {
        if *shutdown_rx.borrow() {
            info!("[ws] shutdown requested");
            return;
        }

        info!("[ws] connecting to {url}");

        let ws_stream = match connect_ws(&url).await {
            Ok(s) => {
                backoff = Duration::from_millis(100); // reset backoff on success
                info!("[ws] connected");
                s
            }
            Err(e) => {
                error!("[ws] connection failed: {e}, retrying in {backoff:?}");
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {},
                    _ = shutdown_rx.changed() => return,
                }
                backoff = (backoff * 2).min(max_backoff);
                continue;
            }
        };

        let (mut ws_write, mut ws_read) = ws_stream.split();

        // Replay recorded subscriptions, one wire message per tuple.
        let pending: Vec<String> = subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, msg)| msg.clone())
            .collect();
        let mut subscribe_failed = false;
        for msg in pending {
            debug!("[ws] subscribing: {msg}");
            if let Err(e) = ws_write.send(Message::Text(msg.into())).await {
                error!("[ws] subscribe send failed: {e}");
                subscribe_failed = true;
                break;
            }
        }
        if subscribe_failed {
            continue;
        }

        // Ping timer; the first tick lands one full interval after connect.
        let mut ping_interval = ping.as_ref().map(|p| {
            tokio::time::interval_at(tokio::time::Instant::now() + p.interval, p.interval)
        });

        // Main read/write loop
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("[ws] shutdown signal received");
                    let _ = ws_write.close().await;
                    return;
                }

                msg = ws_read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let fallback = fallback_endpoint(&subscriptions);
                            handle_frame(&converter, fallback, &text, &on_entity);
                        }
                        Some(Ok(Message::Binary(data))) => {
                            // Decompression runs before any parsing; each
                            // frame is decompressed independently.
                            match converter.decompress(&data) {
                                Ok(text) => {
                                    let fallback = fallback_endpoint(&subscriptions);
                                    handle_frame(&converter, fallback, &text, &on_entity);
                                }
                                Err(e) => error!("[ws] frame decompression failed: {e}"),
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = ws_write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) => {
                            warn!("[ws] received close frame");
                            break;
                        }
                        Some(Err(e)) => {
                            error!("[ws] read error: {e}");
                            break;
                        }
                        None => {
                            warn!("[ws] stream ended");
                            break;
                        }
                        _ => {} // Pong, Frame — ignore
                    }
                }

                Some(msg) = outbound_rx.recv() => {
                    if let Err(e) = ws_write.send(Message::Text(msg.into())).await {
                        error!("[ws] send error: {e}");
                        break;
                    }
                }

                _ = next_ping(&mut ping_interval) => {
                    if let Some(p) = &ping {
                        if let Err(e) = ws_write.send(Message::Text(p.payload.clone().into())).await {
                            error!("[ws] ping send error: {e}");
                            break;
                        }
                    }
                }
            }
        }

        // Disconnected — will reconnect at the top of the outer loop
        warn!("[ws] disconnected, reconnecting in {backoff:?}");
        tokio::select! {
            _ = tokio::time::sleep(backoff) => {},
            _ = shutdown_rx.changed() => return,
        }
        backoff = (backoff * 2).min(max_backoff);
    }
}

/// Completes on the next ping tick; never resolves when pinging is disabled.
async fn next_ping(interval: &mut Option<tokio::time::Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Establish a (possibly TLS) WebSocket connection.
///
/// The URL is handed to `connect_async` as-is so the handshake headers
/// (`Sec-WebSocket-Key`, `Upgrade`, `Host`, ...) are generated by the
/// client handshake itself.
async fn connect_ws(
    url: &str,
) -> anyhow::Result<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
> {
    let (stream, _response) = tokio_tungstenite::connect_async(url).await?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use mdx_convert::venues;
    use mdx_core::ParamName;

    fn counting_callback() -> (OnEntity, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        let cb: OnEntity = Arc::new(move |_entity| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        (cb, count)
    }

    #[test]
    fn entities_reach_the_callback() {
        let converter = venues::stream_converter("okex").unwrap();
        let (cb, count) = counting_callback();
        let frame = r#"{
            "table": "trade",
            "data": [{"trdMatchID": "z1", "timestamp": "2018-08-01T12:00:00Z",
                      "symbol": "BTC_USD", "price": "4500", "size": "1", "side": "Buy"}]
        }"#;
        handle_frame(&converter, Endpoint::Trade, frame, &cb);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn control_and_garbage_frames_do_not_reach_the_callback() {
        let converter = venues::stream_converter("okex").unwrap();
        let (cb, count) = counting_callback();
        handle_frame(&converter, Endpoint::Trade, r#"[3, "hb"]"#, &cb);
        handle_frame(&converter, Endpoint::Trade, "not json at all", &cb);
        handle_frame(&converter, Endpoint::Trade, r#"{"error": "boom", "status": 1}"#, &cb);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn subscriptions_recorded_before_start() {
        let client = StreamClient::new(venues::stream_converter("okex").unwrap(), None);
        let mut params = Params::new();
        params.insert(ParamName::Interval, "1m".to_string());
        client.subscribe(Endpoint::Candle, "BTC_USD", &params).await.unwrap();
        client.subscribe(Endpoint::Trade, "BTC_USD", &Params::new()).await.unwrap();

        {
            let subs = client.subscriptions.lock().unwrap();
            assert_eq!(subs.len(), 2);
            assert!(subs[0].1.contains("kline_1min:BTC_USD"));
        }
        assert_eq!(fallback_endpoint(&client.subscriptions), Endpoint::Trade);
    }

    #[tokio::test]
    async fn replays_subscriptions_and_delivers_frames() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // One-shot server: accept, read the replayed subscription, answer
        // with a trade frame, report what was subscribed.
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            let sub = ws.next().await.unwrap().unwrap().into_text().unwrap();
            let frame = r#"{
                "table": "trade",
                "data": [{"trdMatchID": "w1", "timestamp": "2018-08-01T12:00:00Z",
                          "symbol": "BTC_USD", "price": "4500", "size": "1", "side": "Buy"}]
            }"#;
            ws.send(Message::Text(frame.to_string().into())).await.unwrap();
            sub.as_str().to_string()
        });

        let mut client = StreamClient::with_url(
            venues::stream_converter("okex").unwrap(),
            format!("ws://{addr}"),
            None,
        );
        client.subscribe(Endpoint::Trade, "BTC_USD", &Params::new()).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        client.start(Arc::new(move |entity| {
            let _ = tx.send(entity);
        }));

        let entity = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entity.symbol(), "BTC_USD");

        let subscribed = server.await.unwrap();
        assert!(subscribed.contains("trade:BTC_USD"));
        client.stop().await;
    }

    #[tokio::test]
    async fn ping_payload_sent_at_interval() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Server returns the first text message it sees; with no
        // subscriptions recorded, that can only be the keep-alive.
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => return text.as_str().to_string(),
                    Some(Ok(_)) => continue,
                    other => panic!("connection ended before any ping: {other:?}"),
                }
            }
        });

        let ping = PingConfig {
            interval: Duration::from_millis(20),
            payload: r#"{"event":"ping"}"#.to_string(),
        };
        let mut client = StreamClient::with_url(
            venues::stream_converter("okex").unwrap(),
            format!("ws://{addr}"),
            Some(ping),
        );
        client.start(Arc::new(|_| {}));

        let text = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(text, r#"{"event":"ping"}"#);
        client.stop().await;
    }
}
