//! The relay capability set the multiplexer is polymorphic over: {
//! ensure-relay, subscribe, close, close-pool } (§4.2).
//!
//! [`WsTransport`] is the production implementation over
//! `tokio-tungstenite`. Tests use a `FakeTransport` (see `multiplex`'s test
//! module) so subscription timing and event ordering are fully
//! deterministic.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use snafu::{ResultExt, Snafu};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use quire_core::Event;

use crate::filter::Filter;

/// A relay connection's lifecycle state (§4.2: "variant {connected, pending,
/// closed}").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Connected,
    Pending,
    Closed,
}

/// A message emitted by a live subscription.
#[derive(Debug, Clone)]
pub enum RelayMsg {
    Event(Event),
    Eose,
}

#[derive(Debug, Snafu)]
pub enum TransportError {
    #[snafu(display("failed to connect to relay {url}: {source}"))]
    Connect {
        url: String,
        source: tokio_tungstenite::tungstenite::Error,
    },
    #[snafu(display("failed to send subscription request to {url}: {source}"))]
    Send {
        url: String,
        source: tokio_tungstenite::tungstenite::Error,
    },
}

pub type TransportResult<T> = Result<T, TransportError>;

/// An opaque, transport-owned connection handle.
#[async_trait]
pub trait RelayHandle: Send + Sync {
    fn url(&self) -> &str;
    fn state(&self) -> HandleState;
}

/// A live subscription, streaming [`RelayMsg`] until end-of-stream.
#[async_trait]
pub trait RelaySubscription: Send {
    /// Returns `None` once the relay has signalled end-of-stream and the
    /// channel has drained.
    async fn next(&mut self) -> Option<RelayMsg>;
    async fn close(&mut self);
}

/// The capability set a relay multiplexer needs. Implementations own their
/// own connection pooling; `ensure_relay` may reuse an existing connection.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn ensure_relay(&self, url: &str) -> TransportResult<Box<dyn RelayHandle>>;

    async fn subscribe(
        &self,
        handle: &dyn RelayHandle,
        filters: &[Filter],
    ) -> TransportResult<Box<dyn RelaySubscription>>;
}

/// Production transport: one websocket connection per relay URL, opened
/// fresh per subscription. Connection reuse across calls is left to
/// [`crate::pool::RelayPool`], which owns a `WsTransport` per relay set.
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

struct WsHandle {
    url: String,
}

#[async_trait]
impl RelayHandle for WsHandle {
    fn url(&self) -> &str {
        &self.url
    }

    fn state(&self) -> HandleState {
        HandleState::Connected
    }
}

pub struct WsSubscription {
    rx: mpsc::Receiver<RelayMsg>,
    closed_tx: Option<mpsc::Sender<()>>,
}

#[async_trait]
impl RelaySubscription for WsSubscription {
    async fn next(&mut self) -> Option<RelayMsg> {
        self.rx.recv().await
    }

    async fn close(&mut self) {
        self.closed_tx.take();
    }
}

#[async_trait]
impl RelayTransport for WsTransport {
    async fn ensure_relay(&self, url: &str) -> TransportResult<Box<dyn RelayHandle>> {
        Ok(Box::new(WsHandle {
            url: url.to_string(),
        }))
    }

    async fn subscribe(
        &self,
        handle: &dyn RelayHandle,
        filters: &[Filter],
    ) -> TransportResult<Box<dyn RelaySubscription>> {
        let url = handle.url().to_string();
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .context(ConnectSnafu { url: url.clone() })?;
        let (mut write, mut read) = ws.split();

        let sub_id = "quire";
        let mut req = vec![serde_json::json!("REQ"), serde_json::json!(sub_id)];
        req.extend(filters.iter().map(|f| serde_json::to_value(f).expect("filter serializes")));
        let req = serde_json::Value::Array(req);
        write
            .send(Message::Text(req.to_string()))
            .await
            .context(SendSnafu { url: url.clone() })?;

        let (tx, rx) = mpsc::channel(256);
        let (closed_tx, mut closed_rx) = mpsc::channel::<()>(1);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = closed_rx.recv() => break,
                    msg = read.next() => {
                        let Some(Ok(Message::Text(text))) = msg else { break };
                        let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&text) else {
                            continue;
                        };
                        let Some(tag) = parsed.get(0).and_then(|v| v.as_str()) else {
                            continue;
                        };
                        match tag {
                            "EVENT" => {
                                if let Some(ev) = parsed
                                    .get(2)
                                    .and_then(|v| serde_json::from_value::<Event>(v.clone()).ok())
                                {
                                    if tx.send(RelayMsg::Event(ev)).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            "EOSE" => {
                                let _ = tx.send(RelayMsg::Eose).await;
                                break;
                            }
                            _ => {}
                        }
                    }
                }
            }
        });

        Ok(Box::new(WsSubscription {
            rx,
            closed_tx: Some(closed_tx),
        }))
    }
}
