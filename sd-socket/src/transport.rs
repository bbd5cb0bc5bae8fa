//! Transport seam between the session and the network.
//!
//! A [`Connector`] opens one link per attempt. The link is a pair of
//! channels: frames to write, and frames (or the final close) read from the
//! peer. The session owns the link exclusively.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

use sd_core::error::{SdError, SdResult};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;
type WsWrite = futures_util::stream::SplitSink<WsStream, Message>;
type WsRead = futures_util::stream::SplitStream<WsStream>;

/// Frame written to the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    /// Close the link with the given code and reason.
    Close { code: u16, reason: String },
}

/// Frame read from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    /// The link is gone. Always the last item on the channel.
    Closed { code: Option<u16>, reason: String },
}

/// An established link.
#[derive(Debug)]
pub struct TransportLink {
    pub outbound: mpsc::UnboundedSender<Outbound>,
    pub inbound: mpsc::UnboundedReceiver<Inbound>,
}

impl TransportLink {
    /// Queue a text frame. Returns false if the writer is gone.
    pub fn write(&self, text: String) -> bool {
        self.outbound.send(Outbound::Text(text)).is_ok()
    }

    /// Queue a close frame.
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.outbound.send(Outbound::Close {
            code,
            reason: reason.to_string(),
        });
    }
}

/// Opens transport links to a room endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a link. Failing to establish it is a [`SdError::TransportOpen`].
    async fn open(&self, url: &Url) -> SdResult<TransportLink>;
}

/// WebSocket connector backed by tokio-tungstenite.
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn writer_task(mut write: WsWrite, mut rx: mpsc::UnboundedReceiver<Outbound>) {
        while let Some(frame) = rx.recv().await {
            let (message, is_close) = match frame {
                Outbound::Text(text) => (Message::Text(text), false),
                Outbound::Close { code, reason } => (
                    Message::Close(Some(CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    })),
                    true,
                ),
            };

            if let Err(e) = write.send(message).await {
                debug!("websocket write failed: {e}");
                break;
            }
            if is_close {
                break;
            }
        }
        let _ = write.close().await;
    }

    async fn reader_task(mut read: WsRead, tx: mpsc::UnboundedSender<Inbound>) {
        let closed = loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => {
                    if tx.send(Inbound::Text(text)).is_err() {
                        return;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    break match frame {
                        Some(f) => Inbound::Closed {
                            code: Some(u16::from(f.code)),
                            reason: f.reason.to_string(),
                        },
                        None => Inbound::Closed {
                            code: None,
                            reason: String::new(),
                        },
                    };
                }
                // Protocol-level ping/pong is answered by tungstenite.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("websocket read error: {e}");
                    break Inbound::Closed {
                        code: None,
                        reason: e.to_string(),
                    };
                }
                None => {
                    break Inbound::Closed {
                        code: None,
                        reason: "stream ended".into(),
                    };
                }
            }
        };
        let _ = tx.send(closed);
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(Duration::from_millis(
            sd_core::constants::DEFAULT_CONNECT_TIMEOUT_MS,
        ))
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &Url) -> SdResult<TransportLink> {
        debug!("opening websocket to {}{}", url.origin().ascii_serialization(), url.path());

        let (ws, _response) = tokio::time::timeout(self.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| SdError::TransportOpen("connect timed out".into()))?
            .map_err(|e| SdError::TransportOpen(e.to_string()))?;

        let (write, read) = ws.split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::writer_task(write, outbound_rx));
        tokio::spawn(Self::reader_task(read, inbound_tx));

        Ok(TransportLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
