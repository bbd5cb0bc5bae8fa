//! Shared test utilities for room session integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use sd_core::error::{SdError, SdResult};
use sd_socket::{
    ConnectionState, Connector, Envelope, Inbound, KeepAliveConfig, Navigator, NoticeLevel,
    Notifier, Outbound, ReconnectConfig, RoomClient, RoomClientConfig, TransportLink,
};

pub const ROOM: &str = "r1";

/// What the next open attempt does.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Accept,
    Refuse,
    /// Never resolves.
    Hang,
}

/// The server side of an accepted link.
pub struct Peer {
    pub to_client: mpsc::UnboundedSender<Inbound>,
    pub from_client: mpsc::UnboundedReceiver<Outbound>,
}

impl Peer {
    /// Deliver an envelope to the client.
    pub fn push(&self, envelope: &Envelope) {
        self.push_raw(&envelope.encode().expect("encode"));
    }

    pub fn push_raw(&self, text: &str) {
        self.to_client
            .send(Inbound::Text(text.to_string()))
            .expect("client side of link is gone");
    }

    /// Close the link from the server side.
    pub fn drop_link(&self, code: u16) {
        let _ = self.to_client.send(Inbound::Closed {
            code: Some(code),
            reason: "server went away".into(),
        });
    }

    /// Next text frame written by the client, decoded.
    pub async fn next_envelope(&mut self) -> Envelope {
        match self.from_client.recv().await {
            Some(Outbound::Text(text)) => Envelope::decode(&text).expect("client wrote bad json"),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }
}

/// Connector that follows a script of open outcomes.
pub struct ScriptedConnector {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    opens: AtomicUsize,
    urls: Mutex<Vec<Url>>,
    peers: mpsc::UnboundedSender<Peer>,
}

impl ScriptedConnector {
    /// Steps run in order; once exhausted every attempt uses `fallback`.
    pub fn new(steps: &[Step], fallback: Step) -> (Arc<Self>, mpsc::UnboundedReceiver<Peer>) {
        let (peers, peer_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            script: Mutex::new(steps.iter().copied().collect()),
            fallback,
            opens: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
            peers,
        });
        (connector, peer_rx)
    }

    /// Queue more steps ahead of the fallback.
    pub fn then(&self, step: Step) {
        self.script.lock().unwrap().push_back(step);
    }

    /// Open attempts made so far.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn last_url(&self) -> Option<Url> {
        self.urls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, url: &Url) -> SdResult<TransportLink> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.clone());
        let step = self.script.lock().unwrap().pop_front().unwrap_or(self.fallback);

        match step {
            Step::Refuse => Err(SdError::TransportOpen("connection refused".into())),
            Step::Hang => std::future::pending().await,
            Step::Accept => {
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
                let _ = self.peers.send(Peer {
                    to_client: inbound_tx,
                    from_client: outbound_rx,
                });
                Ok(TransportLink {
                    outbound: outbound_tx,
                    inbound: inbound_rx,
                })
            }
        }
    }
}

/// Records notices and navigation.
#[derive(Default)]
pub struct Recorder {
    pub notices: Mutex<Vec<(NoticeLevel, String)>>,
    pub routes: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.notices.lock().unwrap().clone()
    }

    pub fn routes(&self) -> Vec<String> {
        self.routes.lock().unwrap().clone()
    }

    pub fn count(&self, level: NoticeLevel) -> usize {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .count()
    }
}

impl Notifier for Recorder {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notices.lock().unwrap().push((level, message.to_string()));
    }
}

impl Navigator for Recorder {
    fn navigate(&self, path: &str) {
        self.routes.lock().unwrap().push(path.to_string());
    }
}

/// Default session tuning: 5 attempts, 3 s apart, 30 s keep-alive.
pub fn test_config() -> RoomClientConfig {
    RoomClientConfig {
        reconnect: ReconnectConfig {
            interval: Duration::from_secs(3),
            max_attempts: 5,
        },
        keepalive: KeepAliveConfig {
            interval: Duration::from_secs(30),
        },
        ..RoomClientConfig::default()
    }
}

pub fn create_client(
    connector: Arc<ScriptedConnector>,
    recorder: Arc<Recorder>,
    config: RoomClientConfig,
) -> RoomClient {
    RoomClient::builder(ROOM, "secret-token")
        .server_address("http://localhost:8080")
        .config(config)
        .connector(connector)
        .notifier(recorder.clone())
        .navigator(recorder)
        .spawn()
        .expect("failed to spawn room client")
}

/// Wait (in virtual time) until the client reaches `state`.
pub async fn wait_for_state(client: &RoomClient, state: ConnectionState) {
    let mut rx = client.state_receiver();
    tokio::time::timeout(Duration::from_secs(600), rx.wait_for(|s| *s == state))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {state}"))
        .expect("session actor stopped");
}

/// Let spawned tasks run without moving the clock.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
