//! Room connection manager.
//!
//! [`RoomClient`] is the caller-owned handle to one room session. It owns the
//! handler registry and talks to the background [`SessionActor`] over a
//! command channel; state and retry counters are published back through
//! watch channels so reads never wait on the actor.
//!
//! Dropping the handle shuts the session down cleanly.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use sd_core::config::{AppConfig, RealtimeConfig};
use sd_core::constants;
use sd_core::error::{SdError, SdResult};

use crate::dispatch::{
    Dispatcher, HandlerRegistry, Navigator, NoopNavigator, Notifier, TracingNotifier,
};
use crate::endpoint::room_endpoint;
use crate::envelope::{Envelope, MessageKind};
use crate::session::{Command, Published, SessionActor, SessionSnapshot};
use crate::state::ConnectionState;
use crate::transport::{Connector, WsConnector};

/// Reconnection behavior after an unexpected close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Fixed delay before each attempt.
    pub interval: Duration,
    /// Consecutive failed attempts allowed before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(constants::DEFAULT_RECONNECT_INTERVAL_MS),
            max_attempts: constants::DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

/// Keep-alive probing while connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepAliveConfig {
    /// Period between `ping` envelopes. The first fires one period after open.
    pub interval: Duration,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(constants::DEFAULT_KEEPALIVE_INTERVAL_MS),
        }
    }
}

/// Tuning for one room session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomClientConfig {
    pub reconnect: ReconnectConfig,
    pub keepalive: KeepAliveConfig,
    /// Upper bound on a single open attempt (WebSocket connector only).
    pub connect_timeout: Duration,
    /// Endpoint path; the room id is appended.
    pub endpoint_path: String,
}

impl Default for RoomClientConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            keepalive: KeepAliveConfig::default(),
            connect_timeout: Duration::from_millis(constants::DEFAULT_CONNECT_TIMEOUT_MS),
            endpoint_path: constants::DEFAULT_ROOM_ENDPOINT_PATH.to_string(),
        }
    }
}

impl From<&RealtimeConfig> for RoomClientConfig {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            reconnect: ReconnectConfig {
                interval: config.reconnect_interval(),
                max_attempts: config.max_reconnect_attempts,
            },
            keepalive: KeepAliveConfig {
                interval: config.keepalive_interval(),
            },
            connect_timeout: config.connect_timeout(),
            endpoint_path: config.endpoint_path.clone(),
        }
    }
}

/// Builder for [`RoomClient`].
pub struct RoomClientBuilder {
    room_id: String,
    credential: String,
    server_address: String,
    config: RoomClientConfig,
    connector: Option<Arc<dyn Connector>>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
}

impl RoomClientBuilder {
    /// Session tuning. Defaults to [`RoomClientConfig::default`].
    pub fn config(mut self, config: RoomClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Server origin, e.g. `https://live.example.com`.
    pub fn server_address(mut self, address: impl Into<String>) -> Self {
        self.server_address = address.into();
        self
    }

    /// Take the server address and realtime tuning from the app config.
    pub fn app_config(self, app: &AppConfig) -> Self {
        self.server_address(app.server.address.clone())
            .config(RoomClientConfig::from(&app.realtime))
    }

    /// Transport used to open links. Defaults to [`WsConnector`].
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    /// Resolve the endpoint and start the session actor in the `Idle` state.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> SdResult<RoomClient> {
        let url = room_endpoint(
            &self.server_address,
            &self.config.endpoint_path,
            &self.room_id,
            &self.credential,
        )?;

        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WsConnector::new(self.config.connect_timeout)));
        let registry = Arc::new(HandlerRegistry::new());
        let dispatcher = Dispatcher::new(registry.clone(), self.notifier, self.navigator);

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let (attempts_tx, attempts_rx) = watch::channel(0u32);

        let actor = SessionActor::new(
            self.room_id.clone(),
            url,
            self.config,
            connector,
            dispatcher,
            command_rx,
            Published {
                state: state_tx,
                attempts: attempts_tx,
            },
        );
        tokio::spawn(actor.run());

        info!("room client created for room {}", self.room_id);
        Ok(RoomClient {
            room_id: self.room_id,
            commands,
            state_rx,
            attempts_rx,
            registry,
        })
    }
}

/// Handle to one room session.
pub struct RoomClient {
    room_id: String,
    commands: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    attempts_rx: watch::Receiver<u32>,
    registry: Arc<HandlerRegistry>,
}

impl RoomClient {
    /// Start building a client for `room_id`, authenticated by `credential`.
    pub fn builder(room_id: impl Into<String>, credential: impl Into<String>) -> RoomClientBuilder {
        RoomClientBuilder {
            room_id: room_id.into(),
            credential: credential.into(),
            server_address: String::new(),
            config: RoomClientConfig::default(),
            connector: None,
            notifier: Arc::new(TracingNotifier),
            navigator: Arc::new(NoopNavigator),
        }
    }

    /// Open the session.
    ///
    /// Resolves once the link is open, or fails with
    /// [`SdError::TransportOpen`] if this attempt fails. A failed attempt
    /// still enters the retry cycle in the background. Calling this while
    /// already open is a no-op; while an attempt is in flight it waits for
    /// that attempt.
    pub async fn connect(&self) -> SdResult<()> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Connect(tx))
            .map_err(|_| SdError::Disconnected)?;
        rx.await.map_err(|_| SdError::Disconnected)?
    }

    /// Close the session and cancel any scheduled reconnection.
    ///
    /// Returns once the session is `ClosedClean`. Idempotent.
    pub async fn disconnect(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Disconnect(tx)).is_ok() {
            let _ = rx.await;
        }
        debug!("room {} disconnected", self.room_id);
    }

    /// Send an envelope of `kind` tagged with this room and the current time.
    ///
    /// Fails with [`SdError::SendWhileClosed`] unless the session is open;
    /// nothing is queued for later delivery.
    pub fn send(&self, kind: &str, content: Option<String>, data: Option<Value>) -> SdResult<()> {
        let state = self.connection_state();
        if !state.is_open() {
            warn!("room {}: cannot send {kind} while {state}", self.room_id);
            return Err(SdError::SendWhileClosed(state.to_string()));
        }

        let text = Envelope::outbound(kind, &self.room_id, content, data).encode()?;
        self.commands
            .send(Command::Send(text))
            .map_err(|_| SdError::Disconnected)
    }

    pub fn send_chat(&self, content: impl Into<String>) -> SdResult<()> {
        self.send(MessageKind::Chat.as_str(), Some(content.into()), None)
    }

    /// Send a `ping` envelope outside the keep-alive schedule.
    pub fn send_ping(&self) -> SdResult<()> {
        self.send(MessageKind::Ping.as_str(), None, None)
    }

    /// Register the handler for `kind`, replacing any previous one.
    pub fn on<F>(&self, kind: &str, handler: F)
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.registry.on(kind, handler);
    }

    /// Remove the handler for `kind`.
    pub fn off(&self, kind: &str) -> bool {
        self.registry.off(kind)
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state().is_open()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Subscribe to state changes.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Consecutive failed attempts in the current retry cycle.
    pub fn reconnect_attempts(&self) -> u32 {
        *self.attempts_rx.borrow()
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Diagnostic view of the session's timers and link.
    pub async fn snapshot(&self) -> SdResult<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot(tx))
            .map_err(|_| SdError::Disconnected)?;
        rx.await.map_err(|_| SdError::Disconnected)
    }
}

impl std::fmt::Debug for RoomClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomClient")
            .field("room_id", &self.room_id)
            .field("state", &self.connection_state())
            .field("handlers", &self.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RoomClientConfig::default();
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.reconnect.interval, Duration::from_secs(3));
        assert_eq!(config.keepalive.interval, Duration::from_secs(30));
        assert_eq!(config.endpoint_path, "/ws/live-room");
    }

    #[test]
    fn test_config_from_realtime() {
        let realtime = RealtimeConfig {
            max_reconnect_attempts: 2,
            reconnect_interval_ms: 500,
            keepalive_interval_ms: 1000,
            connect_timeout_ms: 250,
            endpoint_path: "/rt".into(),
        };
        let config = RoomClientConfig::from(&realtime);
        assert_eq!(config.reconnect.max_attempts, 2);
        assert_eq!(config.reconnect.interval, Duration::from_millis(500));
        assert_eq!(config.keepalive.interval, Duration::from_secs(1));
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
        assert_eq!(config.endpoint_path, "/rt");
    }

    #[tokio::test]
    async fn test_spawn_requires_server_address() {
        let err = RoomClient::builder("r1", "token").spawn().unwrap_err();
        assert!(matches!(err, SdError::MissingConfig(_)));
    }

    #[tokio::test]
    async fn test_fresh_client_is_idle() {
        let client = RoomClient::builder("r1", "token")
            .server_address("http://localhost:1")
            .spawn()
            .unwrap();

        assert_eq!(client.connection_state(), ConnectionState::Idle);
        assert!(!client.is_connected());
        assert_eq!(client.reconnect_attempts(), 0);
        assert_eq!(client.room_id(), "r1");

        let err = client.send_chat("hello").unwrap_err();
        assert!(matches!(err, SdError::SendWhileClosed(_)));
    }
}
