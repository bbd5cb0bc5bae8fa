//! The per-room session actor.
//!
//! One task owns everything that changes over a session's lifetime: the
//! lifecycle state, the transport link, the in-flight open attempt, the
//! keep-alive interval and the retry timer. Commands from the
//! [`RoomClient`](crate::manager::RoomClient) handle, inbound frames and
//! timer firings are all serialized through a single `select!` loop.
//!
//! Timers are never started or stopped directly. [`SessionActor::transition`]
//! derives them from the target state, so a keep-alive interval exists iff
//! the state is `Open` and a retry timer exists iff it is `ClosedRetrying`.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, error, info, warn};
use url::Url;

use sd_core::constants::NORMAL_CLOSE_CODE;
use sd_core::error::{SdError, SdResult};

use crate::dispatch::{Dispatcher, NoticeLevel};
use crate::envelope::{Envelope, MessageKind};
use crate::manager::RoomClientConfig;
use crate::state::ConnectionState;
use crate::transport::{Connector, Inbound, TransportLink};

/// Requests from the handle to the actor.
pub(crate) enum Command {
    Connect(oneshot::Sender<SdResult<()>>),
    Disconnect(oneshot::Sender<()>),
    /// Pre-encoded envelope to write.
    Send(String),
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

/// Point-in-time view of a session's internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: ConnectionState,
    pub attempts: u32,
    pub keepalive_active: bool,
    pub retry_pending: bool,
    pub link_open: bool,
    pub connect_in_flight: bool,
}

impl SessionSnapshot {
    /// Number of timers currently armed.
    pub fn active_timers(&self) -> usize {
        usize::from(self.keepalive_active) + usize::from(self.retry_pending)
    }
}

/// Watch channels the actor publishes into.
pub(crate) struct Published {
    pub state: watch::Sender<ConnectionState>,
    pub attempts: watch::Sender<u32>,
}

enum Event {
    Command(Option<Command>),
    Opened(SdResult<TransportLink>),
    Frame(Option<Inbound>),
    KeepAliveTick,
    RetryDue,
}

pub(crate) struct SessionActor {
    room_id: String,
    url: Url,
    config: RoomClientConfig,
    connector: Arc<dyn Connector>,
    dispatcher: Dispatcher,
    commands: mpsc::UnboundedReceiver<Command>,
    published: Published,

    state: ConnectionState,
    attempts: u32,
    link: Option<TransportLink>,
    pending_open: Option<BoxFuture<'static, SdResult<TransportLink>>>,
    connect_waiters: Vec<oneshot::Sender<SdResult<()>>>,
    keepalive: Option<Interval>,
    retry: Option<Pin<Box<Sleep>>>,
}

impl SessionActor {
    pub(crate) fn new(
        room_id: String,
        url: Url,
        config: RoomClientConfig,
        connector: Arc<dyn Connector>,
        dispatcher: Dispatcher,
        commands: mpsc::UnboundedReceiver<Command>,
        published: Published,
    ) -> Self {
        Self {
            room_id,
            url,
            config,
            connector,
            dispatcher,
            commands,
            published,
            state: ConnectionState::Idle,
            attempts: 0,
            link: None,
            pending_open: None,
            connect_waiters: Vec::new(),
            keepalive: None,
            retry: None,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!("session actor for room {} started", self.room_id);
        loop {
            // Commands are polled first so a disconnect always wins over a
            // retry or open result that became ready at the same time.
            let event = tokio::select! {
                biased;
                cmd = self.commands.recv() => Event::Command(cmd),
                res = poll_open(&mut self.pending_open) => Event::Opened(res),
                frame = recv_frame(&mut self.link) => Event::Frame(frame),
                _ = tick(&mut self.keepalive) => Event::KeepAliveTick,
                _ = wait_retry(&mut self.retry) => Event::RetryDue,
            };

            match event {
                Event::Command(None) => {
                    self.teardown("client dropped");
                    break;
                }
                Event::Command(Some(cmd)) => self.handle_command(cmd),
                Event::Opened(result) => self.handle_open_result(result),
                Event::Frame(frame) => self.handle_frame(frame),
                Event::KeepAliveTick => self.send_keepalive(),
                Event::RetryDue => self.retry_now(),
            }

            debug_assert_eq!(self.keepalive.is_some(), self.state.wants_keepalive());
            debug_assert_eq!(self.retry.is_some(), self.state.wants_retry_timer());
        }
        debug!("session actor for room {} stopped", self.room_id);
    }

    // --- State machine ---

    /// Move to `next`, arming or cancelling timers to match it.
    fn transition(&mut self, next: ConnectionState) -> bool {
        let prev = self.state;
        if !prev.can_transition_to(next) {
            warn!("room {}: illegal transition {prev} -> {next} ignored", self.room_id);
            return false;
        }
        self.state = next;

        self.keepalive = if next.wants_keepalive() {
            // Interval panics on a zero period.
            let period = self.config.keepalive.interval.max(Duration::from_millis(1));
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Some(interval)
        } else {
            None
        };

        self.retry = if next.wants_retry_timer() {
            Some(Box::pin(sleep(self.config.reconnect.interval)))
        } else {
            None
        };

        info!("room {} state: {prev} -> {next}", self.room_id);
        self.published.state.send_replace(next);
        true
    }

    fn set_attempts(&mut self, attempts: u32) {
        self.attempts = attempts;
        self.published.attempts.send_replace(attempts);
    }

    // --- Commands ---

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect(reply) => self.connect(reply),
            Command::Disconnect(reply) => {
                self.teardown("client disconnect");
                let _ = reply.send(());
            }
            Command::Send(text) => self.write(text),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn connect(&mut self, reply: oneshot::Sender<SdResult<()>>) {
        match self.state {
            ConnectionState::Open => {
                debug!("room {} already connected", self.room_id);
                let _ = reply.send(Ok(()));
            }
            ConnectionState::Connecting => {
                debug!("room {} connect already in flight, joining", self.room_id);
                self.connect_waiters.push(reply);
            }
            ConnectionState::Closing => {
                let _ = reply.send(Err(SdError::Disconnected));
            }
            ConnectionState::ClosedRetrying => {
                // Skip the remaining delay; the retry budget keeps counting.
                self.connect_waiters.push(reply);
                self.begin_attempt();
            }
            ConnectionState::Idle
            | ConnectionState::ClosedClean
            | ConnectionState::ClosedExhausted => {
                self.set_attempts(0);
                self.connect_waiters.push(reply);
                self.begin_attempt();
            }
        }
    }

    fn begin_attempt(&mut self) {
        if !self.transition(ConnectionState::Connecting) {
            self.fail_waiters(|| SdError::Internal("cannot start connect attempt".into()));
            return;
        }
        let connector = self.connector.clone();
        let url = self.url.clone();
        self.pending_open = Some(Box::pin(async move { connector.open(&url).await }));
    }

    fn handle_open_result(&mut self, result: SdResult<TransportLink>) {
        self.pending_open = None;
        match result {
            Ok(link) => {
                self.link = Some(link);
                let failed = self.attempts;
                // Observers woken by `Open` must already see the reset count.
                self.set_attempts(0);
                if failed > 0 {
                    info!("room {} reconnected after {failed} attempt(s)", self.room_id);
                }
                self.transition(ConnectionState::Open);
                for waiter in self.connect_waiters.drain(..) {
                    let _ = waiter.send(Ok(()));
                }
            }
            Err(e) => {
                let reason = match e {
                    SdError::TransportOpen(reason) => reason,
                    other => other.to_string(),
                };
                warn!("room {}: connect attempt failed: {reason}", self.room_id);
                self.fail_waiters(|| SdError::TransportOpen(reason.clone()));
                self.schedule_reconnect();
            }
        }
    }

    fn fail_waiters(&mut self, err: impl Fn() -> SdError) {
        for waiter in self.connect_waiters.drain(..) {
            let _ = waiter.send(Err(err()));
        }
    }

    // --- Reconnection policy ---

    /// Called after a failed attempt or an unexpected close.
    fn schedule_reconnect(&mut self) {
        let max = self.config.reconnect.max_attempts;
        if self.attempts < max {
            self.set_attempts(self.attempts + 1);
            if self.transition(ConnectionState::ClosedRetrying) {
                info!(
                    "room {}: reconnecting ({}/{}) in {:?}",
                    self.room_id, self.attempts, max, self.config.reconnect.interval
                );
                self.dispatcher.notifier().notify(
                    NoticeLevel::Info,
                    &format!("Connection lost, reconnecting ({}/{max})...", self.attempts),
                );
            }
        } else if self.transition(ConnectionState::ClosedExhausted) {
            let err = SdError::RetryBudgetExhausted {
                attempts: self.attempts,
            };
            error!("room {}: {err}", self.room_id);
            self.dispatcher.notifier().notify(
                NoticeLevel::Error,
                "Connection failed, please retry manually",
            );
        }
    }

    fn retry_now(&mut self) {
        debug!(
            "room {}: retry timer fired (attempt {}/{})",
            self.room_id, self.attempts, self.config.reconnect.max_attempts
        );
        self.begin_attempt();
    }

    // --- Inbound ---

    fn handle_frame(&mut self, frame: Option<Inbound>) {
        match frame {
            Some(Inbound::Text(text)) => self.handle_text(&text),
            Some(Inbound::Closed { code, reason }) => self.handle_unexpected_close(code, reason),
            None => self.handle_unexpected_close(None, "transport dropped".into()),
        }
    }

    fn handle_text(&mut self, text: &str) {
        let envelope = match Envelope::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("room {}: discarding frame: {e}", self.room_id);
                return;
            }
        };

        debug!("room {}: received {}", self.room_id, envelope.kind);
        let outcome = self.dispatcher.dispatch(&envelope);
        if outcome.requires_teardown() {
            info!("room {} closed by server, tearing down", self.room_id);
            self.teardown("room closed");
        }
    }

    fn handle_unexpected_close(&mut self, code: Option<u16>, reason: String) {
        self.link = None;
        let err = SdError::UnexpectedClose { code, reason };
        warn!("room {}: {err}", self.room_id);
        self.schedule_reconnect();
    }

    // --- Outbound ---

    fn write(&mut self, text: String) {
        match (&self.link, self.state) {
            (Some(link), ConnectionState::Open) => {
                if !link.write(text) {
                    debug!("room {}: writer gone, frame dropped", self.room_id);
                }
            }
            _ => debug!("room {}: frame dropped while {}", self.room_id, self.state),
        }
    }

    fn send_keepalive(&mut self) {
        let probe = Envelope::outbound(MessageKind::Ping.as_str(), &self.room_id, None, None);
        match probe.encode() {
            Ok(text) => self.write(text),
            Err(e) => warn!("room {}: failed to encode keep-alive: {e}", self.room_id),
        }
    }

    // --- Teardown ---

    /// Clean, caller-side close. Idempotent.
    fn teardown(&mut self, reason: &str) {
        match self.state {
            ConnectionState::ClosedClean => {
                debug!("room {}: already closed", self.room_id);
            }
            ConnectionState::Open | ConnectionState::Connecting => {
                self.transition(ConnectionState::Closing);
                self.pending_open = None;
                if let Some(link) = self.link.take() {
                    link.close(NORMAL_CLOSE_CODE, reason);
                }
                self.transition(ConnectionState::ClosedClean);
            }
            ConnectionState::Closing
            | ConnectionState::Idle
            | ConnectionState::ClosedRetrying
            | ConnectionState::ClosedExhausted => {
                self.transition(ConnectionState::ClosedClean);
            }
        }
        self.fail_waiters(|| SdError::Disconnected);
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            attempts: self.attempts,
            keepalive_active: self.keepalive.is_some(),
            retry_pending: self.retry.is_some(),
            link_open: self.link.is_some(),
            connect_in_flight: self.pending_open.is_some(),
        }
    }
}

async fn poll_open(
    pending: &mut Option<BoxFuture<'static, SdResult<TransportLink>>>,
) -> SdResult<TransportLink> {
    match pending.as_mut() {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn recv_frame(link: &mut Option<TransportLink>) -> Option<Inbound> {
    match link.as_mut() {
        Some(link) => link.inbound.recv().await,
        None => std::future::pending().await,
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval.as_mut() {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn wait_retry(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry.as_mut() {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending::<()>().await,
    }
}
