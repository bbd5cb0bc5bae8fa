//! Inbound frame dispatch: the handler registry and built-in reactions.
//!
//! Each decoded envelope first goes to the caller-registered handler for its
//! kind (if any), then through the built-in reactions. The two are
//! independent; registering a handler never suppresses a built-in.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use sd_core::constants::ROOM_LIST_ROUTE;

use crate::envelope::{Envelope, MessageKind};

/// Callback invoked for every inbound envelope of one kind.
pub type Handler = Arc<dyn Fn(&Envelope) + Send + Sync>;

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// Surfaces passive and actionable notices to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);
}

/// Moves the user away from the room view.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Notifier that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Success | NoticeLevel::Info => info!("{message}"),
            NoticeLevel::Warning => warn!("{message}"),
            NoticeLevel::Error => tracing::error!("{message}"),
        }
    }
}

/// Navigator for headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, path: &str) {
        debug!("navigation to {path} ignored");
    }
}

/// Per-session map from message kind to a single handler.
///
/// Registering a kind replaces the previous handler (last write wins).
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Mutex<HashMap<String, Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, replacing any previous one.
    pub fn on<F>(&self, kind: &str, handler: F)
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        let replaced = self.lock().insert(kind.to_string(), handler).is_some();
        if replaced {
            debug!("replaced handler for {kind}");
        }
    }

    /// Remove the handler for `kind`. Returns whether one was registered.
    pub fn off(&self, kind: &str) -> bool {
        self.lock().remove(kind).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot the handler for `kind`. The lock is released before the
    /// caller invokes it, so handlers may call `on`/`off` freely.
    pub fn get(&self, kind: &str) -> Option<Handler> {
        self.lock().get(kind).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Handler>> {
        // A handler that panicked mid-registration leaves the map intact.
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Built-in side effect that fired for a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuiltinReaction {
    /// A notice was shown.
    Notice(NoticeLevel),
    /// The room was closed remotely: tear down and navigate away.
    RoomClosed,
}

/// Outcome of dispatching one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// A registered handler was invoked.
    pub handled: bool,
    /// The built-in reaction that fired, if any.
    pub builtin: Option<BuiltinReaction>,
}

impl Dispatch {
    /// Whether the session must tear itself down.
    pub fn requires_teardown(&self) -> bool {
        self.builtin == Some(BuiltinReaction::RoomClosed)
    }
}

/// Routes decoded envelopes to handlers and built-in reactions.
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            registry,
            notifier,
            navigator,
        }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Dispatch one envelope.
    pub fn dispatch(&self, envelope: &Envelope) -> Dispatch {
        let handled = match self.registry.get(&envelope.kind) {
            Some(handler) => {
                handler(envelope);
                true
            }
            None => false,
        };

        let builtin = self.apply_builtin(envelope);
        Dispatch { handled, builtin }
    }

    fn apply_builtin(&self, envelope: &Envelope) -> Option<BuiltinReaction> {
        let kind = envelope.message_kind();
        if !kind.is_recognized() {
            debug!("unhandled message kind: {}", envelope.kind);
            return None;
        }
        match kind {
            MessageKind::Welcome => {
                Some(self.notice(NoticeLevel::Success, "Welcome to the live room!"))
            }
            MessageKind::UserJoined | MessageKind::UserLeft => {
                let name = envelope.username.as_deref()?;
                let verb = if kind == MessageKind::UserJoined { "joined" } else { "left" };
                Some(self.notice(NoticeLevel::Info, &format!("{name} {verb} the live room")))
            }
            MessageKind::RoomClosed => {
                self.notifier
                    .notify(NoticeLevel::Warning, "The live room has been closed");
                self.navigator.navigate(ROOM_LIST_ROUTE);
                Some(BuiltinReaction::RoomClosed)
            }
            MessageKind::LiveStarted => {
                Some(self.notice(NoticeLevel::Success, "The live stream has started!"))
            }
            MessageKind::LiveEnded => Some(self.notice(NoticeLevel::Info, "The live stream has ended")),
            // Left to registered handlers.
            MessageKind::Chat
            | MessageKind::Pong
            | MessageKind::ViewerCountUpdate
            | MessageKind::Ping
            | MessageKind::Unknown(_) => None,
        }
    }

    fn notice(&self, level: NoticeLevel, message: &str) -> BuiltinReaction {
        self.notifier.notify(level, message);
        BuiltinReaction::Notice(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Recorder {
        notices: Mutex<Vec<(NoticeLevel, String)>>,
        routes: Mutex<Vec<String>>,
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

    fn dispatcher() -> (Dispatcher, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = Dispatcher::new(
            Arc::new(HandlerRegistry::new()),
            recorder.clone(),
            recorder.clone(),
        );
        (dispatcher, recorder)
    }

    fn counter() -> (impl Fn(&Envelope) + Send + Sync + 'static, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handler = move |_: &Envelope| {
            c.fetch_add(1, Ordering::SeqCst);
        };
        (handler, count)
    }

    #[test]
    fn test_registry_last_write_wins() {
        let registry = HandlerRegistry::new();
        let (first, first_count) = counter();
        let (second, second_count) = counter();

        registry.on("chat", first);
        registry.on("chat", second);
        assert_eq!(registry.len(), 1);

        let handler = registry.get("chat").unwrap();
        handler(&Envelope::new("chat"));
        assert_eq!(first_count.load(Ordering::SeqCst), 0);
        assert_eq!(second_count.load(Ordering::SeqCst), 1);

        assert!(registry.off("chat"));
        assert!(!registry.off("chat"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_chat_goes_to_handler_only() {
        let (dispatcher, recorder) = dispatcher();
        let (handler, count) = counter();
        dispatcher.registry().on("chat", handler);

        let outcome = dispatcher.dispatch(&Envelope::new("chat").with_content("hi"));
        assert_eq!(
            outcome,
            Dispatch {
                handled: true,
                builtin: None
            }
        );
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(recorder.notices.lock().unwrap().is_empty());
    }

    #[test]
    fn test_builtin_fires_alongside_handler() {
        let (dispatcher, recorder) = dispatcher();
        let (handler, count) = counter();
        dispatcher.registry().on("live_started", handler);

        let outcome = dispatcher.dispatch(&Envelope::new("live_started"));
        assert!(outcome.handled);
        assert_eq!(outcome.builtin, Some(BuiltinReaction::Notice(NoticeLevel::Success)));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.notices.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_membership_notices_need_a_name() {
        let (dispatcher, recorder) = dispatcher();

        let outcome = dispatcher.dispatch(&Envelope::new("user_joined"));
        assert_eq!(outcome.builtin, None);

        dispatcher.dispatch(&Envelope::new("user_joined").with_sender(1, "bob"));
        dispatcher.dispatch(&Envelope::new("user_left").with_sender(1, "bob"));

        let notices = recorder.notices.lock().unwrap();
        assert_eq!(
            *notices,
            vec![
                (NoticeLevel::Info, "bob joined the live room".to_string()),
                (NoticeLevel::Info, "bob left the live room".to_string()),
            ]
        );
    }

    #[test]
    fn test_room_closed_navigates_away() {
        let (dispatcher, recorder) = dispatcher();

        let outcome = dispatcher.dispatch(&Envelope::new("room_closed").with_timestamp(2000));
        assert!(!outcome.handled);
        assert!(outcome.requires_teardown());
        assert_eq!(*recorder.routes.lock().unwrap(), vec!["/live-rooms".to_string()]);
        assert_eq!(recorder.notices.lock().unwrap()[0].0, NoticeLevel::Warning);
    }

    #[test]
    fn test_unknown_kind_is_ignored() {
        let (dispatcher, recorder) = dispatcher();
        let outcome = dispatcher.dispatch(&Envelope::new("gift"));
        assert_eq!(
            outcome,
            Dispatch {
                handled: false,
                builtin: None
            }
        );
        assert!(recorder.notices.lock().unwrap().is_empty());
        assert!(recorder.routes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unrecognized_kinds_still_reach_handlers() {
        let (dispatcher, recorder) = dispatcher();
        let (gift, gift_count) = counter();
        let (ping, ping_count) = counter();
        dispatcher.registry().on("gift", gift);
        dispatcher.registry().on("ping", ping);

        for kind in ["gift", "ping"] {
            let outcome = dispatcher.dispatch(&Envelope::new(kind));
            assert!(outcome.handled, "{kind}");
            assert_eq!(outcome.builtin, None, "{kind}");
        }
        assert_eq!(gift_count.load(Ordering::SeqCst), 1);
        assert_eq!(ping_count.load(Ordering::SeqCst), 1);
        assert!(recorder.notices.lock().unwrap().is_empty());
    }

    #[test]
    fn test_handler_can_unregister_itself() {
        let (dispatcher, _recorder) = dispatcher();
        let registry = dispatcher.registry().clone();
        let inner = registry.clone();
        registry.on("chat", move |_: &Envelope| {
            inner.off("chat");
        });

        assert!(dispatcher.dispatch(&Envelope::new("chat")).handled);
        assert!(!dispatcher.dispatch(&Envelope::new("chat")).handled);
    }
}
