//! StreamDemo Socket - real-time live-room client.
//!
//! This crate provides the room session used by viewers and hosts:
//! - A connection manager with an explicit lifecycle state machine
//! - Fixed-interval reconnection with a bounded attempt budget
//! - Application-level keep-alive probes while connected
//! - JSON envelope encoding and per-kind handler dispatch
//! - Built-in reactions for membership, live-status and room-closed frames

pub mod dispatch;
pub mod endpoint;
pub mod envelope;
pub mod manager;
pub mod session;
pub mod state;
pub mod transport;

// Re-export key types
pub use dispatch::{
    BuiltinReaction, Dispatch, Dispatcher, Handler, HandlerRegistry, Navigator, NoopNavigator,
    NoticeLevel, Notifier, TracingNotifier,
};
pub use endpoint::room_endpoint;
pub use envelope::{Envelope, MessageKind};
pub use manager::{KeepAliveConfig, ReconnectConfig, RoomClient, RoomClientBuilder, RoomClientConfig};
pub use session::SessionSnapshot;
pub use state::ConnectionState;
pub use transport::{Connector, Inbound, Outbound, TransportLink, WsConnector};
