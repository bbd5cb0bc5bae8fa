//! Wire envelope and message kinds for the live-room channel.
//!
//! Every frame on the channel is a single JSON object. The kind tag is an
//! open set: well-known kinds map to [`MessageKind`] variants, anything else
//! is carried through as [`MessageKind::Unknown`].

use serde::{Deserialize, Serialize};

use sd_core::error::{SdError, SdResult};

/// Message kinds exchanged with the live-room server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Chat line from a room member (`chat`).
    Chat,
    /// Keep-alive probe (`ping`).
    Ping,
    /// Keep-alive response (`pong`).
    Pong,
    /// Greeting sent by the server after joining (`welcome`).
    Welcome,
    /// Another member joined the room (`user_joined`).
    UserJoined,
    /// A member left the room (`user_left`).
    UserLeft,
    /// The room was closed by its owner (`room_closed`).
    RoomClosed,
    /// The broadcaster went live (`live_started`).
    LiveStarted,
    /// The broadcast ended (`live_ended`).
    LiveEnded,
    /// Viewer count changed (`viewer_count_update`).
    ViewerCountUpdate,
    /// Unknown/unhandled kind.
    Unknown(String),
}

impl MessageKind {
    /// Parse a kind tag from the wire.
    pub fn from_str(s: &str) -> Self {
        match s {
            "chat" => Self::Chat,
            "ping" => Self::Ping,
            "pong" => Self::Pong,
            "welcome" => Self::Welcome,
            "user_joined" => Self::UserJoined,
            "user_left" => Self::UserLeft,
            "room_closed" => Self::RoomClosed,
            "live_started" => Self::LiveStarted,
            "live_ended" => Self::LiveEnded,
            "viewer_count_update" => Self::ViewerCountUpdate,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Convert to the wire tag.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Chat => "chat",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Welcome => "welcome",
            Self::UserJoined => "user_joined",
            Self::UserLeft => "user_left",
            Self::RoomClosed => "room_closed",
            Self::LiveStarted => "live_started",
            Self::LiveEnded => "live_ended",
            Self::ViewerCountUpdate => "viewer_count_update",
            Self::Unknown(s) => s.as_str(),
        }
    }

    /// Whether the client recognizes this kind (built-in reaction or
    /// deliberately left to registered handlers).
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unknown(_) | Self::Ping)
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for MessageKind {
    fn from(s: &str) -> Self {
        Self::from_str(s)
    }
}

/// The wire unit of the live-room channel.
///
/// ```json
/// { "type": "chat", "room_id": "r1", "content": "hi", "timestamp": 1000 }
/// ```
///
/// The kind is written as `type`; `kind` is accepted on decode as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message kind tag.
    #[serde(rename = "type", alias = "kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    /// Numeric id of the sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    /// Display name of the sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Sender role in the room (e.g. "creator", "viewer").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Free-form structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Send time on the sender's clock. The client writes milliseconds.
    #[serde(default)]
    pub timestamp: i64,
}

impl Envelope {
    /// Create an envelope of the given kind stamped with the current time.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            room_id: None,
            user_id: None,
            username: None,
            role: None,
            content: None,
            data: None,
            timestamp: now_millis(),
        }
    }

    /// Outbound envelope for a room, as produced by the client's `send`.
    pub fn outbound(
        kind: impl Into<String>,
        room_id: &str,
        content: Option<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            room_id: Some(room_id.to_string()),
            content,
            data,
            ..Self::new(kind)
        }
    }

    pub fn with_room(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    pub fn with_sender(mut self, user_id: i64, username: impl Into<String>) -> Self {
        self.user_id = Some(user_id);
        self.username = Some(username.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Parsed kind tag.
    pub fn message_kind(&self) -> MessageKind {
        MessageKind::from_str(&self.kind)
    }

    /// Decode an inbound text frame.
    pub fn decode(text: &str) -> SdResult<Self> {
        serde_json::from_str(text).map_err(|e| SdError::Decode(e.to_string()))
    }

    /// Encode for the wire.
    pub fn encode(&self) -> SdResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Viewer count carried by a `viewer_count_update` frame.
    pub fn viewer_count(&self) -> Option<u64> {
        if self.message_kind() != MessageKind::ViewerCountUpdate {
            return None;
        }
        let data = self.data.as_ref()?;
        data.get("viewer_count")
            .or_else(|| data.get("count"))
            .and_then(|v| v.as_u64())
    }
}

/// Current client clock in milliseconds since the epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
