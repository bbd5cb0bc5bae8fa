//! Live-room endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sd_core::constants::ROOM_LIST_ROUTE;
use sd_core::error::SdResult;

use crate::client::ApiClient;

/// Server-side lifecycle of a live room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Created,
    Live,
    Ended,
    Closed,
    #[serde(other)]
    Unknown,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Live => "live",
            Self::Ended => "ended",
            Self::Closed => "closed",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live room as returned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveRoomInfo {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub creator_id: i64,
    pub status: RoomStatus,
    /// Only present for the room's creator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_key: Option<String>,
    #[serde(default)]
    pub viewer_count: i64,
    #[serde(default)]
    pub max_viewers: i64,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl LiveRoomInfo {
    pub fn is_live(&self) -> bool {
        self.status == RoomStatus::Live
    }

    /// Start time, ignoring the zero timestamp the server sends for rooms
    /// that never went live.
    pub fn live_since(&self) -> Option<DateTime<Utc>> {
        self.started_at.filter(|t| t.timestamp() > 0)
    }
}

/// Acknowledgement of a room action.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomAck {
    #[serde(default)]
    pub room_id: Option<String>,
}

/// The caller's role in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRole {
    pub role: String,
}

impl RoomRole {
    pub fn is_creator(&self) -> bool {
        self.role == "creator"
    }
}

#[derive(Debug, Serialize)]
struct CreateRoomParams<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

fn room_path(room_id: &str) -> String {
    format!("{ROOM_LIST_ROUTE}/{room_id}")
}

fn limit_query(limit: Option<u32>) -> Vec<(&'static str, String)> {
    limit
        .map(|l| vec![("limit", l.to_string())])
        .unwrap_or_default()
}

impl ApiClient {
    /// Rooms that are currently open (created or live).
    pub async fn active_rooms(&self, limit: Option<u32>) -> SdResult<Vec<LiveRoomInfo>> {
        self.get_with_query(ROOM_LIST_ROUTE, &limit_query(limit))
            .await
    }

    /// All rooms, including ended ones.
    pub async fn all_rooms(&self, limit: Option<u32>) -> SdResult<Vec<LiveRoomInfo>> {
        self.get_with_query(&format!("{ROOM_LIST_ROUTE}/all"), &limit_query(limit))
            .await
    }

    pub async fn create_room(
        &self,
        title: &str,
        description: Option<&str>,
    ) -> SdResult<LiveRoomInfo> {
        let params = CreateRoomParams { title, description };
        self.post(ROOM_LIST_ROUTE, &params).await
    }

    pub async fn room(&self, room_id: &str) -> SdResult<LiveRoomInfo> {
        self.get(&room_path(room_id)).await
    }

    pub async fn join_room(&self, room_id: &str) -> SdResult<RoomAck> {
        self.post_empty(&format!("{}/join", room_path(room_id)))
            .await
    }

    pub async fn leave_room(&self, room_id: &str) -> SdResult<RoomAck> {
        self.post_empty(&format!("{}/leave", room_path(room_id)))
            .await
    }

    /// Start broadcasting. Creator only.
    pub async fn start_live(&self, room_id: &str) -> SdResult<RoomAck> {
        self.post_empty(&format!("{}/start", room_path(room_id)))
            .await
    }

    /// Stop broadcasting. Creator only.
    pub async fn end_live(&self, room_id: &str) -> SdResult<RoomAck> {
        self.post_empty(&format!("{}/end", room_path(room_id)))
            .await
    }

    /// Close the room for everyone. Creator only.
    pub async fn close_room(&self, room_id: &str) -> SdResult<RoomAck> {
        self.delete(&room_path(room_id)).await
    }

    pub async fn room_role(&self, room_id: &str) -> SdResult<RoomRole> {
        self.get(&format!("{}/role", room_path(room_id))).await
    }
}
