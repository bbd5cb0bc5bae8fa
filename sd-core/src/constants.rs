//! Application-wide constants.

/// Application name.
pub const APP_NAME: &str = "StreamDemo";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default REST API path prefix.
pub const DEFAULT_API_PATH: &str = "/api";

/// Default REST API timeout in milliseconds.
pub const DEFAULT_API_TIMEOUT_MS: u64 = 10_000;

/// Path of the room-scoped real-time endpoint; the room id is appended.
pub const DEFAULT_ROOM_ENDPOINT_PATH: &str = "/ws/live-room";

/// Query parameter carrying the credential on the room endpoint.
pub const ROOM_TOKEN_PARAM: &str = "token";

/// Maximum consecutive reconnection attempts before giving up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Fixed delay between reconnection attempts in milliseconds.
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 3_000;

/// Keep-alive probe interval in milliseconds.
pub const DEFAULT_KEEPALIVE_INTERVAL_MS: u64 = 30_000;

/// Timeout for a single transport open attempt in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Close code sent on a caller-initiated disconnect.
pub const NORMAL_CLOSE_CODE: u16 = 1000;

/// Where the client navigates after a forced room closure.
pub const ROOM_LIST_ROUTE: &str = "/live-rooms";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realtime_defaults() {
        assert_eq!(DEFAULT_MAX_RECONNECT_ATTEMPTS, 5);
        assert_eq!(DEFAULT_RECONNECT_INTERVAL_MS, 3_000);
        assert_eq!(DEFAULT_KEEPALIVE_INTERVAL_MS, 30_000);
        assert!(DEFAULT_ROOM_ENDPOINT_PATH.starts_with('/'));
    }
}
