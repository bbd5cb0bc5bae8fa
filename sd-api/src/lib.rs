//! StreamDemo API - HTTP client for the live-room REST API.
//!
//! This crate provides a typed HTTP client for the live-room endpoints. It
//! attaches the bearer credential, normalizes the several response envelope
//! shapes the server uses into bare payloads, and retries idempotent reads on
//! transient failures.

pub mod client;
pub mod endpoints;
pub mod response;

// Re-export key types
pub use client::{ApiClient, RetryConfig};
pub use endpoints::live_rooms::{LiveRoomInfo, RoomAck, RoomRole, RoomStatus};
pub use response::{error_message, unwrap_payload, ResponseShape};
