//! REST endpoint groups.

pub mod live_rooms;
