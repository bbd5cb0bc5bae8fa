//! Stream Demo Core - Foundation types, error handling, configuration, and logging.
//!
//! This crate provides the shared foundation used by all other workspace crates:
//! - Application configuration (server address, real-time tuning, logging)
//! - Global error types, including the real-time channel taxonomy
//! - Structured logging with tracing
//! - Platform directories and common constants
//! - The persisted credential store

pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod platform;

// Re-export commonly used items at the crate root
pub use auth::{CredentialStore, UserProfile};
pub use config::AppConfig;
pub use error::{SdError, SdResult};
pub use logging::init_logging;
