//! OS-specific directories.
//!
//! - Windows: `%APPDATA%/StreamDemo`
//! - macOS: `~/Library/Application Support/StreamDemo`
//! - Linux: `~/.local/share/StreamDemo`

use std::path::PathBuf;

use crate::constants::APP_NAME;
use crate::error::{SdError, SdResult};

/// Application data directory. Holds credentials and logs.
pub fn data_dir() -> SdResult<PathBuf> {
    let base = dirs::data_dir()
        .ok_or_else(|| SdError::Config("could not determine data directory".into()))?;
    Ok(base.join(APP_NAME))
}

/// Configuration directory. Holds `config.toml`.
pub fn config_dir() -> SdResult<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| SdError::Config("could not determine config directory".into()))?;
    Ok(base.join(APP_NAME))
}
