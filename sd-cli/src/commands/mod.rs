//! CLI command implementations.

pub mod auth;
pub mod rooms;
pub mod watch;

use sd_api::ApiClient;
use sd_core::auth::CredentialStore;
use sd_core::config::ConfigHandle;
use sd_core::error::{SdError, SdResult};

/// Helper to create an API client from config, signed in when a credential is saved.
pub async fn create_api_client(config: &ConfigHandle) -> SdResult<ApiClient> {
    let server_config = config.read().await.server.clone();
    let client = ApiClient::new(&server_config)?;
    let store = CredentialStore::open_default()?;
    Ok(match store.token() {
        Some(token) => client.with_token(token),
        None => client,
    })
}

/// Resolve the credential: explicit argument first, then the saved one.
pub fn resolve_token(explicit: Option<String>) -> SdResult<String> {
    if let Some(token) = explicit.filter(|t| !t.trim().is_empty()) {
        return Ok(token);
    }
    let store = CredentialStore::open_default()?;
    store
        .token()
        .map(str::to_string)
        .ok_or_else(|| SdError::AuthFailed("not signed in; run `streamdemo auth set-token`".into()))
}

/// Print a value as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> SdResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Truncate a string to a maximum number of characters, appending an ellipsis if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    let count = s.chars().count();
    if count <= max_len {
        s.to_string()
    } else if max_len > 3 {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    } else {
        s.chars().take(max_len).collect()
    }
}

/// Show only the ends of a credential.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
