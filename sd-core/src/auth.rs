//! Persisted credential store.
//!
//! Holds the current bearer token and the signed-in user profile. Both are
//! kept in memory and mirrored to a small JSON file so the next process start
//! picks them up again. The token is handed to the REST client on every
//! request and to the room channel once, at connect time.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SdResult;
use crate::platform;

/// File name of the credential record inside the data directory.
const CREDENTIALS_FILE: &str = "credentials.json";

/// Profile of the signed-in user as returned by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

/// On-disk shape. The user is kept as a raw value so a corrupt profile can
/// be detected separately from a corrupt file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredCredentials {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<serde_json::Value>,
}

/// Credential store backed by a JSON file.
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    token: Option<String>,
    user: Option<UserProfile>,
}

impl CredentialStore {
    /// Open the store at the default location in the platform data directory.
    pub fn open_default() -> SdResult<Self> {
        let path = platform::data_dir()?.join(CREDENTIALS_FILE);
        Self::open(&path)
    }

    /// Open the store at a specific path, restoring any saved credentials.
    ///
    /// An unreadable file, or a stored profile that fails to parse, is
    /// cleared as if the user had logged out. A token saved without any
    /// profile is kept.
    pub fn open(path: &Path) -> SdResult<Self> {
        let mut store = Self {
            path: path.to_path_buf(),
            token: None,
            user: None,
        };

        if !path.exists() {
            return Ok(store);
        }

        let contents = std::fs::read_to_string(path)?;
        let stored: StoredCredentials = match serde_json::from_str(&contents) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("credential file unreadable, clearing: {e}");
                store.logout()?;
                return Ok(store);
            }
        };

        match (stored.token, stored.user) {
            (Some(token), Some(user)) => match serde_json::from_value::<UserProfile>(user) {
                Ok(profile) => {
                    store.token = Some(token);
                    store.user = Some(profile);
                }
                Err(e) => {
                    warn!("failed to parse stored user profile: {e}");
                    store.logout()?;
                }
            },
            (Some(token), None) => {
                // Token-only sessions are allowed (e.g. set from the CLI).
                store.token = Some(token);
            }
            _ => {}
        }

        debug!("credential store opened at {}", store.path.display());
        Ok(store)
    }

    /// Current bearer token, if signed in.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Current user profile, if known.
    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store a fresh session.
    pub fn set_auth(&mut self, token: String, user: Option<UserProfile>) -> SdResult<()> {
        self.token = Some(token);
        self.user = user;
        self.persist()
    }

    /// Replace the cached user profile, keeping the token.
    pub fn update_user(&mut self, user: UserProfile) -> SdResult<()> {
        self.user = Some(user);
        self.persist()
    }

    /// Forget the session in memory and on disk.
    pub fn logout(&mut self) -> SdResult<()> {
        self.token = None;
        self.user = None;
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        debug!("credentials cleared");
        Ok(())
    }

    fn persist(&self) -> SdResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let stored = StoredCredentials {
            token: self.token.clone(),
            user: self.user.as_ref().map(serde_json::to_value).transpose()?,
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&stored)?)?;
        Ok(())
    }
}
