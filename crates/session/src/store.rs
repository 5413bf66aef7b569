//! On-disk session token persistence.
//!
//! The token lives in a JSON file under the user's config directory:
//! - Linux: `~/.config/sfs/session.json`
//! - Windows: `%APPDATA%/sfs/session.json`
//!
//! The file is owner-only readable on Unix since it holds a live
//! session token.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::SessionError;

/// Default token validity window: 1 year.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// A persisted session token with its expiry (Unix seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub expires_at: u64,
}

impl StoredSession {
    /// Returns `true` if the expiry is in the past.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_now()
    }
}

/// Explicit store for the session file. No ambient singleton: the
/// caller decides where the file lives and passes the store around.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Creates a store backed by `path`.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Returns the session file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the persisted session, if present and still valid.
    ///
    /// A missing, unparsable, or expired file all load as `None`;
    /// corruption is treated as "no session", never as an error.
    pub fn load(&self) -> Option<StoredSession> {
        let data = std::fs::read_to_string(&self.path).ok()?;
        let session: StoredSession = match serde_json::from_str(&data) {
            Ok(s) => s,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "discarding unparsable session file");
                return None;
            }
        };
        if session.is_expired() {
            debug!(path = %self.path.display(), "discarding expired session");
            return None;
        }
        Some(session)
    }

    /// Persists `token` with the given validity window.
    ///
    /// Creates parent directories as needed and restricts the file to
    /// the owning user on Unix.
    pub fn save(&self, token: &str, ttl: Duration) -> Result<(), SessionError> {
        let session = StoredSession {
            token: token.to_string(),
            expires_at: unix_now() + ttl.as_secs(),
        };
        let json = serde_json::to_string(&session)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        debug!(path = %self.path.display(), "session persisted");
        Ok(())
    }
}

/// Returns the default session file path under the platform config dir.
pub fn default_session_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("sfs").join("session.json"))
}

/// Returns the platform-specific config directory.
fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".config"))
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, SessionStore) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("session.json");
        (tmp, SessionStore::new(path))
    }

    #[test]
    fn load_missing_file_returns_none() {
        let (_tmp, store) = test_store();
        assert!(store.load().is_none());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let (_tmp, store) = test_store();
        store.save("tok-abc", DEFAULT_SESSION_TTL).unwrap();

        let session = store.load().unwrap();
        assert_eq!(session.token, "tok-abc");
        assert!(session.expires_at > unix_now());
    }

    #[test]
    fn expired_session_loads_as_none() {
        let (_tmp, store) = test_store();
        store.save("stale", Duration::from_secs(0)).unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn corrupt_file_loads_as_none() {
        let (_tmp, store) = test_store();
        std::fs::write(store.path(), "{not json").unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn wrong_shape_loads_as_none() {
        let (_tmp, store) = test_store();
        std::fs::write(store.path(), r#"{"something":"else"}"#).unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn save_creates_parent_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path().join("nested").join("dir").join("session.json"));
        store.save("tok", DEFAULT_SESSION_TTL).unwrap();
        assert!(store.load().is_some());
    }

    #[cfg(unix)]
    #[test]
    fn save_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (_tmp, store) = test_store();
        store.save("secret", DEFAULT_SESSION_TTL).unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn overwrite_replaces_token() {
        let (_tmp, store) = test_store();
        store.save("old", DEFAULT_SESSION_TTL).unwrap();
        store.save("new", DEFAULT_SESSION_TTL).unwrap();
        assert_eq!(store.load().unwrap().token, "new");
    }

    #[test]
    fn default_path_under_config_dir() {
        // HOME or APPDATA is set in any normal test environment.
        if let Some(path) = default_session_path() {
            assert!(path.to_string_lossy().contains("sfs"));
            assert!(path.to_string_lossy().ends_with("session.json"));
        }
    }
}
