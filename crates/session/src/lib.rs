//! Session management for the Simple File Sharer server.
//!
//! Owns the persisted authentication token and the one cookie-bearing
//! HTTP transport the rest of the client shares. Login is a form POST
//! that the server answers with a redirect carrying a session cookie;
//! the token is persisted to a user-only-readable JSON file so later
//! invocations skip the login handshake.

pub mod manager;
pub mod store;

pub use manager::{CredentialSource, Credentials, Session, StaticCredentials};
pub use store::{SessionStore, StoredSession, default_session_path};

/// Errors produced by session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid server URL: {0}")]
    InvalidServerUrl(String),

    #[error("login rejected by server")]
    LoginRejected,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
