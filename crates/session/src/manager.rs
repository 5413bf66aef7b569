//! Login handshake and authenticated transport.
//!
//! The server signals a successful login with a redirect that sets the
//! session cookie, so the client must keep redirect-following disabled
//! to observe the 3xx itself. One cookie-bearing `reqwest::Client` is
//! shared for every request so the token rides along automatically.

use std::sync::Arc;

use reqwest::Url;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::redirect::Policy;
use tracing::{debug, info, warn};

use crate::SessionError;
use crate::store::{DEFAULT_SESSION_TTL, SessionStore};

/// Cookie name the server uses for the session token.
const SESSION_COOKIE: &str = "sid";

/// A username/password pair.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Source of credentials when the stored session is missing or stale.
///
/// Interactive prompting lives behind this trait in the calling
/// application; the session layer only asks for a pair when it needs one.
pub trait CredentialSource {
    /// Returns credentials, or `None` if the user declined.
    fn credentials(&self) -> Option<Credentials>;
}

/// A fixed credential pair, for non-interactive callers.
pub struct StaticCredentials {
    creds: Credentials,
}

impl StaticCredentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            creds: Credentials {
                username: username.to_string(),
                password: password.to_string(),
            },
        }
    }
}

impl CredentialSource for StaticCredentials {
    fn credentials(&self) -> Option<Credentials> {
        Some(self.creds.clone())
    }
}

/// Authenticated session against one SFS server.
///
/// Owns the cookie jar, the persisted token store, and the HTTP client
/// that every other component uses for network calls.
#[derive(Debug)]
pub struct Session {
    base_url: Url,
    http: reqwest::Client,
    jar: Arc<Jar>,
    store: SessionStore,
}

impl Session {
    /// Creates a session for `server_url`, loading any persisted token.
    ///
    /// The URL must be absolute with an `http`/`https` scheme; anything
    /// else fails fast with [`SessionError::InvalidServerUrl`]. A
    /// trailing slash is appended if missing.
    pub fn new(server_url: &str, store: SessionStore) -> Result<Self, SessionError> {
        let base_url = parse_server_url(server_url)?;

        let jar = Arc::new(Jar::default());
        if let Some(session) = store.load() {
            debug!("resuming persisted session");
            jar.add_cookie_str(&format!("{SESSION_COOKIE}={}", session.token), &base_url);
        }

        let http = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            base_url,
            http,
            jar,
            store,
        })
    }

    /// The shared cookie-bearing HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// The normalized server base URL (always slash-terminated).
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Checks whether the current credential is accepted by the server.
    ///
    /// Issues a lightweight authenticated request; HTTP 200 means the
    /// session works. This is the only staleness detection besides the
    /// locally stored expiry.
    pub async fn probe(&self) -> bool {
        let url = format!("{}api/quota", self.base_url);
        match self.http.get(&url).send().await {
            Ok(resp) => resp.status() == reqwest::StatusCode::OK,
            Err(e) => {
                debug!(error = %e, "auth probe failed");
                false
            }
        }
    }

    /// Submits credentials and persists the resulting token.
    ///
    /// Success is a 3xx response carrying the session cookie; any other
    /// response is [`SessionError::LoginRejected`] and the persisted
    /// session file is left untouched.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), SessionError> {
        let url = format!("{}login", self.base_url);
        let resp = self
            .http
            .post(&url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        if !resp.status().is_redirection() {
            warn!(status = %resp.status(), "login rejected");
            return Err(SessionError::LoginRejected);
        }

        // The jar already captured the Set-Cookie; read the token back
        // from the response to persist it.
        let token = resp
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .or_else(|| self.jar_token())
            .ok_or(SessionError::LoginRejected)?;

        self.store.save(&token, DEFAULT_SESSION_TTL)?;
        info!("login successful, session persisted");
        Ok(())
    }

    /// Probes the server and logs in once if the probe fails.
    ///
    /// This is the entry point other components use: it returns the
    /// final authentication state and never surfaces intermediate
    /// failures.
    pub async fn ensure_authenticated(&self, source: &dyn CredentialSource) -> bool {
        if self.probe().await {
            return true;
        }

        debug!("stored session rejected, requesting credentials");
        let Some(creds) = source.credentials() else {
            return false;
        };

        match self.login(&creds.username, &creds.password).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "login failed");
                false
            }
        }
    }

    /// Reads the session token currently held in the cookie jar.
    fn jar_token(&self) -> Option<String> {
        let header = self.jar.cookies(&self.base_url)?;
        let header = header.to_str().ok()?.to_string();
        header.split("; ").find_map(|pair| {
            pair.strip_prefix(&format!("{SESSION_COOKIE}="))
                .map(str::to_string)
        })
    }
}

/// Parses and normalizes the server base URL.
fn parse_server_url(server_url: &str) -> Result<Url, SessionError> {
    let mut url = Url::parse(server_url)
        .map_err(|_| SessionError::InvalidServerUrl(server_url.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(SessionError::InvalidServerUrl(server_url.to_string()));
    }

    // Slash-terminate so endpoint paths can be appended directly.
    if !url.path().ends_with('/') {
        url.set_path(&format!("{}/", url.path()));
    }
    Ok(url)
}
