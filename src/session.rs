//! Internal bearer-token session management.
//!
//! Each [`AhemClient`](crate::AhemClient) owns one [`TokenSession`]; clones of the
//! client share it. There is no process-wide token.

use crate::error::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Token endpoint response. Servers answer with either field name.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default, rename = "accessToken")]
    access_token: Option<String>,
}

impl TokenResponse {
    fn into_token(self) -> Option<String> {
        self.token
            .filter(|t| !t.is_empty())
            .or(self.access_token.filter(|t| !t.is_empty()))
    }
}

/// Cached bearer token for one client.
#[derive(Default)]
pub(crate) struct TokenSession {
    token: Mutex<Option<SecretString>>,
}

impl TokenSession {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the cached token, authenticating first if none is cached.
    ///
    /// The lock is held across authentication so concurrent callers share one handshake.
    pub(crate) async fn bearer(&self, http: &reqwest::Client, auth_url: &str) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.expose_secret().to_string());
        }

        let token = authenticate(http, auth_url).await?;
        let value = token.expose_secret().to_string();
        *guard = Some(token);
        Ok(value)
    }

    /// Authenticates unconditionally and replaces the cached token.
    pub(crate) async fn refresh(&self, http: &reqwest::Client, auth_url: &str) -> Result<()> {
        let mut guard = self.token.lock().await;
        *guard = Some(authenticate(http, auth_url).await?);
        Ok(())
    }

    /// Drops the cached token; the next call re-authenticates.
    pub(crate) async fn clear(&self) {
        self.token.lock().await.take();
        debug!("Cleared cached token");
    }

    pub(crate) async fn is_set(&self) -> bool {
        self.token.lock().await.is_some()
    }
}

impl std::fmt::Debug for TokenSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSession")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Exchanges an implicit session for a bearer token.
#[instrument(name = "session::authenticate", skip(http), fields(auth_url = %auth_url))]
pub(crate) async fn authenticate(http: &reqwest::Client, auth_url: &str) -> Result<SecretString> {
    debug!("Requesting bearer token");

    let response = http
        .post(auth_url)
        .json(&serde_json::json!({}))
        .send()
        .await
        .map_err(|source| Error::Request {
            url: auth_url.to_string(),
            source,
        })?;

    let status = response.status();
    let body = response.text().await.map_err(|source| Error::Request {
        url: auth_url.to_string(),
        source,
    })?;

    if !status.is_success() {
        return Err(Error::Auth {
            status: status.as_u16(),
            body,
        });
    }

    let parsed: TokenResponse = serde_json::from_str(&body).map_err(|source| Error::Decode {
        url: auth_url.to_string(),
        source,
    })?;

    let token = parsed.into_token().ok_or(Error::MissingToken)?;

    debug!("Authenticated");

    Ok(SecretString::from(token))
}
