//! HTTP transport client for the AHEM mail server.
//!
//! [`AhemClient`] issues one authenticated request per server operation. It never
//! retries: connection failures, non-2xx responses and malformed JSON all surface
//! immediately as [`Error`] values.
//!
//! # Example
//!
//! ```no_run
//! use ahem_helper::AhemClient;
//!
//! # async fn example() -> ahem_helper::Result<()> {
//! let client = AhemClient::new("http://localhost:3000")?;
//! client.authenticate().await?;
//!
//! for summary in client.list_summaries("inbox").await? {
//!     println!("{}: {}", summary.email_id, summary.subject);
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::{HelperConfig, DEFAULT_AUTH_PATH};
use crate::error::{Error, Result};
use crate::models::{EmailFull, EmailSummary};
use crate::session::TokenSession;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Async client for the mail server's REST API.
///
/// Cloning is cheap; clones share the connection pool and the cached token.
#[derive(Clone)]
pub struct AhemClient {
    http: reqwest::Client,
    base_url: String,
    auth_url: String,
    session: Arc<TokenSession>,
}

impl AhemClient {
    /// Creates a builder for the server at `base_url`.
    pub fn builder(base_url: impl Into<String>) -> AhemClientBuilder {
        AhemClientBuilder::new(base_url)
    }

    /// Creates a client with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the URL is not an http(s) URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        AhemClientBuilder::new(base_url).build()
    }

    /// Creates a client from a resolved [`HelperConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the HTTP client cannot be built.
    pub fn from_config(config: &HelperConfig) -> Result<Self> {
        AhemClientBuilder::new(config.base_url.clone())
            .auth_path(config.auth_path.clone())
            .build()
    }

    /// Returns the server base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Requests a fresh bearer token and caches it for later calls.
    ///
    /// Other operations authenticate lazily, so calling this is only needed to fail
    /// early or to replace a token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the server rejects the request, or
    /// [`Error::MissingToken`] if it answers without a token.
    #[instrument(name = "AhemClient::authenticate", skip(self), fields(base_url = %self.base_url))]
    pub async fn authenticate(&self) -> Result<()> {
        self.session.refresh(&self.http, &self.auth_url).await
    }

    /// Drops the cached token so the next call re-authenticates.
    pub async fn clear_token(&self) {
        self.session.clear().await;
    }

    /// Returns `true` if a token is cached.
    pub async fn is_authenticated(&self) -> bool {
        self.session.is_set().await
    }

    /// Lists the emails in `mailbox`, in server order.
    ///
    /// # Errors
    ///
    /// Returns a transport error on network failure, non-2xx status or malformed JSON.
    #[instrument(name = "AhemClient::list_summaries", skip(self), fields(mailbox = %mailbox))]
    pub async fn list_summaries(&self, mailbox: &str) -> Result<Vec<EmailSummary>> {
        let url = format!("{}/email", self.mailbox_url(mailbox));
        let summaries: Vec<EmailSummary> = self.get_json(&url).await?;
        debug!(count = summaries.len(), "Listed emails");
        Ok(summaries)
    }

    /// Fetches the complete record of one email.
    ///
    /// # Errors
    ///
    /// Returns a transport error on network failure, non-2xx status or malformed JSON.
    #[instrument(name = "AhemClient::get_full", skip(self), fields(mailbox = %mailbox, email_id = %id))]
    pub async fn get_full(&self, mailbox: &str, id: &str) -> Result<EmailFull> {
        self.get_json(&self.email_url(mailbox, id)).await
    }

    /// Sets the read flag of one email on the server.
    ///
    /// # Errors
    ///
    /// Returns a transport error on network failure or non-2xx status.
    #[instrument(
        name = "AhemClient::set_read_state",
        skip(self),
        fields(mailbox = %mailbox, email_id = %id)
    )]
    pub async fn set_read_state(&self, mailbox: &str, id: &str, read: bool) -> Result<()> {
        let body = serde_json::json!({ "isRead": read });
        self.send(Method::PATCH, &self.email_url(mailbox, id), Some(body))
            .await?;
        Ok(())
    }

    /// Marks one email as read.
    ///
    /// # Errors
    ///
    /// Returns a transport error on network failure or non-2xx status.
    pub async fn mark_as_read(&self, mailbox: &str, id: &str) -> Result<()> {
        self.set_read_state(mailbox, id, true).await
    }

    /// Deletes one email.
    ///
    /// # Errors
    ///
    /// Returns a transport error on network failure or non-2xx status.
    #[instrument(name = "AhemClient::delete_email", skip(self), fields(mailbox = %mailbox, email_id = %id))]
    pub async fn delete_email(&self, mailbox: &str, id: &str) -> Result<()> {
        self.send(Method::DELETE, &self.email_url(mailbox, id), None)
            .await?;
        Ok(())
    }

    /// Deletes a mailbox and everything in it.
    ///
    /// # Errors
    ///
    /// Returns a transport error on network failure or non-2xx status.
    #[instrument(name = "AhemClient::delete_mailbox", skip(self), fields(mailbox = %mailbox))]
    pub async fn delete_mailbox(&self, mailbox: &str) -> Result<()> {
        self.send(Method::DELETE, &self.mailbox_url(mailbox), None)
            .await?;
        Ok(())
    }

    /// Lists mailbox names starting with `prefix` (all names when `None`).
    ///
    /// # Errors
    ///
    /// Returns a transport error on network failure, non-2xx status or malformed JSON.
    #[instrument(name = "AhemClient::list_mailbox_names", skip(self))]
    pub async fn list_mailbox_names(&self, prefix: Option<&str>) -> Result<Vec<String>> {
        let url = format!("{}/api/mailbox/autocomplete", self.base_url);
        let body = serde_json::json!({ "prefix": prefix.unwrap_or_default() });
        let response = self.send(Method::POST, &url, Some(body)).await?;
        let names: Vec<MailboxName> = Self::decode(&url, response).await?;
        Ok(names.into_iter().map(MailboxName::into_name).collect())
    }

    /// Downloads the raw bytes of one attachment.
    ///
    /// # Errors
    ///
    /// Returns a transport error on network failure or non-2xx status.
    #[instrument(
        name = "AhemClient::get_attachment_bytes",
        skip(self),
        fields(mailbox = %mailbox, email_id = %id, filename = %filename)
    )]
    pub async fn get_attachment_bytes(
        &self,
        mailbox: &str,
        id: &str,
        filename: &str,
    ) -> Result<Vec<u8>> {
        let url = format!(
            "{}/attachments/{}",
            self.email_url(mailbox, id),
            urlencoding::encode(filename)
        );
        let response = self.send(Method::GET, &url, None).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| Error::Request { url, source })?;
        Ok(bytes.to_vec())
    }

    /// Fetches the server's capability/info blob.
    ///
    /// # Errors
    ///
    /// Returns a transport error on network failure, non-2xx status or malformed JSON.
    #[instrument(name = "AhemClient::properties", skip(self))]
    pub async fn properties(&self) -> Result<serde_json::Value> {
        let url = format!("{}/api/properties", self.base_url);
        self.get_json(&url).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Private methods
    // ─────────────────────────────────────────────────────────────────────────

    fn mailbox_url(&self, mailbox: &str) -> String {
        format!(
            "{}/api/mailbox/{}",
            self.base_url,
            urlencoding::encode(mailbox)
        )
    }

    fn email_url(&self, mailbox: &str, id: &str) -> String {
        format!("{}/email/{}", self.mailbox_url(mailbox), urlencoding::encode(id))
    }

    /// Sends one authenticated request and rejects non-2xx responses.
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response> {
        let token = self.session.bearer(&self.http, &self.auth_url).await?;

        let mut request = self.http.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|source| Error::Request {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        Err(Self::status_error(url, status.as_u16(), response.text().await))
    }

    /// Non-2xx outcome; a body that could not be read is reported in place of the body.
    fn status_error(url: &str, status: u16, body: reqwest::Result<String>) -> Error {
        let body = body.unwrap_or_else(|e| format!("<response body unreadable: {e}>"));
        Error::Status {
            url: url.to_string(),
            status,
            body,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.send(Method::GET, url, None).await?;
        Self::decode(url, response).await
    }

    async fn decode<T: DeserializeOwned>(url: &str, response: reqwest::Response) -> Result<T> {
        let text = response.text().await.map_err(|source| Error::Request {
            url: url.to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| Error::Decode {
            url: url.to_string(),
            source,
        })
    }
}

impl std::fmt::Debug for AhemClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AhemClient")
            .field("base_url", &self.base_url)
            .field("auth_url", &self.auth_url)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// Autocomplete entries come back as bare strings or as objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MailboxName {
    Plain(String),
    Named {
        #[serde(alias = "mailbox")]
        name: String,
    },
}

impl MailboxName {
    fn into_name(self) -> String {
        match self {
            MailboxName::Plain(name) | MailboxName::Named { name } => name,
        }
    }
}

/// Builder for configuring an [`AhemClient`].
///
/// Start with [`AhemClient::builder`] to override defaults.
#[derive(Debug, Clone)]
pub struct AhemClientBuilder {
    base_url: String,
    auth_path: String,
    request_timeout: Option<Duration>,
    proxy: Option<String>,
    user_agent: Option<String>,
}

impl AhemClientBuilder {
    /// Creates a builder with default settings.
    ///
    /// Defaults:
    /// - Token endpoint `/api/auth/token`
    /// - No request timeout
    /// - No proxy
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_path: DEFAULT_AUTH_PATH.to_string(),
            request_timeout: None,
            proxy: None,
            user_agent: None,
        }
    }

    /// Overrides the token endpoint path.
    #[must_use]
    pub fn auth_path(mut self, path: impl Into<String>) -> Self {
        self.auth_path = path.into();
        self
    }

    /// Sets a per-request timeout. A request that exceeds it fails as [`Error::Request`].
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Routes all requests through a proxy (e.g. `"http://127.0.0.1:8080"`).
    #[must_use]
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Overrides the user agent string.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Builds the client. No network request is made.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a non-http(s) base URL, an invalid proxy,
    /// or if the HTTP client cannot be initialised.
    pub fn build(self) -> Result<AhemClient> {
        let base_url = self.base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::InvalidConfig {
                message: format!("base URL must start with http:// or https://, got '{base_url}'"),
            });
        }

        let mut builder = reqwest::Client::builder();

        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(proxy_url) = &self.proxy {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| Error::InvalidConfig {
                message: format!("invalid proxy '{proxy_url}': {e}"),
            })?;
            builder = builder.proxy(proxy);
        }

        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }

        let http = builder.build().map_err(|e| Error::InvalidConfig {
            message: format!("failed to build HTTP client: {e}"),
        })?;

        let auth_url = format!("{}{}", base_url, self.auth_path);

        Ok(AhemClient {
            http,
            base_url,
            auth_url,
            session: Arc::new(TokenSession::new()),
        })
    }
}
