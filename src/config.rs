//! Configuration for the mail helper.
//!
//! Configuration is assembled from ordered [`ConfigLayer`]s: built-in defaults, then
//! run-level settings, then per-test settings, and finally the `AHEM_BASE_URL`
//! environment variable, which overrides the server URL from every layer.
//!
//! ```
//! use ahem_helper::{ConfigLayer, HelperConfig};
//! use std::time::Duration;
//!
//! let run = ConfigLayer::new()
//!     .base_url("http://localhost:3000")
//!     .default_timeout(Duration::from_secs(20));
//! let test = ConfigLayer::new().default_mailbox("signup");
//!
//! let config = HelperConfig::from_layers_with_env(&[run, test], None).expect("valid config");
//! assert_eq!(config.default_mailbox, "signup");
//! assert_eq!(config.default_timeout, Duration::from_secs(20));
//! ```

use crate::error::{Error, Result};
use std::time::Duration;

/// Environment variable that overrides the server base URL.
pub const BASE_URL_ENV: &str = "AHEM_BASE_URL";

/// Mailbox used when no layer names one.
pub const DEFAULT_MAILBOX: &str = "inbox";

/// Default time budget for a wait.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default pause between two listing calls while waiting.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default token endpoint path.
pub const DEFAULT_AUTH_PATH: &str = "/api/auth/token";

/// One partial configuration source.
///
/// Unset fields leave the value from lower-precedence layers untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    /// Server base URL, e.g. `http://localhost:3000`.
    pub base_url: Option<String>,
    /// Mailbox used when an operation doesn't name one.
    pub default_mailbox: Option<String>,
    /// Time budget for waits.
    pub default_timeout: Option<Duration>,
    /// Pause between listing calls while waiting.
    pub poll_interval: Option<Duration>,
    /// Whether to empty the default mailbox after each test.
    pub cleanup_after_run: Option<bool>,
    /// Path of the token endpoint.
    pub auth_path: Option<String>,
}

impl ConfigLayer {
    /// Creates an empty layer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the default mailbox name.
    #[must_use]
    pub fn default_mailbox(mut self, mailbox: impl Into<String>) -> Self {
        self.default_mailbox = Some(mailbox.into());
        self
    }

    /// Sets the default wait timeout.
    #[must_use]
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Sets the polling interval.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Enables or disables post-test cleanup.
    #[must_use]
    pub fn cleanup_after_run(mut self, cleanup: bool) -> Self {
        self.cleanup_after_run = Some(cleanup);
        self
    }

    /// Sets the token endpoint path (`/api/auth/token` or `/api/auth/authenticate`).
    #[must_use]
    pub fn auth_path(mut self, path: impl Into<String>) -> Self {
        self.auth_path = Some(path.into());
        self
    }

    /// Overlays `other` on top of `self`; set fields in `other` win.
    fn overlay(&mut self, other: &ConfigLayer) {
        if other.base_url.is_some() {
            self.base_url.clone_from(&other.base_url);
        }
        if other.default_mailbox.is_some() {
            self.default_mailbox.clone_from(&other.default_mailbox);
        }
        if other.default_timeout.is_some() {
            self.default_timeout = other.default_timeout;
        }
        if other.poll_interval.is_some() {
            self.poll_interval = other.poll_interval;
        }
        if other.cleanup_after_run.is_some() {
            self.cleanup_after_run = other.cleanup_after_run;
        }
        if other.auth_path.is_some() {
            self.auth_path.clone_from(&other.auth_path);
        }
    }
}

/// Fully resolved configuration.
///
/// Build with [`HelperConfig::from_layers`] or [`HelperConfig::builder`].
/// The base URL is always non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperConfig {
    /// Server base URL without a trailing slash.
    pub base_url: String,
    /// Mailbox used when an operation doesn't name one.
    pub default_mailbox: String,
    /// Time budget for waits.
    pub default_timeout: Duration,
    /// Pause between listing calls while waiting.
    pub poll_interval: Duration,
    /// Whether to empty the default mailbox after each test.
    pub cleanup_after_run: bool,
    /// Path of the token endpoint.
    pub auth_path: String,
}

impl HelperConfig {
    /// Creates a single-layer configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use ahem_helper::HelperConfig;
    ///
    /// let config = HelperConfig::builder()
    ///     .base_url("http://localhost:3000")
    ///     .build()
    ///     .expect("valid config");
    /// assert_eq!(config.default_mailbox, "inbox");
    /// ```
    #[must_use]
    pub fn builder() -> HelperConfigBuilder {
        HelperConfigBuilder::default()
    }

    /// Returns the built-in defaults as a layer. The base URL is left unset.
    #[must_use]
    pub fn defaults() -> ConfigLayer {
        ConfigLayer {
            base_url: None,
            default_mailbox: Some(DEFAULT_MAILBOX.to_string()),
            default_timeout: Some(DEFAULT_TIMEOUT),
            poll_interval: Some(DEFAULT_POLL_INTERVAL),
            cleanup_after_run: Some(true),
            auth_path: Some(DEFAULT_AUTH_PATH.to_string()),
        }
    }

    /// Merges `layers` (lowest precedence first) over the defaults and applies the
    /// [`BASE_URL_ENV`] override from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if no base URL is set anywhere or a value is invalid.
    pub fn from_layers(layers: &[ConfigLayer]) -> Result<Self> {
        Self::from_layers_with_env(layers, std::env::var(BASE_URL_ENV).ok())
    }

    /// Same as [`from_layers`](Self::from_layers) with an explicit environment override.
    ///
    /// A blank override is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if no base URL is set anywhere or a value is invalid.
    pub fn from_layers_with_env(
        layers: &[ConfigLayer],
        env_base_url: Option<String>,
    ) -> Result<Self> {
        let mut merged = Self::defaults();
        for layer in layers {
            merged.overlay(layer);
        }

        if let Some(url) = env_base_url.filter(|u| !u.trim().is_empty()) {
            merged.base_url = Some(url);
        }

        Self::validate(merged)
    }

    fn validate(merged: ConfigLayer) -> Result<Self> {
        let base_url = merged
            .base_url
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::InvalidConfig {
                message: format!("base URL is required (set it in a layer or via {BASE_URL_ENV})"),
            })?;

        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::InvalidConfig {
                message: format!("base URL must start with http:// or https://, got '{base_url}'"),
            });
        }

        let default_mailbox = merged.default_mailbox.unwrap_or_default();
        if default_mailbox.is_empty() {
            return Err(Error::InvalidConfig {
                message: "default mailbox must not be empty".into(),
            });
        }

        let poll_interval = merged.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL);
        if poll_interval.is_zero() {
            return Err(Error::InvalidConfig {
                message: "poll interval must be greater than zero".into(),
            });
        }

        let auth_path = merged
            .auth_path
            .unwrap_or_else(|| DEFAULT_AUTH_PATH.to_string());
        if !auth_path.starts_with('/') {
            return Err(Error::InvalidConfig {
                message: format!("auth path must start with '/', got '{auth_path}'"),
            });
        }

        Ok(HelperConfig {
            base_url,
            default_mailbox,
            default_timeout: merged.default_timeout.unwrap_or(DEFAULT_TIMEOUT),
            poll_interval,
            cleanup_after_run: merged.cleanup_after_run.unwrap_or(true),
            auth_path,
        })
    }
}

/// Builder for [`HelperConfig`].
///
/// Produces a configuration from a single layer over the defaults. Like
/// [`HelperConfig::from_layers`], [`build`](Self::build) lets [`BASE_URL_ENV`]
/// override the base URL.
#[derive(Debug, Default)]
pub struct HelperConfigBuilder {
    layer: ConfigLayer,
}

impl HelperConfigBuilder {
    /// Sets the server base URL (required).
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.layer = self.layer.base_url(url);
        self
    }

    /// Sets the default mailbox name.
    #[must_use]
    pub fn default_mailbox(mut self, mailbox: impl Into<String>) -> Self {
        self.layer = self.layer.default_mailbox(mailbox);
        self
    }

    /// Sets the default wait timeout.
    #[must_use]
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.layer = self.layer.default_timeout(timeout);
        self
    }

    /// Sets the polling interval.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.layer = self.layer.poll_interval(interval);
        self
    }

    /// Enables or disables post-test cleanup.
    #[must_use]
    pub fn cleanup_after_run(mut self, cleanup: bool) -> Self {
        self.layer = self.layer.cleanup_after_run(cleanup);
        self
    }

    /// Sets the token endpoint path.
    #[must_use]
    pub fn auth_path(mut self, path: impl Into<String>) -> Self {
        self.layer = self.layer.auth_path(path);
        self
    }

    /// Builds the configuration, applying the [`BASE_URL_ENV`] override.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is missing or any value is invalid.
    pub fn build(self) -> Result<HelperConfig> {
        HelperConfig::from_layers(&[self.layer])
    }

    /// Builds the configuration with an explicit environment override
    /// instead of reading the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is missing or any value is invalid.
    pub fn build_with_env(self, env_base_url: Option<String>) -> Result<HelperConfig> {
        HelperConfig::from_layers_with_env(&[self.layer], env_base_url)
    }
}
