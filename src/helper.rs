//! Per-test helper: one authenticated client, the resolved configuration, and
//! post-test cleanup.
//!
//! # Example
//!
//! ```no_run
//! use ahem_helper::{ConfigLayer, HelperConfig, MailHelper, MatchCriteria};
//!
//! # async fn example() -> ahem_helper::Result<()> {
//! let run = ConfigLayer::new().base_url("http://localhost:3000");
//! let config = HelperConfig::from_layers(&[run])?;
//!
//! let helper = MailHelper::setup(config).await?;
//! let email = helper
//!     .wait_for_email(&MatchCriteria::new().subject_contains("verify"))
//!     .await?;
//! println!("code: {}", email.extract_verification_code()?);
//!
//! // Empties the default mailbox when `cleanup_after_run` is set
//! helper.teardown().await;
//! # Ok(())
//! # }
//! ```

use crate::client::AhemClient;
use crate::config::HelperConfig;
use crate::criteria::MatchCriteria;
use crate::email::Email;
use crate::error::Result;
use crate::models::EmailSummary;
use crate::wait::{self, WaitOptions};
use futures::future::join_all;
use tracing::{debug, instrument, warn};

/// Outcome of emptying the default mailbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Emails deleted.
    pub deleted: usize,
    /// Emails whose delete call failed.
    pub failed: usize,
    /// Whether the mailbox listing itself failed (nothing was deleted then).
    pub listing_failed: bool,
}

impl CleanupReport {
    /// Returns `true` if every step succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && !self.listing_failed
    }
}

/// Ready-to-use helper for the scope of one test.
///
/// Create with [`MailHelper::setup`].
#[derive(Debug, Clone)]
pub struct MailHelper {
    client: AhemClient,
    config: HelperConfig,
}

impl MailHelper {
    /// Builds the client from `config` and authenticates before first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built or authentication fails.
    #[instrument(
        name = "MailHelper::setup",
        skip_all,
        fields(base_url = %config.base_url, mailbox = %config.default_mailbox)
    )]
    pub async fn setup(config: HelperConfig) -> Result<Self> {
        let client = AhemClient::from_config(&config)?;
        client.authenticate().await?;

        debug!("Helper ready");

        Ok(Self { client, config })
    }

    /// Wraps an already built client, e.g. one with a proxy or request timeout.
    ///
    /// No authentication happens here; the client authenticates lazily.
    #[must_use]
    pub fn with_client(client: AhemClient, config: HelperConfig) -> Self {
        Self { client, config }
    }

    /// The underlying transport client.
    #[must_use]
    pub fn client(&self) -> &AhemClient {
        &self.client
    }

    /// The resolved configuration.
    #[must_use]
    pub fn config(&self) -> &HelperConfig {
        &self.config
    }

    /// Wait options derived from the configuration.
    #[must_use]
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions::from_config(&self.config)
    }

    /// Waits in the default mailbox with the configured timeout and interval,
    /// marking the match read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WaitTimeout`](crate::Error::WaitTimeout) or a transport error.
    pub async fn wait_for_email(&self, criteria: &MatchCriteria) -> Result<Email> {
        self.wait_for_email_with(criteria, self.wait_options())
            .await
    }

    /// Waits with explicit options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WaitTimeout`](crate::Error::WaitTimeout) or a transport error.
    pub async fn wait_for_email_with(
        &self,
        criteria: &MatchCriteria,
        options: WaitOptions,
    ) -> Result<Email> {
        wait::poll_until_match(&self.client, criteria, &options).await
    }

    /// Checks the default mailbox once for a match.
    ///
    /// # Errors
    ///
    /// Returns a transport error on failure.
    pub async fn find_email(&self, criteria: &MatchCriteria) -> Result<Option<Email>> {
        wait::find_first(&self.client, criteria, &self.config.default_mailbox).await
    }

    /// Lists `mailbox`, or the default mailbox.
    ///
    /// # Errors
    ///
    /// Returns a transport error on failure.
    pub async fn list_emails(&self, mailbox: Option<&str>) -> Result<Vec<EmailSummary>> {
        self.client
            .list_summaries(mailbox.unwrap_or(&self.config.default_mailbox))
            .await
    }

    /// Fetches one email from the default mailbox.
    ///
    /// # Errors
    ///
    /// Returns a transport error on failure.
    pub async fn get_email(&self, id: &str) -> Result<Email> {
        let mailbox = &self.config.default_mailbox;
        let record = self.client.get_full(mailbox, id).await?;
        Ok(Email::new(record, mailbox.clone(), self.client.clone()))
    }

    /// Deletes one email from the default mailbox.
    ///
    /// # Errors
    ///
    /// Returns a transport error on failure.
    pub async fn delete_email(&self, id: &str) -> Result<()> {
        self.client
            .delete_email(&self.config.default_mailbox, id)
            .await
    }

    /// Deletes `mailbox`, or the default mailbox, with all its emails.
    ///
    /// # Errors
    ///
    /// Returns a transport error on failure.
    pub async fn delete_mailbox(&self, mailbox: Option<&str>) -> Result<()> {
        self.client
            .delete_mailbox(mailbox.unwrap_or(&self.config.default_mailbox))
            .await
    }

    /// Deletes every email in the default mailbox.
    ///
    /// Deletes run concurrently and all of them settle before this returns.
    /// Failures are logged as warnings and counted, never returned.
    #[instrument(name = "MailHelper::cleanup", skip(self), fields(mailbox = %self.config.default_mailbox))]
    pub async fn cleanup(&self) -> CleanupReport {
        let mailbox = self.config.default_mailbox.as_str();

        let summaries = match self.client.list_summaries(mailbox).await {
            Ok(summaries) => summaries,
            Err(e) => {
                warn!(error = %e, "Failed to list emails for cleanup");
                return CleanupReport {
                    listing_failed: true,
                    ..CleanupReport::default()
                };
            }
        };

        let results = join_all(
            summaries
                .iter()
                .map(|s| self.client.delete_email(mailbox, &s.email_id)),
        )
        .await;

        let mut report = CleanupReport::default();
        for (summary, result) in summaries.iter().zip(results) {
            match result {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    warn!(email_id = %summary.email_id, error = %e, "Failed to delete email during cleanup");
                    report.failed += 1;
                }
            }
        }

        debug!(
            deleted = report.deleted,
            failed = report.failed,
            "Cleanup finished"
        );
        report
    }

    /// Ends the test scope: runs [`cleanup`](Self::cleanup) if `cleanup_after_run` is set.
    pub async fn teardown(self) -> Option<CleanupReport> {
        if self.config.cleanup_after_run {
            Some(self.cleanup().await)
        } else {
            None
        }
    }

    /// Converts this helper into a guard that tears down on drop.
    #[must_use]
    pub fn into_guard(self) -> MailHelperGuard {
        MailHelperGuard { inner: Some(self) }
    }
}

/// RAII guard for [`MailHelper`] that runs teardown on drop.
///
/// Created by [`MailHelper::into_guard`]. Prefer [`finish`](Self::finish): a drop
/// can only schedule the cleanup on the current tokio runtime, not wait for it.
///
/// Under `#[tokio::test]` the runtime shuts down as soon as the test body returns,
/// so a cleanup scheduled by dropping the guard at the end of a test is usually
/// cancelled before its delete calls go out. A drop that has to schedule cleanup
/// logs a warning for that reason.
#[derive(Debug)]
pub struct MailHelperGuard {
    inner: Option<MailHelper>,
}

impl MailHelperGuard {
    /// Tears down explicitly and consumes the guard.
    pub async fn finish(mut self) -> Option<CleanupReport> {
        match self.inner.take() {
            Some(helper) => helper.teardown().await,
            None => None,
        }
    }
}

impl std::ops::Deref for MailHelperGuard {
    type Target = MailHelper;

    /// # Panics
    ///
    /// Panics if the guard has already been consumed.
    fn deref(&self) -> &MailHelper {
        self.inner.as_ref().expect("guard already consumed")
    }
}

impl Drop for MailHelperGuard {
    fn drop(&mut self) {
        let Some(helper) = self.inner.take() else {
            return;
        };
        if !helper.config.cleanup_after_run {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(
                    mailbox = %helper.config.default_mailbox,
                    "MailHelperGuard dropped without finish(). \
                     Cleanup was scheduled in the background and is lost if the runtime \
                     shuts down first."
                );
                handle.spawn(async move {
                    let report = helper.cleanup().await;
                    if report.is_clean() {
                        debug!(deleted = report.deleted, "Guard cleanup finished");
                    }
                });
            }
            Err(_) => {
                warn!(
                    "MailHelperGuard dropped outside of tokio runtime context. \
                     Mailbox was not cleaned up. \
                     Consider calling .finish().await explicitly before dropping."
                );
            }
        }
    }
}
