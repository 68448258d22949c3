//! Poll-until-match: wait for an email to arrive in a mailbox.
//!
//! The engine is a three-state machine:
//!
//! - [`WaitState::Polling`]: check the deadline, list the mailbox, test each
//!   summary in server order. No match means sleep for the poll interval and poll again.
//! - [`WaitState::Matched`]: the first matching email, already fetched in full.
//!   If requested it is marked read before being handed to the caller.
//! - [`WaitState::TimedOut`]: the deadline passed before a poll started.
//!
//! The deadline is only checked at the top of a poll, so a listing that started
//! before the deadline and finds a match is honoured even if it completes late.
//! Transport errors end the wait immediately, whatever time is left.
//!
//! Two waits marking the same email read race each other; nothing coordinates them.
//!
//! ```no_run
//! use ahem_helper::wait::{poll_until_match, WaitOptions};
//! use ahem_helper::{AhemClient, MatchCriteria};
//! use std::time::Duration;
//!
//! # async fn example() -> ahem_helper::Result<()> {
//! let client = AhemClient::new("http://localhost:3000")?;
//! let options = WaitOptions::new("inbox")
//!     .timeout(Duration::from_secs(10))
//!     .poll_interval(Duration::from_millis(250));
//!
//! let email = poll_until_match(&client, &MatchCriteria::new().subject_contains("verify"), &options).await?;
//! println!("{}", email.subject());
//! # Ok(())
//! # }
//! ```

use crate::client::AhemClient;
use crate::config::{HelperConfig, DEFAULT_MAILBOX, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};
use crate::criteria::MatchCriteria;
use crate::email::Email;
use crate::error::{Error, Result};
use crate::models::EmailFull;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// Per-wait settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitOptions {
    /// Mailbox to poll.
    pub mailbox: String,
    /// Total time budget, measured from the start of the wait.
    pub timeout: Duration,
    /// Pause between two listing calls.
    pub poll_interval: Duration,
    /// Mark the matched email read before returning it.
    pub mark_as_read: bool,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            mailbox: DEFAULT_MAILBOX.to_string(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            mark_as_read: true,
        }
    }
}

impl WaitOptions {
    /// Default options for `mailbox`.
    #[must_use]
    pub fn new(mailbox: impl Into<String>) -> Self {
        Self {
            mailbox: mailbox.into(),
            ..Self::default()
        }
    }

    /// Options taken from a resolved configuration.
    #[must_use]
    pub fn from_config(config: &HelperConfig) -> Self {
        Self {
            mailbox: config.default_mailbox.clone(),
            timeout: config.default_timeout,
            poll_interval: config.poll_interval,
            mark_as_read: true,
        }
    }

    /// Sets the mailbox to poll.
    #[must_use]
    pub fn mailbox(mut self, mailbox: impl Into<String>) -> Self {
        self.mailbox = mailbox.into();
        self
    }

    /// Sets the time budget.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the pause between polls.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Enables or disables marking the match as read.
    #[must_use]
    pub fn mark_as_read(mut self, mark: bool) -> Self {
        self.mark_as_read = mark;
        self
    }
}

/// State of one wait.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitState {
    /// About to start poll number `attempt` (1-based).
    Polling {
        /// Poll number.
        attempt: u32,
    },
    /// A matching email was found (terminal).
    Matched(Box<EmailFull>),
    /// The deadline passed without a match (terminal).
    TimedOut,
}

impl WaitState {
    /// Returns `true` for `Matched` and `TimedOut`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WaitState::Polling { .. })
    }
}

/// Polls `options.mailbox` until an email satisfies `criteria` or the timeout passes.
///
/// # Errors
///
/// - [`Error::InvalidConfig`] if `options.poll_interval` is zero, before any request.
/// - [`Error::WaitTimeout`] if no email matched in time.
/// - Any transport error from listing, fetching or marking read, immediately.
#[instrument(
    name = "wait::poll_until_match",
    skip(client, criteria, options),
    fields(
        mailbox = %options.mailbox,
        criteria = %criteria,
        timeout_ms = u64::try_from(options.timeout.as_millis()).unwrap_or(u64::MAX)
    )
)]
pub async fn poll_until_match(
    client: &AhemClient,
    criteria: &MatchCriteria,
    options: &WaitOptions,
) -> Result<Email> {
    if options.poll_interval.is_zero() {
        return Err(Error::InvalidConfig {
            message: "poll interval must be greater than zero".into(),
        });
    }

    let started = Instant::now();
    let mut state = WaitState::Polling { attempt: 1 };

    loop {
        state = match state {
            WaitState::Polling { attempt } => {
                if started.elapsed() >= options.timeout {
                    WaitState::TimedOut
                } else if let Some(record) =
                    first_match(client, criteria, &options.mailbox).await?
                {
                    WaitState::Matched(Box::new(record))
                } else {
                    debug!(attempt, "No matching email yet");
                    tokio::time::sleep(options.poll_interval).await;
                    WaitState::Polling {
                        attempt: attempt + 1,
                    }
                }
            }
            WaitState::Matched(record) => {
                debug!(email_id = %record.id, elapsed = ?started.elapsed(), "Found matching email");
                if options.mark_as_read {
                    client.mark_as_read(&options.mailbox, &record.id).await?;
                }
                return Ok(Email::new(*record, options.mailbox.clone(), client.clone()));
            }
            WaitState::TimedOut => {
                return Err(Error::WaitTimeout {
                    mailbox: options.mailbox.clone(),
                    criteria: criteria.to_string(),
                    timeout: options.timeout,
                });
            }
        };
    }
}

/// Checks `mailbox` once and returns the first match, without waiting or marking read.
///
/// # Errors
///
/// Returns any transport error from listing or fetching.
#[instrument(name = "wait::find_first", skip(client, criteria), fields(criteria = %criteria))]
pub async fn find_first(
    client: &AhemClient,
    criteria: &MatchCriteria,
    mailbox: &str,
) -> Result<Option<Email>> {
    Ok(first_match(client, criteria, mailbox)
        .await?
        .map(|record| Email::new(record, mailbox, client.clone())))
}

/// One listing pass. Full records are fetched only for summaries that already match.
async fn first_match(
    client: &AhemClient,
    criteria: &MatchCriteria,
    mailbox: &str,
) -> Result<Option<EmailFull>> {
    let summaries = client.list_summaries(mailbox).await?;
    let check_full = criteria.needs_full_record();

    for summary in summaries.iter().filter(|s| criteria.matches_summary(s)) {
        let record = client.get_full(mailbox, &summary.email_id).await?;
        if !check_full || criteria.matches_full(&record) {
            return Ok(Some(record));
        }
        debug!(email_id = %summary.email_id, "Summary matched but full record did not");
    }

    Ok(None)
}
