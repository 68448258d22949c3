//! A fetched email plus the operations tests run on it.

use crate::client::AhemClient;
use crate::criteria::MatchCriteria;
use crate::error::{Error, Result};
use crate::matcher::{CodeMatcher, LinkMatcher, Matcher};
use crate::models::EmailFull;
use tracing::{debug, instrument};

/// One email as fetched from the server, bound to the mailbox it came from.
///
/// The record is a snapshot: [`mark_as_read`](Self::mark_as_read) and
/// [`delete`](Self::delete) act on the server copy only. Use
/// [`refresh`](Self::refresh) to observe the server state again.
///
/// # Example
///
/// ```no_run
/// use ahem_helper::{MailHelper, HelperConfig, MatchCriteria};
///
/// # async fn example() -> ahem_helper::Result<()> {
/// # let config = HelperConfig::builder().base_url("http://localhost:3000").build()?;
/// let helper = MailHelper::setup(config).await?;
/// let email = helper
///     .wait_for_email(&MatchCriteria::new().subject_contains("verify"))
///     .await?;
///
/// let code = email.extract_verification_code()?;
/// let link = email.extract_link("confirm")?;
/// email.delete().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Email {
    record: EmailFull,
    mailbox: String,
    client: AhemClient,
}

impl Email {
    pub(crate) fn new(record: EmailFull, mailbox: impl Into<String>, client: AhemClient) -> Self {
        Self {
            record,
            mailbox: mailbox.into(),
            client,
        }
    }

    /// Server identifier of this email.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.record.id
    }

    /// Subject line.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.record.subject
    }

    /// Mailbox this email was fetched from.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    /// Plain-text body, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.record.text.as_deref()
    }

    /// Markup body, if any.
    #[must_use]
    pub fn html(&self) -> Option<&str> {
        self.record.html.as_deref()
    }

    /// The full snapshot.
    #[must_use]
    pub fn record(&self) -> &EmailFull {
        &self.record
    }

    /// Consumes the wrapper and returns the snapshot.
    #[must_use]
    pub fn into_record(self) -> EmailFull {
        self.record
    }

    /// Checks this snapshot against `criteria`, summary-level and full-level fields alike.
    ///
    /// Useful after [`refresh`](Self::refresh), e.g. to assert the email is now read.
    #[must_use]
    pub fn matches(&self, criteria: &MatchCriteria) -> bool {
        criteria.matches_record(&self.record)
    }

    /// Returns the first link containing `fragment`.
    ///
    /// Searches the markup body if present, else the plain-text body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no such link exists.
    pub fn extract_link(&self, fragment: &str) -> Result<String> {
        self.extract_link_with(&LinkMatcher::containing(fragment))
    }

    /// Runs `matcher` over the same body [`extract_link`](Self::extract_link) searches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the matcher finds nothing.
    pub fn extract_link_with(&self, matcher: &dyn Matcher) -> Result<String> {
        let body = self.record.link_source().unwrap_or_default();
        Self::extract(body, matcher)
    }

    /// Returns the first run of 4 to 6 digits in the plain-text body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if there is no plain-text body or no code in it.
    pub fn extract_verification_code(&self) -> Result<String> {
        let body = self.record.text.as_deref().unwrap_or_default();
        Self::extract(body, &CodeMatcher::verification_code())
    }

    /// Marks this email as read on the server.
    ///
    /// # Errors
    ///
    /// Returns a transport error on failure.
    #[instrument(name = "Email::mark_as_read", skip(self), fields(mailbox = %self.mailbox, email_id = %self.record.id))]
    pub async fn mark_as_read(&self) -> Result<()> {
        self.client.mark_as_read(&self.mailbox, &self.record.id).await
    }

    /// Deletes this email on the server.
    ///
    /// # Errors
    ///
    /// Returns a transport error on failure.
    #[instrument(name = "Email::delete", skip(self), fields(mailbox = %self.mailbox, email_id = %self.record.id))]
    pub async fn delete(&self) -> Result<()> {
        self.client.delete_email(&self.mailbox, &self.record.id).await
    }

    /// Fetches the current server copy of this email.
    ///
    /// # Errors
    ///
    /// Returns a transport error on failure (HTTP 404 once deleted).
    pub async fn refresh(&self) -> Result<Email> {
        let record = self.client.get_full(&self.mailbox, &self.record.id).await?;
        Ok(Self::new(record, self.mailbox.clone(), self.client.clone()))
    }

    /// Downloads one attachment of this email.
    ///
    /// # Errors
    ///
    /// Returns a transport error on failure.
    pub async fn attachment_bytes(&self, filename: &str) -> Result<Vec<u8>> {
        self.client
            .get_attachment_bytes(&self.mailbox, &self.record.id, filename)
            .await
    }

    fn extract(body: &str, matcher: &dyn Matcher) -> Result<String> {
        match matcher.find_match(body) {
            Some(found) => {
                debug!(matcher = %matcher.description(), "Extracted value from email body");
                Ok(found.into_owned())
            }
            None => Err(Error::NotFound {
                what: matcher.description().to_string(),
            }),
        }
    }
}
