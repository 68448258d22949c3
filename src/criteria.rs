//! Criteria deciding whether an email satisfies a wait.
//!
//! Every field is optional and set fields are combined with AND; an empty
//! [`MatchCriteria`] accepts every email. A custom predicate, when present,
//! replaces all structural fields.
//!
//! Listing records carry no recipients or body, so those two fields are checked
//! against the full record; everything else is checked against the summary.
//!
//! ```
//! use ahem_helper::MatchCriteria;
//!
//! let criteria = MatchCriteria::new()
//!     .from("noreply@example.com")
//!     .subject_contains("verify");
//! assert_eq!(
//!     criteria.to_string(),
//!     "from = \"noreply@example.com\" and subject contains \"verify\""
//! );
//! ```

use crate::error::{Error, Result};
use crate::models::{EmailFull, EmailSummary, Sender};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Caller-supplied predicate over a listing record.
pub type Predicate = Arc<dyn Fn(&EmailSummary) -> bool + Send + Sync>;

/// Conjunctive match criteria for emails.
#[derive(Clone, Default)]
pub struct MatchCriteria {
    from: Option<String>,
    from_contains: Option<String>,
    to_contains: Option<String>,
    subject_contains: Option<String>,
    subject_pattern: Option<Regex>,
    body_contains: Option<String>,
    received_after: Option<DateTime<Utc>>,
    read_state: Option<bool>,
    custom: Option<(Predicate, String)>,
}

impl MatchCriteria {
    /// Creates criteria that match every email.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sender address must equal `address` exactly.
    #[must_use]
    pub fn from(mut self, address: impl Into<String>) -> Self {
        self.from = Some(address.into());
        self
    }

    /// Sender address must contain `fragment` (case-sensitive).
    #[must_use]
    pub fn from_contains(mut self, fragment: impl Into<String>) -> Self {
        self.from_contains = Some(fragment.into());
        self
    }

    /// Some recipient address must contain `fragment` (case-sensitive).
    #[must_use]
    pub fn to_contains(mut self, fragment: impl Into<String>) -> Self {
        self.to_contains = Some(fragment.into());
        self
    }

    /// Subject must contain `fragment` (case-sensitive).
    #[must_use]
    pub fn subject_contains(mut self, fragment: impl Into<String>) -> Self {
        self.subject_contains = Some(fragment.into());
        self
    }

    /// Subject must match `pattern` somewhere; anchor it yourself for a full match.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if the pattern does not compile.
    pub fn subject_matches(mut self, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| Error::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        self.subject_pattern = Some(regex);
        Ok(self)
    }

    /// Subject must match an already compiled regex.
    #[must_use]
    pub fn subject_regex(mut self, regex: Regex) -> Self {
        self.subject_pattern = Some(regex);
        self
    }

    /// Plain-text or markup body must contain `fragment` (case-sensitive).
    #[must_use]
    pub fn body_contains(mut self, fragment: impl Into<String>) -> Self {
        self.body_contains = Some(fragment.into());
        self
    }

    /// Email must have arrived strictly after `instant`.
    #[must_use]
    pub fn received_after(mut self, instant: DateTime<Utc>) -> Self {
        self.received_after = Some(instant);
        self
    }

    /// Read flag must equal `read`.
    #[must_use]
    pub fn read_state(mut self, read: bool) -> Self {
        self.read_state = Some(read);
        self
    }

    /// Only unread emails.
    #[must_use]
    pub fn unread_only(self) -> Self {
        self.read_state(false)
    }

    /// Replaces every structural field with `predicate`.
    #[must_use]
    pub fn custom<F>(self, predicate: F) -> Self
    where
        F: Fn(&EmailSummary) -> bool + Send + Sync + 'static,
    {
        self.custom_described(predicate, "custom predicate")
    }

    /// Like [`custom`](Self::custom), with a description for logs and timeout messages.
    #[must_use]
    pub fn custom_described<F>(mut self, predicate: F, description: impl Into<String>) -> Self
    where
        F: Fn(&EmailSummary) -> bool + Send + Sync + 'static,
    {
        self.custom = Some((Arc::new(predicate), description.into()));
        self
    }

    /// Returns `true` if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.custom.is_none() && !self.has_summary_fields() && !self.has_full_fields()
    }

    /// Returns `true` if a full record is needed to decide a match.
    #[must_use]
    pub fn needs_full_record(&self) -> bool {
        self.custom.is_none() && self.has_full_fields()
    }

    /// Checks the fields a listing record can answer.
    ///
    /// With a custom predicate, only the predicate is consulted.
    #[must_use]
    pub fn matches_summary(&self, summary: &EmailSummary) -> bool {
        if let Some((predicate, _)) = &self.custom {
            return predicate(summary);
        }

        let address = summary.sender.address.as_str();

        self.from.as_deref().map_or(true, |from| address == from)
            && self
                .from_contains
                .as_deref()
                .map_or(true, |f| address.contains(f))
            && self
                .subject_contains
                .as_deref()
                .map_or(true, |f| summary.subject.contains(f))
            && self
                .subject_pattern
                .as_ref()
                .map_or(true, |re| re.is_match(&summary.subject))
            && self.received_after.map_or(true, |after| {
                summary.received_at().is_some_and(|at| at > after)
            })
            && self.read_state.map_or(true, |read| summary.is_read == read)
    }

    /// Checks the fields only a full record can answer (recipient, body).
    ///
    /// With a custom predicate this is always `true`.
    #[must_use]
    pub fn matches_full(&self, email: &EmailFull) -> bool {
        if self.custom.is_some() {
            return true;
        }

        self.to_contains
            .as_deref()
            .map_or(true, |f| email.to.addresses().any(|a| a.contains(f)))
            && self.body_contains.as_deref().map_or(true, |f| {
                email.text.as_deref().is_some_and(|t| t.contains(f))
                    || email.html.as_deref().is_some_and(|h| h.contains(f))
            })
    }

    /// Checks every criterion against one full record.
    #[must_use]
    pub fn matches_record(&self, email: &EmailFull) -> bool {
        self.matches_summary(&EmailSummary::from(email)) && self.matches_full(email)
    }

    fn has_summary_fields(&self) -> bool {
        self.from.is_some()
            || self.from_contains.is_some()
            || self.subject_contains.is_some()
            || self.subject_pattern.is_some()
            || self.received_after.is_some()
            || self.read_state.is_some()
    }

    fn has_full_fields(&self) -> bool {
        self.to_contains.is_some() || self.body_contains.is_some()
    }
}

impl From<&EmailFull> for EmailSummary {
    fn from(email: &EmailFull) -> Self {
        let sender = email
            .from
            .value
            .first()
            .map(|a| Sender {
                address: a.address.clone(),
                name: a.name.clone(),
            })
            .unwrap_or_default();

        EmailSummary {
            email_id: email.id.clone(),
            subject: email.subject.clone(),
            sender,
            timestamp: email.timestamp,
            is_read: email.is_read.unwrap_or(false),
        }
    }
}

impl fmt::Display for MatchCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some((_, description)) = &self.custom {
            return write!(f, "{description}");
        }

        let mut parts = Vec::new();
        if let Some(from) = &self.from {
            parts.push(format!("from = \"{from}\""));
        }
        if let Some(from) = &self.from_contains {
            parts.push(format!("from contains \"{from}\""));
        }
        if let Some(to) = &self.to_contains {
            parts.push(format!("to contains \"{to}\""));
        }
        if let Some(subject) = &self.subject_contains {
            parts.push(format!("subject contains \"{subject}\""));
        }
        if let Some(re) = &self.subject_pattern {
            parts.push(format!("subject matches /{}/", re.as_str()));
        }
        if let Some(body) = &self.body_contains {
            parts.push(format!("body contains \"{body}\""));
        }
        if let Some(after) = &self.received_after {
            parts.push(format!("received after {}", after.to_rfc3339()));
        }
        if let Some(read) = self.read_state {
            parts.push(if read { "read" } else { "unread" }.to_string());
        }

        if parts.is_empty() {
            write!(f, "any email")
        } else {
            write!(f, "{}", parts.join(" and "))
        }
    }
}

impl fmt::Debug for MatchCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MatchCriteria")
            .field(&self.to_string())
            .finish()
    }
}
