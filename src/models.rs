//! Email records as returned by the mail server's JSON API.
//!
//! [`EmailSummary`] comes from the listing call and carries no body.
//! [`EmailFull`] comes from the single-email fetch and is a snapshot:
//! later mark-read or delete calls change the server copy, not this value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Address and display name of the sender in a listing record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    /// Email address.
    #[serde(default)]
    pub address: String,
    /// Display name, possibly empty.
    #[serde(default)]
    pub name: String,
}

/// Lightweight record produced by listing a mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSummary {
    /// Identifier, unique within the mailbox.
    pub email_id: String,
    /// Subject line.
    #[serde(default)]
    pub subject: String,
    /// Sender address and name.
    #[serde(default)]
    pub sender: Sender,
    /// Arrival time in milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
    /// Whether the email has been marked read.
    #[serde(default)]
    pub is_read: bool,
}

impl EmailSummary {
    /// Returns the arrival time, if the timestamp is representable.
    #[must_use]
    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// One address in an address group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Email address.
    #[serde(default)]
    pub address: String,
    /// Display name, possibly empty.
    #[serde(default)]
    pub name: String,
}

/// A `from`/`to` structure: the parsed addresses plus their rendered forms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressGroup {
    /// Parsed addresses.
    #[serde(default)]
    pub value: Vec<Address>,
    /// Plain-text rendering.
    #[serde(default)]
    pub text: String,
    /// Markup rendering.
    #[serde(default)]
    pub html: String,
}

impl AddressGroup {
    /// Iterates over the bare addresses.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.value.iter().map(|a| a.address.as_str())
    }
}

/// Attachment metadata. Bytes are fetched separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// File name as sent.
    #[serde(default)]
    pub filename: Option<String>,
    /// MIME type.
    #[serde(default)]
    pub content_type: Option<String>,
    /// Size in bytes.
    #[serde(default)]
    pub size: Option<u64>,
}

/// One raw header line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderLine {
    /// Lower-cased header name.
    #[serde(default)]
    pub key: String,
    /// The full original line.
    #[serde(default)]
    pub line: String,
}

/// Complete record produced by fetching a single email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailFull {
    /// Identifier, unique within the mailbox.
    #[serde(rename = "_id")]
    pub id: String,
    /// Subject line.
    #[serde(default)]
    pub subject: String,
    /// Rendered markup body.
    #[serde(default)]
    pub html: Option<String>,
    /// Plain-text body.
    #[serde(default)]
    pub text: Option<String>,
    /// Plain-text body converted to markup by the server.
    #[serde(default)]
    pub text_as_html: Option<String>,
    /// The `Date` header as sent.
    #[serde(default)]
    pub date: String,
    /// Arrival time in milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
    /// Read state, when the server includes it.
    #[serde(default)]
    pub is_read: Option<bool>,
    /// Attachment metadata.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Sender structure.
    #[serde(default)]
    pub from: AddressGroup,
    /// Recipient structure.
    #[serde(default)]
    pub to: AddressGroup,
    /// Parsed headers.
    #[serde(default)]
    pub headers: serde_json::Map<String, serde_json::Value>,
    /// Raw header lines.
    #[serde(default)]
    pub header_lines: Vec<HeaderLine>,
    /// The `Message-ID` header.
    #[serde(default)]
    pub message_id: String,
}

impl EmailFull {
    /// Returns the arrival time, if the timestamp is representable.
    #[must_use]
    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    /// Returns the first sender address, if any.
    #[must_use]
    pub fn sender_address(&self) -> Option<&str> {
        self.from.addresses().next()
    }

    /// Body used for link extraction: markup if present, else plain text.
    #[must_use]
    pub fn link_source(&self) -> Option<&str> {
        self.html
            .as_deref()
            .filter(|h| !h.is_empty())
            .or(self.text.as_deref())
    }
}
