//! # ahem-helper
//!
//! Async test helper for emails captured by an AHEM disposable-mailbox server.
//!
//! This crate provides a high-level, async API for:
//! - Talking to the server's REST API (list, fetch, mark read, delete, attachments)
//! - Waiting until an email matching some criteria arrives
//! - Pulling a verification code or a link out of the email that arrived
//! - Emptying the test mailbox afterwards
//!
//! ## Quick Start
//!
//! ```no_run
//! use ahem_helper::{HelperConfig, MailHelper, MatchCriteria};
//! use std::time::Duration;
//!
//! # async fn example() -> ahem_helper::Result<()> {
//! let config = HelperConfig::builder()
//!     .base_url("http://localhost:3000")
//!     .default_timeout(Duration::from_secs(10))
//!     .build()?;
//!
//! let helper = MailHelper::setup(config).await?;
//!
//! // Wait for the signup email and read the code out of it
//! let email = helper
//!     .wait_for_email(&MatchCriteria::new().subject_contains("verify"))
//!     .await?;
//! let code = email.extract_verification_code()?;
//! println!("Got code: {}", code);
//!
//! // Clean up
//! helper.teardown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Layered Configuration
//!
//! Run-level and per-test settings are [`ConfigLayer`]s; later layers win, and
//! the `AHEM_BASE_URL` environment variable overrides the server URL of all of them.
//!
//! ```
//! use ahem_helper::{ConfigLayer, HelperConfig};
//!
//! let run = ConfigLayer::new().base_url("http://localhost:3000");
//! let test = ConfigLayer::new().default_mailbox("password-reset").cleanup_after_run(false);
//!
//! let config = HelperConfig::from_layers_with_env(&[run, test], None).unwrap();
//! assert_eq!(config.default_mailbox, "password-reset");
//! ```
//!
//! ## Custom Predicates
//!
//! ```
//! use ahem_helper::MatchCriteria;
//!
//! // Replaces every structural criterion
//! let newest_unread = MatchCriteria::new()
//!     .custom_described(|s| !s.is_read && s.sender.name == "Billing", "unread billing email");
//! ```
//!
//! ## RAII Guard for Automatic Cleanup
//!
//! ```no_run
//! use ahem_helper::{HelperConfig, MailHelper, MatchCriteria};
//!
//! # async fn example() -> ahem_helper::Result<()> {
//! # let config = HelperConfig::builder().base_url("http://localhost:3000").build()?;
//! let guard = MailHelper::setup(config).await?.into_guard();
//!
//! let email = guard.wait_for_email(&MatchCriteria::new()).await?;
//! // Guard schedules cleanup when dropped; `finish` waits for it
//! guard.finish().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Transport failures are never retried by the crate. Use [`Error::category`] and
//! [`Error::is_retryable`] to decide what to do:
//!
//! ```
//! use ahem_helper::{Error, ErrorCategory};
//!
//! fn handle_error(error: &Error) {
//!     match error.category() {
//!         ErrorCategory::Timeout => println!("email never arrived: {}", error),
//!         _ if error.is_retryable() => println!("transient, can retry: {}", error),
//!         _ => println!("permanent error: {}", error),
//!     }
//! }
//! ```
//!
//! ## Observability
//!
//! The crate uses `tracing` for instrumentation. All network operations emit spans
//! with structured fields.
//!
//! ### Span Naming Convention
//!
//! - `AhemClient::<operation>` - One HTTP call
//! - `session::authenticate` - Token handshake
//! - `wait::poll_until_match` - A whole wait
//! - `MailHelper::setup` / `MailHelper::cleanup` - Test scope
//!
//! ### Standard Fields
//!
//! - `mailbox` - Mailbox name
//! - `email_id` - Email identifier
//! - `criteria` - Match criteria description
//! - `attempt` - Poll number within a wait
//!
//! The bearer token is never recorded.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
pub mod config;
pub mod criteria;
pub mod error;
pub mod matcher;
pub mod models;
pub mod wait;

// Internal modules
mod client;
mod email;
mod helper;
mod session;

// Re-exports for ergonomic API
pub use client::{AhemClient, AhemClientBuilder};
pub use config::{ConfigLayer, HelperConfig, HelperConfigBuilder, BASE_URL_ENV};
pub use criteria::MatchCriteria;
pub use email::Email;
pub use error::{Error, ErrorCategory, Result};
pub use helper::{CleanupReport, MailHelper, MailHelperGuard};
pub use models::{EmailFull, EmailSummary};
pub use wait::{WaitOptions, WaitState};
