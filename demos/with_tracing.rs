//! Example: Using tracing for observability.
//!
//! This example demonstrates how to enable structured logging using
//! the `tracing` ecosystem. Every HTTP call, the token handshake and each
//! wait emit tracing spans and events.
//!
//! # Usage
//!
//! ```bash
//! export AHEM_BASE_URL="http://localhost:3000"
//! # Set log level (trace, debug, info, warn, error)
//! export RUST_LOG=ahem_helper=debug
//!
//! cargo run --example with_tracing
//! ```

use ahem_helper::{HelperConfig, MailHelper, MatchCriteria};
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ahem_helper::Result<()> {
    // Use RUST_LOG to control log levels, e.g. RUST_LOG=ahem_helper=debug,info
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ahem_helper=info")),
        )
        .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let config = HelperConfig::builder()
        .base_url(std::env::var("AHEM_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".into()))
        .default_timeout(Duration::from_secs(20))
        .poll_interval(Duration::from_secs(2))
        .build()?;

    tracing::info!(base_url = %config.base_url, "Starting ahem-helper example");

    // Emits MailHelper::setup and session::authenticate spans
    let helper = MailHelper::setup(config).await?;

    // Emits wait::poll_until_match with one AhemClient::list_summaries span per poll
    let criteria = MatchCriteria::new().subject_contains("verify");
    match helper.wait_for_email(&criteria).await {
        Ok(email) => {
            tracing::info!(email_id = %email.id(), subject = %email.subject(), "Email arrived");
            match email.extract_verification_code() {
                Ok(code) => tracing::info!(code = %code, "Verification code found"),
                Err(e) => tracing::warn!(error = %e, "No verification code"),
            }
        }
        Err(e) => {
            tracing::error!(error = %e, category = %e.category(), "Wait failed");
        }
    }

    // Emits MailHelper::cleanup with one AhemClient::delete_email span per email
    helper.teardown().await;

    tracing::info!("Example completed");
    Ok(())
}
