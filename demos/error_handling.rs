//! Example: Proper error handling with retries.
//!
//! The crate never retries on its own. This example shows how a caller can
//! retry transient failures based on [`Error::is_retryable`] and branch on
//! [`Error::category`].
//!
//! # Usage
//!
//! ```bash
//! export AHEM_BASE_URL="http://localhost:3000"
//! cargo run --example error_handling
//! ```

use ahem_helper::{Email, Error, ErrorCategory, HelperConfig, MailHelper, MatchCriteria};
use std::time::Duration;

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Set up with automatic retry for transient failures
async fn setup_with_retry(config: &HelperConfig) -> Result<MailHelper, Error> {
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 1;

    loop {
        println!("Setup attempt {attempt}/{MAX_RETRIES}...");

        match MailHelper::setup(config.clone()).await {
            Ok(helper) => {
                println!("Authenticated successfully!");
                return Ok(helper);
            }
            Err(e) => {
                println!("  Error: {e}");
                println!("  Category: {}", e.category());
                println!("  Retryable: {}", e.is_retryable());

                if e.is_retryable() && attempt < MAX_RETRIES {
                    println!("  Retrying in {backoff:?}...");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2; // Exponential backoff
                    attempt += 1;
                } else {
                    return Err(e);
                }
            }
        }
    }
}

/// Wait with error classification
async fn wait_with_error_handling(helper: &MailHelper) -> Result<Option<Email>, Error> {
    let criteria = MatchCriteria::new().subject_contains("verify");

    match helper.wait_for_email(&criteria).await {
        Ok(email) => Ok(Some(email)),
        Err(e) => match e.category() {
            ErrorCategory::Timeout => {
                // Nothing arrived: a test failure, not a crash
                println!("No matching email arrived: {e}");
                Ok(None)
            }
            ErrorCategory::Transport => {
                if let Some(status) = e.status() {
                    println!("Server answered HTTP {status}: {e}");
                } else {
                    println!("Server unreachable: {e}");
                }
                Err(e)
            }
            ErrorCategory::Decode => {
                println!("Unexpected response shape, is this an AHEM server? {e}");
                Err(e)
            }
            _ => {
                println!("Error: {e}");
                Err(e)
            }
        },
    }
}

#[tokio::main]
async fn main() {
    let config = match HelperConfig::from_layers(&[]) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            eprintln!("Set AHEM_BASE_URL to the server address");
            std::process::exit(1);
        }
    };

    let helper = match setup_with_retry(&config).await {
        Ok(helper) => helper,
        Err(e) => {
            eprintln!("Failed to set up after retries: {e}");
            std::process::exit(1);
        }
    };

    match wait_with_error_handling(&helper).await {
        Ok(Some(email)) => match email.extract_verification_code() {
            Ok(code) => println!("Found code: {code}"),
            Err(Error::NotFound { what }) => println!("Email has no {what}"),
            Err(e) => println!("Extraction failed: {e}"),
        },
        Ok(None) => println!("No email, moving on"),
        Err(e) => eprintln!("Wait failed: {e}"),
    }

    if let Some(report) = helper.teardown().await {
        if !report.is_clean() {
            println!(
                "Cleanup incomplete: {} deleted, {} failed",
                report.deleted, report.failed
            );
        }
    }
}
