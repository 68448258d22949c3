//! Example: Wait for a signup email and read the verification code.
//!
//! # Usage
//!
//! ```bash
//! export AHEM_BASE_URL="http://localhost:3000"
//! cargo run --example wait_for_code
//! ```

use ahem_helper::{ConfigLayer, HelperConfig, MailHelper, MatchCriteria};
use std::time::Duration;

#[tokio::main]
async fn main() -> ahem_helper::Result<()> {
    // Run-level defaults; AHEM_BASE_URL overrides the server URL
    let run = ConfigLayer::new()
        .base_url("http://localhost:3000")
        .default_timeout(Duration::from_secs(60));
    let test = ConfigLayer::new().default_mailbox("signup");

    let config = HelperConfig::from_layers(&[run, test])?;
    println!("Waiting for email in '{}' on {}", config.default_mailbox, config.base_url);

    let helper = MailHelper::setup(config).await?;

    let criteria = MatchCriteria::new()
        .subject_contains("verify")
        .unread_only();

    let email = helper.wait_for_email(&criteria).await?;
    println!("Received: {}", email.subject());

    match email.extract_verification_code() {
        Ok(code) => println!("Verification code: {code}"),
        Err(e) => println!("No code in this email: {e}"),
    }

    if let Ok(link) = email.extract_link("confirm") {
        println!("Confirmation link: {link}");
    }

    if let Some(report) = helper.teardown().await {
        println!("Cleanup removed {} email(s)", report.deleted);
    }

    Ok(())
}
