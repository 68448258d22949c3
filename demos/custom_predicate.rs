//! Example: Custom predicates and explicit wait options.
//!
//! # Usage
//!
//! ```bash
//! export AHEM_BASE_URL="http://localhost:3000"
//! cargo run --example custom_predicate
//! ```

use ahem_helper::matcher::{ClosureMatcher, RegexMatcher};
use ahem_helper::{HelperConfig, MailHelper, MatchCriteria};
use chrono::Utc;
use std::borrow::Cow;
use std::time::Duration;

#[tokio::main]
async fn main() -> ahem_helper::Result<()> {
    let config = HelperConfig::from_layers(&[])?;
    let guard = MailHelper::setup(config).await?.into_guard();
    let started = Utc::now();

    // Structural criteria, all of which must hold
    let invoice = MatchCriteria::new()
        .from_contains("billing@")
        .subject_matches(r"(?i)invoice #\d+")?
        .received_after(started);
    println!("Looking for: {invoice}");

    // A predicate replaces the structural criteria entirely
    let weekend_digest = MatchCriteria::new().custom_described(
        |s| s.sender.name == "Digest" && s.subject.len() < 80,
        "short digest email",
    );

    let options = guard
        .wait_options()
        .timeout(Duration::from_secs(15))
        .poll_interval(Duration::from_millis(500))
        .mark_as_read(false);

    for criteria in [invoice, weekend_digest] {
        match guard.wait_for_email_with(&criteria, options.clone()).await {
            Ok(email) => {
                println!("Matched '{}' ({})", email.subject(), email.id());

                // Pull anything out of the body with a matcher
                let amount = RegexMatcher::with_description(r"Total:\s*([\d.,]+)", "invoice total")?;
                if let Ok(total) = email.extract_link_with(&amount) {
                    println!("  Total: {total}");
                }

                let unsubscribe = ClosureMatcher::new(
                    |body| {
                        body.lines()
                            .find(|l| l.to_lowercase().contains("unsubscribe"))
                            .map(|l| Cow::Borrowed(l.trim()))
                    },
                    "unsubscribe line",
                );
                if let Ok(line) = email.extract_link_with(&unsubscribe) {
                    println!("  {line}");
                }
            }
            Err(e) => println!("No match for {criteria}: {e}"),
        }
    }

    guard.finish().await;
    Ok(())
}
