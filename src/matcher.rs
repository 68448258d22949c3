//! Content extraction from email bodies.
//!
//! This module provides a flexible [`Matcher`] trait and built-in implementations
//! for the two things tests usually need from an email: a verification code and a link.
//!
//! # Example
//!
//! ```
//! use ahem_helper::matcher::{CodeMatcher, LinkMatcher, Matcher};
//!
//! let code = CodeMatcher::verification_code();
//! assert_eq!(code.find_match("Your code is 483920.").as_deref(), Some("483920"));
//!
//! let link = LinkMatcher::containing("confirm");
//! let text = "Click http://example.com/confirm?x=1 to continue";
//! assert_eq!(link.find_match(text).as_deref(), Some("http://example.com/confirm?x=1"));
//! ```

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// Characters that end a URL in a text or markup body.
const URL_BODY: &str = r#"[^\s"'<>]"#;

static VERIFICATION_CODE: Lazy<RegexMatcher> = Lazy::new(|| CodeMatcher::pattern(4, 6));

static ANY_LINK: Lazy<RegexMatcher> = Lazy::new(|| {
    RegexMatcher::with_description(&format!("(https?://{URL_BODY}+)"), "any link")
        .expect("valid regex")
});

/// Pulls one value out of an email body.
///
/// [`Email::extract_link_with`](crate::Email::extract_link_with) accepts any
/// implementation, so a test can extract whatever its application sends:
/// magic-link tokens, invitation ids, one-time passwords in odd formats.
///
/// # Example
///
/// ```
/// use ahem_helper::matcher::Matcher;
/// use std::borrow::Cow;
///
/// /// Password-reset token sent as `reset=<token>`.
/// struct ResetToken;
///
/// impl Matcher for ResetToken {
///     fn find_match<'a>(&self, body: &'a str) -> Option<Cow<'a, str>> {
///         body.split_whitespace()
///             .find_map(|word| word.strip_prefix("reset="))
///             .map(Cow::Borrowed)
///     }
///
///     fn description(&self) -> &str {
///         "reset token"
///     }
/// }
///
/// assert_eq!(ResetToken.find_match("Use reset=9f2c within 1h").as_deref(), Some("9f2c"));
/// ```
pub trait Matcher: Send + Sync {
    /// Returns the first value found in `body`, borrowed from it where possible.
    fn find_match<'a>(&self, body: &'a str) -> Option<Cow<'a, str>>;

    /// What this matcher looks for, e.g. `verification code (4-6 digits)`.
    ///
    /// Becomes the `what` of [`Error::NotFound`] when nothing matches.
    fn description(&self) -> &str;
}

/// Matcher backed by a regular expression.
///
/// Yields capture group 1, or the whole match when the pattern has no group.
///
/// ```
/// use ahem_helper::matcher::{Matcher, RegexMatcher};
///
/// let invite = RegexMatcher::with_description(r"invitation id: (INV-\d+)", "invitation id")?;
/// assert_eq!(invite.find_match("Your invitation id: INV-0042").as_deref(), Some("INV-0042"));
/// # Ok::<(), ahem_helper::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
    description: String,
}

impl RegexMatcher {
    /// Compiles `pattern`; the description is the pattern itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if the pattern does not compile.
    pub fn new(pattern: &str) -> Result<Self> {
        Self::with_description(pattern, format!("pattern /{pattern}/"))
    }

    /// Compiles `pattern` with a description used in [`Error::NotFound`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if the pattern does not compile.
    pub fn with_description(pattern: &str, description: impl Into<String>) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| Error::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            regex,
            description: description.into(),
        })
    }
}

impl Matcher for RegexMatcher {
    fn find_match<'a>(&self, body: &'a str) -> Option<Cow<'a, str>> {
        let caps = self.regex.captures(body)?;
        caps.get(1)
            .or_else(|| caps.get(0))
            .map(|m| Cow::Borrowed(m.as_str()))
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Matcher for short numeric codes (verification codes, PINs).
///
/// A code is a run of digits whose neighbours are non-digits or the ends of the text.
/// The first such run in document order wins.
///
/// # Example
///
/// ```
/// use ahem_helper::matcher::{CodeMatcher, Matcher};
///
/// let code = CodeMatcher::verification_code();
/// assert_eq!(code.find_match("PIN 1234, ref 99").as_deref(), Some("1234"));
/// assert_eq!(code.find_match("Order 1234567"), None); // 7 digits
/// ```
#[derive(Debug, Clone)]
pub struct CodeMatcher {
    inner: RegexMatcher,
}

impl CodeMatcher {
    /// Matches a 4 to 6 digit code.
    #[must_use]
    pub fn verification_code() -> Self {
        Self {
            inner: VERIFICATION_CODE.clone(),
        }
    }

    /// Matches exactly `digits` digits.
    ///
    /// # Panics
    ///
    /// Panics if `digits` is 0.
    #[must_use]
    pub fn n_digit(digits: usize) -> Self {
        Self::range(digits, digits)
    }

    /// Matches between `min` and `max` digits.
    ///
    /// # Panics
    ///
    /// Panics if `min` is 0 or `min > max`.
    #[must_use]
    pub fn range(min: usize, max: usize) -> Self {
        assert!(min > 0, "min must be > 0");
        assert!(min <= max, "min must be <= max");
        Self {
            inner: Self::pattern(min, max),
        }
    }

    fn pattern(min: usize, max: usize) -> RegexMatcher {
        // ASCII digits only; `\d` would also accept other scripts
        let pattern = format!(r"(?:^|[^0-9])([0-9]{{{min},{max}}})(?:[^0-9]|$)");
        let description = if min == max {
            format!("{min}-digit code")
        } else {
            format!("verification code ({min}-{max} digits)")
        };
        RegexMatcher::with_description(&pattern, description).expect("valid regex")
    }
}

impl Matcher for CodeMatcher {
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        self.inner.find_match(text)
    }

    fn description(&self) -> &str {
        self.inner.description()
    }
}

/// Matcher for `http(s)` links.
///
/// A link ends at whitespace, a quote, or an angle bracket, so it works on
/// both plain-text and markup bodies.
///
/// # Example
///
/// ```
/// use ahem_helper::matcher::{LinkMatcher, Matcher};
///
/// let matcher = LinkMatcher::containing("verify");
/// let html = r#"<a href="https://example.com/verify?token=abc">Click</a>"#;
/// assert_eq!(matcher.find_match(html), Some("https://example.com/verify?token=abc".into()));
/// ```
#[derive(Debug, Clone)]
pub struct LinkMatcher {
    inner: RegexMatcher,
}

impl LinkMatcher {
    /// Matches the first link whose text contains `fragment` (ASCII case-insensitive).
    ///
    /// The fragment is taken literally, not as a pattern.
    #[must_use]
    pub fn containing(fragment: &str) -> Self {
        let escaped = regex::escape(fragment);
        let pattern = format!("(?i)(https?://{URL_BODY}*{escaped}{URL_BODY}*)");
        Self {
            inner: RegexMatcher::with_description(
                &pattern,
                format!("link containing \"{fragment}\""),
            )
            .expect("valid regex"),
        }
    }

    /// Matches the first link of any kind.
    #[must_use]
    pub fn any() -> Self {
        Self {
            inner: ANY_LINK.clone(),
        }
    }

    /// Matches links with a caller-supplied pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if the pattern does not compile.
    pub fn custom(pattern: &str, description: &str) -> Result<Self> {
        Ok(Self {
            inner: RegexMatcher::with_description(pattern, description)?,
        })
    }
}

impl Matcher for LinkMatcher {
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        self.inner.find_match(text)
    }

    fn description(&self) -> &str {
        self.inner.description()
    }
}

/// Matcher wrapping a function, for one-off extraction inside a test.
///
/// ```
/// use ahem_helper::matcher::{ClosureMatcher, Matcher};
/// use std::borrow::Cow;
///
/// // Second line of a two-line address block
/// let city = ClosureMatcher::new(
///     |body| body.lines().nth(1).map(|line| Cow::Borrowed(line.trim())),
///     "city line",
/// );
/// assert_eq!(city.find_match("1 Main St\n  Springfield\n").as_deref(), Some("Springfield"));
/// ```
pub struct ClosureMatcher<F> {
    extract: F,
    description: String,
}

impl<F> ClosureMatcher<F>
where
    F: for<'a> Fn(&'a str) -> Option<Cow<'a, str>> + Send + Sync,
{
    /// Wraps `extract` under `description`.
    #[must_use]
    pub fn new(extract: F, description: impl Into<String>) -> Self {
        Self {
            extract,
            description: description.into(),
        }
    }
}

impl<F> Matcher for ClosureMatcher<F>
where
    F: for<'a> Fn(&'a str) -> Option<Cow<'a, str>> + Send + Sync,
{
    fn find_match<'a>(&self, body: &'a str) -> Option<Cow<'a, str>> {
        (self.extract)(body)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl<F> std::fmt::Debug for ClosureMatcher<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureMatcher")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
