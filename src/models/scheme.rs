use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// RFC 3986 section 3.1: `scheme = ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )`
static SCHEME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*$").expect("Invalid scheme regex"));

fn is_scheme_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')
}

/// Reduce arbitrary input to a string that follows the URL scheme grammar.
///
/// Leading characters are dropped until the first ASCII letter, then
/// everything outside letters, digits, `+`, `-` and `.` is filtered out.
/// Total over all inputs; the result is either empty or a valid scheme.
pub fn sanitize(input: &str) -> String {
    input
        .trim_start_matches(|c: char| !c.is_ascii_alphabetic())
        .chars()
        .filter(|&c| is_scheme_char(c))
        .collect()
}

/// Check a string against the URL scheme grammar without modifying it.
pub fn is_valid_scheme(value: &str) -> bool {
    SCHEME_PATTERN.is_match(value)
}

/// A URL scheme that has been through [`sanitize`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UrlScheme(String);

impl UrlScheme {
    pub fn sanitized(input: &str) -> Self {
        Self(sanitize(input.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for UrlScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The iOS `CFBundleURLSchemes` list kept in player settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UrlSchemeList(Vec<String>);

impl UrlSchemeList {
    pub fn new(schemes: Vec<String>) -> Self {
        Self(schemes)
    }

    /// Swap `old` for `new`, idempotently.
    ///
    /// Nothing happens when `new` is already listed. Otherwise the first
    /// entry equal to `old` is overwritten in place, or `new` is appended.
    /// Returns whether the list changed.
    pub fn replace(&mut self, old: &str, new: &str) -> bool {
        for (index, scheme) in self.0.iter_mut().enumerate() {
            if scheme == new {
                tracing::debug!("Desired url scheme already set at index {}", index);
                return false;
            }
            if scheme == old {
                tracing::debug!("Updating old scheme at index {}", index);
                *scheme = new.to_string();
                return true;
            }
        }

        self.0.push(new.to_string());
        true
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, scheme: &str) -> bool {
        self.0.iter().any(|s| s == scheme)
    }
}
