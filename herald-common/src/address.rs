//! Email address syntax checks.
//!
//! Campaign intake only needs to know whether an address *looks* deliverable:
//! something before an `@`, a dotted domain after it, and no whitespace. The
//! transport is the final authority on whether the mailbox exists.

use std::sync::LazyLock;

use regex::Regex;

/// Longest address accepted by SMTP (RFC 5321 path limit minus the brackets).
pub const MAX_ADDRESS_LENGTH: usize = 254;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used, reason = "The pattern is a compile-time constant")]
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap()
});

/// Returns `true` if `address` matches the standard `local@domain.tld` shape.
#[must_use]
pub fn is_valid_email(address: &str) -> bool {
    !address.is_empty() && address.len() <= MAX_ADDRESS_LENGTH && EMAIL_PATTERN.is_match(address)
}
