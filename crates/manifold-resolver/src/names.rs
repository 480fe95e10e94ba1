//! TLD token validation.
//!
//! A TLD token is the text after the last `.` of a name, so it can never
//! itself contain a dot. The empty token names the default chain.

use crate::error::{ResolverError, ResolverResult};

/// Validate a TLD token for registration.
///
/// ```
/// use manifold_resolver::names::validate_tld;
///
/// assert!(validate_tld("").is_ok());
/// assert!(validate_tld("eth").is_ok());
/// assert!(validate_tld("a.b").is_err());
/// ```
pub fn validate_tld(tld: &str) -> ResolverResult<()> {
    let invalid = |reason: &str| ResolverError::InvalidTld {
        tld: tld.to_string(),
        reason: reason.to_string(),
    };

    if tld.contains('.') {
        return Err(invalid("must not contain '.'"));
    }
    if tld.contains('/') || tld.contains('\\') {
        return Err(invalid("must not contain path separators"));
    }
    if tld.chars().any(char::is_whitespace) {
        return Err(invalid("must not contain whitespace"));
    }
    if tld.chars().any(char::is_control) {
        return Err(invalid("must not contain control characters"));
    }
    Ok(())
}
