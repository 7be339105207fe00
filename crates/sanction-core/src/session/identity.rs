//! Opaque, self-validating identifiers.
//!
//! Identifiers have the shape `<prefix>_<unix millis>_<16 lowercase hex>`,
//! so validity can be checked without a lookup. The random suffix is drawn
//! from the operating system RNG.

use crate::error::{Result, SanctionError};
use chrono::Utc;
use once_cell::sync::Lazy;
use rand::RngCore;
use rand::rngs::OsRng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SUFFIX_BYTES: usize = 8;

static SESSION_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^sess_[0-9]+_[a-f0-9]{16}$").expect("valid session id pattern"));

/// Generates a `<prefix>_<millis>_<hex>` token.
pub fn generate_token(prefix: &str) -> String {
    let mut bytes = [0u8; SUFFIX_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let suffix: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}_{}_{}", prefix, Utc::now().timestamp_millis(), suffix)
}

/// Returns true if `candidate` is a `<prefix>_<digits>_<16 hex>` token.
pub fn is_token(prefix: &str, candidate: &str) -> bool {
    let Some(rest) = candidate
        .strip_prefix(prefix)
        .and_then(|r| r.strip_prefix('_'))
    else {
        return false;
    };
    let Some((millis, suffix)) = rest.split_once('_') else {
        return false;
    };
    !millis.is_empty()
        && millis.bytes().all(|b| b.is_ascii_digit())
        && suffix.len() == SUFFIX_BYTES * 2
        && suffix
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Identifier of one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh session id (`sess_<millis>_<16 hex>`).
    pub fn generate() -> Self {
        Self(generate_token("sess"))
    }

    /// Returns true iff `candidate` matches the session id pattern exactly.
    pub fn is_valid(candidate: &str) -> bool {
        SESSION_ID_PATTERN.is_match(candidate)
    }

    /// Parses a session id, rejecting anything that does not match the pattern.
    pub fn parse(candidate: &str) -> Result<Self> {
        if Self::is_valid(candidate) {
            Ok(Self(candidate.to_string()))
        } else {
            Err(SanctionError::validation(format!(
                "malformed session id '{}'",
                candidate
            )))
        }
    }

    /// Keeps a valid caller-supplied id, otherwise starts a new session.
    pub fn parse_or_generate(candidate: Option<&str>) -> Self {
        match candidate {
            Some(c) if Self::is_valid(c) => Self(c.to_string()),
            _ => Self::generate(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = SanctionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_valid() {
        for _ in 0..100 {
            let id = SessionId::generate();
            assert!(SessionId::is_valid(id.as_str()), "{}", id);
        }
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_rejects_malformed_ids() {
        assert!(!SessionId::is_valid("abc"));
        assert!(!SessionId::is_valid(""));
        assert!(!SessionId::is_valid("sess_1700000000000_0123456789abcde"));
        assert!(!SessionId::is_valid("sess_1700000000000_0123456789abcdef0"));
        assert!(!SessionId::is_valid("sess_1700000000000_0123456789ABCDEF"));
        assert!(!SessionId::is_valid("sess__0123456789abcdef"));
        assert!(!SessionId::is_valid(" sess_1700000000000_0123456789abcdef"));
        assert!(SessionId::is_valid("sess_1700000000000_0123456789abcdef"));
    }

    #[test]
    fn test_non_ascii_digits_are_rejected() {
        // Arabic-Indic digits
        let candidate = "sess_\u{661}\u{662}\u{663}_0123456789abcdef";
        assert!(!SessionId::is_valid(candidate));
        assert!(SessionId::parse(candidate).unwrap_err().is_validation());
        assert!(!is_token("sess", candidate));
    }

    #[test]
    fn test_truncated_suffix_is_rejected() {
        let id = SessionId::generate();
        let truncated = &id.as_str()[..id.as_str().len() - 1];
        assert!(!SessionId::is_valid(truncated));
        assert!(SessionId::parse(truncated).unwrap_err().is_validation());
    }

    #[test]
    fn test_parse_or_generate() {
        let kept = SessionId::parse_or_generate(Some("sess_1_0123456789abcdef"));
        assert_eq!(kept.as_str(), "sess_1_0123456789abcdef");

        let fresh = SessionId::parse_or_generate(Some("not-a-session"));
        assert!(SessionId::is_valid(fresh.as_str()));

        let none = SessionId::parse_or_generate(None);
        assert!(SessionId::is_valid(none.as_str()));
    }

    #[test]
    fn test_is_token_matches_regex_for_sessions() {
        let id = SessionId::generate();
        assert!(is_token("sess", id.as_str()));
        assert!(!is_token("approval", id.as_str()));
        assert!(!is_token("sess", "sess_12_xyz"));
    }
}
