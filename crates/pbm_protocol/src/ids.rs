//! Identifier newtypes shared across the simulator.

use std::fmt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A unique claim number, at most 50 characters, assigned at adjudication.
///
/// Wrapping a bare `String` in a newtype keeps claim numbers from being
/// confused with other string fields (response messages, business keys) at
/// the type level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimNumber(String);

/// Maximum length of a claim number, per the persisted column width.
pub const MAX_CLAIM_NUMBER_LEN: usize = 50;

impl ClaimNumber {
    pub fn new(value: impl Into<String>) -> Result<Self, ClaimNumberError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ClaimNumberError::Empty);
        }
        if value.len() > MAX_CLAIM_NUMBER_LEN {
            return Err(ClaimNumberError::TooLong(value.len()));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClaimNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ClaimNumber> for String {
    fn from(value: ClaimNumber) -> Self {
        value.0
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimNumberError {
    #[error("claim number cannot be empty")]
    Empty,
    #[error("claim number exceeds {MAX_CLAIM_NUMBER_LEN} characters: got {0}")]
    TooLong(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty() {
        assert!(matches!(ClaimNumber::new(""), Err(ClaimNumberError::Empty)));
    }

    #[test]
    fn rejects_too_long() {
        let long = "x".repeat(51);
        assert!(matches!(
            ClaimNumber::new(long),
            Err(ClaimNumberError::TooLong(51))
        ));
    }

    #[test]
    fn accepts_prefixed_claim_numbers() {
        let n = ClaimNumber::new("CLM-000001").unwrap();
        assert_eq!(n.as_str(), "CLM-000001");
    }
}
