use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::Serialize;
use thiserror::Error;

/// Longest value a PatientID (VR LO) may hold.
const MAX_LEN: usize = 64;

/// Internally generated identifier that replaces the patient identity.
///
/// The value ends up both in PatientID and, with case naming, in output file
/// names, so it is limited to ASCII letters, digits, `-`, `_` and `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CaseId(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid case number {value:?}: {reason}")]
pub struct InvalidCaseId {
    pub value: String,
    pub reason: &'static str,
}

impl CaseId {
    pub fn new(value: &str) -> Result<Self, InvalidCaseId> {
        let reject = |reason| InvalidCaseId {
            value: value.to_string(),
            reason,
        };

        if value.is_empty() {
            return Err(reject("must not be empty"));
        }
        if value.len() > MAX_LEN {
            return Err(reject("must be at most 64 characters"));
        }
        if value.starts_with('.') {
            return Err(reject("must not start with '.'"));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(reject("only ASCII letters, digits, '-', '_' and '.' are allowed"));
        }

        Ok(Self(value.to_string()))
    }

    /// Random six digit case number, zero padded.
    pub fn generate() -> Self {
        let n: u32 = rand::rng().random_range(0..=999_999);
        Self(format!("{n:06}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CaseId {
    type Err = InvalidCaseId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CaseId::new(s)
    }
}

impl AsRef<str> for CaseId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_six_digits() {
        for _ in 0..100 {
            let id = CaseId::generate();
            assert_eq!(id.as_str().len(), 6);
            assert!(id.as_str().chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn accepts_typical_case_numbers() {
        for value in ["004217", "case-12", "PX_2023.07"] {
            let id: CaseId = value.parse().expect("valid case id");
            assert_eq!(id.to_string(), value);
        }
    }

    #[test]
    fn rejects_unsafe_values() {
        let long = "9".repeat(65);
        for value in ["", ".hidden", "../escape", "a b", "Doe^John", long.as_str()] {
            assert!(
                CaseId::new(value).is_err(),
                "{value:?} should be rejected"
            );
        }
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = CaseId::new("000042").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"000042\"");
    }
}
