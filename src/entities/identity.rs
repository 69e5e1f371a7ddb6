// 🪪 Runner identity - registration codes and name keys
//
// A registration code looks like "ABC8001": three letters of the club,
// two digits of the birth year, two digits of sequence. Runners without a
// registration carry the "nereg." sentinel instead.

use crate::error::{Result, SeasonError};
use deunicode::deunicode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel written for runners without a registration
pub const UNREGISTERED: &str = "nereg.";

/// Marker that identifies the sentinel (also in variants like "nereg")
const UNREGISTERED_MARKER: &str = "nereg";

/// Byte offset of the two-digit birth year inside a registration code
const BIRTH_YEAR_OFFSET: usize = 3;

/// Registration codes that can be matched across races have this length
const REGISTRATION_LENGTH: usize = 7;

// ============================================================================
// IDENTITY CODE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct IdentityCode(String);

impl IdentityCode {
    /// Wrap a raw code; blank input becomes the unregistered sentinel
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self::unregistered()
        } else {
            IdentityCode(trimmed.to_string())
        }
    }

    pub fn unregistered() -> Self {
        IdentityCode(UNREGISTERED.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unregistered(&self) -> bool {
        self.0.contains(UNREGISTERED_MARKER)
    }

    fn is_numeric(&self) -> bool {
        !self.0.is_empty() && self.0.chars().all(|c| c.is_ascii_digit())
    }

    /// Structured registration that the collator matches on
    /// (seven characters starting with a capital letter)
    pub fn is_registered(&self) -> bool {
        self.0.chars().count() == REGISTRATION_LENGTH
            && self.0.chars().next().is_some_and(|c| c.is_ascii_uppercase())
    }

    /// Code trusted as the identity of a merged runner: anything that is
    /// neither purely numeric nor the unregistered sentinel
    pub fn is_authoritative(&self) -> bool {
        !self.is_numeric() && !self.is_unregistered()
    }

    /// Decode the birth year embedded in the code.
    ///
    /// Numeric codes and the unregistered sentinel carry no birth year
    /// (`Ok(None)`). Two-digit years above the current year's suffix are
    /// taken as 19xx, the rest as 20xx.
    pub fn birth_year(&self, current_year: i32) -> Result<Option<i32>> {
        if self.is_numeric() || self.is_unregistered() {
            return Ok(None);
        }

        let digits = self
            .0
            .get(BIRTH_YEAR_OFFSET..BIRTH_YEAR_OFFSET + 2)
            .filter(|d| d.chars().all(|c| c.is_ascii_digit()))
            .ok_or_else(|| SeasonError::MalformedIdentityCode(self.0.clone()))?;

        let two_digit: i32 = digits
            .parse()
            .map_err(|_| SeasonError::MalformedIdentityCode(self.0.clone()))?;

        if two_digit > current_year % 100 {
            Ok(Some(1900 + two_digit))
        } else {
            Ok(Some(2000 + two_digit))
        }
    }

    /// Like `birth_year`, but a malformed code is reported and treated as unknown
    pub fn birth_year_lossy(&self, current_year: i32) -> Option<i32> {
        match self.birth_year(current_year) {
            Ok(year) => year,
            Err(e) => {
                tracing::warn!("Error parsing year of birth: {}", e);
                None
            }
        }
    }
}

impl Default for IdentityCode {
    fn default() -> Self {
        Self::unregistered()
    }
}

impl From<String> for IdentityCode {
    fn from(raw: String) -> Self {
        IdentityCode::new(&raw)
    }
}

impl From<IdentityCode> for String {
    fn from(code: IdentityCode) -> Self {
        code.0
    }
}

impl fmt::Display for IdentityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// NAME KEY
// ============================================================================

/// Key under which possibly identical runners are grouped:
/// trimmed, diacritics folded, lower-cased
pub fn name_key(name: &str) -> String {
    deunicode(name.trim()).to_lowercase()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_is_unregistered() {
        assert_eq!(IdentityCode::new("  "), IdentityCode::unregistered());
        assert!(IdentityCode::new("").is_unregistered());
    }

    #[test]
    fn test_registered_and_authoritative() {
        let code = IdentityCode::new("ABM8001");
        assert!(code.is_registered());
        assert!(code.is_authoritative());

        let numeric = IdentityCode::new("1234567");
        assert!(!numeric.is_registered());
        assert!(!numeric.is_authoritative());

        let unreg = IdentityCode::unregistered();
        assert!(!unreg.is_registered());
        assert!(!unreg.is_authoritative());

        // Not matchable by code, but still authoritative in reconciliation
        let short = IdentityCode::new("ABM80");
        assert!(!short.is_registered());
        assert!(short.is_authoritative());
    }

    #[test]
    fn test_birth_year_century() {
        assert_eq!(IdentityCode::new("ABM8001").birth_year(2025).unwrap(), Some(1980));
        assert_eq!(IdentityCode::new("ABM1203").birth_year(2025).unwrap(), Some(2012));
        assert_eq!(IdentityCode::new("ABM2501").birth_year(2025).unwrap(), Some(2025));
        assert_eq!(IdentityCode::new("ABM2601").birth_year(2025).unwrap(), Some(1926));
    }

    #[test]
    fn test_birth_year_absent() {
        assert_eq!(IdentityCode::new("1234567").birth_year(2025).unwrap(), None);
        assert_eq!(IdentityCode::unregistered().birth_year(2025).unwrap(), None);
    }

    #[test]
    fn test_birth_year_malformed() {
        let err = IdentityCode::new("ABMXX01").birth_year(2025).unwrap_err();
        assert!(matches!(err, SeasonError::MalformedIdentityCode(_)));

        assert!(IdentityCode::new("AB").birth_year(2025).is_err());
        assert_eq!(IdentityCode::new("AB").birth_year_lossy(2025), None);
    }

    #[test]
    fn test_name_key_folds() {
        assert_eq!(name_key("  Jiří Novák "), "jiri novak");
        assert_eq!(name_key("JIRI NOVAK"), name_key("Jiří Novák"));
        assert_ne!(name_key("Jiří Novák"), name_key("Jiří Nováková"));
    }
}
