use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const COUNTRY_CODE: &str = "BE";
const IBAN_LENGTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid IBAN '{value}': {reason}")]
pub struct InvalidIbanError {
    pub value: String,
    pub reason: &'static str,
}

impl InvalidIbanError {
    fn new(value: &str, reason: &'static str) -> Self {
        InvalidIbanError {
            value: value.to_string(),
            reason,
        }
    }
}

/// A validated account number in canonical form: upper case, no spaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Iban(String);

impl Iban {
    pub fn parse(raw: &str) -> Result<Self, InvalidIbanError> {
        validate(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display form, grouped in blocks of four.
    pub fn formatted(&self) -> String {
        format(&self.0)
    }
}

impl fmt::Display for Iban {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Iban {
    type Err = InvalidIbanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate(s)
    }
}

impl TryFrom<String> for Iban {
    type Error = InvalidIbanError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate(&value)
    }
}

impl From<Iban> for String {
    fn from(iban: Iban) -> Self {
        iban.0
    }
}

/// Strips whitespace and upper-cases. Does not check the checksum.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Inserts a space after every fourth character.
pub fn format(canonical: &str) -> String {
    let mut out = String::with_capacity(canonical.len() + canonical.len() / 4);
    for (i, c) in canonical.chars().enumerate() {
        if i > 0 && i % 4 == 0 {
            out.push(' ');
        }
        out.push(c);
    }
    out
}

pub fn validate(raw: &str) -> Result<Iban, InvalidIbanError> {
    let canonical = normalize(raw);

    if canonical.len() != IBAN_LENGTH {
        return Err(InvalidIbanError::new(raw, "expected 16 characters"));
    }
    if !canonical.starts_with(COUNTRY_CODE) {
        return Err(InvalidIbanError::new(raw, "country code must be BE"));
    }
    if !canonical[2..].chars().all(|c| c.is_ascii_digit()) {
        return Err(InvalidIbanError::new(raw, "expected 14 digits after the country code"));
    }
    if checksum(&canonical) != 1 {
        return Err(InvalidIbanError::new(raw, "check digits do not match"));
    }

    Ok(Iban(canonical))
}

/// ISO 13616 mod-97 over the rearranged number, folded one symbol at a time
/// so the value never exceeds u32.
fn checksum(canonical: &str) -> u32 {
    let (head, bban) = canonical.split_at(4);
    bban.chars().chain(head.chars()).fold(0u32, |rem, c| match c.to_digit(36) {
        Some(v) if v < 10 => (rem * 10 + v) % 97,
        Some(v) => (rem * 100 + v) % 97,
        None => rem,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &[&str] = &["BE68539007547034", "BE71096123456769", "BE62510007547061"];

    #[test]
    fn validate_accepts_formatted_input() {
        let iban = validate("be68 5390 0754 7034").unwrap();
        assert_eq!(iban.as_str(), "BE68539007547034");
    }

    #[test]
    fn validate_rejects_bad_check_digits() {
        let err = validate("BE68539007547035").unwrap_err();
        assert_eq!(err.value, "BE68539007547035");
        assert_eq!(err.reason, "check digits do not match");
    }

    #[test]
    fn validate_rejects_wrong_length() {
        assert!(validate("BE6853900754703").is_err());
        assert!(validate("BE685390075470344").is_err());
        assert!(validate("").is_err());
    }

    #[test]
    fn validate_rejects_other_countries() {
        // Valid Dutch IBAN, but only Belgian numbers are accepted.
        assert!(validate("NL91ABNA0417164300").is_err());
        assert!(validate("NL68539007547034").is_err());
    }

    #[test]
    fn validate_rejects_letters_in_bban() {
        let err = validate("BE6853900754703A").unwrap_err();
        assert_eq!(err.reason, "expected 14 digits after the country code");
    }

    #[test]
    fn format_groups_by_four() {
        assert_eq!(format("BE68539007547034"), "BE68 5390 0754 7034");
        assert_eq!(format("BE6"), "BE6");
        assert_eq!(format(""), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["be68 5390 0754 7034", " BE68539007547034 ", "Be68\t5390"] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn normalize_inverts_format() {
        for canonical in VALID {
            assert_eq!(&normalize(&format(canonical)), canonical);
        }
    }

    #[test]
    fn serde_goes_through_validation() {
        let iban: Iban = serde_json::from_str("\"BE71 0961 2345 6769\"").unwrap();
        assert_eq!(iban.as_str(), "BE71096123456769");
        assert!(serde_json::from_str::<Iban>("\"BE00000000000000\"").is_err());
    }
}
