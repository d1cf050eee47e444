//! Structural validation applied to every message crossing the channel
//!
//! Validation is a pure function from a raw payload to either a typed,
//! constraint-satisfying value or a [`SchemaViolation`] naming the field
//! that broke. Once a value is wrapped in [`Valid`], no downstream code
//! re-validates it.

use crate::error::SchemaViolation;
use std::ops::Deref;

/// Field-level constraint check for one message type.
pub trait Validate {
    fn validate(&self) -> Result<(), SchemaViolation>;
}

/// Proof that a value passed validation.
///
/// Constructed only through [`Valid::new`], so holding a `Valid<T>`
/// guarantees every declared constraint of `T` holds for the rest of the
/// value's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct Valid<T>(T);

impl<T: Validate> Valid<T> {
    pub fn new(value: T) -> Result<Self, SchemaViolation> {
        value.validate()?;
        Ok(Self(value))
    }
}

impl<T> Valid<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Valid<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

/// Integer timestamp fields must be strictly positive.
pub fn require_positive(field: &str, value: u64) -> Result<(), SchemaViolation> {
    if value == 0 {
        return Err(SchemaViolation::new(
            field,
            "a strictly positive timestamp",
        ));
    }
    Ok(())
}

/// Required string fields must be non-empty.
pub fn require_non_empty(field: &str, value: &str) -> Result<(), SchemaViolation> {
    if value.is_empty() {
        return Err(SchemaViolation::new(field, "a non-empty string"));
    }
    Ok(())
}

/// String length bound, counted in characters rather than bytes.
pub fn require_length(
    field: &str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), SchemaViolation> {
    let chars = value.chars().count();
    if chars < min || chars > max {
        return Err(SchemaViolation::new(
            field,
            format!("a string of {} to {} characters", min, max),
        ));
    }
    Ok(())
}

/// Team numbers are one to five digits with at most one trailing
/// uppercase letter, e.g. `1234` or `1234A`.
pub fn require_team_number(field: &str, value: &str) -> Result<(), SchemaViolation> {
    if is_team_number(value) {
        Ok(())
    } else {
        Err(SchemaViolation::new(
            field,
            "a team number (1-5 digits, optional uppercase letter suffix)",
        ))
    }
}

fn is_team_number(value: &str) -> bool {
    let (digits, suffix) = match value.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((index, _)) => value.split_at(index),
        None => (value, ""),
    };

    if digits.is_empty() || digits.len() > 5 {
        return false;
    }

    suffix.is_empty() || (suffix.len() == 1 && suffix.chars().all(|c| c.is_ascii_uppercase()))
}

// The age-update payload is a bare number with no declared constraints.
impl Validate for u64 {
    fn validate(&self) -> Result<(), SchemaViolation> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_positive_rejects_zero() {
        let err = require_positive("connected_at", 0).unwrap_err();
        assert_eq!(err.field, "connected_at");
        assert!(require_positive("connected_at", 1).is_ok());
    }

    #[test]
    fn test_require_length_counts_characters() {
        assert!(require_length("device_name", "Judge Phone", 1, 100).is_ok());
        assert!(require_length("device_name", "", 1, 100).is_err());

        // 100 multibyte characters are within a 100-character bound
        let name: String = "ø".repeat(100);
        assert!(require_length("device_name", &name, 1, 100).is_ok());

        let too_long: String = "a".repeat(101);
        let err = require_length("device_name", &too_long, 1, 100).unwrap_err();
        assert_eq!(err.field, "device_name");
    }

    #[test]
    fn test_team_number_accepts_digits_and_letter_suffix() {
        for value in ["1", "12345", "1234A", "99Z"] {
            assert!(require_team_number("team_number", value).is_ok(), "{value}");
        }
    }

    #[test]
    fn test_team_number_rejects_malformed_values() {
        for value in ["", "123456", "A123", "12a", "12AB", "12 4"] {
            assert!(
                require_team_number("team_number", value).is_err(),
                "{value}"
            );
        }
    }

    #[test]
    fn test_valid_wrapper_requires_passing_validation() {
        let ok = Valid::new(42u64).unwrap();
        assert_eq!(*ok, 42);
        assert_eq!(ok.into_inner(), 42);
    }
}
