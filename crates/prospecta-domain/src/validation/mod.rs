//! Key validation.
//!
//! Keys are checked before any load is issued so a malformed value never
//! reaches a batch:
//! - Base-ids are 1 to 8 ASCII digits (the CNPJ root, usually zero-padded)
//! - Activity codes are non-empty after trimming

use crate::error::{DomainError, DomainResult};

/// Maximum length of a company base-id.
pub const BASE_ID_MAX_LEN: usize = 8;

/// Validates a company base-id and returns it trimmed.
pub fn validate_base_id(value: &str) -> DomainResult<&str> {
    let trimmed = value.trim();
    let reason = if trimmed.is_empty() {
        Some("base-id is empty")
    } else if trimmed.len() > BASE_ID_MAX_LEN {
        Some("base-id is longer than 8 digits")
    } else if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        Some("base-id must contain only digits")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(DomainError::MalformedKey {
            value: value.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(trimmed),
    }
}

/// Validates an activity code and returns it trimmed.
pub fn validate_activity_code(value: &str) -> DomainResult<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::MalformedKey {
            value: value.to_string(),
            reason: "activity code is empty".to_string(),
        });
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_accepts_short_and_full_base_ids() {
        assert_eq!(validate_base_id("001").unwrap(), "001");
        assert_eq!(validate_base_id("11222333").unwrap(), "11222333");
        assert_eq!(validate_base_id(" 11222333 ").unwrap(), "11222333");
    }

    #[test]
    fn test_rejects_malformed_base_ids() {
        for bad in ["", "   ", "123456789", "12a45678", "11.222.333"] {
            let err = validate_base_id(bad).unwrap_err();
            assert!(
                matches!(err, DomainError::MalformedKey { .. }),
                "expected malformed key for {bad:?}"
            );
        }
    }

    #[test]
    fn test_activity_code_must_not_be_blank() {
        assert_eq!(validate_activity_code(" 62.01 ").unwrap(), "62.01");
        assert!(validate_activity_code("  ").is_err());
    }

    proptest! {
        #[test]
        fn test_any_digit_string_up_to_eight_is_valid(id in "[0-9]{1,8}") {
            prop_assert_eq!(validate_base_id(&id).unwrap(), id.as_str());
        }

        #[test]
        fn test_longer_digit_strings_are_rejected(id in "[0-9]{9,14}") {
            prop_assert!(validate_base_id(&id).is_err());
        }
    }
}
