// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Contact detail normalization shared by booking and profile edits.

/// Number of digits in a valid phone number.
pub const PHONE_DIGITS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContactError {
    #[error("Please fill in all required fields")]
    MissingName,

    #[error("Please enter a valid phone number")]
    InvalidPhone,
}

/// Strip every non-digit and keep at most the first ten digits, the same
/// way the phone input field does while typing.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit())
        .take(PHONE_DIGITS)
        .collect()
}

/// Validate a name/phone pair, returning the trimmed name and normalized phone.
pub fn validate_contact(name: &str, phone: &str) -> Result<(String, String), ContactError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ContactError::MissingName);
    }

    let phone = normalize_phone(phone);
    if phone.len() < PHONE_DIGITS {
        return Err(ContactError::InvalidPhone);
    }

    Ok((name.to_string(), phone))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_noise() {
        assert_eq!(normalize_phone("98-76 54a3210x"), "9876543210");
    }

    #[test]
    fn test_normalize_truncates_extra_digits() {
        assert_eq!(normalize_phone("+91 98765 43210"), "9198765432");
    }

    #[test]
    fn test_short_phone_rejected() {
        assert_eq!(
            validate_contact("Asha Rao", "12345"),
            Err(ContactError::InvalidPhone)
        );
    }

    #[test]
    fn test_blank_name_rejected() {
        assert_eq!(
            validate_contact("   ", "9876543210"),
            Err(ContactError::MissingName)
        );
    }

    #[test]
    fn test_valid_contact() {
        assert_eq!(
            validate_contact(" Asha Rao ", "98-76 54a3210x"),
            Ok(("Asha Rao".to_string(), "9876543210".to_string()))
        );
    }
}
