//! Common validation rules shared across request payloads.

use validator::ValidationError;

/// Strips spaces, dashes, dots and parentheses, keeping a leading `+`.
pub fn normalize_phone(phone: &str) -> String {
    let trimmed = phone.trim();
    let mut normalized = String::with_capacity(trimmed.len());
    for (idx, c) in trimmed.chars().enumerate() {
        if c.is_ascii_digit() || (idx == 0 && c == '+') {
            normalized.push(c);
        }
    }
    normalized
}

/// Validates phone format.
///
/// Requirements:
/// - Only digits after normalisation, optional leading `+`
/// - 7-15 digits (E.164 upper bound)
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone
        .trim()
        .chars()
        .any(|c| !(c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '.' | '(' | ')')))
    {
        return Err(ValidationError::new("phone_invalid_characters"));
    }
    let digits = normalize_phone(phone).trim_start_matches('+').len();
    if !(7..=15).contains(&digits) {
        return Err(ValidationError::new("phone_invalid_length"));
    }
    Ok(())
}

/// Validates a device identifier.
///
/// Requirements:
/// - 1-128 characters
/// - Printable ASCII without whitespace
pub fn validate_device_id(device_id: &str) -> Result<(), ValidationError> {
    if device_id.is_empty() || device_id.len() > 128 {
        return Err(ValidationError::new("device_id_invalid_length"));
    }
    if !device_id.chars().all(|c| c.is_ascii_graphic()) {
        return Err(ValidationError::new("device_id_invalid_characters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_phone_keeps_leading_plus_only() {
        assert_eq!(normalize_phone(" +63 (917) 555-0101 "), "+639175550101");
        assert_eq!(normalize_phone("0917+555"), "0917555");
    }

    #[test]
    fn phone_rejects_letters() {
        assert!(validate_phone("0917-CALL-ME").is_err());
    }

    #[test]
    fn phone_rejects_too_short() {
        assert!(validate_phone("12345").is_err());
    }

    #[test]
    fn phone_accepts_valid() {
        assert!(validate_phone("+63 917 555 0101").is_ok());
    }

    #[test]
    fn device_id_rejects_empty_and_whitespace() {
        assert!(validate_device_id("").is_err());
        assert!(validate_device_id("dev A").is_err());
    }

    #[test]
    fn device_id_accepts_uuid_like_values() {
        assert!(validate_device_id("6f1c2d1e-2b7a-4d39-9a0e-0d5e8c1f4a11").is_ok());
    }
}
