//! Recipient address validation.

use crate::email_sender::EmailSendError;
use email_address::EmailAddress;
use std::str::FromStr;

/// Validate a recipient address before handing a message to the transport.
///
/// - Trims whitespace
/// - Validates RFC 5322 compliance
///
/// The address is not lowercased: it doubles as the identity value the
/// pending record was stored under.
pub fn email_validate(email: &str) -> Result<String, EmailSendError> {
    let trimmed = email.trim();

    let parsed = EmailAddress::from_str(trimmed)
        .map_err(|_| EmailSendError::InvalidAddress(trimmed.to_owned()))?;

    Ok(parsed.as_str().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        let result = email_validate("user@example.com");
        assert_eq!(result.unwrap(), "user@example.com");
    }

    #[test]
    fn test_keeps_case() {
        let result = email_validate("User@Example.COM");
        assert_eq!(result.unwrap(), "User@Example.COM");
    }

    #[test]
    fn test_trims_whitespace() {
        let result = email_validate("  user@example.com  ");
        assert_eq!(result.unwrap(), "user@example.com");
    }

    #[test]
    fn test_rejects_invalid_no_at() {
        let result = email_validate("userexample.com");
        assert!(matches!(result, Err(EmailSendError::InvalidAddress(_))));
    }

    #[test]
    fn test_rejects_invalid_no_domain() {
        assert!(email_validate("user@").is_err());
    }

    #[test]
    fn test_rejects_invalid_no_local() {
        assert!(email_validate("@example.com").is_err());
    }

    #[test]
    fn test_rejects_empty() {
        assert!(email_validate("").is_err());
        assert!(email_validate("   ").is_err());
    }
}
