use std::fmt;

use crate::domain::Recipient;

pub const CURRENCY_MAX_LEN: usize = 12;
pub const NOTE_MAX_LEN: usize = 2000;

/// Countries whose payout rails need a bank code (CLABE for Mexico).
pub const BANK_CODE_REQUIRED_COUNTRIES: &[&str] = &["MX"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_currency(currency: &str) -> ValidationResult {
    validate_required("currency", currency)?;
    validate_max_len("currency", currency, CURRENCY_MAX_LEN)?;
    if !currency.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::new("currency", "must be alphanumeric"));
    }

    Ok(())
}

/// Checks the recipient fields every payout rail needs before any provider
/// call is attempted.
pub fn validate_recipient(recipient: &Recipient, currency: &str) -> ValidationResult {
    validate_required("recipient.name", &recipient.name)?;
    validate_required("recipient.bankName", &recipient.bank_name)?;
    validate_required("recipient.account", &recipient.account)?;
    validate_required("recipient.country", &recipient.country)?;
    validate_currency(currency)?;

    let needs_bank_code = BANK_CODE_REQUIRED_COUNTRIES
        .iter()
        .any(|country| recipient.country.eq_ignore_ascii_case(country));
    let has_bank_code = recipient
        .bank_code
        .as_deref()
        .map(|code| !code.trim().is_empty())
        .unwrap_or(false);
    if needs_bank_code && !has_bank_code {
        return Err(ValidationError::new(
            "recipient.bankCode",
            format!("is required for payouts to {}", recipient.country),
        ));
    }

    Ok(())
}

pub fn validate_notes(notes: &[String]) -> ValidationResult {
    for note in notes {
        validate_max_len("notes", note, NOTE_MAX_LEN)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient(country: &str, bank_code: Option<&str>) -> Recipient {
        Recipient {
            name: "Ana Lopez".to_string(),
            account: "012345678901234567".to_string(),
            bank_name: "BBVA".to_string(),
            bank_code: bank_code.map(str::to_string),
            country: country.to_string(),
        }
    }

    #[test]
    fn test_sanitize_string_collapses_whitespace() {
        assert_eq!(sanitize_string("  Ana \n\t Lopez "), "Ana Lopez");
    }

    #[test]
    fn test_valid_recipient() {
        assert!(validate_recipient(&recipient("CO", None), "COP").is_ok());
        assert!(validate_recipient(&recipient("MX", Some("012")), "MXN").is_ok());
    }

    #[test]
    fn test_mexico_requires_bank_code() {
        let err = validate_recipient(&recipient("MX", None), "MXN").unwrap_err();
        assert_eq!(err.field, "recipient.bankCode");

        let err = validate_recipient(&recipient("mx", Some("  ")), "MXN").unwrap_err();
        assert_eq!(err.field, "recipient.bankCode");
    }

    #[test]
    fn test_missing_recipient_fields() {
        let mut r = recipient("CO", None);
        r.name = " ".to_string();
        assert_eq!(validate_recipient(&r, "COP").unwrap_err().field, "recipient.name");

        let mut r = recipient("CO", None);
        r.bank_name.clear();
        assert_eq!(validate_recipient(&r, "COP").unwrap_err().field, "recipient.bankName");

        let mut r = recipient("CO", None);
        r.country.clear();
        assert_eq!(validate_recipient(&r, "COP").unwrap_err().field, "recipient.country");

        assert_eq!(
            validate_recipient(&recipient("CO", None), "").unwrap_err().field,
            "currency"
        );
    }

    #[test]
    fn test_note_length_limit() {
        let long = "x".repeat(NOTE_MAX_LEN + 1);
        assert!(validate_notes(&["ok".to_string()]).is_ok());
        assert!(validate_notes(&[long]).is_err());
    }
}
