//! Stateless phone-number and amount validation for the Kenyan numbering
//! plan and the gateway's whole-shilling amounts.

use crate::payments::error::{PaymentError, PaymentResult};
use regex::Regex;
use std::sync::OnceLock;

fn msisdn_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(254|0)?[17]\d{8}$").expect("static regex is valid")
    })
}

/// Canonicalize a subscriber number to international format (`254XXXXXXXXX`).
///
/// Idempotent: normalizing an already-normalized number is a no-op.
pub fn normalize_phone(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '+')
        .collect();

    if let Some(rest) = cleaned.strip_prefix('0') {
        return format!("254{}", rest);
    }
    if !cleaned.starts_with("254") {
        return format!("254{}", cleaned);
    }
    cleaned
}

/// Accept Kenyan mobile numbers in international (`254...`), national-trunk
/// (`07.../01...`) or bare nine-digit form.
pub fn validate_phone(raw: &str) -> PaymentResult<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '+')
        .collect();

    if !msisdn_pattern().is_match(&cleaned) {
        return Err(PaymentError::ValidationError {
            message: "Please provide a valid Kenyan phone number".to_string(),
            field: Some("phone_number".to_string()),
        });
    }
    Ok(normalize_phone(&cleaned))
}

/// The gateway's currency has no sub-unit granularity: fractional amounts are
/// rejected outright rather than rounded.
pub fn validate_amount(amount: f64, min: i64, max: i64) -> PaymentResult<i64> {
    if !amount.is_finite() || amount.fract() != 0.0 {
        return Err(PaymentError::ValidationError {
            message: "Amount must be a whole number of shillings".to_string(),
            field: Some("amount".to_string()),
        });
    }
    let whole = amount as i64;
    if whole < min || whole > max {
        return Err(PaymentError::ValidationError {
            message: format!("Amount must be between {} and {} KES", min, max),
            field: Some("amount".to_string()),
        });
    }
    Ok(whole)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_canonicalizes_all_input_forms() {
        assert_eq!(normalize_phone("0712345678"), "254712345678");
        assert_eq!(normalize_phone("+254712345678"), "254712345678");
        assert_eq!(normalize_phone("712345678"), "254712345678");
        assert_eq!(normalize_phone("254 712-345-678"), "254712345678");
    }

    #[test]
    fn normalization_is_idempotent() {
        for input in ["0712345678", "+254712345678", "712345678", "0110000000"] {
            let once = normalize_phone(input);
            assert_eq!(normalize_phone(&once), once, "input {}", input);
        }
    }

    #[test]
    fn phone_validation_accepts_safaricom_forms() {
        assert!(validate_phone("0712345678").is_ok());
        assert!(validate_phone("254712345678").is_ok());
        assert!(validate_phone("712345678").is_ok());
        assert!(validate_phone("+254 110 000 000").is_ok());
    }

    #[test]
    fn phone_validation_rejects_foreign_and_short_numbers() {
        assert!(validate_phone("0812345678").is_err());
        assert!(validate_phone("25571234567").is_err());
        assert!(validate_phone("07123").is_err());
        assert!(validate_phone("not-a-number").is_err());
    }

    #[test]
    fn amount_boundaries_are_inclusive() {
        assert_eq!(validate_amount(10.0, 10, 150_000).unwrap(), 10);
        assert_eq!(validate_amount(150_000.0, 10, 150_000).unwrap(), 150_000);
        assert!(validate_amount(9.0, 10, 150_000).is_err());
        assert!(validate_amount(150_001.0, 10, 150_000).is_err());
    }

    #[test]
    fn fractional_amounts_are_rejected() {
        assert!(validate_amount(10.5, 10, 150_000).is_err());
        assert!(validate_amount(f64::NAN, 10, 150_000).is_err());
    }
}
