//! Input validation for join forms, camp drafts and feedback.
//!
//! Every check returns [`RegistrationError::Validation`] naming the
//! offending field. Validation never looks at stored state; lookups and
//! duplicate checks happen in the reducer.

use crate::catalog::CampDraft;
use crate::error::{RegistrationError, Result};
use crate::types::{Gender, JoinForm, Money, Participant, RegistrationDetails};
use serde::{Deserialize, Serialize};

/// Default upper bound for participant age
pub const DEFAULT_MAX_AGE: u32 = 150;

/// Minimum number of digits in a phone number
pub const MIN_PHONE_DIGITS: usize = 7;

/// Maximum number of digits in a phone number
pub const MAX_PHONE_DIGITS: usize = 15;

/// Tunable validation limits
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRules {
    /// Oldest accepted participant age, inclusive
    pub max_age: u32,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_MAX_AGE,
        }
    }
}

/// Validates a participant identity: name and email must be non-blank
///
/// # Errors
///
/// Returns a validation error naming the blank field.
pub fn validate_participant(participant: &Participant) -> Result<()> {
    require_non_blank("participant name", &participant.name)?;
    require_non_blank("participant email", &participant.email)
}

/// Validates a join form and produces typed registration details
///
/// # Errors
///
/// Returns a validation error for a missing or out-of-range age, a malformed
/// phone number, an unknown gender or a blank emergency contact.
pub fn validate_join(form: &JoinForm, rules: &ValidationRules) -> Result<RegistrationDetails> {
    let age = validate_age(form.age, rules)?;
    validate_phone(&form.phone)?;
    let gender = parse_gender(&form.gender)?;
    require_non_blank("emergency contact", &form.emergency_contact)?;

    Ok(RegistrationDetails {
        age,
        phone: form.phone.trim().to_string(),
        gender,
        emergency_contact: form.emergency_contact.trim().to_string(),
    })
}

/// Age must be present, positive and no greater than `rules.max_age`
///
/// # Errors
///
/// Returns a validation error otherwise.
pub fn validate_age(age: Option<u32>, rules: &ValidationRules) -> Result<u32> {
    match age {
        None => Err(RegistrationError::validation("age is required")),
        Some(0) => Err(RegistrationError::validation("age must be greater than 0")),
        Some(age) if age > rules.max_age => Err(RegistrationError::validation(format!(
            "age must be at most {}",
            rules.max_age
        ))),
        Some(age) => Ok(age),
    }
}

/// Phone numbers: optional leading `+`, then digits separated by spaces,
/// dashes or parentheses, with 7 to 15 digits in total
///
/// # Errors
///
/// Returns a validation error otherwise.
pub fn validate_phone(phone: &str) -> Result<()> {
    let phone = phone.trim();
    if phone.is_empty() {
        return Err(RegistrationError::validation("phone is required"));
    }

    let body = phone.strip_prefix('+').unwrap_or(phone);
    let mut digits = 0usize;
    for c in body.chars() {
        match c {
            '0'..='9' => digits += 1,
            ' ' | '-' | '(' | ')' => {},
            other => {
                return Err(RegistrationError::validation(format!(
                    "phone contains invalid character '{other}'"
                )));
            },
        }
    }

    if (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits) {
        Ok(())
    } else {
        Err(RegistrationError::validation(format!(
            "phone must contain {MIN_PHONE_DIGITS} to {MAX_PHONE_DIGITS} digits, found {digits}"
        )))
    }
}

/// Parses `Male`, `Female` or `Other`, ignoring case and surrounding space
///
/// # Errors
///
/// Returns a validation error for anything else.
pub fn parse_gender(gender: &str) -> Result<Gender> {
    match gender.trim().to_lowercase().as_str() {
        "male" => Ok(Gender::Male),
        "female" => Ok(Gender::Female),
        "other" => Ok(Gender::Other),
        "" => Err(RegistrationError::validation("gender is required")),
        _ => Err(RegistrationError::validation(format!(
            "gender must be Male, Female or Other, got '{}'",
            gender.trim()
        ))),
    }
}

/// Camps need a non-blank name; the fee is a [`Money`] and so already
/// non-negative
///
/// # Errors
///
/// Returns a validation error for a blank name.
pub fn validate_camp_draft(draft: &CampDraft) -> Result<()> {
    require_non_blank("camp name", &draft.name)
}

/// Parses a decimal fee such as `"25.50"`
///
/// # Errors
///
/// Returns a validation error for negative or malformed amounts.
pub fn parse_fee(input: &str) -> Result<Money> {
    input
        .parse()
        .map_err(|e| RegistrationError::validation(format!("fee: {e}")))
}

/// Fails when `value` is empty or whitespace only
///
/// # Errors
///
/// Returns a validation error naming `field`.
pub fn require_non_blank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(RegistrationError::validation(format!("{field} is required")))
    } else {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn form() -> JoinForm {
        JoinForm::new(34, "+1 (555) 123-4567", "female", "Bob, +1 555 765 4321")
    }

    fn message(err: RegistrationError) -> String {
        match err {
            RegistrationError::Validation { message } => message,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_form() {
        let details = validate_join(&form(), &ValidationRules::default()).unwrap();
        assert_eq!(details.age, 34);
        assert_eq!(details.gender, Gender::Female);
        assert_eq!(details.phone, "+1 (555) 123-4567");
    }

    #[test]
    fn test_age_bounds() {
        let rules = ValidationRules::default();
        assert!(message(validate_age(None, &rules).unwrap_err()).contains("required"));
        assert!(message(validate_age(Some(0), &rules).unwrap_err()).contains("greater than 0"));
        assert!(validate_age(Some(1), &rules).is_ok());
        assert!(validate_age(Some(150), &rules).is_ok());
        assert!(validate_age(Some(151), &rules).is_err());

        let strict = ValidationRules { max_age: 99 };
        assert!(validate_age(Some(100), &strict).is_err());
    }

    #[test]
    fn test_phone_format() {
        for ok in ["5551234", "+44 20 7946 0958", "(555) 123-4567", "123456789012345"] {
            assert!(validate_phone(ok).is_ok(), "rejected {ok:?}");
        }
        for bad in ["", "   ", "555123", "1234567890123456", "555-CALL-NOW", "+", "++5551234", "555.123.4567"] {
            assert!(validate_phone(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_gender_is_closed_set() {
        assert_eq!(parse_gender(" MALE ").unwrap(), Gender::Male);
        assert_eq!(parse_gender("Other").unwrap(), Gender::Other);
        assert!(message(parse_gender("").unwrap_err()).contains("required"));
        assert!(parse_gender("unknown").is_err());
    }

    #[test]
    fn test_emergency_contact_required() {
        let mut form = form();
        form.emergency_contact = "  ".to_string();
        let err = validate_join(&form, &ValidationRules::default()).unwrap_err();
        assert_eq!(message(err), "emergency contact is required");
    }

    #[test]
    fn test_camp_draft_and_fee() {
        let fee = parse_fee("25.50").unwrap();
        assert_eq!(fee.cents(), 2550);
        assert!(message(parse_fee("-3").unwrap_err()).starts_with("fee:"));

        assert!(validate_camp_draft(&CampDraft::new("Eye Care Camp", fee)).is_ok());
        assert!(validate_camp_draft(&CampDraft::new(" ", fee)).is_err());
    }

    #[test]
    fn test_participant_fields_required() {
        assert!(validate_participant(&Participant::new("Alice", "alice@example.com")).is_ok());
        assert!(validate_participant(&Participant::new("", "alice@example.com")).is_err());
        assert!(validate_participant(&Participant::new("Alice", " ")).is_err());
    }
}
