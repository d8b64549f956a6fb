//! Domain types for the medical camp registration engine.
//!
//! Identifiers, money, participant identity and the join-form details.
//! Values here are plain data; the rules that check them live in
//! [`crate::validation`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a camp
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CampId(Uuid);

impl CampId {
    /// Creates a new random `CampId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `CampId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CampId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CampId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a registration
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegistrationId(Uuid);

impl RegistrationId {
    /// Creates a new random `RegistrationId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `RegistrationId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RegistrationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a feedback entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeedbackId(Uuid);

impl FeedbackId {
    /// Creates a new random `FeedbackId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for FeedbackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FeedbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// A non-negative amount of money, stored in cents
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from whole currency units with overflow checking
    #[must_use]
    pub const fn checked_from_units(units: u64) -> Option<Self> {
        match units.checked_mul(100) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Returns the whole units (rounded down)
    #[must_use]
    pub const fn units(&self) -> u64 {
        self.0 / 100
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two amounts, saturating at the maximum representable value
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.units(), self.0 % 100)
    }
}

/// Error returned when a decimal fee string cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid amount '{0}': expected a non-negative decimal with at most two fraction digits")]
pub struct ParseMoneyError(String);

impl FromStr for Money {
    type Err = ParseMoneyError;

    /// Parses `"25"`, `"25.5"`, `"25.50"` or `"$25.50"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseMoneyError(s.to_string());
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed);

        let (whole, fraction) = match trimmed.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (trimmed, ""),
        };

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        if fraction.len() > 2 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        if trimmed.ends_with('.') {
            return Err(err());
        }

        let units: u64 = whole.parse().map_err(|_| err())?;
        let cents: u64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<u64>().map_err(|_| err())? * 10,
            _ => fraction.parse().map_err(|_| err())?,
        };

        Self::checked_from_units(units)
            .and_then(|m| m.0.checked_add(cents))
            .map(Self)
            .ok_or_else(err)
    }
}

// ============================================================================
// Participants
// ============================================================================

/// Participant identity as supplied by the identity provider
///
/// Both fields are opaque; only non-blankness is checked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Display name
    pub name: String,
    /// Email address, used as the participant key
    pub email: String,
}

impl Participant {
    /// Creates a participant
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Case-insensitive key used for duplicate detection and lookups
    #[must_use]
    pub fn email_key(&self) -> String {
        email_key(&self.email)
    }
}

/// Normalizes an email for comparisons
#[must_use]
pub fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Gender as captured on the join form
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    /// Male
    Male,
    /// Female
    Female,
    /// Other
    Other,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Male => write!(f, "Male"),
            Self::Female => write!(f, "Female"),
            Self::Other => write!(f, "Other"),
        }
    }
}

/// Join-form details exactly as submitted
///
/// Nothing here is trusted; [`crate::validation::validate_join`] turns it
/// into [`RegistrationDetails`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinForm {
    /// Age in years
    pub age: Option<u32>,
    /// Phone number
    pub phone: String,
    /// Gender as free text
    pub gender: String,
    /// Emergency contact
    pub emergency_contact: String,
}

impl JoinForm {
    /// Convenience constructor for a fully filled-in form
    #[must_use]
    pub fn new(
        age: u32,
        phone: impl Into<String>,
        gender: impl Into<String>,
        emergency_contact: impl Into<String>,
    ) -> Self {
        Self {
            age: Some(age),
            phone: phone.into(),
            gender: gender.into(),
            emergency_contact: emergency_contact.into(),
        }
    }
}

/// Validated registration details
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationDetails {
    /// Age in years (at least 1)
    pub age: u32,
    /// Phone number as entered
    pub phone: String,
    /// Gender
    pub gender: Gender,
    /// Emergency contact
    pub emergency_contact: String,
}

/// Transaction id handed over by the payment gateway
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentReference(String);

impl PaymentReference {
    /// Wraps a gateway transaction id
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// The raw transaction id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PaymentReference {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(2550).to_string(), "$25.50");
        assert_eq!(Money::ZERO.to_string(), "$0.00");
    }

    #[test]
    fn test_money_parse() {
        assert_eq!("25".parse::<Money>(), Ok(Money::from_cents(2500)));
        assert_eq!("25.5".parse::<Money>(), Ok(Money::from_cents(2550)));
        assert_eq!("$25.05".parse::<Money>(), Ok(Money::from_cents(2505)));
        assert_eq!(" 0.00 ".parse::<Money>(), Ok(Money::ZERO));
    }

    #[test]
    fn test_money_parse_rejects_malformed() {
        for input in ["", "-5", "abc", "1.234", "1.", ".5", "1,50", "99999999999999999999"] {
            assert!(input.parse::<Money>().is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn test_money_saturating_add() {
        let sum = Money::from_cents(150).saturating_add(Money::from_cents(250));
        assert_eq!(sum.cents(), 400);
        assert_eq!(Money::from_cents(u64::MAX).saturating_add(sum).cents(), u64::MAX);
    }

    #[test]
    fn test_email_key_is_case_insensitive() {
        let participant = Participant::new("Alice", "  Alice@Example.COM ");
        assert_eq!(participant.email_key(), "alice@example.com");
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(CampId::new(), CampId::new());
        assert_ne!(RegistrationId::new(), RegistrationId::new());
        assert_ne!(FeedbackId::new(), FeedbackId::new());
    }
}
