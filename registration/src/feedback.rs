//! Feedback ledger.
//!
//! Holds at most one entry per registration. Submitting again for the same
//! registration replaces the rating and comment in place; deleting an entry
//! never touches the registration it came from.

use crate::error::{EntityKind, RegistrationError, Result};
use crate::types::{CampId, FeedbackId, Participant, RegistrationId, email_key};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A rating from 1 to 5
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    /// Lowest rating
    pub const MIN: u8 = 1;
    /// Highest rating
    pub const MAX: u8 = 5;

    /// Creates a rating
    ///
    /// # Errors
    ///
    /// Returns a validation error outside `1..=5`.
    pub fn new(value: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Self::out_of_range(value))
        }
    }

    fn out_of_range(value: impl fmt::Display) -> RegistrationError {
        RegistrationError::validation(format!(
            "rating must be between {} and {}, got {value}",
            Self::MIN,
            Self::MAX
        ))
    }

    /// The numeric value
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = RegistrationError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<i64> for Rating {
    type Error = RegistrationError;

    fn try_from(value: i64) -> Result<Self> {
        u8::try_from(value)
            .map_err(|_| Self::out_of_range(value))
            .and_then(Self::new)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/5", self.0)
    }
}

/// Feedback left on a confirmed registration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    /// Feedback ID
    pub id: FeedbackId,
    /// Originating registration (weak reference)
    pub registration_id: RegistrationId,
    /// Camp the registration was for
    pub camp_id: CampId,
    /// Camp name at join time
    pub camp_name: String,
    /// Author
    pub participant: Participant,
    /// Rating
    pub rating: Rating,
    /// Free-text comment
    pub comment: String,
    /// When the entry was last submitted
    pub submitted_at: DateTime<Utc>,
}

/// Feedback entries, one per registration at most
#[derive(Clone, Debug, Default)]
pub struct FeedbackLedger {
    entries: HashMap<FeedbackId, FeedbackEntry>,
    by_registration: HashMap<RegistrationId, FeedbackId>,
    order: Vec<FeedbackId>,
}

impl FeedbackLedger {
    /// Creates an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a ledger from stored entries
    ///
    /// # Errors
    ///
    /// Returns `Validation` if a feedback id repeats or a registration has
    /// more than one entry.
    pub fn from_entries(entries: impl IntoIterator<Item = FeedbackEntry>) -> Result<Self> {
        let mut ledger = Self::new();
        for entry in entries {
            if ledger.entries.contains_key(&entry.id) {
                return Err(RegistrationError::validation(format!(
                    "feedback {} appears more than once",
                    entry.id
                )));
            }
            if let Some(existing) = ledger.by_registration.get(&entry.registration_id) {
                return Err(RegistrationError::validation(format!(
                    "registration {} has feedback {} and {}",
                    entry.registration_id, existing, entry.id
                )));
            }
            ledger.upsert(entry);
        }
        Ok(ledger)
    }

    /// Looks up an entry
    #[must_use]
    pub fn get(&self, id: &FeedbackId) -> Option<&FeedbackEntry> {
        self.entries.get(id)
    }

    /// Looks up an entry, failing with `NotFound`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    pub fn require(&self, id: &FeedbackId) -> Result<&FeedbackEntry> {
        self.get(id)
            .ok_or_else(|| RegistrationError::not_found(EntityKind::Feedback, id))
    }

    /// The entry for a registration, if one exists
    #[must_use]
    pub fn for_registration(&self, registration_id: &RegistrationId) -> Option<&FeedbackEntry> {
        self.by_registration
            .get(registration_id)
            .and_then(|id| self.entries.get(id))
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in first-submission order
    pub fn iter(&self) -> impl Iterator<Item = &FeedbackEntry> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    /// Entries written by a participant
    #[must_use]
    pub fn for_participant(&self, email: &str) -> Vec<&FeedbackEntry> {
        let key = email_key(email);
        self.iter()
            .filter(|e| e.participant.email_key() == key)
            .collect()
    }

    /// Entries for a camp
    #[must_use]
    pub fn for_camp(&self, camp_id: &CampId) -> Vec<&FeedbackEntry> {
        self.iter().filter(|e| e.camp_id == *camp_id).collect()
    }

    /// Mean rating for a camp, `None` without feedback
    #[must_use]
    pub fn average_rating(&self, camp_id: &CampId) -> Option<f64> {
        let ratings: Vec<u8> = self
            .for_camp(camp_id)
            .iter()
            .map(|e| e.rating.value())
            .collect();
        if ratings.is_empty() {
            return None;
        }
        let total: u32 = ratings.iter().map(|&r| u32::from(r)).sum();
        let count = u32::try_from(ratings.len()).ok()?;
        Some(f64::from(total) / f64::from(count))
    }

    /// Inserts an entry, or replaces the entry with the same id
    pub(crate) fn upsert(&mut self, entry: FeedbackEntry) {
        let id = entry.id;
        self.by_registration.insert(entry.registration_id, id);
        if self.entries.insert(id, entry).is_none() {
            self.order.push(id);
        }
    }

    pub(crate) fn remove(&mut self, id: &FeedbackId) -> Option<FeedbackEntry> {
        let entry = self.entries.remove(id)?;
        self.by_registration.remove(&entry.registration_id);
        self.order.retain(|other| other != id);
        Some(entry)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use medcamp_testing::test_epoch;

    fn entry(camp_id: CampId, email: &str, rating: u8) -> FeedbackEntry {
        FeedbackEntry {
            id: FeedbackId::new(),
            registration_id: RegistrationId::new(),
            camp_id,
            camp_name: "Eye Care".to_string(),
            participant: Participant::new("Someone", email),
            rating: Rating::new(rating).unwrap(),
            comment: "thanks".to_string(),
            submitted_at: test_epoch(),
        }
    }

    #[test]
    fn test_rating_bounds() {
        assert!(Rating::new(0).is_err());
        assert_eq!(Rating::new(1).unwrap().value(), 1);
        assert_eq!(Rating::new(5).unwrap().to_string(), "5/5");
        assert_eq!(Rating::new(6).unwrap_err().kind(), "validation");
    }

    #[test]
    fn test_rating_deserialization_is_checked() {
        assert!(serde_json::from_str::<Rating>("4").is_ok());
        assert!(serde_json::from_str::<Rating>("9").is_err());
    }

    #[test]
    fn test_average_rating() {
        let camp = CampId::new();
        let mut ledger = FeedbackLedger::new();
        assert_eq!(ledger.average_rating(&camp), None);

        ledger.upsert(entry(camp, "a@example.com", 5));
        ledger.upsert(entry(camp, "b@example.com", 4));
        ledger.upsert(entry(CampId::new(), "c@example.com", 1));

        assert_eq!(ledger.average_rating(&camp), Some(4.5));
        assert_eq!(ledger.for_camp(&camp).len(), 2);
        assert_eq!(ledger.for_participant("A@EXAMPLE.COM").len(), 1);
    }

    #[test]
    fn test_upsert_replaces_and_remove_clears_index() {
        let mut ledger = FeedbackLedger::new();
        let first = entry(CampId::new(), "a@example.com", 2);
        let registration_id = first.registration_id;
        ledger.upsert(first.clone());

        let mut again = first.clone();
        again.rating = Rating::new(5).unwrap();
        ledger.upsert(again);

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.for_registration(&registration_id).unwrap().rating.value(), 5);

        ledger.remove(&first.id).unwrap();
        assert!(ledger.for_registration(&registration_id).is_none());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_from_entries_refuses_second_entry_for_a_registration() {
        let first = entry(CampId::new(), "a@example.com", 4);
        let mut second = first.clone();
        second.id = FeedbackId::new();

        let ledger = FeedbackLedger::from_entries([first.clone()]).unwrap();
        assert_eq!(ledger.len(), 1);

        let err = FeedbackLedger::from_entries([first.clone(), second]).unwrap_err();
        assert_eq!(err.kind(), "validation");
        let err = FeedbackLedger::from_entries([first.clone(), first]).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_rating_from_wide_integers() {
        assert_eq!(Rating::try_from(3_i64).unwrap().value(), 3);
        for value in [-1_i64, 0, 6, 256, 300] {
            assert_eq!(Rating::try_from(value).unwrap_err().kind(), "validation");
        }
    }
}
