//! Camp catalog.
//!
//! Camps are created and edited by organizers. The only field the engine
//! owns is `participant_count`, which changes exclusively through
//! [`CampCatalog::adjust_participant_count`] when a registration is joined
//! or cancelled.

use crate::types::{CampId, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A medical camp
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Camp {
    /// Camp ID
    pub id: CampId,
    /// Camp name
    pub name: String,
    /// Registration fee, snapshotted into each registration at join time
    pub fee: Money,
    /// When the camp takes place
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Venue
    pub location: String,
    /// Healthcare professional in charge
    pub healthcare_professional: String,
    /// Free-form description
    pub description: String,
    /// Hosted image URL
    pub image_url: Option<String>,
    /// Number of non-cancelled registrations for this camp
    pub participant_count: u32,
    /// When the camp was created
    pub created_at: DateTime<Utc>,
}

impl Camp {
    /// Builds a camp from an organizer's draft with no participants
    #[must_use]
    pub fn from_draft(id: CampId, draft: CampDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name.trim().to_string(),
            fee: draft.fee,
            scheduled_at: draft.scheduled_at,
            location: draft.location,
            healthcare_professional: draft.healthcare_professional,
            description: draft.description,
            image_url: draft.image_url,
            participant_count: 0,
            created_at,
        }
    }

    fn apply_draft(&mut self, draft: CampDraft) {
        self.name = draft.name.trim().to_string();
        self.fee = draft.fee;
        self.scheduled_at = draft.scheduled_at;
        self.location = draft.location;
        self.healthcare_professional = draft.healthcare_professional;
        self.description = draft.description;
        self.image_url = draft.image_url;
    }
}

/// Organizer-editable camp fields
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampDraft {
    /// Camp name
    pub name: String,
    /// Registration fee
    pub fee: Money,
    /// When the camp takes place
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Venue
    pub location: String,
    /// Healthcare professional in charge
    pub healthcare_professional: String,
    /// Free-form description
    pub description: String,
    /// Hosted image URL
    pub image_url: Option<String>,
}

impl CampDraft {
    /// Creates a draft with a name and fee; other fields start empty
    #[must_use]
    pub fn new(name: impl Into<String>, fee: Money) -> Self {
        Self {
            name: name.into(),
            fee,
            ..Self::default()
        }
    }

    /// Sets the venue
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Sets the healthcare professional
    #[must_use]
    pub fn with_professional(mut self, professional: impl Into<String>) -> Self {
        self.healthcare_professional = professional.into();
        self
    }

    /// Sets the schedule
    #[must_use]
    pub const fn with_schedule(mut self, scheduled_at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(scheduled_at);
        self
    }

    /// Sets the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// All known camps, in creation order
#[derive(Clone, Debug, Default)]
pub struct CampCatalog {
    camps: HashMap<CampId, Camp>,
    order: Vec<CampId>,
}

impl CampCatalog {
    /// Creates an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a catalog from stored camps, keeping their order
    #[must_use]
    pub fn from_camps(camps: impl IntoIterator<Item = Camp>) -> Self {
        let mut catalog = Self::new();
        for camp in camps {
            catalog.insert(camp);
        }
        catalog
    }

    /// Looks up a camp
    #[must_use]
    pub fn get(&self, id: &CampId) -> Option<&Camp> {
        self.camps.get(id)
    }

    /// Whether the camp exists
    #[must_use]
    pub fn contains(&self, id: &CampId) -> bool {
        self.camps.contains_key(id)
    }

    /// Number of camps
    #[must_use]
    pub fn len(&self) -> usize {
        self.camps.len()
    }

    /// Whether the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.camps.is_empty()
    }

    /// All camps in creation order
    pub fn iter(&self) -> impl Iterator<Item = &Camp> {
        self.order.iter().filter_map(|id| self.camps.get(id))
    }

    /// Adds a camp, replacing any camp with the same id
    pub fn insert(&mut self, camp: Camp) {
        if self.camps.insert(camp.id, camp.clone()).is_none() {
            self.order.push(camp.id);
        }
    }

    /// Applies an organizer edit; the participant count is left untouched
    pub fn update(&mut self, id: &CampId, draft: CampDraft) -> Option<&Camp> {
        let camp = self.camps.get_mut(id)?;
        camp.apply_draft(draft);
        Some(camp)
    }

    /// Removes a camp
    pub fn remove(&mut self, id: &CampId) -> Option<Camp> {
        let camp = self.camps.remove(id)?;
        self.order.retain(|other| other != id);
        Some(camp)
    }

    /// Moves a camp's participant count by `delta`, clamping at zero
    ///
    /// Returns the new count, or `None` for an unknown camp.
    pub(crate) fn adjust_participant_count(&mut self, id: &CampId, delta: i64) -> Option<u32> {
        let camp = self.camps.get_mut(id)?;
        let next = i64::from(camp.participant_count).saturating_add(delta);
        camp.participant_count = u32::try_from(next.max(0)).unwrap_or(u32::MAX);
        Some(camp.participant_count)
    }
}
