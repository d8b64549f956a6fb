//! The registration engine: an async facade over the registry [`Store`].
//!
//! Each operation sends one command and reads its outcome inside the same
//! write-lock acquisition, so the value returned is exactly what that
//! command produced. Applied events are published to subscribers in commit
//! order before the lock is released.

use crate::catalog::{Camp, CampDraft};
use crate::config::Config;
use crate::error::{EntityKind, RegistrationError, Result};
use crate::feedback::FeedbackEntry;
use crate::metrics;
use crate::reducer::{
    CommandOutcome, RegistryAction, RegistryEnvironment, RegistryEvent, RegistryReducer,
    RegistrySnapshot, RegistryState,
};
use crate::registration::{PaymentRecord, Registration, RegistrationStatus};
use crate::types::{
    CampId, FeedbackId, JoinForm, Money, Participant, PaymentReference, RegistrationId,
};
use chrono::{DateTime, Utc};
use medcamp_core::environment::{Clock, SystemClock};
use medcamp_runtime::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// The store type behind the engine
pub type RegistryStore = Store<RegistryState, RegistryAction, RegistryEnvironment, RegistryReducer>;

/// Per-participant analytics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSummary {
    /// Registrations ever made, cancelled ones included
    pub registrations: usize,
    /// Joined and unpaid
    pub joined: usize,
    /// Paid, awaiting confirmation
    pub paid: usize,
    /// Confirmed
    pub confirmed: usize,
    /// Cancelled
    pub cancelled: usize,
    /// Sum of every payment recorded for the participant
    pub total_paid: Money,
}

/// Registration lifecycle engine
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct RegistrationEngine {
    store: RegistryStore,
    events: broadcast::Sender<RegistryEvent>,
    shutdown_timeout: Duration,
}

impl RegistrationEngine {
    /// Creates an empty engine using the system clock
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates an empty engine with an injected clock
    #[must_use]
    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self::from_state(RegistryState::default(), config, clock)
    }

    /// Restores an engine from a snapshot
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the snapshot is inconsistent, see
    /// [`RegistryState::from_snapshot`].
    pub fn from_snapshot(
        snapshot: RegistrySnapshot,
        config: &Config,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let state = RegistryState::from_snapshot(snapshot)?;
        tracing::info!(
            camps = state.catalog.len(),
            registrations = state.book.len(),
            feedback = state.ledger.len(),
            "Registry restored from snapshot"
        );
        Ok(Self::from_state(state, config, clock))
    }

    fn from_state(state: RegistryState, config: &Config, clock: Arc<dyn Clock>) -> Self {
        metrics::set_active_registrations(state.book.active_count());
        let environment = RegistryEnvironment::new(clock, config.validation_rules());
        let (events, _) = broadcast::channel(config.event_channel_capacity.max(1));

        Self {
            store: Store::new(state, RegistryReducer::new(), environment),
            events,
            shutdown_timeout: config.shutdown_timeout(),
        }
    }

    /// Sends `action` and reads its result under the same write lock
    async fn execute<T, F>(&self, action: RegistryAction, read: F) -> Result<T>
    where
        F: FnOnce(&RegistryState) -> Result<T>,
    {
        let command = action.name();
        let events = &self.events;

        let (outcome, _effects) = self
            .store
            .send_and_inspect(action, |state| match state.last_outcome.take() {
                Some(CommandOutcome::Applied(applied)) => {
                    if !applied.is_empty() {
                        metrics::set_active_registrations(state.book.active_count());
                    }
                    for event in applied {
                        // No subscribers is fine
                        let _ = events.send(event);
                    }
                    read(state)
                },
                Some(CommandOutcome::Rejected(error)) => Err(error),
                None => Err(RegistrationError::Unavailable {
                    reason: format!("{command} produced no outcome"),
                }),
            })
            .await?;

        match &outcome {
            Ok(_) => tracing::info!(command, "Command applied"),
            Err(error) => tracing::warn!(command, kind = error.kind(), %error, "Command rejected"),
        }
        outcome
    }

    // ========================================================================
    // Camp catalog
    // ========================================================================

    /// Creates a camp
    ///
    /// # Errors
    ///
    /// `Validation` for a blank name.
    #[tracing::instrument(skip(self, draft), fields(camp = %draft.name))]
    pub async fn create_camp(&self, draft: CampDraft) -> Result<Camp> {
        let camp_id = CampId::new();
        self.execute(RegistryAction::CreateCamp { camp_id, draft }, move |state| {
            require_camp(state, &camp_id)
        })
        .await
    }

    /// Replaces a camp's organizer-editable fields
    ///
    /// Registrations keep the fee they joined with.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown camp, `Validation` for a blank name.
    #[tracing::instrument(skip(self, draft))]
    pub async fn update_camp(&self, camp_id: CampId, draft: CampDraft) -> Result<Camp> {
        self.execute(RegistryAction::UpdateCamp { camp_id, draft }, move |state| {
            require_camp(state, &camp_id)
        })
        .await
    }

    /// Deletes a camp that has no active registrations
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown camp, `InvalidTransition` while registrations
    /// are active.
    #[tracing::instrument(skip(self))]
    pub async fn remove_camp(&self, camp_id: CampId) -> Result<()> {
        self.execute(RegistryAction::RemoveCamp { camp_id }, |_| Ok(()))
            .await
    }

    /// Looks up a camp
    pub async fn camp(&self, camp_id: CampId) -> Option<Camp> {
        self.store.state(|s| s.catalog.get(&camp_id).cloned()).await
    }

    /// All camps in creation order
    pub async fn camps(&self) -> Vec<Camp> {
        self.store.state(|s| s.catalog.iter().cloned().collect()).await
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Joins a camp
    ///
    /// Creates a `Joined` registration with the camp's current fee and
    /// increments the camp's participant count, atomically.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed form or identity, `NotFound` for an
    /// unknown camp, `DuplicateRegistration` if the participant already holds
    /// an active registration for the camp.
    #[tracing::instrument(skip(self, participant, form), fields(email = %participant.email))]
    pub async fn join(
        &self,
        camp_id: CampId,
        participant: Participant,
        form: JoinForm,
    ) -> Result<Registration> {
        let registration_id = RegistrationId::new();
        let action = RegistryAction::Join {
            registration_id,
            camp_id,
            participant,
            form,
        };
        self.execute(action, move |state| {
            state.book.require(&registration_id).cloned()
        })
        .await
    }

    /// Records a payment
    ///
    /// Re-delivery with the same reference is accepted and changes nothing.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown registration, `InvalidTransition` for a
    /// cancelled registration or a different reference than the one recorded.
    pub async fn mark_paid(
        &self,
        registration_id: RegistrationId,
        reference: impl Into<PaymentReference>,
    ) -> Result<Registration> {
        self.mark_paid_at(registration_id, reference.into(), None)
            .await
    }

    #[tracing::instrument(skip(self, reference), fields(reference = %reference))]
    pub(crate) async fn mark_paid_at(
        &self,
        registration_id: RegistrationId,
        reference: PaymentReference,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<Registration> {
        let action = RegistryAction::MarkPaid {
            registration_id,
            reference,
            paid_at,
        };
        self.execute(action, move |state| {
            state.book.require(&registration_id).cloned()
        })
        .await
    }

    /// Confirms a paid registration; confirming twice is a no-op
    ///
    /// # Errors
    ///
    /// `PaymentRequired` while unpaid, `InvalidTransition` once cancelled,
    /// `NotFound` for an unknown registration.
    #[tracing::instrument(skip(self))]
    pub async fn confirm(&self, registration_id: RegistrationId) -> Result<Registration> {
        self.execute(RegistryAction::Confirm { registration_id }, move |state| {
            state.book.require(&registration_id).cloned()
        })
        .await
    }

    /// Cancels a registration and decrements its camp's participant count
    ///
    /// # Errors
    ///
    /// `CancellationForbidden` once confirmed, `InvalidTransition` if already
    /// cancelled, `NotFound` for an unknown registration.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, registration_id: RegistrationId) -> Result<Registration> {
        self.execute(RegistryAction::Cancel { registration_id }, move |state| {
            state.book.require(&registration_id).cloned()
        })
        .await
    }

    /// Looks up a registration
    pub async fn registration(&self, registration_id: RegistrationId) -> Option<Registration> {
        self.store
            .state(|s| s.book.get(&registration_id).cloned())
            .await
    }

    /// A participant's registrations in join order
    pub async fn registrations_for_participant(&self, email: &str) -> Vec<Registration> {
        self.store
            .state(|s| s.book.for_participant(email).into_iter().cloned().collect())
            .await
    }

    /// A camp's registrations in join order
    pub async fn registrations_for_camp(&self, camp_id: CampId) -> Vec<Registration> {
        self.store
            .state(|s| s.book.for_camp(&camp_id).into_iter().cloned().collect())
            .await
    }

    /// Every registration in join order
    pub async fn all_registrations(&self) -> Vec<Registration> {
        self.store.state(|s| s.book.iter().cloned().collect()).await
    }

    /// A participant's payments, newest first
    pub async fn payment_history(&self, email: &str) -> Vec<PaymentRecord> {
        self.store
            .state(|s| s.book.payment_history(email).into_iter().cloned().collect())
            .await
    }

    // ========================================================================
    // Feedback
    // ========================================================================

    /// Leaves feedback on a confirmed registration
    ///
    /// A second submission for the same registration replaces the first,
    /// keeping its id.
    ///
    /// # Errors
    ///
    /// `Validation` for a rating outside 1..=5, `NotEligible` unless the
    /// registration is confirmed, `NotFound` for an unknown registration.
    #[tracing::instrument(skip(self, comment))]
    pub async fn submit_feedback(
        &self,
        registration_id: RegistrationId,
        rating: i64,
        comment: impl Into<String>,
    ) -> Result<FeedbackEntry> {
        let action = RegistryAction::SubmitFeedback {
            feedback_id: FeedbackId::new(),
            registration_id,
            rating,
            comment: comment.into(),
        };
        self.execute(action, move |state| {
            state
                .ledger
                .for_registration(&registration_id)
                .cloned()
                .ok_or_else(|| RegistrationError::not_found(EntityKind::Feedback, registration_id))
        })
        .await
    }

    /// Deletes a feedback entry; the registration is unaffected
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown entry.
    #[tracing::instrument(skip(self))]
    pub async fn delete_feedback(&self, feedback_id: FeedbackId) -> Result<()> {
        self.execute(RegistryAction::DeleteFeedback { feedback_id }, |_| Ok(()))
            .await
    }

    /// All feedback
    pub async fn all_feedback(&self) -> Vec<FeedbackEntry> {
        self.store.state(|s| s.ledger.iter().cloned().collect()).await
    }

    /// Feedback written by a participant
    pub async fn feedback_for_participant(&self, email: &str) -> Vec<FeedbackEntry> {
        self.store
            .state(|s| s.ledger.for_participant(email).into_iter().cloned().collect())
            .await
    }

    /// Feedback for a camp
    pub async fn feedback_for_camp(&self, camp_id: CampId) -> Vec<FeedbackEntry> {
        self.store
            .state(|s| s.ledger.for_camp(&camp_id).into_iter().cloned().collect())
            .await
    }

    /// Mean rating for a camp
    pub async fn average_rating(&self, camp_id: CampId) -> Option<f64> {
        self.store.state(|s| s.ledger.average_rating(&camp_id)).await
    }

    // ========================================================================
    // Analytics, events and lifecycle
    // ========================================================================

    /// Registration counts by state and total paid for a participant
    pub async fn participant_summary(&self, email: &str) -> ParticipantSummary {
        self.store
            .state(|s| {
                let mut summary = ParticipantSummary::default();
                for registration in s.book.for_participant(email) {
                    summary.registrations += 1;
                    match registration.status {
                        RegistrationStatus::Joined => summary.joined += 1,
                        RegistrationStatus::Paid { .. } => summary.paid += 1,
                        RegistrationStatus::Confirmed { .. } => summary.confirmed += 1,
                        RegistrationStatus::Cancelled { .. } => summary.cancelled += 1,
                    }
                }
                summary.total_paid = s
                    .book
                    .payment_history(email)
                    .iter()
                    .fold(Money::ZERO, |total, p| total.saturating_add(p.amount));
                summary
            })
            .await
    }

    /// Subscribes to applied events, delivered in commit order
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Serializable copy of the whole registry
    pub async fn snapshot(&self) -> RegistrySnapshot {
        self.store.state(RegistryState::snapshot).await
    }

    /// Stops accepting commands and waits for in-flight effects
    ///
    /// # Errors
    ///
    /// `Unavailable` if effects are still running after the configured
    /// shutdown timeout.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!(
            pending_effects = self.store.pending_effects(),
            "Shutting down registration engine"
        );
        self.store.shutdown(self.shutdown_timeout).await?;
        Ok(())
    }
}

fn require_camp(state: &RegistryState, camp_id: &CampId) -> Result<Camp> {
    state
        .catalog
        .get(camp_id)
        .cloned()
        .ok_or_else(|| RegistrationError::not_found(EntityKind::Camp, camp_id))
}
