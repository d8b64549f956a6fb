//! Registry reducer: camps, registrations and feedback in one state.
//!
//! Keeping the three collections in a single state lets a join or a
//! cancellation update the registration and its camp's participant count
//! in the same reduction, so no observer ever sees one without the other.
//!
//! Commands are decided against the current state first. A decision either
//! yields events, which are then applied, or a [`RegistrationError`], which
//! is recorded in [`RegistryState::last_outcome`] and leaves everything else
//! untouched.

use crate::catalog::{Camp, CampCatalog, CampDraft};
use crate::error::{EntityKind, RegistrationError, Result};
use crate::feedback::{FeedbackEntry, FeedbackLedger, Rating};
use crate::metrics;
use crate::registration::{
    Lifecycle, PaymentRecord, Plan, Registration, RegistrationBook, RegistrationStatus,
};
use crate::types::{CampId, FeedbackId, JoinForm, Participant, PaymentReference, RegistrationId};
use crate::validation::{self, ValidationRules};
use chrono::{DateTime, Utc};
use medcamp_core::{SmallVec, effect::Effect, environment::Clock, reducer::Reducer, smallvec};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// Actions
// ============================================================================

/// Commands accepted by the registry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryAction {
    /// Organizer creates a camp
    CreateCamp {
        /// New camp ID
        camp_id: CampId,
        /// Camp fields
        draft: CampDraft,
    },
    /// Organizer edits a camp
    UpdateCamp {
        /// Camp to edit
        camp_id: CampId,
        /// Replacement fields
        draft: CampDraft,
    },
    /// Organizer deletes a camp
    RemoveCamp {
        /// Camp to delete
        camp_id: CampId,
    },
    /// Participant joins a camp
    Join {
        /// New registration ID
        registration_id: RegistrationId,
        /// Camp to join
        camp_id: CampId,
        /// Who is joining
        participant: Participant,
        /// Join form as submitted
        form: JoinForm,
    },
    /// Payment gateway reports a successful charge
    MarkPaid {
        /// Registration paid for
        registration_id: RegistrationId,
        /// Gateway transaction id
        reference: PaymentReference,
        /// When the gateway took the payment; defaults to now
        paid_at: Option<DateTime<Utc>>,
    },
    /// Organizer confirms a paid registration
    Confirm {
        /// Registration to confirm
        registration_id: RegistrationId,
    },
    /// Organizer or participant cancels a registration
    Cancel {
        /// Registration to cancel
        registration_id: RegistrationId,
    },
    /// Participant leaves feedback
    SubmitFeedback {
        /// ID used if this is the registration's first entry
        feedback_id: FeedbackId,
        /// Confirmed registration
        registration_id: RegistrationId,
        /// Rating from 1 to 5, as submitted
        rating: i64,
        /// Free-text comment
        comment: String,
    },
    /// Feedback removed by organizer or author
    DeleteFeedback {
        /// Entry to delete
        feedback_id: FeedbackId,
    },
}

impl RegistryAction {
    /// Command name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateCamp { .. } => "create_camp",
            Self::UpdateCamp { .. } => "update_camp",
            Self::RemoveCamp { .. } => "remove_camp",
            Self::Join { .. } => "join",
            Self::MarkPaid { .. } => "mark_paid",
            Self::Confirm { .. } => "confirm",
            Self::Cancel { .. } => "cancel",
            Self::SubmitFeedback { .. } => "submit_feedback",
            Self::DeleteFeedback { .. } => "delete_feedback",
        }
    }
}

/// Facts recorded by the registry, in the order they were applied
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryEvent {
    /// A camp was created
    CampCreated {
        /// The new camp
        camp: Camp,
    },
    /// A camp's fields were replaced
    CampUpdated {
        /// Camp edited
        camp_id: CampId,
        /// New fields
        draft: CampDraft,
    },
    /// A camp was deleted
    CampRemoved {
        /// Camp deleted
        camp_id: CampId,
    },
    /// A participant joined a camp
    ParticipantJoined {
        /// The new registration
        registration: Registration,
    },
    /// A payment was recorded
    PaymentRecorded {
        /// Payment history entry
        record: PaymentRecord,
    },
    /// A registration was confirmed
    RegistrationConfirmed {
        /// Registration confirmed
        registration_id: RegistrationId,
        /// When
        confirmed_at: DateTime<Utc>,
    },
    /// A registration was cancelled
    RegistrationCancelled {
        /// Registration cancelled
        registration_id: RegistrationId,
        /// Its camp
        camp_id: CampId,
        /// When
        cancelled_at: DateTime<Utc>,
    },
    /// Feedback was submitted or replaced
    FeedbackSubmitted {
        /// The entry as stored
        entry: FeedbackEntry,
    },
    /// Feedback was deleted
    FeedbackDeleted {
        /// Entry deleted
        feedback_id: FeedbackId,
        /// Registration it belonged to
        registration_id: RegistrationId,
    },
}

// ============================================================================
// State
// ============================================================================

/// What the last command did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Accepted; the events applied (empty when it was already in effect)
    Applied(Vec<RegistryEvent>),
    /// Rejected; state is unchanged
    Rejected(RegistrationError),
}

/// Camps, registrations and feedback
#[derive(Clone, Debug, Default)]
pub struct RegistryState {
    /// Camp catalog
    pub catalog: CampCatalog,
    /// Registration records
    pub book: RegistrationBook,
    /// Feedback entries
    pub ledger: FeedbackLedger,
    /// Outcome of the most recent command, taken by the engine
    pub last_outcome: Option<CommandOutcome>,
}

/// Serializable copy of the registry, used to persist and restore it
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Camps in creation order
    pub camps: Vec<Camp>,
    /// Registrations in join order
    pub registrations: Vec<Registration>,
    /// Payment history in the order recorded
    pub payments: Vec<PaymentRecord>,
    /// Feedback entries
    pub feedback: Vec<FeedbackEntry>,
}

impl RegistryState {
    /// Copies the registry into a snapshot
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            camps: self.catalog.iter().cloned().collect(),
            registrations: self.book.iter().cloned().collect(),
            payments: self.book.payments().to_vec(),
            feedback: self.ledger.iter().cloned().collect(),
        }
    }

    /// Rebuilds state from a snapshot
    ///
    /// Participant counts are recomputed from the active registration
    /// records, so stored counters are never trusted.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the snapshot breaks a registry invariant:
    /// a repeated id, two active registrations for one participant and camp,
    /// an active registration for an unknown camp, more than one feedback
    /// entry per registration, or feedback on a registration that is not
    /// confirmed.
    pub fn from_snapshot(snapshot: RegistrySnapshot) -> Result<Self> {
        let mut catalog = CampCatalog::from_camps(snapshot.camps);
        let book = RegistrationBook::restore(snapshot.registrations, snapshot.payments)?;
        let ledger = FeedbackLedger::from_entries(snapshot.feedback)?;

        if let Some(orphan) = book
            .iter()
            .find(|r| r.status.is_active() && !catalog.contains(&r.camp_id))
        {
            return Err(RegistrationError::validation(format!(
                "registration {} is active for unknown camp {}",
                orphan.id, orphan.camp_id
            )));
        }

        for entry in ledger.iter() {
            let confirmed = book
                .get(&entry.registration_id)
                .is_some_and(|r| matches!(r.status, RegistrationStatus::Confirmed { .. }));
            if !confirmed {
                return Err(RegistrationError::validation(format!(
                    "feedback {} belongs to registration {}, which is not confirmed",
                    entry.id, entry.registration_id
                )));
            }
        }

        let counts: Vec<(CampId, i64)> = catalog
            .iter()
            .map(|camp| {
                let active = book
                    .for_camp(&camp.id)
                    .into_iter()
                    .filter(|r| r.status.is_active())
                    .count();
                let active = i64::try_from(active).unwrap_or(i64::MAX);
                (camp.id, active - i64::from(camp.participant_count))
            })
            .collect();
        for (camp_id, delta) in counts {
            catalog.adjust_participant_count(&camp_id, delta);
        }

        Ok(Self {
            catalog,
            book,
            ledger,
            last_outcome: None,
        })
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the registry reducer
#[derive(Clone)]
pub struct RegistryEnvironment {
    /// Clock for timestamps
    pub clock: Arc<dyn Clock>,
    /// Validation limits
    pub rules: ValidationRules,
}

impl RegistryEnvironment {
    /// Creates a new `RegistryEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, rules: ValidationRules) -> Self {
        Self { clock, rules }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the registry
#[derive(Clone, Copy, Debug)]
pub struct RegistryReducer;

impl RegistryReducer {
    /// Creates a new `RegistryReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decides what a command does, without changing state
    fn decide(
        state: &RegistryState,
        action: RegistryAction,
        env: &RegistryEnvironment,
    ) -> Result<Vec<RegistryEvent>> {
        let now = env.clock.now();

        match action {
            RegistryAction::CreateCamp { camp_id, draft } => {
                validation::validate_camp_draft(&draft)?;
                if state.catalog.contains(&camp_id) {
                    return Err(RegistrationError::validation(format!(
                        "camp id {camp_id} is already in use"
                    )));
                }
                Ok(vec![RegistryEvent::CampCreated {
                    camp: Camp::from_draft(camp_id, draft, now),
                }])
            },

            RegistryAction::UpdateCamp { camp_id, draft } => {
                validation::validate_camp_draft(&draft)?;
                Self::require_camp(state, &camp_id)?;
                Ok(vec![RegistryEvent::CampUpdated { camp_id, draft }])
            },

            RegistryAction::RemoveCamp { camp_id } => {
                Self::require_camp(state, &camp_id)?;
                let active = state.book.active_count_for_camp(&camp_id);
                if active > 0 {
                    return Err(RegistrationError::invalid_transition(
                        "remove camp",
                        camp_id,
                        format!("{active} active registration(s)"),
                    ));
                }
                Ok(vec![RegistryEvent::CampRemoved { camp_id }])
            },

            RegistryAction::Join {
                registration_id,
                camp_id,
                participant,
                form,
            } => {
                validation::validate_participant(&participant)?;
                let details = validation::validate_join(&form, &env.rules)?;
                let camp = Self::require_camp(state, &camp_id)?;

                if state.book.active_for(&camp_id, &participant.email).is_some() {
                    return Err(RegistrationError::DuplicateRegistration {
                        camp_id,
                        participant_email: participant.email,
                    });
                }
                if state.book.get(&registration_id).is_some() {
                    return Err(RegistrationError::validation(format!(
                        "registration id {registration_id} is already in use"
                    )));
                }

                Ok(vec![RegistryEvent::ParticipantJoined {
                    registration: Registration {
                        id: registration_id,
                        camp_id,
                        camp_name: camp.name.clone(),
                        location: camp.location.clone(),
                        healthcare_professional: camp.healthcare_professional.clone(),
                        participant: Participant::new(
                            participant.name.trim(),
                            participant.email.trim(),
                        ),
                        details,
                        fee: camp.fee,
                        joined_at: now,
                        status: RegistrationStatus::Joined,
                    },
                }])
            },

            RegistryAction::MarkPaid {
                registration_id,
                reference,
                paid_at,
            } => {
                if reference.as_str().trim().is_empty() {
                    return Err(RegistrationError::validation("payment reference is required"));
                }
                let registration = state.book.require(&registration_id)?;
                let command = Lifecycle::MarkPaid {
                    reference,
                    paid_at: paid_at.unwrap_or(now),
                };
                match registration.plan(&command)? {
                    Plan::Unchanged => Ok(Vec::new()),
                    Plan::Transition(status) => {
                        let events = status
                            .payment()
                            .map(|payment| RegistryEvent::PaymentRecorded {
                                record: PaymentRecord::new(registration, payment),
                            })
                            .into_iter()
                            .collect();
                        Ok(events)
                    },
                }
            },

            RegistryAction::Confirm { registration_id } => {
                let registration = state.book.require(&registration_id)?;
                match registration.plan(&Lifecycle::Confirm { at: now })? {
                    Plan::Unchanged => Ok(Vec::new()),
                    Plan::Transition(_) => Ok(vec![RegistryEvent::RegistrationConfirmed {
                        registration_id,
                        confirmed_at: now,
                    }]),
                }
            },

            RegistryAction::Cancel { registration_id } => {
                let registration = state.book.require(&registration_id)?;
                match registration.plan(&Lifecycle::Cancel { at: now })? {
                    Plan::Unchanged => Ok(Vec::new()),
                    Plan::Transition(_) => Ok(vec![RegistryEvent::RegistrationCancelled {
                        registration_id,
                        camp_id: registration.camp_id,
                        cancelled_at: now,
                    }]),
                }
            },

            RegistryAction::SubmitFeedback {
                feedback_id,
                registration_id,
                rating,
                comment,
            } => {
                let rating = Rating::try_from(rating)?;
                let registration = state.book.require(&registration_id)?;
                if !matches!(registration.status, RegistrationStatus::Confirmed { .. }) {
                    return Err(RegistrationError::NotEligible { registration_id });
                }

                let id = state
                    .ledger
                    .for_registration(&registration_id)
                    .map_or(feedback_id, |existing| existing.id);

                Ok(vec![RegistryEvent::FeedbackSubmitted {
                    entry: FeedbackEntry {
                        id,
                        registration_id,
                        camp_id: registration.camp_id,
                        camp_name: registration.camp_name.clone(),
                        participant: registration.participant.clone(),
                        rating,
                        comment: comment.trim().to_string(),
                        submitted_at: now,
                    },
                }])
            },

            RegistryAction::DeleteFeedback { feedback_id } => {
                let entry = state.ledger.require(&feedback_id)?;
                Ok(vec![RegistryEvent::FeedbackDeleted {
                    feedback_id,
                    registration_id: entry.registration_id,
                }])
            },
        }
    }

    fn require_camp<'a>(state: &'a RegistryState, camp_id: &CampId) -> Result<&'a Camp> {
        state
            .catalog
            .get(camp_id)
            .ok_or_else(|| RegistrationError::not_found(EntityKind::Camp, camp_id))
    }

    /// Applies an event to state
    ///
    /// Lifecycle events are replayed through [`Registration::plan`], so the
    /// transition table stays the single source of truth.
    fn apply_event(state: &mut RegistryState, event: &RegistryEvent) {
        match event {
            RegistryEvent::CampCreated { camp } => {
                state.catalog.insert(camp.clone());
            },
            RegistryEvent::CampUpdated { camp_id, draft } => {
                state.catalog.update(camp_id, draft.clone());
            },
            RegistryEvent::CampRemoved { camp_id } => {
                state.catalog.remove(camp_id);
            },
            RegistryEvent::ParticipantJoined { registration } => {
                state.book.insert(registration.clone());
                state
                    .catalog
                    .adjust_participant_count(&registration.camp_id, 1);
            },
            RegistryEvent::PaymentRecorded { record } => {
                let command = Lifecycle::MarkPaid {
                    reference: record.transaction_id.clone(),
                    paid_at: record.paid_at,
                };
                if Self::transition(state, &record.registration_id, &command) {
                    state.book.record_payment(record.clone());
                }
            },
            RegistryEvent::RegistrationConfirmed {
                registration_id,
                confirmed_at,
            } => {
                Self::transition(state, registration_id, &Lifecycle::Confirm {
                    at: *confirmed_at,
                });
            },
            RegistryEvent::RegistrationCancelled {
                registration_id,
                camp_id,
                cancelled_at,
            } => {
                let command = Lifecycle::Cancel { at: *cancelled_at };
                if Self::transition(state, registration_id, &command) {
                    state.catalog.adjust_participant_count(camp_id, -1);
                }
            },
            RegistryEvent::FeedbackSubmitted { entry } => {
                state.ledger.upsert(entry.clone());
            },
            RegistryEvent::FeedbackDeleted { feedback_id, .. } => {
                state.ledger.remove(feedback_id);
            },
        }
    }

    /// Moves a registration to its planned status; `true` if it changed
    fn transition(state: &mut RegistryState, id: &RegistrationId, command: &Lifecycle) -> bool {
        let planned = state.book.get(id).map(|r| r.plan(command));
        match planned {
            Some(Ok(Plan::Transition(status))) => state.book.set_status(id, status).is_some(),
            _ => false,
        }
    }
}

impl Default for RegistryReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl Reducer for RegistryReducer {
    type State = RegistryState;
    type Action = RegistryAction;
    type Environment = RegistryEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect; 4]> {
        match Self::decide(state, action, env) {
            Ok(events) => {
                for event in &events {
                    Self::apply_event(state, event);
                }

                let effects = if events.is_empty() {
                    SmallVec::new()
                } else {
                    let recorded = events.clone();
                    smallvec![Effect::fire_and_forget(async move {
                        for event in &recorded {
                            metrics::record_event(event);
                        }
                    })]
                };

                state.last_outcome = Some(CommandOutcome::Applied(events));
                effects
            },
            Err(error) => {
                let kind = error.kind();
                state.last_outcome = Some(CommandOutcome::Rejected(error));
                smallvec![Effect::fire_and_forget(async move {
                    metrics::record_rejection(kind);
                })]
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::types::Money;
    use medcamp_testing::{FixedClock, ReducerTest, assertions, test_epoch};

    fn env() -> RegistryEnvironment {
        RegistryEnvironment::new(Arc::new(FixedClock::new(test_epoch())), ValidationRules::default())
    }

    fn form() -> JoinForm {
        JoinForm::new(30, "+1 555 123 4567", "Female", "Bob (husband)")
    }

    fn state_with_camp(camp_id: CampId) -> RegistryState {
        let mut state = RegistryState::default();
        RegistryReducer::apply_event(&mut state, &RegistryEvent::CampCreated {
            camp: Camp::from_draft(
                camp_id,
                CampDraft::new("Free Eye Camp", Money::from_cents(2500)),
                test_epoch(),
            ),
        });
        state
    }

    fn join(registration_id: RegistrationId, camp_id: CampId, email: &str) -> RegistryAction {
        RegistryAction::Join {
            registration_id,
            camp_id,
            participant: Participant::new("Participant", email),
            form: form(),
        }
    }

    fn mark_paid(registration_id: RegistrationId, reference: &str) -> RegistryAction {
        RegistryAction::MarkPaid {
            registration_id,
            reference: reference.into(),
            paid_at: None,
        }
    }

    fn rejection(state: &RegistryState) -> &RegistrationError {
        match &state.last_outcome {
            Some(CommandOutcome::Rejected(error)) => error,
            other => panic!("expected a rejection, got {other:?}"),
        }
    }

    fn count(state: &RegistryState, camp_id: CampId) -> u32 {
        state.catalog.get(&camp_id).unwrap().participant_count
    }

    #[test]
    fn test_join_increments_count_and_snapshots_fee() {
        let camp_id = CampId::new();
        let reg = RegistrationId::new();

        ReducerTest::new(RegistryReducer::new())
            .with_env(env())
            .given_state(state_with_camp(camp_id))
            .when_action(join(reg, camp_id, "alice@example.com"))
            .then_state(move |state| {
                assert_eq!(count(state, camp_id), 1);
                let registration = state.book.get(&reg).unwrap();
                assert_eq!(registration.status, RegistrationStatus::Joined);
                assert_eq!(registration.fee, Money::from_cents(2500));
                assert_eq!(registration.camp_name, "Free Eye Camp");
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn test_duplicate_join_rejected_without_second_increment() {
        let camp_id = CampId::new();

        ReducerTest::new(RegistryReducer::new())
            .with_env(env())
            .given_state(state_with_camp(camp_id))
            .when_actions([
                join(RegistrationId::new(), camp_id, "alice@example.com"),
                join(RegistrationId::new(), camp_id, "ALICE@example.com"),
            ])
            .then_state(move |state| {
                assert_eq!(count(state, camp_id), 1);
                assert_eq!(state.book.len(), 1);
                assert!(matches!(
                    rejection(state),
                    RegistrationError::DuplicateRegistration { .. }
                ));
            })
            .run();
    }

    #[test]
    fn test_join_unknown_camp_is_not_found() {
        ReducerTest::new(RegistryReducer::new())
            .with_env(env())
            .given_state(RegistryState::default())
            .when_action(join(RegistrationId::new(), CampId::new(), "alice@example.com"))
            .then_state(|state| {
                assert_eq!(rejection(state).kind(), "not_found");
                assert!(state.book.is_empty());
            })
            .run();
    }

    #[test]
    fn test_join_with_invalid_form_is_rejected() {
        let camp_id = CampId::new();
        let mut bad = join(RegistrationId::new(), camp_id, "alice@example.com");
        if let RegistryAction::Join { form, .. } = &mut bad {
            form.age = Some(0);
        }

        ReducerTest::new(RegistryReducer::new())
            .with_env(env())
            .given_state(state_with_camp(camp_id))
            .when_action(bad)
            .then_state(move |state| {
                assert_eq!(rejection(state).kind(), "validation");
                assert_eq!(count(state, camp_id), 0);
            })
            .run();
    }

    #[test]
    fn test_full_lifecycle_then_cancel_forbidden() {
        let camp_id = CampId::new();
        let reg = RegistrationId::new();

        ReducerTest::new(RegistryReducer::new())
            .with_env(env())
            .given_state(state_with_camp(camp_id))
            .when_actions([
                join(reg, camp_id, "alice@example.com"),
                mark_paid(reg, "tx_001"),
                RegistryAction::Confirm {
                    registration_id: reg,
                },
                RegistryAction::Cancel {
                    registration_id: reg,
                },
            ])
            .then_state(move |state| {
                assert_eq!(
                    rejection(state),
                    &RegistrationError::CancellationForbidden {
                        registration_id: reg
                    }
                );
                assert_eq!(count(state, camp_id), 1);
                assert_eq!(state.book.get(&reg).unwrap().status.name(), "Confirmed");
                assert_eq!(state.book.payments().len(), 1);
            })
            .run();
    }

    #[test]
    fn test_confirm_unpaid_requires_payment() {
        let camp_id = CampId::new();
        let reg = RegistrationId::new();

        ReducerTest::new(RegistryReducer::new())
            .with_env(env())
            .given_state(state_with_camp(camp_id))
            .when_actions([
                join(reg, camp_id, "bob@example.com"),
                RegistryAction::Confirm {
                    registration_id: reg,
                },
            ])
            .then_state(move |state| {
                assert_eq!(
                    rejection(state),
                    &RegistrationError::PaymentRequired {
                        registration_id: reg
                    }
                );
                assert_eq!(state.book.get(&reg).unwrap().status, RegistrationStatus::Joined);
            })
            .run();
    }

    #[test]
    fn test_repeated_mark_paid_is_a_no_op() {
        let camp_id = CampId::new();
        let reg = RegistrationId::new();

        ReducerTest::new(RegistryReducer::new())
            .with_env(env())
            .given_state(state_with_camp(camp_id))
            .when_actions([
                join(reg, camp_id, "alice@example.com"),
                mark_paid(reg, "tx_001"),
                mark_paid(reg, "tx_001"),
            ])
            .then_state(move |state| {
                assert_eq!(state.last_outcome, Some(CommandOutcome::Applied(Vec::new())));
                assert_eq!(state.book.payments().len(), 1);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_cancel_joined_decrements_and_allows_rejoin() {
        let camp_id = CampId::new();
        let reg = RegistrationId::new();
        let rejoin = RegistrationId::new();

        ReducerTest::new(RegistryReducer::new())
            .with_env(env())
            .given_state(state_with_camp(camp_id))
            .when_actions([
                join(reg, camp_id, "bob@example.com"),
                RegistryAction::Cancel {
                    registration_id: reg,
                },
                join(rejoin, camp_id, "bob@example.com"),
            ])
            .then_state(move |state| {
                assert_eq!(count(state, camp_id), 1);
                assert!(state.book.get(&reg).unwrap().is_cancelled());
                assert_eq!(state.book.get(&rejoin).unwrap().status, RegistrationStatus::Joined);
            })
            .run();
    }

    #[test]
    fn test_feedback_requires_confirmation_and_replaces() {
        let camp_id = CampId::new();
        let reg = RegistrationId::new();
        let first = FeedbackId::new();

        let feedback = move |feedback_id, rating: i64| RegistryAction::SubmitFeedback {
            feedback_id,
            registration_id: reg,
            rating,
            comment: "great".to_string(),
        };

        ReducerTest::new(RegistryReducer::new())
            .with_env(env())
            .given_state(state_with_camp(camp_id))
            .when_actions([
                join(reg, camp_id, "alice@example.com"),
                feedback(first, 5),
            ])
            .then_state(move |state| {
                assert_eq!(
                    rejection(state),
                    &RegistrationError::NotEligible {
                        registration_id: reg
                    }
                );
            })
            .run();

        ReducerTest::new(RegistryReducer::new())
            .with_env(env())
            .given_state(state_with_camp(camp_id))
            .when_actions([
                join(reg, camp_id, "alice@example.com"),
                mark_paid(reg, "tx_001"),
                RegistryAction::Confirm {
                    registration_id: reg,
                },
                feedback(first, 5),
                feedback(FeedbackId::new(), 3),
            ])
            .then_state(move |state| {
                assert_eq!(state.ledger.len(), 1);
                let entry = state.ledger.for_registration(&reg).unwrap();
                assert_eq!(entry.id, first);
                assert_eq!(entry.rating.value(), 3);
            })
            .run();
    }

    #[test]
    fn test_remove_camp_with_active_registrations_is_rejected() {
        let camp_id = CampId::new();

        ReducerTest::new(RegistryReducer::new())
            .with_env(env())
            .given_state(state_with_camp(camp_id))
            .when_actions([
                join(RegistrationId::new(), camp_id, "alice@example.com"),
                RegistryAction::RemoveCamp { camp_id },
            ])
            .then_state(move |state| {
                assert_eq!(rejection(state).kind(), "invalid_transition");
                assert!(state.catalog.contains(&camp_id));
            })
            .run();
    }

    #[test]
    fn test_snapshot_restore_repairs_counts() {
        let camp_id = CampId::new();
        let reg = RegistrationId::new();
        let mut state = state_with_camp(camp_id);
        let reducer = RegistryReducer::new();
        let _ = reducer.reduce(&mut state, join(reg, camp_id, "alice@example.com"), &env());

        let mut snapshot = state.snapshot();
        snapshot.camps[0].participant_count = 7;
        let json = serde_json::to_string(&snapshot).unwrap();

        let restored =
            RegistryState::from_snapshot(serde_json::from_str(&json).unwrap()).unwrap();
        assert_eq!(count(&restored, camp_id), 1);
        assert_eq!(restored.book.active_count(), 1);
        assert!(restored.book.active_for(&camp_id, "alice@example.com").is_some());
    }

    #[test]
    fn test_snapshot_with_two_active_registrations_for_one_pair_is_rejected() {
        let camp_id = CampId::new();
        let reg = RegistrationId::new();
        let mut state = state_with_camp(camp_id);
        let reducer = RegistryReducer::new();
        let _ = reducer.reduce(&mut state, join(reg, camp_id, "alice@example.com"), &env());

        let mut snapshot = state.snapshot();
        let mut twin = snapshot.registrations[0].clone();
        twin.id = RegistrationId::new();
        twin.participant.email = "ALICE@example.com".to_string();
        snapshot.registrations.push(twin);

        let err = RegistryState::from_snapshot(snapshot).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_snapshot_with_cancelled_twin_restores_exact_count() {
        let camp_id = CampId::new();
        let reg = RegistrationId::new();
        let mut state = state_with_camp(camp_id);
        let reducer = RegistryReducer::new();
        let _ = reducer.reduce(&mut state, join(reg, camp_id, "alice@example.com"), &env());

        let mut snapshot = state.snapshot();
        let mut old = snapshot.registrations[0].clone();
        old.id = RegistrationId::new();
        old.status = RegistrationStatus::Cancelled {
            payment: None,
            cancelled_at: test_epoch(),
        };
        snapshot.registrations.insert(0, old);

        let restored = RegistryState::from_snapshot(snapshot).unwrap();
        assert_eq!(count(&restored, camp_id), 1);
        assert_eq!(restored.book.active_for(&camp_id, "alice@example.com").unwrap().id, reg);
    }

    #[test]
    fn test_snapshot_with_feedback_on_unconfirmed_registration_is_rejected() {
        let camp_id = CampId::new();
        let reg = RegistrationId::new();
        let mut state = state_with_camp(camp_id);
        let reducer = RegistryReducer::new();
        let _ = reducer.reduce(&mut state, join(reg, camp_id, "alice@example.com"), &env());
        let _ = reducer.reduce(&mut state, mark_paid(reg, "tx_001"), &env());
        let _ = reducer.reduce(&mut state, RegistryAction::Confirm { registration_id: reg }, &env());
        let _ = reducer.reduce(
            &mut state,
            RegistryAction::SubmitFeedback {
                feedback_id: FeedbackId::new(),
                registration_id: reg,
                rating: 5,
                comment: "great".to_string(),
            },
            &env(),
        );

        let snapshot = state.snapshot();
        assert!(RegistryState::from_snapshot(snapshot.clone()).is_ok());

        let mut unconfirmed = snapshot.clone();
        unconfirmed.registrations[0].status = RegistrationStatus::Joined;
        let err = RegistryState::from_snapshot(unconfirmed).unwrap_err();
        assert_eq!(err.kind(), "validation");

        let mut doubled = snapshot;
        let mut second = doubled.feedback[0].clone();
        second.id = FeedbackId::new();
        doubled.feedback.push(second);
        let err = RegistryState::from_snapshot(doubled).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_out_of_range_rating_is_a_validation_error() {
        let camp_id = CampId::new();
        let reg = RegistrationId::new();

        for rating in [-1, 0, 6, 300] {
            ReducerTest::new(RegistryReducer::new())
                .with_env(env())
                .given_state(state_with_camp(camp_id))
                .when_actions([
                    join(reg, camp_id, "alice@example.com"),
                    mark_paid(reg, "tx_001"),
                    RegistryAction::Confirm {
                        registration_id: reg,
                    },
                    RegistryAction::SubmitFeedback {
                        feedback_id: FeedbackId::new(),
                        registration_id: reg,
                        rating,
                        comment: String::new(),
                    },
                ])
                .then_state(|state| {
                    assert_eq!(rejection(state).kind(), "validation");
                    assert!(state.ledger.is_empty());
                })
                .run();
        }
    }
}
