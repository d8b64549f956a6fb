//! Registration records and the lifecycle state machine.
//!
//! ```text
//!            mark_paid            confirm
//!   Joined ────────────▶ Paid ────────────▶ Confirmed
//!     │                   │
//!     │ cancel            │ cancel
//!     ▼                   ▼
//!   Cancelled ◀───────────┘
//! ```
//!
//! [`Registration::plan`] is the one place where the transition rules live.
//! It never mutates; the reducer applies the returned status afterwards.

use crate::error::{EntityKind, RegistrationError, Result};
use crate::types::{
    CampId, Money, Participant, PaymentReference, RegistrationDetails, RegistrationId, email_key,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Payment captured for a registration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Gateway transaction id, immutable once recorded
    pub reference: PaymentReference,
    /// Amount paid (the fee snapshot)
    pub amount: Money,
    /// When the payment was taken
    pub paid_at: DateTime<Utc>,
}

/// Lifecycle state of a registration
///
/// Each state carries exactly the data that exists in it, so a confirmed
/// registration always has a payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RegistrationStatus {
    /// Joined, not paid yet
    Joined,
    /// Paid, waiting for the organizer
    Paid {
        /// Captured payment
        payment: Payment,
    },
    /// Accepted by the organizer
    Confirmed {
        /// Captured payment
        payment: Payment,
        /// When the organizer confirmed
        confirmed_at: DateTime<Utc>,
    },
    /// Cancelled before confirmation; terminal
    Cancelled {
        /// Payment taken before the cancellation, if any
        payment: Option<Payment>,
        /// When the registration was cancelled
        cancelled_at: DateTime<Utc>,
    },
}

impl RegistrationStatus {
    /// The captured payment, if any
    #[must_use]
    pub const fn payment(&self) -> Option<&Payment> {
        match self {
            Self::Joined => None,
            Self::Paid { payment } | Self::Confirmed { payment, .. } => Some(payment),
            Self::Cancelled { payment, .. } => payment.as_ref(),
        }
    }

    /// Whether the registration still counts towards its camp
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !matches!(self, Self::Cancelled { .. })
    }

    /// State name without payload
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Joined => "Joined",
            Self::Paid { .. } => "Paid",
            Self::Confirmed { .. } => "Confirmed",
            Self::Cancelled { .. } => "Cancelled",
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Payment column as shown to participants and organizers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// No payment recorded
    Unpaid,
    /// Payment recorded
    Paid,
}

/// Confirmation column as shown to participants and organizers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfirmationStatus {
    /// Not confirmed
    Pending,
    /// Confirmed by the organizer
    Confirmed,
}

/// A lifecycle command against a single registration
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// Record a payment
    MarkPaid {
        /// Gateway transaction id
        reference: PaymentReference,
        /// When the payment was taken
        paid_at: DateTime<Utc>,
    },
    /// Organizer confirmation
    Confirm {
        /// Confirmation time
        at: DateTime<Utc>,
    },
    /// Cancellation
    Cancel {
        /// Cancellation time
        at: DateTime<Utc>,
    },
}

impl Lifecycle {
    const fn operation(&self) -> &'static str {
        match self {
            Self::MarkPaid { .. } => "mark paid",
            Self::Confirm { .. } => "confirm",
            Self::Cancel { .. } => "cancel",
        }
    }
}

/// Result of planning a lifecycle command
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Plan {
    /// Move to this status
    Transition(RegistrationStatus),
    /// Already applied; nothing changes
    Unchanged,
}

/// One participant's registration for one camp
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Registration ID
    pub id: RegistrationId,
    /// Camp joined (weak reference)
    pub camp_id: CampId,
    /// Camp name at join time
    pub camp_name: String,
    /// Camp location at join time
    pub location: String,
    /// Healthcare professional at join time
    pub healthcare_professional: String,
    /// Who joined
    pub participant: Participant,
    /// Join-form details
    pub details: RegistrationDetails,
    /// Camp fee at join time; never changes afterwards
    pub fee: Money,
    /// When the participant joined
    pub joined_at: DateTime<Utc>,
    /// Lifecycle state
    pub status: RegistrationStatus,
}

impl Registration {
    /// Derived payment column
    #[must_use]
    pub const fn payment_status(&self) -> PaymentStatus {
        match self.status {
            RegistrationStatus::Joined => PaymentStatus::Unpaid,
            RegistrationStatus::Paid { .. } | RegistrationStatus::Confirmed { .. } => {
                PaymentStatus::Paid
            },
            RegistrationStatus::Cancelled { ref payment, .. } => {
                if payment.is_some() {
                    PaymentStatus::Paid
                } else {
                    PaymentStatus::Unpaid
                }
            },
        }
    }

    /// Derived confirmation column
    #[must_use]
    pub const fn confirmation_status(&self) -> ConfirmationStatus {
        match self.status {
            RegistrationStatus::Confirmed { .. } => ConfirmationStatus::Confirmed,
            _ => ConfirmationStatus::Pending,
        }
    }

    /// Whether the registration is cancelled
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        !self.status.is_active()
    }

    /// Decides what `command` does to this registration
    ///
    /// | state     | mark paid                         | confirm             | cancel                  |
    /// |-----------|-----------------------------------|---------------------|-------------------------|
    /// | Joined    | → Paid                            | `PaymentRequired`   | → Cancelled             |
    /// | Paid      | same ref: unchanged, else invalid | → Confirmed         | → Cancelled             |
    /// | Confirmed | same ref: unchanged, else invalid | unchanged           | `CancellationForbidden` |
    /// | Cancelled | invalid                           | invalid             | invalid                 |
    ///
    /// # Errors
    ///
    /// Returns the error named in the table.
    pub fn plan(&self, command: &Lifecycle) -> Result<Plan> {
        let invalid =
            || RegistrationError::invalid_transition(command.operation(), self.id, &self.status);

        match (&self.status, command) {
            (RegistrationStatus::Cancelled { .. }, _) => Err(invalid()),

            (RegistrationStatus::Joined, Lifecycle::MarkPaid { reference, paid_at }) => {
                Ok(Plan::Transition(RegistrationStatus::Paid {
                    payment: Payment {
                        reference: reference.clone(),
                        amount: self.fee,
                        paid_at: *paid_at,
                    },
                }))
            },
            (
                RegistrationStatus::Paid { payment } | RegistrationStatus::Confirmed { payment, .. },
                Lifecycle::MarkPaid { reference, .. },
            ) => {
                if payment.reference == *reference {
                    Ok(Plan::Unchanged)
                } else {
                    Err(invalid())
                }
            },

            (RegistrationStatus::Joined, Lifecycle::Confirm { .. }) => {
                Err(RegistrationError::PaymentRequired {
                    registration_id: self.id,
                })
            },
            (RegistrationStatus::Paid { payment }, Lifecycle::Confirm { at }) => {
                Ok(Plan::Transition(RegistrationStatus::Confirmed {
                    payment: payment.clone(),
                    confirmed_at: *at,
                }))
            },
            (RegistrationStatus::Confirmed { .. }, Lifecycle::Confirm { .. }) => Ok(Plan::Unchanged),

            (RegistrationStatus::Joined, Lifecycle::Cancel { at }) => {
                Ok(Plan::Transition(RegistrationStatus::Cancelled {
                    payment: None,
                    cancelled_at: *at,
                }))
            },
            (RegistrationStatus::Paid { payment }, Lifecycle::Cancel { at }) => {
                Ok(Plan::Transition(RegistrationStatus::Cancelled {
                    payment: Some(payment.clone()),
                    cancelled_at: *at,
                }))
            },
            (RegistrationStatus::Confirmed { .. }, Lifecycle::Cancel { .. }) => {
                Err(RegistrationError::CancellationForbidden {
                    registration_id: self.id,
                })
            },
        }
    }
}

/// Payment history entry, kept even if the registration is later cancelled
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Registration paid for
    pub registration_id: RegistrationId,
    /// Camp paid for
    pub camp_id: CampId,
    /// Camp name at join time
    pub camp_name: String,
    /// Payer
    pub participant_email: String,
    /// Amount paid
    pub amount: Money,
    /// Gateway transaction id
    pub transaction_id: PaymentReference,
    /// When the payment was taken
    pub paid_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// History entry for `payment` on `registration`
    #[must_use]
    pub fn new(registration: &Registration, payment: &Payment) -> Self {
        Self {
            registration_id: registration.id,
            camp_id: registration.camp_id,
            camp_name: registration.camp_name.clone(),
            participant_email: registration.participant.email.clone(),
            amount: payment.amount,
            transaction_id: payment.reference.clone(),
            paid_at: payment.paid_at,
        }
    }
}

/// Registration records with an index of active (camp, participant) pairs
#[derive(Clone, Debug, Default)]
pub struct RegistrationBook {
    registrations: HashMap<RegistrationId, Registration>,
    order: Vec<RegistrationId>,
    active: HashMap<(CampId, String), RegistrationId>,
    payments: Vec<PaymentRecord>,
}

impl RegistrationBook {
    /// Creates an empty book
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a book from stored records; the active index is recomputed
    ///
    /// # Errors
    ///
    /// Returns `Validation` if a registration id repeats or a participant
    /// holds two active registrations for one camp.
    pub fn restore(
        registrations: impl IntoIterator<Item = Registration>,
        payments: impl IntoIterator<Item = PaymentRecord>,
    ) -> Result<Self> {
        let mut book = Self::new();
        for registration in registrations {
            if book.registrations.contains_key(&registration.id) {
                return Err(RegistrationError::validation(format!(
                    "registration {} appears more than once",
                    registration.id
                )));
            }
            if registration.status.is_active() {
                if let Some(existing) =
                    book.active_for(&registration.camp_id, &registration.participant.email)
                {
                    return Err(RegistrationError::validation(format!(
                        "registrations {} and {} are both active for {} in camp {}",
                        existing.id,
                        registration.id,
                        registration.participant.email,
                        registration.camp_id
                    )));
                }
            }
            book.insert(registration);
        }
        book.payments.extend(payments);
        Ok(book)
    }

    /// Looks up a registration
    #[must_use]
    pub fn get(&self, id: &RegistrationId) -> Option<&Registration> {
        self.registrations.get(id)
    }

    /// Looks up a registration, failing with `NotFound`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    pub fn require(&self, id: &RegistrationId) -> Result<&Registration> {
        self.get(id)
            .ok_or_else(|| RegistrationError::not_found(EntityKind::Registration, id))
    }

    /// Number of registrations, cancelled ones included
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Whether the book is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// The participant's active registration for a camp
    #[must_use]
    pub fn active_for(&self, camp_id: &CampId, email: &str) -> Option<&Registration> {
        self.active
            .get(&(*camp_id, email_key(email)))
            .and_then(|id| self.registrations.get(id))
    }

    /// Number of active registrations across every camp
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Number of active registrations for a camp
    #[must_use]
    pub fn active_count_for_camp(&self, camp_id: &CampId) -> usize {
        self.registrations
            .values()
            .filter(|r| r.camp_id == *camp_id && r.status.is_active())
            .count()
    }

    /// Every registration in join order
    pub fn iter(&self) -> impl Iterator<Item = &Registration> {
        self.order.iter().filter_map(|id| self.registrations.get(id))
    }

    /// A participant's registrations in join order
    #[must_use]
    pub fn for_participant(&self, email: &str) -> Vec<&Registration> {
        let key = email_key(email);
        self.iter()
            .filter(|r| r.participant.email_key() == key)
            .collect()
    }

    /// A camp's registrations in join order
    #[must_use]
    pub fn for_camp(&self, camp_id: &CampId) -> Vec<&Registration> {
        self.iter().filter(|r| r.camp_id == *camp_id).collect()
    }

    /// Payment history for a participant, newest first
    #[must_use]
    pub fn payment_history(&self, email: &str) -> Vec<&PaymentRecord> {
        let key = email_key(email);
        let mut history: Vec<_> = self
            .payments
            .iter()
            .filter(|p| email_key(&p.participant_email) == key)
            .collect();
        history.sort_by(|a, b| b.paid_at.cmp(&a.paid_at));
        history
    }

    /// Every payment record in the order recorded
    #[must_use]
    pub fn payments(&self) -> &[PaymentRecord] {
        &self.payments
    }

    pub(crate) fn insert(&mut self, registration: Registration) {
        let id = registration.id;
        if registration.status.is_active() {
            self.active
                .insert((registration.camp_id, registration.participant.email_key()), id);
        }
        if self.registrations.insert(id, registration).is_none() {
            self.order.push(id);
        }
    }

    /// Stores a new status, keeping the active index in step
    pub(crate) fn set_status(
        &mut self,
        id: &RegistrationId,
        status: RegistrationStatus,
    ) -> Option<&Registration> {
        let registration = self.registrations.get_mut(id)?;
        if !status.is_active() {
            let key = (registration.camp_id, registration.participant.email_key());
            if self.active.get(&key) == Some(id) {
                self.active.remove(&key);
            }
        }
        registration.status = status;
        Some(registration)
    }

    pub(crate) fn record_payment(&mut self, record: PaymentRecord) {
        self.payments.push(record);
    }
}
