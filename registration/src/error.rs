//! Error types for the registration engine.
//!
//! Every operation returns a [`RegistrationError`] on failure. The domain
//! kinds are all recoverable and carry enough context for a caller to
//! render a message; [`RegistrationError::Unavailable`] is the only kind that
//! comes from the runtime rather than from the registration rules.

use crate::types::{CampId, RegistrationId};
use medcamp_runtime::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The kind of entity a lookup failed for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// A camp
    Camp,
    /// A registration
    Registration,
    /// A feedback entry
    Feedback,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Camp => write!(f, "camp"),
            Self::Registration => write!(f, "registration"),
            Self::Feedback => write!(f, "feedback"),
        }
    }
}

/// Registration engine errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegistrationError {
    /// Malformed input (age, phone, rating, fee...)
    #[error("Validation error: {message}")]
    Validation {
        /// What was wrong, naming the field
        message: String,
    },

    /// The participant already holds an active registration for the camp
    #[error("{participant_email} already has an active registration for camp {camp_id}")]
    DuplicateRegistration {
        /// Camp joined twice
        camp_id: CampId,
        /// Participant email as submitted
        participant_email: String,
    },

    /// Referenced entity does not exist
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind
        entity: EntityKind,
        /// Identifier that was looked up
        id: String,
    },

    /// The operation is not valid for the entity's current state
    #[error("Cannot {operation} {id}: currently {state}")]
    InvalidTransition {
        /// Attempted operation
        operation: String,
        /// Entity identifier
        id: String,
        /// Current state of the entity
        state: String,
    },

    /// Confirmation attempted before payment
    #[error("Registration {registration_id} must be paid before it can be confirmed")]
    PaymentRequired {
        /// Unpaid registration
        registration_id: RegistrationId,
    },

    /// Cancellation attempted on a paid and confirmed registration
    #[error("Registration {registration_id} is paid and confirmed and cannot be cancelled")]
    CancellationForbidden {
        /// Confirmed registration
        registration_id: RegistrationId,
    },

    /// Feedback submitted for a registration that is not confirmed
    #[error("Registration {registration_id} is not confirmed; feedback is not accepted yet")]
    NotEligible {
        /// Registration the feedback was for
        registration_id: RegistrationId,
    },

    /// The engine could not process the command (shutting down)
    #[error("Registration engine unavailable: {reason}")]
    Unavailable {
        /// Runtime failure description
        reason: String,
    },
}

impl RegistrationError {
    /// Creates a validation error
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a not-found error
    #[must_use]
    pub fn not_found(entity: EntityKind, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Creates an invalid-transition error
    #[must_use]
    pub fn invalid_transition(
        operation: &str,
        id: impl fmt::Display,
        state: impl fmt::Display,
    ) -> Self {
        Self::InvalidTransition {
            operation: operation.to_string(),
            id: id.to_string(),
            state: state.to_string(),
        }
    }

    /// Short machine-readable kind, used as a metrics label
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::DuplicateRegistration { .. } => "duplicate_registration",
            Self::NotFound { .. } => "not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::PaymentRequired { .. } => "payment_required",
            Self::CancellationForbidden { .. } => "cancellation_forbidden",
            Self::NotEligible { .. } => "not_eligible",
            Self::Unavailable { .. } => "unavailable",
        }
    }
}

impl From<StoreError> for RegistrationError {
    fn from(error: StoreError) -> Self {
        Self::Unavailable {
            reason: error.to_string(),
        }
    }
}

/// Result type for registration engine operations
pub type Result<T> = std::result::Result<T, RegistrationError>;
