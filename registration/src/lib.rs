//! # Medcamp Registration
//!
//! Registration lifecycle engine for medical camps: participants join a camp,
//! pay the fee through an external gateway, get confirmed by the organizer
//! and may then leave feedback.
//!
//! ```text
//!   organizer ─┐                                  ┌─ payment gateway
//!              ▼                                  ▼
//!      ┌──────────────┐  join/cancel   ┌──────────────────────┐
//!      │ Camp Catalog │◀──────────────▶│ Registration Book    │
//!      └──────────────┘ (count ±1)     │  (lifecycle machine) │
//!                                      └──────────┬───────────┘
//!                                                 │ confirmed
//!                                                 ▼
//!                                      ┌──────────────────────┐
//!                                      │ Feedback Ledger      │
//!                                      └──────────────────────┘
//! ```
//!
//! All three live in one [`RegistryState`] reduced by [`RegistryReducer`].
//! [`RegistrationEngine`] runs the reducer in a store and exposes every
//! operation as an async call returning [`Result`].
//!
//! ## Lifecycle
//!
//! | state     | payment | confirmation | cancel allowed |
//! |-----------|---------|--------------|----------------|
//! | Joined    | Unpaid  | Pending      | yes            |
//! | Paid      | Paid    | Pending      | yes            |
//! | Confirmed | Paid    | Confirmed    | no             |
//! | Cancelled | either  | Pending      | terminal       |

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod metrics;
pub mod payment;
pub mod reducer;
pub mod registration;
pub mod types;
pub mod validation;

pub use catalog::{Camp, CampCatalog, CampDraft};
pub use config::Config;
pub use engine::{ParticipantSummary, RegistrationEngine};
pub use error::{EntityKind, RegistrationError, Result};
pub use feedback::{FeedbackEntry, FeedbackLedger, Rating};
pub use payment::{PaymentConfirmation, PaymentConfirmationAdapter, PaymentRunSummary};
pub use reducer::{
    CommandOutcome, RegistryAction, RegistryEnvironment, RegistryEvent, RegistryReducer,
    RegistrySnapshot, RegistryState,
};
pub use registration::{
    ConfirmationStatus, Payment, PaymentRecord, PaymentStatus, Registration, RegistrationBook,
    RegistrationStatus,
};
pub use types::*;
pub use validation::ValidationRules;
