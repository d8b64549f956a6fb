//! Business metrics for the registration engine.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `medcamp_registrations_total{status}` - Registrations by transition (joined, paid, confirmed, cancelled)
//! - `medcamp_payments_total` - Payments recorded
//! - `medcamp_payment_revenue_cents_total` - Revenue from recorded payments in cents
//! - `medcamp_feedback_total{action}` - Feedback submitted or deleted
//! - `medcamp_camps_total{action}` - Camps created, updated or removed
//! - `medcamp_commands_rejected_total{kind}` - Rejected commands by error kind
//!
//! ## Gauges
//! - `medcamp_active_registrations` - Registrations that are not cancelled
//!
//! Recording is a no-op until a recorder is installed, which only binaries do.

use crate::reducer::RegistryEvent;
use metrics::{describe_counter, describe_gauge};

/// Initialize and register all business metrics descriptions.
///
/// Call once at startup, before any metrics are recorded.
pub fn register_business_metrics() {
    describe_counter!(
        "medcamp_registrations_total",
        "Registration lifecycle transitions by status (joined, paid, confirmed, cancelled)"
    );
    describe_gauge!(
        "medcamp_active_registrations",
        "Current number of registrations that are not cancelled"
    );

    describe_counter!("medcamp_payments_total", "Total number of payments recorded");
    describe_counter!(
        "medcamp_payment_revenue_cents_total",
        "Total revenue from recorded payments in cents"
    );

    describe_counter!(
        "medcamp_feedback_total",
        "Feedback entries submitted or deleted"
    );
    describe_counter!("medcamp_camps_total", "Camps created, updated or removed");
    describe_counter!(
        "medcamp_commands_rejected_total",
        "Commands rejected by the registry, by error kind"
    );

    tracing::info!("Business metrics registered");
}

/// Record the metrics for one applied event.
pub fn record_event(event: &RegistryEvent) {
    match event {
        RegistryEvent::CampCreated { .. } => {
            metrics::counter!("medcamp_camps_total", "action" => "created").increment(1);
        },
        RegistryEvent::CampUpdated { .. } => {
            metrics::counter!("medcamp_camps_total", "action" => "updated").increment(1);
        },
        RegistryEvent::CampRemoved { .. } => {
            metrics::counter!("medcamp_camps_total", "action" => "removed").increment(1);
        },
        RegistryEvent::ParticipantJoined { .. } => {
            metrics::counter!("medcamp_registrations_total", "status" => "joined").increment(1);
        },
        RegistryEvent::PaymentRecorded { record } => {
            let amount_cents = record.amount.cents();
            metrics::counter!("medcamp_registrations_total", "status" => "paid").increment(1);
            metrics::counter!("medcamp_payments_total").increment(1);
            metrics::counter!("medcamp_payment_revenue_cents_total").increment(amount_cents);
            tracing::debug!(amount_cents, "Recorded payment metric");
        },
        RegistryEvent::RegistrationConfirmed { .. } => {
            metrics::counter!("medcamp_registrations_total", "status" => "confirmed").increment(1);
        },
        RegistryEvent::RegistrationCancelled { .. } => {
            metrics::counter!("medcamp_registrations_total", "status" => "cancelled").increment(1);
        },
        RegistryEvent::FeedbackSubmitted { .. } => {
            metrics::counter!("medcamp_feedback_total", "action" => "submitted").increment(1);
        },
        RegistryEvent::FeedbackDeleted { .. } => {
            metrics::counter!("medcamp_feedback_total", "action" => "deleted").increment(1);
        },
    }
}

/// Set the active registrations gauge to the registry's current total.
///
/// The engine calls this under the store lock, after restoring a snapshot
/// and after every applied command, so the gauge follows commit order.
#[allow(clippy::cast_precision_loss)]
pub fn set_active_registrations(active: usize) {
    metrics::gauge!("medcamp_active_registrations").set(active as f64);
}

/// Record a rejected command.
///
/// # Arguments
///
/// * `kind` - Error kind, see [`crate::error::RegistrationError::kind`]
pub fn record_rejection(kind: &'static str) {
    metrics::counter!("medcamp_commands_rejected_total", "kind" => kind).increment(1);
    tracing::debug!(kind, "Recorded command rejection metric");
}
