//! Payment confirmation adapter.
//!
//! The payment gateway charges the card and then reports success. This
//! adapter turns each report into a `mark_paid` command. It never talks to
//! the gateway itself and performs no retries; a gateway that re-delivers a
//! confirmation gets the same answer as the first time.

use crate::engine::RegistrationEngine;
use crate::error::{EntityKind, RegistrationError, Result};
use crate::registration::Registration;
use crate::types::{Money, PaymentReference, RegistrationId};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Payment success report from the gateway
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    /// Registration that was paid for
    pub registration_id: RegistrationId,
    /// Gateway transaction id
    pub transaction_id: PaymentReference,
    /// Amount the gateway charged
    pub amount: Money,
    /// When the gateway charged; the engine clock is used when absent
    pub paid_at: Option<DateTime<Utc>>,
}

/// Totals for one run of the adapter
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRunSummary {
    /// Confirmations that left the registration paid
    pub accepted: usize,
    /// Confirmations the engine refused
    pub rejected: usize,
}

/// Forwards gateway confirmations into the registration engine
#[derive(Clone)]
pub struct PaymentConfirmationAdapter {
    engine: RegistrationEngine,
}

impl PaymentConfirmationAdapter {
    /// Creates an adapter for `engine`
    #[must_use]
    pub const fn new(engine: RegistrationEngine) -> Self {
        Self { engine }
    }

    /// Handles one confirmation
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown registration, `Validation` when the charged
    /// amount differs from the registration's fee, and whatever `mark_paid`
    /// returns otherwise.
    #[tracing::instrument(
        skip(self, confirmation),
        fields(
            registration_id = %confirmation.registration_id,
            transaction_id = %confirmation.transaction_id,
            amount = %confirmation.amount,
        )
    )]
    pub async fn handle(&self, confirmation: PaymentConfirmation) -> Result<Registration> {
        let registration = self
            .engine
            .registration(confirmation.registration_id)
            .await
            .ok_or_else(|| {
                RegistrationError::not_found(EntityKind::Registration, confirmation.registration_id)
            })?;

        // The fee snapshot is immutable, so this check cannot go stale
        if registration.fee != confirmation.amount {
            return Err(RegistrationError::validation(format!(
                "payment amount {} does not match fee {}",
                confirmation.amount, registration.fee
            )));
        }

        self.engine
            .mark_paid_at(
                confirmation.registration_id,
                confirmation.transaction_id,
                confirmation.paid_at,
            )
            .await
    }

    /// Processes confirmations until the stream ends or shutdown is signalled
    pub async fn run<S>(
        &self,
        mut confirmations: S,
        mut shutdown: broadcast::Receiver<()>,
    ) -> PaymentRunSummary
    where
        S: Stream<Item = PaymentConfirmation> + Unpin + Send,
    {
        info!("Payment confirmation adapter started");
        let mut summary = PaymentRunSummary::default();

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Payment confirmation adapter received shutdown signal");
                    break;
                }
                next = confirmations.next() => {
                    let Some(confirmation) = next else {
                        break;
                    };
                    let registration_id = confirmation.registration_id;
                    match self.handle(confirmation).await {
                        Ok(registration) => {
                            summary.accepted += 1;
                            info!(%registration_id, state = %registration.status, "Payment applied");
                        }
                        Err(error) => {
                            summary.rejected += 1;
                            warn!(%registration_id, kind = error.kind(), %error, "Payment confirmation rejected");
                        }
                    }
                }
            }
        }

        info!(
            accepted = summary.accepted,
            rejected = summary.rejected,
            "Payment confirmation adapter stopped"
        );
        summary
    }

    /// Spawns the adapter behind a bounded queue
    ///
    /// Returns the queue's sender and the task handle. The task ends when
    /// every sender is dropped or `shutdown` fires.
    #[must_use]
    pub fn spawn(
        self,
        capacity: usize,
        shutdown: broadcast::Receiver<()>,
    ) -> (mpsc::Sender<PaymentConfirmation>, JoinHandle<PaymentRunSummary>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let confirmations = Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|confirmation| (confirmation, rx))
        }));

        let handle = tokio::spawn(async move { self.run(confirmations, shutdown).await });
        (tx, handle)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::catalog::CampDraft;
    use crate::config::Config;
    use crate::registration::RegistrationStatus;
    use crate::types::{JoinForm, Participant};
    use medcamp_testing::{test_clock, test_epoch};
    use std::sync::Arc;

    async fn joined() -> (RegistrationEngine, Registration) {
        let engine = RegistrationEngine::with_clock(&Config::default(), Arc::new(test_clock()));
        let camp = engine
            .create_camp(CampDraft::new("Blood Drive", Money::from_cents(1500)))
            .await
            .unwrap();
        let registration = engine
            .join(
                camp.id,
                Participant::new("Nadia", "nadia@example.com"),
                JoinForm::new(27, "+880 1711 000000", "Female", "Mother"),
            )
            .await
            .unwrap();
        (engine, registration)
    }

    fn confirmation(registration_id: RegistrationId, cents: u64) -> PaymentConfirmation {
        PaymentConfirmation {
            registration_id,
            transaction_id: "pi_123".into(),
            amount: Money::from_cents(cents),
            paid_at: Some(test_epoch() - chrono::Duration::minutes(5)),
        }
    }

    #[tokio::test]
    async fn test_handle_marks_paid_with_gateway_time() {
        let (engine, registration) = joined().await;
        let adapter = PaymentConfirmationAdapter::new(engine.clone());

        let paid = adapter
            .handle(confirmation(registration.id, 1500))
            .await
            .unwrap();

        let RegistrationStatus::Paid { payment } = &paid.status else {
            panic!("expected Paid, got {}", paid.status);
        };
        assert_eq!(payment.paid_at, test_epoch() - chrono::Duration::minutes(5));
        assert_eq!(engine.payment_history("nadia@example.com").await.len(), 1);
    }

    #[tokio::test]
    async fn test_amount_mismatch_is_rejected() {
        let (engine, registration) = joined().await;
        let adapter = PaymentConfirmationAdapter::new(engine.clone());

        let err = adapter
            .handle(confirmation(registration.id, 999))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert_eq!(
            engine.registration(registration.id).await.unwrap().status,
            RegistrationStatus::Joined
        );
    }

    #[tokio::test]
    async fn test_spawned_adapter_counts_outcomes() {
        let (engine, registration) = joined().await;
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (tx, handle) = PaymentConfirmationAdapter::new(engine).spawn(4, shutdown_rx);

        tx.send(confirmation(registration.id, 1500)).await.unwrap();
        tx.send(confirmation(registration.id, 1500)).await.unwrap();
        tx.send(confirmation(RegistrationId::new(), 1500)).await.unwrap();
        drop(tx);

        let summary = handle.await.unwrap();
        assert_eq!(summary, PaymentRunSummary {
            accepted: 2,
            rejected: 1
        });
    }
}
