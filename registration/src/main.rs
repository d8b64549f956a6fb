//! CLI demo for the medcamp registration engine.
//!
//! Walks one camp through the full lifecycle: joins, a gateway payment,
//! confirmation, a refused cancellation, a permitted one, and feedback.

use medcamp_registration::{
    CampDraft, Config, JoinForm, Participant, PaymentConfirmation, PaymentConfirmationAdapter,
    RegistrationEngine, RegistrationError, validation,
};
use medcamp_runtime::metrics::MetricsRecorder;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let recorder = MetricsRecorder::install()?;
    medcamp_registration::metrics::register_business_metrics();
    info!(?config, "Configuration loaded");

    println!("=== Medcamp: Registration Lifecycle ===\n");

    let engine = RegistrationEngine::new(&config);
    let mut events = engine.subscribe();

    let camp = engine
        .create_camp(
            CampDraft::new("Free Eye Screening", validation::parse_fee("25.00")?)
                .with_location("Community Hall, Sylhet")
                .with_professional("Dr. Farhana Ahmed"),
        )
        .await?;
    println!("Created camp '{}' (fee {})", camp.name, camp.fee);

    let form = || JoinForm::new(34, "+880 1711-000000", "Female", "Rafiq, +880 1711-111111");
    let alice = engine
        .join(camp.id, Participant::new("Alice", "alice@example.com"), form())
        .await?;
    let bob = engine
        .join(camp.id, Participant::new("Bob", "bob@example.com"), form())
        .await?;
    print_count(&engine, &camp.id).await;

    match engine
        .join(camp.id, Participant::new("Alice", "ALICE@example.com"), form())
        .await
    {
        Err(RegistrationError::DuplicateRegistration { .. }) => {
            println!("Alice's second join refused as a duplicate");
        },
        other => println!("Unexpected duplicate join result: {other:?}"),
    }

    // Payments arrive through the gateway adapter
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let (payments, adapter) = PaymentConfirmationAdapter::new(engine.clone())
        .spawn(config.payment_queue_capacity, shutdown_rx);
    for _ in 0..2 {
        // The gateway retries; the second delivery is a no-op
        payments
            .send(PaymentConfirmation {
                registration_id: alice.id,
                transaction_id: "tx_001".into(),
                amount: alice.fee,
                paid_at: None,
            })
            .await?;
    }
    drop(payments);
    let summary = adapter.await?;
    drop(shutdown_tx);
    println!(
        "Gateway deliveries: {} accepted, {} rejected",
        summary.accepted, summary.rejected
    );

    if let Err(error) = engine.confirm(bob.id).await {
        println!("Confirming Bob: {error}");
    }
    let alice = engine.confirm(alice.id).await?;
    println!("Alice is now {}", alice.status);

    if let Err(error) = engine.cancel(alice.id).await {
        println!("Cancelling Alice: {error}");
    }
    let bob = engine.cancel(bob.id).await?;
    println!("Bob is now {}", bob.status);
    print_count(&engine, &camp.id).await;

    let entry = engine.submit_feedback(alice.id, 5, "great").await?;
    println!("Alice rated the camp {}", entry.rating);
    if let Err(error) = engine.submit_feedback(bob.id, 4, "ok").await {
        println!("Bob's feedback: {error}");
    }

    let summary = engine.participant_summary("alice@example.com").await;
    println!("\nAlice's summary: {}", serde_json::to_string(&summary)?);

    let mut applied = 0;
    while events.try_recv().is_ok() {
        applied += 1;
    }
    println!("{applied} events published");

    let snapshot = engine.snapshot().await;
    println!(
        "Snapshot: {} camp(s), {} registration(s), {} payment(s), {} feedback",
        snapshot.camps.len(),
        snapshot.registrations.len(),
        snapshot.payments.len(),
        snapshot.feedback.len()
    );

    engine.shutdown().await?;

    if let Some(rendered) = recorder.render() {
        println!("\n--- metrics ---\n{rendered}");
    }

    Ok(())
}

async fn print_count(engine: &RegistrationEngine, camp_id: &medcamp_registration::CampId) {
    if let Some(camp) = engine.camp(*camp_id).await {
        println!("  participant count: {}", camp.participant_count);
    }
}
