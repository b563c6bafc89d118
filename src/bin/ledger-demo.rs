//! Ledger demo
//!
//! Runs the full event-sourcing pipeline on the in-memory transport:
//! create an account, deposit, withdraw, transfer, then compare the live
//! materialized state with a full replay of the event store.
//!
//! Run with: cargo run --bin ledger-demo

use anyhow::{Context, Result};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ledgerstream::consumer::STATE_BUILDER_GROUP;
use ledgerstream::publisher::{EventPublisher, PublisherConfig, ACCOUNT_EVENTS_STREAM};
use ledgerstream::transport::{LogTransport, MemoryTransport};
use ledgerstream::{AccountLedgerService, LedgerView, ProjectionConsumer};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let transport = Arc::new(MemoryTransport::new());
    let view = Arc::new(LedgerView::new());

    // Consumption side: fold delivered events into the view, ack on success
    let subscription = transport
        .subscribe(ACCOUNT_EVENTS_STREAM, STATE_BUILDER_GROUP)
        .await
        .context("subscribe failed")?;
    let consumer = ProjectionConsumer::new(Arc::clone(&view));
    tokio::spawn(consumer.run(subscription));

    // Command side
    let publisher = EventPublisher::new(transport.clone(), PublisherConfig::default());
    let service = AccountLedgerService::new(publisher, Arc::clone(&view));

    service.create_account("A1", "Alice").await?;
    service.create_account("B1", "Bob").await?;
    service.credit("A1", dec!(100.00), "initial deposit").await?;
    service.debit("A1", dec!(30.00), "coffee").await?;
    service.transfer("A1", "B1", dec!(25.00), "rent share").await?;

    // Give the consumer a moment to drain the stream
    tokio::time::sleep(Duration::from_millis(100)).await;

    let alice = service
        .query_state("A1")
        .await
        .context("A1 state missing")?;
    info!(balance = %alice.balance, history = ?alice.history, "live state for A1");

    let replayed = service
        .rebuild("A1")
        .await?
        .context("A1 replay missing")?;
    info!(balance = %replayed.balance, "replayed state for A1");
    assert_eq!(alice, replayed, "replay must match the live view");

    let bob = service.query_state("B1").await.context("B1 state missing")?;
    info!(balance = %bob.balance, "live state for B1");

    Ok(())
}
