//! Event publisher
//!
//! Translates domain events into transport sends. The one rule that must
//! never be broken: the partition key is always the event's account id, so
//! the transport delivers all events of one account in publication order.
//! Varying the key would silently break the fold's correctness.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::errors::{LedgerError, LedgerResult};
use crate::events::AccountEvent;
use crate::transport::{DeliveryReceipt, LogTransport};

/// Default stream carrying account events
pub const ACCOUNT_EVENTS_STREAM: &str = "account-events";

/// Configuration for the event publisher
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Stream single-event publishes go to
    pub stream: String,
    /// Upper bound on an atomic commit before the outcome is declared
    /// ambiguous
    pub commit_timeout: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            stream: ACCOUNT_EVENTS_STREAM.to_string(),
            commit_timeout: Duration::from_secs(5),
        }
    }
}

/// Publishes account events through the ordered log transport
///
/// Does not retry internally; transport failures surface to the caller,
/// which owns the retry policy.
#[derive(Clone)]
pub struct EventPublisher {
    transport: Arc<dyn LogTransport>,
    config: PublisherConfig,
}

impl EventPublisher {
    /// Create a publisher over a transport
    pub fn new(transport: Arc<dyn LogTransport>, config: PublisherConfig) -> Self {
        Self { transport, config }
    }

    /// The stream single-event publishes go to
    pub fn stream(&self) -> &str {
        &self.config.stream
    }

    /// Publish one event to the account-events stream
    ///
    /// Partition key is the event's account id.
    pub async fn publish(&self, event: &AccountEvent) -> LedgerResult<DeliveryReceipt> {
        let payload = serde_json::to_vec(event)?;
        let receipt = self
            .transport
            .send(&self.config.stream, event.account_id(), payload)
            .await?;

        debug!(
            account_id = event.account_id(),
            event_type = event.event_type_name(),
            sequence = receipt.sequence,
            "event published"
        );
        Ok(receipt)
    }

    /// Publish a set of events atomically, possibly across streams
    ///
    /// Either every entry becomes visible to consumers or none does. An
    /// enqueue failure aborts cleanly (`TransactionAborted`). A commit that
    /// cannot be confirmed either way, including timeout expiry, surfaces as
    /// `AmbiguousOutcome` — the events may have landed, so the caller must
    /// not blindly retry without an idempotency key.
    pub async fn publish_atomic(&self, entries: &[(String, AccountEvent)]) -> LedgerResult<()> {
        // Serialize everything up front; a bad payload fails before the
        // transaction even opens.
        let mut sends = Vec::with_capacity(entries.len());
        for (stream, event) in entries {
            sends.push((stream.as_str(), event.account_id(), serde_json::to_vec(event)?));
        }

        let mut txn = self.transport.begin_atomic().await?;
        for (stream, partition_key, payload) in sends {
            if let Err(e) = txn.send(stream, partition_key, payload).await {
                error!("atomic publish enqueue failed: {e}");
                if let Err(abort_err) = txn.abort().await {
                    warn!("transaction abort after enqueue failure also failed: {abort_err}");
                }
                return Err(LedgerError::TransactionAborted(e.to_string()));
            }
        }

        match timeout(self.config.commit_timeout, txn.commit()).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::AmbiguousOutcome(format!(
                "commit not confirmed within {:?}",
                self.config.commit_timeout
            ))),
        }
    }
}
