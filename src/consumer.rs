//! Consumption driver
//!
//! Bridges the transport subscription to the ledger: for each delivered
//! record, append to the event store and fold into the live view as one
//! atomic step, then acknowledge. A record is acknowledged only after both
//! succeed; on failure it stays unacknowledged and the transport's
//! at-least-once redelivery is the recovery mechanism — there is no retry
//! loop here.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::errors::LedgerResult;
use crate::projection::AccountState;
use crate::transport::{LogRecord, LogSubscription};
use crate::view::LedgerView;

/// Consumer group name used by the ledger state builder
pub const STATE_BUILDER_GROUP: &str = "account-state-builder";

/// Folds delivered account events into the shared ledger view
#[derive(Clone)]
pub struct ProjectionConsumer {
    view: Arc<LedgerView>,
}

impl ProjectionConsumer {
    /// Create a consumer writing into the given view
    pub fn new(view: Arc<LedgerView>) -> Self {
        Self { view }
    }

    /// Process one delivered record: deserialize, append, fold
    ///
    /// Store append and live fold happen inside one critical section in the
    /// view, so this either fully applies the record or leaves no trace.
    pub async fn process_record(&self, record: &LogRecord) -> LedgerResult<AccountState> {
        let event = serde_json::from_slice(&record.payload)?;
        self.view.append_and_apply(&event).await
    }

    /// Drive a subscription until it closes
    ///
    /// Acknowledges each record only after it was appended and folded; a
    /// failed record is left unacknowledged for redelivery.
    pub async fn run(self, mut subscription: Box<dyn LogSubscription>) {
        while let Some(delivery) = subscription.next().await {
            let record = &delivery.record;
            match self.process_record(record).await {
                Ok(state) => {
                    info!(
                        account_id = %record.partition_key,
                        balance = %state.balance,
                        "event folded"
                    );
                    if let Err(e) = delivery.ack().await {
                        // The transport will redeliver; with no dedup below
                        // this layer, the duplicate will fold again.
                        warn!("ack failed, record will be redelivered: {e}");
                    }
                }
                Err(e) => {
                    error!(
                        account_id = %record.partition_key,
                        sequence = record.sequence,
                        "record left unacknowledged: {e}"
                    );
                }
            }
        }
        info!("subscription closed, consumer stopping");
    }
}
