//! Ordered log transport abstraction
//!
//! The ledger core does not talk to a broker directly; it talks to these
//! traits. The transport must provide:
//!
//! - **Per-key ordering**: two sends with the same partition key to the same
//!   stream are delivered to consumers in send order
//! - **At-least-once delivery**: a delivered record is redelivered until its
//!   ack is invoked
//! - **Atomic multi-send**: a transaction either makes every enqueued send
//!   visible across all target streams, or none of them
//!
//! `MemoryTransport` implements the contract in-process; `NatsLogTransport`
//! adapts NATS JetStream.

use async_trait::async_trait;

use crate::errors::LedgerResult;

pub mod memory;
pub mod nats;

pub use memory::MemoryTransport;
pub use nats::{NatsLogTransport, NatsTransportConfig};

/// Receipt returned for an accepted single send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Stream the record was appended to
    pub stream: String,
    /// Partition key the record was sent under
    pub partition_key: String,
    /// Broker-assigned sequence within the stream
    pub sequence: u64,
}

/// A record as delivered to a consumer
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// Stream the record came from
    pub stream: String,
    /// Partition key it was produced with
    pub partition_key: String,
    /// Opaque payload bytes
    pub payload: Vec<u8>,
    /// Broker-assigned sequence within the stream
    pub sequence: u64,
}

/// Ordered, partitioned, append-only log client
#[async_trait]
pub trait LogTransport: Send + Sync {
    /// Send a single record
    ///
    /// Two sends with the same `partition_key` to the same stream are
    /// delivered to consumers in send order.
    async fn send(
        &self,
        stream: &str,
        partition_key: &str,
        payload: Vec<u8>,
    ) -> LedgerResult<DeliveryReceipt>;

    /// Open an atomic multi-send transaction
    async fn begin_atomic(&self) -> LedgerResult<Box<dyn LogTransaction>>;

    /// Subscribe to a stream as a member of a consumer group
    ///
    /// Records are delivered at least once: a record stays pending until its
    /// delivery is acknowledged.
    async fn subscribe(&self, stream: &str, group: &str) -> LedgerResult<Box<dyn LogSubscription>>;
}

/// Handle for an open atomic multi-send transaction
///
/// Enqueued sends are invisible to all subscribers until `commit` succeeds.
#[async_trait]
pub trait LogTransaction: Send {
    /// Enqueue a send within the transaction
    async fn send(&mut self, stream: &str, partition_key: &str, payload: Vec<u8>)
        -> LedgerResult<()>;

    /// Commit every enqueued send atomically
    ///
    /// Fails with `TransactionAborted` when the transaction rolled back
    /// cleanly, or `AmbiguousOutcome` when the transport cannot confirm
    /// which branch occurred.
    async fn commit(self: Box<Self>) -> LedgerResult<()>;

    /// Discard every enqueued send
    async fn abort(self: Box<Self>) -> LedgerResult<()>;
}

/// An open subscription yielding deliveries in partition order
#[async_trait]
pub trait LogSubscription: Send {
    /// Next delivery, or `None` when the subscription is closed
    async fn next(&mut self) -> Option<Delivery>;
}

/// Acknowledgment token for a single delivery
#[async_trait]
pub trait AckToken: Send {
    /// Mark the delivery processed; the record will not be redelivered
    async fn ack(self: Box<Self>) -> LedgerResult<()>;
}

/// One delivered record together with its acknowledgment token
pub struct Delivery {
    /// The delivered record
    pub record: LogRecord,
    acker: Box<dyn AckToken>,
}

impl Delivery {
    /// Pair a record with its ack token
    pub fn new(record: LogRecord, acker: Box<dyn AckToken>) -> Self {
        Self { record, acker }
    }

    /// Acknowledge the delivery
    ///
    /// Until this is called the transport treats the record as unprocessed
    /// and will redeliver it.
    pub async fn ack(self) -> LedgerResult<()> {
        self.acker.ack().await
    }
}
