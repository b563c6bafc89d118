//! In-process transport implementing the ordered log contract
//!
//! Backs tests and local runs with the same semantics the core expects from
//! a real broker: per-stream ordered logs, consumer-group cursors,
//! at-least-once redelivery of unacknowledged records, and an atomic
//! multi-send whose commit is a single critical section (so partial
//! visibility cannot occur).
//!
//! Commit faults can be injected to exercise the abort and
//! ambiguous-outcome paths without a broker.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::errors::{LedgerError, LedgerResult};
use crate::transport::{
    AckToken, Delivery, DeliveryReceipt, LogRecord, LogSubscription, LogTransaction, LogTransport,
};

#[derive(Debug, Clone)]
struct StoredRecord {
    partition_key: String,
    payload: Vec<u8>,
    sequence: u64,
}

#[derive(Debug, Default)]
struct StreamLog {
    records: Vec<StoredRecord>,
    next_sequence: u64,
}

impl StreamLog {
    fn append(&mut self, partition_key: &str, payload: Vec<u8>) -> u64 {
        self.next_sequence += 1;
        let sequence = self.next_sequence;
        self.records.push(StoredRecord {
            partition_key: partition_key.to_string(),
            payload,
            sequence,
        });
        sequence
    }
}

/// Per consumer-group delivery state
#[derive(Debug, Default)]
struct GroupCursor {
    /// Index of the next never-delivered record
    next_index: usize,
    /// Indices delivered but not yet acknowledged
    pending: Vec<usize>,
    /// Indices queued for redelivery, drained before new records
    redeliver: VecDeque<usize>,
}

#[derive(Default)]
struct MemoryInner {
    streams: HashMap<String, StreamLog>,
    cursors: HashMap<(String, String), GroupCursor>,
    fail_next_commit: bool,
    ambiguous_next_commit: bool,
    hang_next_commit: bool,
}

/// In-memory ordered log transport
///
/// Redelivery is hook-driven, not timer-driven: an unacknowledged record
/// stays pending until [`MemoryTransport::redeliver_unacked`] queues it
/// again. A broker would redeliver on an ack deadline instead; tests drive
/// the hook at the exact point the scenario calls for a redelivery.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Mutex<MemoryInner>>,
    notify: Arc<Notify>,
}

impl MemoryTransport {
    /// Create an empty transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next transaction commit fail with a clean abort
    pub async fn fail_next_commit(&self) {
        self.inner.lock().await.fail_next_commit = true;
    }

    /// Make the next transaction commit land but report an unknown outcome
    ///
    /// Models a broker that committed after a client-visible timeout: the
    /// records become visible even though the caller saw an error.
    pub async fn ambiguous_next_commit(&self) {
        self.inner.lock().await.ambiguous_next_commit = true;
    }

    /// Make the next transaction commit never respond
    ///
    /// Models a broker whose commit response is lost in flight; the
    /// caller's commit timeout decides how the outcome surfaces.
    pub async fn hang_next_commit(&self) {
        self.inner.lock().await.hang_next_commit = true;
    }

    /// Queue every unacknowledged record of a group for redelivery
    ///
    /// Redeliveries preserve delivery order and are drained before any
    /// never-delivered record.
    pub async fn redeliver_unacked(&self, stream: &str, group: &str) {
        let mut inner = self.inner.lock().await;
        let key = (stream.to_string(), group.to_string());
        if let Some(cursor) = inner.cursors.get_mut(&key) {
            let pending = cursor.pending.clone();
            cursor.redeliver.extend(pending);
        }
        self.notify.notify_waiters();
    }

    /// All records currently visible on a stream, in append order
    ///
    /// Visibility here is what any subscriber would observe; used by tests
    /// to assert that an aborted transaction left nothing behind.
    pub async fn visible_records(&self, stream: &str) -> Vec<LogRecord> {
        let inner = self.inner.lock().await;
        inner
            .streams
            .get(stream)
            .map(|log| {
                log.records
                    .iter()
                    .map(|r| LogRecord {
                        stream: stream.to_string(),
                        partition_key: r.partition_key.clone(),
                        payload: r.payload.clone(),
                        sequence: r.sequence,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl LogTransport for MemoryTransport {
    async fn send(
        &self,
        stream: &str,
        partition_key: &str,
        payload: Vec<u8>,
    ) -> LedgerResult<DeliveryReceipt> {
        let mut inner = self.inner.lock().await;
        let log = inner.streams.entry(stream.to_string()).or_default();
        let sequence = log.append(partition_key, payload);
        drop(inner);

        self.notify.notify_waiters();
        debug!(stream, partition_key, sequence, "record appended");

        Ok(DeliveryReceipt {
            stream: stream.to_string(),
            partition_key: partition_key.to_string(),
            sequence,
        })
    }

    async fn begin_atomic(&self) -> LedgerResult<Box<dyn LogTransaction>> {
        Ok(Box::new(MemoryTransaction {
            inner: Arc::clone(&self.inner),
            notify: Arc::clone(&self.notify),
            buffered: Vec::new(),
        }))
    }

    async fn subscribe(&self, stream: &str, group: &str) -> LedgerResult<Box<dyn LogSubscription>> {
        let mut inner = self.inner.lock().await;
        inner
            .cursors
            .entry((stream.to_string(), group.to_string()))
            .or_default();

        Ok(Box::new(MemorySubscription {
            inner: Arc::clone(&self.inner),
            notify: Arc::clone(&self.notify),
            stream: stream.to_string(),
            group: group.to_string(),
        }))
    }
}

/// Buffered multi-send transaction; nothing is visible until commit
struct MemoryTransaction {
    inner: Arc<Mutex<MemoryInner>>,
    notify: Arc<Notify>,
    buffered: Vec<(String, String, Vec<u8>)>,
}

#[async_trait]
impl LogTransaction for MemoryTransaction {
    async fn send(
        &mut self,
        stream: &str,
        partition_key: &str,
        payload: Vec<u8>,
    ) -> LedgerResult<()> {
        self.buffered
            .push((stream.to_string(), partition_key.to_string(), payload));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> LedgerResult<()> {
        // Single critical section: either every buffered send is appended or
        // none is, so no subscriber can observe a partial commit.
        let mut inner = self.inner.lock().await;

        if inner.hang_next_commit {
            inner.hang_next_commit = false;
            drop(inner);
            // The commit request is in flight but no response ever arrives
            return std::future::pending().await;
        }

        if inner.fail_next_commit {
            inner.fail_next_commit = false;
            return Err(LedgerError::TransactionAborted(
                "injected commit failure".to_string(),
            ));
        }

        let ambiguous = inner.ambiguous_next_commit;
        inner.ambiguous_next_commit = false;

        for (stream, partition_key, payload) in self.buffered {
            let log = inner.streams.entry(stream).or_default();
            log.append(&partition_key, payload);
        }
        drop(inner);
        self.notify.notify_waiters();

        if ambiguous {
            return Err(LedgerError::AmbiguousOutcome(
                "commit response lost after broker applied it".to_string(),
            ));
        }
        Ok(())
    }

    async fn abort(self: Box<Self>) -> LedgerResult<()> {
        // Buffered sends are simply dropped
        Ok(())
    }
}

struct MemorySubscription {
    inner: Arc<Mutex<MemoryInner>>,
    notify: Arc<Notify>,
    stream: String,
    group: String,
}

impl MemorySubscription {
    /// Take the next deliverable record index, redeliveries first
    fn try_take(&self, inner: &mut MemoryInner) -> Option<usize> {
        let records_len = inner
            .streams
            .get(&self.stream)
            .map(|log| log.records.len())
            .unwrap_or(0);

        let cursor = inner
            .cursors
            .get_mut(&(self.stream.clone(), self.group.clone()))?;

        if let Some(index) = cursor.redeliver.pop_front() {
            return Some(index);
        }
        if cursor.next_index < records_len {
            let index = cursor.next_index;
            cursor.next_index += 1;
            cursor.pending.push(index);
            return Some(index);
        }
        None
    }
}

#[async_trait]
impl LogSubscription for MemorySubscription {
    async fn next(&mut self) -> Option<Delivery> {
        loop {
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock().await;
                if let Some(index) = self.try_take(&mut inner) {
                    let stored = &inner.streams.get(&self.stream)?.records[index];
                    let record = LogRecord {
                        stream: self.stream.clone(),
                        partition_key: stored.partition_key.clone(),
                        payload: stored.payload.clone(),
                        sequence: stored.sequence,
                    };
                    let acker = Box::new(MemoryAckToken {
                        inner: Arc::clone(&self.inner),
                        stream: self.stream.clone(),
                        group: self.group.clone(),
                        index,
                    });
                    return Some(Delivery::new(record, acker));
                }
            }
            notified.await;
        }
    }
}

struct MemoryAckToken {
    inner: Arc<Mutex<MemoryInner>>,
    stream: String,
    group: String,
    index: usize,
}

#[async_trait]
impl AckToken for MemoryAckToken {
    async fn ack(self: Box<Self>) -> LedgerResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(cursor) = inner.cursors.get_mut(&(self.stream, self.group)) {
            cursor.pending.retain(|&i| i != self.index);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_key_records_delivered_in_send_order() {
        let transport = MemoryTransport::new();
        transport.send("s", "k", b"one".to_vec()).await.unwrap();
        transport.send("s", "k", b"two".to_vec()).await.unwrap();

        let mut sub = transport.subscribe("s", "g").await.unwrap();
        let first = sub.next().await.unwrap();
        let second = sub.next().await.unwrap();
        assert_eq!(first.record.payload, b"one");
        assert_eq!(second.record.payload, b"two");
    }

    #[tokio::test]
    async fn unacked_records_are_redelivered() {
        let transport = MemoryTransport::new();
        transport.send("s", "k", b"one".to_vec()).await.unwrap();

        let mut sub = transport.subscribe("s", "g").await.unwrap();
        let first = sub.next().await.unwrap();
        // Not acked: queue it again
        drop(first);
        transport.redeliver_unacked("s", "g").await;

        let again = sub.next().await.unwrap();
        assert_eq!(again.record.payload, b"one");
        again.ack().await.unwrap();

        transport.redeliver_unacked("s", "g").await;
        let mut inner = transport.inner.lock().await;
        let cursor = inner
            .cursors
            .get_mut(&("s".to_string(), "g".to_string()))
            .unwrap();
        assert!(cursor.redeliver.is_empty());
        assert!(cursor.pending.is_empty());
    }

    #[tokio::test]
    async fn aborted_transaction_is_never_visible() {
        let transport = MemoryTransport::new();
        let mut txn = transport.begin_atomic().await.unwrap();
        txn.send("a", "k", b"one".to_vec()).await.unwrap();
        txn.send("b", "k", b"two".to_vec()).await.unwrap();
        txn.abort().await.unwrap();

        assert!(transport.visible_records("a").await.is_empty());
        assert!(transport.visible_records("b").await.is_empty());
    }
}
