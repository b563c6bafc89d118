//! NATS JetStream adapter for the ordered log transport
//!
//! Subjects follow `{prefix}.{stream}.{partition_key}`; each logical stream
//! maps to one JetStream stream capturing `{prefix}.{stream}.>`, and consumer
//! groups map to durable pull consumers with explicit acks. JetStream
//! preserves publish order within a stream, which gives the per-key ordering
//! the core relies on.
//!
//! JetStream has no multi-stream transaction primitive, so `begin_atomic`
//! uses an outbox scheme: commit writes an intent record, flushes the
//! buffered sends with `Nats-Msg-Id` headers (broker-side dedup makes the
//! flush safe to repeat), then writes a completion marker. A failure before
//! any data publish is a clean abort; a failure mid-flush is ambiguous.

use async_nats::jetstream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{LedgerError, LedgerResult};
use crate::transport::{
    AckToken, Delivery, DeliveryReceipt, LogRecord, LogSubscription, LogTransaction, LogTransport,
};

/// Configuration for the JetStream transport
#[derive(Debug, Clone)]
pub struct NatsTransportConfig {
    /// NATS server URLs
    pub servers: Vec<String>,
    /// Client name
    pub name: String,
    /// Subject prefix for all ledger streams
    pub subject_prefix: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Maximum age of stored records
    pub max_age: Duration,
}

impl Default for NatsTransportConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://localhost:4222".to_string()],
            name: "ledgerstream".to_string(),
            subject_prefix: "ledger".to_string(),
            connect_timeout: Duration::from_secs(10),
            max_age: Duration::from_secs(30 * 24 * 60 * 60),
        }
    }
}

/// Intent record written before an atomic flush; the reconciliation hook
/// when a commit outcome is ambiguous
#[derive(Debug, Serialize, Deserialize)]
struct TxnIntent {
    txn_id: Uuid,
    entries: Vec<(String, String)>,
}

/// JetStream-backed ordered log transport
#[derive(Clone)]
pub struct NatsLogTransport {
    jetstream: jetstream::Context,
    config: NatsTransportConfig,
    /// Streams already provisioned by this client
    known_streams: Arc<Mutex<HashSet<String>>>,
}

impl NatsLogTransport {
    /// Connect to NATS and set up the JetStream context
    pub async fn connect(config: NatsTransportConfig) -> LedgerResult<Self> {
        let connect_options = async_nats::ConnectOptions::new()
            .name(&config.name)
            .connection_timeout(config.connect_timeout);

        let client = async_nats::connect_with_options(config.servers.join(","), connect_options)
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        info!("Connected to NATS at {:?}", config.servers);

        Ok(Self {
            jetstream: jetstream::new(client),
            config,
            known_streams: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    /// Subject for one record: `{prefix}.{stream}.{partition_key}`
    fn subject(&self, stream: &str, partition_key: &str) -> String {
        format!("{}.{}.{}", self.config.subject_prefix, stream, partition_key)
    }

    /// JetStream stream name for a logical stream
    fn stream_name(&self, stream: &str) -> String {
        format!(
            "{}_{}",
            self.config.subject_prefix.to_uppercase(),
            stream.to_uppercase().replace('-', "_")
        )
    }

    /// Create the JetStream stream for a logical stream if needed
    async fn ensure_stream(&self, stream: &str) -> LedgerResult<jetstream::stream::Stream> {
        let name = self.stream_name(stream);

        let stream_config = jetstream::stream::Config {
            name: name.clone(),
            subjects: vec![format!("{}.{}.>", self.config.subject_prefix, stream)],
            max_age: self.config.max_age,
            retention: jetstream::stream::RetentionPolicy::Limits,
            ..Default::default()
        };

        let js_stream = self
            .jetstream
            .get_or_create_stream(stream_config)
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        let mut known = self.known_streams.lock().await;
        if known.insert(name.clone()) {
            debug!(stream = %name, "jetstream stream ready");
        }

        Ok(js_stream)
    }

    async fn publish_record(
        &self,
        stream: &str,
        partition_key: &str,
        payload: Vec<u8>,
        msg_id: Option<String>,
    ) -> LedgerResult<u64> {
        self.ensure_stream(stream).await?;
        let subject = self.subject(stream, partition_key);

        let ack = match msg_id {
            Some(id) => {
                let mut headers = async_nats::HeaderMap::new();
                headers.insert("Nats-Msg-Id", id.as_str());
                self.jetstream
                    .publish_with_headers(subject, headers, payload.into())
                    .await
            }
            None => self.jetstream.publish(subject, payload.into()).await,
        }
        .map_err(|e| LedgerError::Transport(e.to_string()))?
        .await
        .map_err(|e| LedgerError::Transport(e.to_string()))?;

        Ok(ack.sequence)
    }
}

#[async_trait]
impl LogTransport for NatsLogTransport {
    async fn send(
        &self,
        stream: &str,
        partition_key: &str,
        payload: Vec<u8>,
    ) -> LedgerResult<DeliveryReceipt> {
        let sequence = self
            .publish_record(stream, partition_key, payload, None)
            .await?;

        debug!(stream, partition_key, sequence, "record published");

        Ok(DeliveryReceipt {
            stream: stream.to_string(),
            partition_key: partition_key.to_string(),
            sequence,
        })
    }

    async fn begin_atomic(&self) -> LedgerResult<Box<dyn LogTransaction>> {
        Ok(Box::new(NatsTransaction {
            transport: self.clone(),
            txn_id: Uuid::now_v7(),
            buffered: Vec::new(),
        }))
    }

    async fn subscribe(&self, stream: &str, group: &str) -> LedgerResult<Box<dyn LogSubscription>> {
        let js_stream = self.ensure_stream(stream).await?;

        let consumer = js_stream
            .get_or_create_consumer(
                group,
                jetstream::consumer::pull::Config {
                    durable_name: Some(group.to_string()),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| LedgerError::Subscription(e.to_string()))?;

        let messages = consumer
            .messages()
            .await
            .map_err(|e| LedgerError::Subscription(e.to_string()))?;

        info!(stream, group, "subscribed");

        Ok(Box::new(NatsSubscription {
            messages,
            stream: stream.to_string(),
        }))
    }
}

/// Outbox-style transaction over JetStream
struct NatsTransaction {
    transport: NatsLogTransport,
    txn_id: Uuid,
    buffered: Vec<(String, String, Vec<u8>)>,
}

impl NatsTransaction {
    fn txn_subject(&self, phase: &str) -> String {
        format!(
            "{}.txn.{}.{}",
            self.transport.config.subject_prefix, phase, self.txn_id
        )
    }
}

#[async_trait]
impl LogTransaction for NatsTransaction {
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
        let intent = TxnIntent {
            txn_id: self.txn_id,
            entries: self
                .buffered
                .iter()
                .map(|(stream, key, _)| (stream.clone(), key.clone()))
                .collect(),
        };
        let intent_payload = serde_json::to_vec(&intent)?;

        // Nothing is visible until the intent is durable; failing here is a
        // clean abort.
        self.transport
            .publish_record("txn", &format!("intent.{}", self.txn_id), intent_payload, None)
            .await
            .map_err(|e| LedgerError::TransactionAborted(e.to_string()))?;

        // Flush the buffered sends. Msg-Id headers let a reconciler repeat
        // the flush without duplicating records.
        for (index, (stream, partition_key, payload)) in self.buffered.into_iter().enumerate() {
            let msg_id = format!("{}-{}", self.txn_id, index);
            if let Err(e) = self
                .transport
                .publish_record(&stream, &partition_key, payload, Some(msg_id))
                .await
            {
                warn!(txn_id = %self.txn_id, %stream, "atomic flush interrupted: {e}");
                return Err(LedgerError::AmbiguousOutcome(format!(
                    "flush interrupted after intent {}: {e}",
                    self.txn_id
                )));
            }
        }

        self.transport
            .publish_record(
                "txn",
                &format!("committed.{}", self.txn_id),
                Vec::new(),
                None,
            )
            .await
            .map_err(|e| {
                LedgerError::AmbiguousOutcome(format!(
                    "records flushed but completion marker failed for {}: {e}",
                    self.txn_id
                ))
            })?;

        debug!(txn_id = %self.txn_id, "atomic publish committed");
        Ok(())
    }

    async fn abort(self: Box<Self>) -> LedgerResult<()> {
        // Buffered sends were never published
        debug!(txn_id = %self.txn_id, "atomic publish aborted");
        Ok(())
    }
}

struct NatsSubscription {
    messages: jetstream::consumer::pull::Stream,
    stream: String,
}

#[async_trait]
impl LogSubscription for NatsSubscription {
    async fn next(&mut self) -> Option<Delivery> {
        loop {
            let message = match self.messages.next().await? {
                Ok(message) => message,
                Err(e) => {
                    warn!(stream = %self.stream, "delivery error: {e}");
                    continue;
                }
            };

            let sequence = match message.info() {
                Ok(info) => info.stream_sequence,
                Err(e) => {
                    warn!(stream = %self.stream, "delivery info unavailable, sequence unknown: {e}");
                    0
                }
            };

            // Partition key is the subject tail after `{prefix}.{stream}.`
            let partition_key = message
                .subject
                .as_str()
                .rsplit('.')
                .next()
                .unwrap_or_default()
                .to_string();

            let record = LogRecord {
                stream: self.stream.clone(),
                partition_key,
                payload: message.payload.to_vec(),
                sequence,
            };

            return Some(Delivery::new(record, Box::new(NatsAckToken { message })));
        }
    }
}

struct NatsAckToken {
    message: jetstream::Message,
}

#[async_trait]
impl AckToken for NatsAckToken {
    async fn ack(self: Box<Self>) -> LedgerResult<()> {
        self.message
            .ack()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = NatsTransportConfig::default();
        assert_eq!(config.subject_prefix, "ledger");
        assert_eq!(config.servers, vec!["nats://localhost:4222"]);
    }

    #[test]
    fn txn_intent_round_trips() {
        let intent = TxnIntent {
            txn_id: Uuid::now_v7(),
            entries: vec![("account-events".to_string(), "A1".to_string())],
        };
        let bytes = serde_json::to_vec(&intent).unwrap();
        let back: TxnIntent = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back.txn_id, intent.txn_id);
        assert_eq!(back.entries, intent.entries);
    }
}
