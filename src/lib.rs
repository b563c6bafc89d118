//! Event-sourced account ledger on an ordered, partitioned event log
//!
//! Commands become immutable [`events::AccountEvent`]s, published with the
//! account id as partition key so the transport delivers them per-account in
//! order. The consumption driver appends each delivered event to the event
//! store and folds it into the materialized view in one atomic step, acking
//! only on success. Replay reconstructs state from the store alone and, for
//! the same stored sequence, always matches the live view.

pub mod consumer;
pub mod errors;
pub mod events;
pub mod money;
pub mod projection;
pub mod publisher;
pub mod service;
pub mod transport;
pub mod view;

// Re-export commonly used types
pub use consumer::{ProjectionConsumer, STATE_BUILDER_GROUP};
pub use errors::{LedgerError, LedgerResult};
pub use events::AccountEvent;
pub use money::Money;
pub use projection::AccountState;
pub use publisher::{EventPublisher, PublisherConfig, ACCOUNT_EVENTS_STREAM};
pub use service::AccountLedgerService;
pub use transport::{LogTransport, MemoryTransport, NatsLogTransport, NatsTransportConfig};
pub use view::LedgerView;
