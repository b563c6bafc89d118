//! Account Domain Events
//!
//! All state changes to an account are represented as immutable events.
//! Events follow event sourcing conventions:
//! - Immutable (constructed once, never mutated)
//! - Past tense naming (`Credited`, not `Credit`)
//! - Globally unique `event_id` assigned at creation, never reused
//! - Serializable for transport and storage

pub mod account;

pub use account::{AccountCreated, AccountEvent, MoneyCredited, MoneyDebited};
