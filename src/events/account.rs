//! Account event variants
//!
//! The event set is closed: the projection folds it with an exhaustive
//! match, so adding a variant here without updating the fold is a compile
//! error, not a silent no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Money;

/// Account Domain Events
///
/// Each variant is a fact that has occurred for exactly one account,
/// identified by `account_id`. All events for one account are published with
/// that id as the partition key, which is what guarantees the consumer sees
/// them in publication order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccountEvent {
    /// Account was created
    Created(AccountCreated),

    /// Money was credited to the account
    Credited(MoneyCredited),

    /// Money was debited from the account
    Debited(MoneyDebited),
}

/// Account was initially created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountCreated {
    /// Unique event identifier (UUID v7 for time ordering)
    pub event_id: Uuid,

    /// Account aggregate key
    pub account_id: String,

    /// When this event occurred
    pub occurred_at: DateTime<Utc>,

    /// Display name of the account owner
    pub owner_name: String,
}

/// Money was credited to an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneyCredited {
    /// Unique event identifier (UUID v7 for time ordering)
    pub event_id: Uuid,

    /// Account aggregate key
    pub account_id: String,

    /// When this event occurred
    pub occurred_at: DateTime<Utc>,

    /// Amount credited; always non-negative, sign implied by the variant
    pub amount: Money,

    /// Free-form description for the ledger history
    pub description: String,
}

/// Money was debited from an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneyDebited {
    /// Unique event identifier (UUID v7 for time ordering)
    pub event_id: Uuid,

    /// Account aggregate key
    pub account_id: String,

    /// When this event occurred
    pub occurred_at: DateTime<Utc>,

    /// Amount debited; always non-negative, sign implied by the variant
    pub amount: Money,

    /// Free-form description for the ledger history
    pub description: String,
}

impl AccountCreated {
    /// Create a new event with a fresh identity and the current time
    pub fn new(account_id: impl Into<String>, owner_name: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            account_id: account_id.into(),
            occurred_at: Utc::now(),
            owner_name: owner_name.into(),
        }
    }
}

impl MoneyCredited {
    /// Create a new event with a fresh identity and the current time
    pub fn new(account_id: impl Into<String>, amount: Money, description: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            account_id: account_id.into(),
            occurred_at: Utc::now(),
            amount,
            description: description.into(),
        }
    }
}

impl MoneyDebited {
    /// Create a new event with a fresh identity and the current time
    pub fn new(account_id: impl Into<String>, amount: Money, description: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            account_id: account_id.into(),
            occurred_at: Utc::now(),
            amount,
            description: description.into(),
        }
    }
}

impl AccountEvent {
    /// Extract the event ID from any variant
    pub fn event_id(&self) -> Uuid {
        match self {
            AccountEvent::Created(e) => e.event_id,
            AccountEvent::Credited(e) => e.event_id,
            AccountEvent::Debited(e) => e.event_id,
        }
    }

    /// Extract the aggregate key from any variant
    pub fn account_id(&self) -> &str {
        match self {
            AccountEvent::Created(e) => &e.account_id,
            AccountEvent::Credited(e) => &e.account_id,
            AccountEvent::Debited(e) => &e.account_id,
        }
    }

    /// Extract the occurrence timestamp from any variant
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AccountEvent::Created(e) => e.occurred_at,
            AccountEvent::Credited(e) => e.occurred_at,
            AccountEvent::Debited(e) => e.occurred_at,
        }
    }

    /// Human-readable event type name
    pub fn event_type_name(&self) -> &'static str {
        match self {
            AccountEvent::Created(_) => "created",
            AccountEvent::Credited(_) => "credited",
            AccountEvent::Debited(_) => "debited",
        }
    }
}
