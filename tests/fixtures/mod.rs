//! Test fixtures
//!
//! Deterministic test data for event and projection tests. All UUIDs and
//! timestamps are fixed constants so tests are reproducible; tests build
//! events through these fixtures, never through the `new` constructors that
//! stamp wall-clock time.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use ledgerstream::events::{AccountCreated, AccountEvent, MoneyCredited, MoneyDebited};
use ledgerstream::money::Money;

// Fixed test UUIDs (UUID v7 shaped, deterministic)
pub const EVENT_ID_1: &str = "01934f4a-0001-7000-8000-000000000001";
pub const EVENT_ID_2: &str = "01934f4a-0002-7000-8000-000000000002";
pub const EVENT_ID_3: &str = "01934f4a-0003-7000-8000-000000000003";
pub const EVENT_ID_4: &str = "01934f4a-0004-7000-8000-000000000004";

// Fixed test timestamp
pub const FIXED_TIMESTAMP: &str = "2026-01-19T12:00:00Z";

/// Parse a fixed UUID from a constant string
pub fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).expect("invalid UUID in test fixture")
}

/// Parse the fixed timestamp
pub fn fixed_timestamp() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(FIXED_TIMESTAMP)
        .expect("invalid timestamp in test fixture")
        .with_timezone(&Utc)
}

/// Validated amount for test payloads
pub fn money(value: Decimal) -> Money {
    Money::new(value).expect("invalid amount in test fixture")
}

/// `Created` event with fixed identity
pub fn created(account_id: &str, owner_name: &str) -> AccountEvent {
    created_with_id(EVENT_ID_1, account_id, owner_name)
}

/// `Created` event with an explicit event id
pub fn created_with_id(event_id: &str, account_id: &str, owner_name: &str) -> AccountEvent {
    AccountEvent::Created(AccountCreated {
        event_id: parse_uuid(event_id),
        account_id: account_id.to_string(),
        occurred_at: fixed_timestamp(),
        owner_name: owner_name.to_string(),
    })
}

/// `Credited` event with fixed identity
pub fn credited(account_id: &str, amount: Decimal, description: &str) -> AccountEvent {
    AccountEvent::Credited(MoneyCredited {
        event_id: parse_uuid(EVENT_ID_2),
        account_id: account_id.to_string(),
        occurred_at: fixed_timestamp(),
        amount: money(amount),
        description: description.to_string(),
    })
}

/// `Debited` event with fixed identity
pub fn debited(account_id: &str, amount: Decimal, description: &str) -> AccountEvent {
    AccountEvent::Debited(MoneyDebited {
        event_id: parse_uuid(EVENT_ID_3),
        account_id: account_id.to_string(),
        occurred_at: fixed_timestamp(),
        amount: money(amount),
        description: description.to_string(),
    })
}
