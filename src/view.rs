//! Materialized view and event store
//!
//! `LedgerView` holds, per account, the append-only sequence of events
//! actually consumed plus the state folded from them. The table is sharded
//! by account key; each shard is guarded by one `RwLock`, and a slot's event
//! append and state fold happen inside a single write-lock section. A reader
//! can therefore never observe a store append without its fold or a fold
//! without its append.
//!
//! Different account keys are independent: consumption lanes for different
//! keys only contend when they happen to hash to the same shard.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use tokio::sync::RwLock;
use tracing::info;

use crate::errors::LedgerResult;
use crate::events::AccountEvent;
use crate::projection::{self, AccountState};

const SHARD_COUNT: usize = 16;

/// Per-account slot: the event store sequence and the state folded from it
#[derive(Debug, Clone)]
struct AccountSlot {
    events: Vec<AccountEvent>,
    state: AccountState,
}

/// Sharded in-process ledger: event store plus live materialized view
#[derive(Debug)]
pub struct LedgerView {
    shards: Vec<RwLock<HashMap<String, AccountSlot>>>,
}

impl Default for LedgerView {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerView {
    /// Create an empty view
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| RwLock::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, account_id: &str) -> &RwLock<HashMap<String, AccountSlot>> {
        let mut hasher = DefaultHasher::new();
        account_id.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }

    /// Append one consumed event and fold it into the live state
    ///
    /// The fold runs first; if it fails, neither the store nor the state
    /// mutates and the caller must leave the record unacknowledged so the
    /// transport redelivers it. Records are never deduplicated here: a
    /// redelivered record appends and folds again.
    pub async fn append_and_apply(&self, event: &AccountEvent) -> LedgerResult<AccountState> {
        let account_id = event.account_id().to_string();
        let mut shard = self.shard(&account_id).write().await;

        match shard.get_mut(&account_id) {
            Some(slot) => {
                let new_state = projection::apply(Some(&slot.state), event)?;
                slot.events.push(event.clone());
                slot.state = new_state.clone();
                Ok(new_state)
            }
            None => {
                let new_state = projection::apply(None, event)?;
                shard.insert(
                    account_id,
                    AccountSlot {
                        events: vec![event.clone()],
                        state: new_state.clone(),
                    },
                );
                Ok(new_state)
            }
        }
    }

    /// Current materialized state for an account, if any event created it
    pub async fn state(&self, account_id: &str) -> Option<AccountState> {
        let shard = self.shard(account_id).read().await;
        shard.get(account_id).map(|slot| slot.state.clone())
    }

    /// Point-in-time snapshot of the stored event sequence for an account
    ///
    /// Empty if the key has never been seen. The snapshot is taken under the
    /// read lock and may be slightly stale with respect to concurrent live
    /// consumption, which is acceptable for replay.
    pub async fn events(&self, account_id: &str) -> Vec<AccountEvent> {
        let shard = self.shard(account_id).read().await;
        shard
            .get(account_id)
            .map(|slot| slot.events.clone())
            .unwrap_or_default()
    }

    /// Rebuild an account's state purely from the stored event sequence
    ///
    /// Reads a snapshot, then folds from absent initial state outside any
    /// lock. Never touches the live view; for a given stored sequence the
    /// result is identical to what live consumption of that sequence
    /// produced.
    pub async fn rebuild(&self, account_id: &str) -> LedgerResult<Option<AccountState>> {
        let snapshot = self.events(account_id).await;
        if snapshot.is_empty() {
            return Ok(None);
        }

        let rebuilt = projection::fold(&snapshot)?;
        if let Some(state) = &rebuilt {
            info!(
                account_id,
                events = snapshot.len(),
                balance = %state.balance,
                "replayed event store"
            );
        }
        Ok(rebuilt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{AccountCreated, MoneyCredited};
    use crate::money::Money;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn append_and_apply_keeps_store_and_state_in_lockstep() {
        let view = LedgerView::new();
        view.append_and_apply(&AccountEvent::Created(AccountCreated::new("a", "Alice")))
            .await
            .unwrap();
        view.append_and_apply(&AccountEvent::Credited(MoneyCredited::new(
            "a",
            Money::new(dec!(5.00)).unwrap(),
            "x",
        )))
        .await
        .unwrap();

        assert_eq!(view.events("a").await.len(), 2);
        assert_eq!(view.state("a").await.unwrap().balance, dec!(5.00));
    }

    #[tokio::test]
    async fn failed_fold_mutates_nothing() {
        let view = LedgerView::new();
        let orphan = AccountEvent::Credited(MoneyCredited::new(
            "ghost",
            Money::new(dec!(5.00)).unwrap(),
            "x",
        ));

        assert!(view.append_and_apply(&orphan).await.is_err());
        assert!(view.events("ghost").await.is_empty());
        assert!(view.state("ghost").await.is_none());
    }

    #[tokio::test]
    async fn rebuild_of_unknown_key_is_absent() {
        let view = LedgerView::new();
        assert_eq!(view.rebuild("unknown-key").await.unwrap(), None);
    }
}
