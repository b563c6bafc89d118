//! Pure projection of account events into materialized state
//!
//! The fold is a pure function: `(prior state, event) → new state`, no side
//! effects beyond the returned value. Replay is the same fold run over a
//! stored sequence, which is what makes a rebuilt state provably identical
//! to the live view for the same event order.
//!
//! The match over `AccountEvent` is exhaustive with no wildcard arm: adding
//! an event variant without extending the fold is a compile error.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, LedgerResult};
use crate::events::AccountEvent;

/// Materialized state of one account
///
/// `balance` always equals the fold of every event observed so far for the
/// account, applied in delivery order; `history` is append-only in that same
/// order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    /// Account aggregate key
    pub account_id: String,
    /// Owner display name from the `Created` event
    pub owner_label: String,
    /// Current balance; negative balances are representable, overdraft
    /// policy belongs to the command layer, not the fold
    pub balance: Decimal,
    /// Ledger lines in delivery order
    pub history: Vec<String>,
    /// When the most recently folded event occurred
    pub last_event_at: DateTime<Utc>,
}

/// Fold one event onto the prior state
///
/// `Created` needs no prior state and initializes the account. A replayed or
/// duplicated `Created` with a matching owner is a no-op; with a different
/// owner it is an [`LedgerError::InconsistentEvent`], never silently
/// resolved, since it indicates a corrupted or misrouted stream. `Credited`
/// and `Debited` require existing state.
pub fn apply(state: Option<&AccountState>, event: &AccountEvent) -> LedgerResult<AccountState> {
    match event {
        AccountEvent::Created(e) => match state {
            None => Ok(AccountState {
                account_id: e.account_id.clone(),
                owner_label: e.owner_name.clone(),
                balance: Decimal::ZERO,
                history: vec!["created".to_string()],
                last_event_at: e.occurred_at,
            }),
            Some(existing) if existing.owner_label == e.owner_name => Ok(existing.clone()),
            Some(existing) => Err(LedgerError::InconsistentEvent {
                account_id: e.account_id.clone(),
                reason: format!(
                    "created event names owner {:?} but state has {:?}",
                    e.owner_name, existing.owner_label
                ),
            }),
        },
        AccountEvent::Credited(e) => {
            let prior = require_state(state, &e.account_id, "credited")?;
            let mut history = prior.history.clone();
            history.push(format!("Deposited: {}", e.amount));
            Ok(AccountState {
                account_id: prior.account_id.clone(),
                owner_label: prior.owner_label.clone(),
                balance: prior.balance + e.amount.amount(),
                history,
                last_event_at: e.occurred_at,
            })
        }
        AccountEvent::Debited(e) => {
            let prior = require_state(state, &e.account_id, "debited")?;
            let mut history = prior.history.clone();
            history.push(format!("Withdrawn: {}", e.amount));
            Ok(AccountState {
                account_id: prior.account_id.clone(),
                owner_label: prior.owner_label.clone(),
                balance: prior.balance - e.amount.amount(),
                history,
                last_event_at: e.occurred_at,
            })
        }
    }
}

fn require_state<'a>(
    state: Option<&'a AccountState>,
    account_id: &str,
    event_type: &str,
) -> LedgerResult<&'a AccountState> {
    state.ok_or_else(|| LedgerError::InconsistentEvent {
        account_id: account_id.to_string(),
        reason: format!("{event_type} event arrived before the account was created"),
    })
}

/// Fold a whole event sequence from absent initial state
///
/// Returns `None` for an empty sequence. This is the replay primitive:
/// feeding it exactly the stored sequence yields exactly what the live view
/// shows after consuming that sequence.
pub fn fold<'a, I>(events: I) -> LedgerResult<Option<AccountState>>
where
    I: IntoIterator<Item = &'a AccountEvent>,
{
    let mut state: Option<AccountState> = None;
    for event in events {
        state = Some(apply(state.as_ref(), event)?);
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{AccountCreated, MoneyCredited, MoneyDebited};
    use crate::money::Money;
    use rust_decimal_macros::dec;

    fn money(value: Decimal) -> Money {
        Money::new(value).unwrap()
    }

    #[test]
    fn created_initializes_state() {
        let event = AccountEvent::Created(AccountCreated::new("acct-1", "Alice"));
        let state = apply(None, &event).unwrap();

        assert_eq!(state.account_id, "acct-1");
        assert_eq!(state.owner_label, "Alice");
        assert_eq!(state.balance, Decimal::ZERO);
        assert_eq!(state.history, vec!["created"]);
    }

    #[test]
    fn duplicate_created_with_matching_owner_is_noop() {
        let event = AccountEvent::Created(AccountCreated::new("acct-1", "Alice"));
        let once = apply(None, &event).unwrap();
        let twice = apply(Some(&once), &event).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn duplicate_created_with_different_owner_is_inconsistent() {
        let first = AccountEvent::Created(AccountCreated::new("acct-1", "Alice"));
        let state = apply(None, &first).unwrap();

        let conflicting = AccountEvent::Created(AccountCreated::new("acct-1", "Mallory"));
        let err = apply(Some(&state), &conflicting).unwrap_err();
        assert!(matches!(err, LedgerError::InconsistentEvent { .. }));
    }

    #[test]
    fn credit_before_create_is_inconsistent() {
        let event = AccountEvent::Credited(MoneyCredited::new("acct-1", money(dec!(5.00)), "x"));
        assert!(matches!(
            apply(None, &event),
            Err(LedgerError::InconsistentEvent { .. })
        ));
    }

    #[test]
    fn debit_can_drive_balance_negative() {
        let events = vec![
            AccountEvent::Created(AccountCreated::new("acct-1", "Alice")),
            AccountEvent::Debited(MoneyDebited::new("acct-1", money(dec!(10.00)), "fee")),
        ];
        let state = fold(&events).unwrap().unwrap();
        assert_eq!(state.balance, dec!(-10.00));
    }

    #[test]
    fn fold_of_empty_sequence_is_absent() {
        let events: Vec<AccountEvent> = Vec::new();
        assert_eq!(fold(&events).unwrap(), None);
    }

    #[test]
    fn history_reflects_exact_delivery_order() {
        let events = vec![
            AccountEvent::Created(AccountCreated::new("acct-1", "Alice")),
            AccountEvent::Credited(MoneyCredited::new("acct-1", money(dec!(10.00)), "a")),
            AccountEvent::Debited(MoneyDebited::new("acct-1", money(dec!(3.00)), "b")),
        ];
        let forward = fold(&events).unwrap().unwrap();
        assert_eq!(
            forward.history,
            vec!["created", "Deposited: 10.00", "Withdrawn: 3.00"]
        );

        // Same final balance either way, but the ledger lines prove the fold
        // ran in store order, not some reordering.
        let reordered = vec![
            events[0].clone(),
            events[2].clone(),
            events[1].clone(),
        ];
        let backward = fold(&reordered).unwrap().unwrap();
        assert_eq!(backward.balance, forward.balance);
        assert_eq!(
            backward.history,
            vec!["created", "Withdrawn: 3.00", "Deposited: 10.00"]
        );
    }
}
