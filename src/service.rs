//! Command-facing ledger service
//!
//! The boundary command callers see: create, credit, debit, transfer on the
//! write side; query and rebuild on the read side. Commands validate, build
//! events, and publish; they never touch the store or view directly — state
//! only changes when the consumption driver folds a delivered record.
//!
//! Command outcomes are three-way, never binary: `Ok` is confirmed,
//! `TransactionAborted` is a confirmed rollback, and `AmbiguousOutcome`
//! means unconfirmed — the caller must treat those differently.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use crate::errors::{LedgerError, LedgerResult};
use crate::events::{AccountCreated, AccountEvent, MoneyCredited, MoneyDebited};
use crate::money::Money;
use crate::projection::AccountState;
use crate::publisher::EventPublisher;
use crate::transport::DeliveryReceipt;
use crate::view::LedgerView;

/// Event-sourced account ledger facade
#[derive(Clone)]
pub struct AccountLedgerService {
    publisher: EventPublisher,
    view: Arc<LedgerView>,
}

impl AccountLedgerService {
    /// Create a service over a publisher and the shared view
    pub fn new(publisher: EventPublisher, view: Arc<LedgerView>) -> Self {
        Self { publisher, view }
    }

    /// Create a new account
    pub async fn create_account(
        &self,
        account_id: &str,
        owner_name: &str,
    ) -> LedgerResult<DeliveryReceipt> {
        let event = AccountEvent::Created(AccountCreated::new(account_id, owner_name));
        let receipt = self.publisher.publish(&event).await?;
        info!(account_id, "account created");
        Ok(receipt)
    }

    /// Credit an account
    ///
    /// Zero or negative amounts are rejected before any publish.
    pub async fn credit(
        &self,
        account_id: &str,
        amount: Decimal,
        description: &str,
    ) -> LedgerResult<DeliveryReceipt> {
        let amount = validated_amount(amount)?;
        let event = AccountEvent::Credited(MoneyCredited::new(account_id, amount, description));
        let receipt = self.publisher.publish(&event).await?;
        info!(account_id, %amount, "credit published");
        Ok(receipt)
    }

    /// Debit an account
    ///
    /// Zero or negative amounts are rejected before any publish. No
    /// overdraft check happens here or in the fold; that policy belongs to
    /// whoever issues commands.
    pub async fn debit(
        &self,
        account_id: &str,
        amount: Decimal,
        description: &str,
    ) -> LedgerResult<DeliveryReceipt> {
        let amount = validated_amount(amount)?;
        let event = AccountEvent::Debited(MoneyDebited::new(account_id, amount, description));
        let receipt = self.publisher.publish(&event).await?;
        info!(account_id, %amount, "debit published");
        Ok(receipt)
    }

    /// Move money between two accounts atomically
    ///
    /// Publishes the debit and the credit in one transaction: consumers see
    /// both or neither. An `AmbiguousOutcome` means the pair may have
    /// landed; do not retry without an idempotency key.
    pub async fn transfer(
        &self,
        from_account: &str,
        to_account: &str,
        amount: Decimal,
        description: &str,
    ) -> LedgerResult<()> {
        let amount = validated_amount(amount)?;
        let stream = self.publisher.stream().to_string();

        let entries = vec![
            (
                stream.clone(),
                AccountEvent::Debited(MoneyDebited::new(from_account, amount, description)),
            ),
            (
                stream,
                AccountEvent::Credited(MoneyCredited::new(to_account, amount, description)),
            ),
        ];

        self.publisher.publish_atomic(&entries).await?;
        info!(from_account, to_account, %amount, "transfer committed");
        Ok(())
    }

    /// Current materialized state for an account
    pub async fn query_state(&self, account_id: &str) -> Option<AccountState> {
        self.view.state(account_id).await
    }

    /// Rebuild state from the event store, bypassing the live view
    pub async fn rebuild(&self, account_id: &str) -> LedgerResult<Option<AccountState>> {
        self.view.rebuild(account_id).await
    }
}

/// Command-level amount validation: strictly positive, at most two decimal
/// places
fn validated_amount(amount: Decimal) -> LedgerResult<Money> {
    let money = Money::new(amount)?;
    if money.is_zero() {
        return Err(LedgerError::InvalidAmount(
            "amount must be greater than zero".to_string(),
        ));
    }
    Ok(money)
}
