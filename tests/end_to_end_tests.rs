//! End-to-end pipeline tests
//!
//! Command → publisher → in-memory ordered log → consumption driver →
//! event store + materialized view → query/replay. Consumption is driven
//! by hand so each test controls exactly when records are processed and
//! acknowledged.

use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use ledgerstream::consumer::STATE_BUILDER_GROUP;
use ledgerstream::publisher::{EventPublisher, PublisherConfig, ACCOUNT_EVENTS_STREAM};
use ledgerstream::transport::{LogSubscription, LogTransport, MemoryTransport};
use ledgerstream::{AccountLedgerService, LedgerView, ProjectionConsumer};

struct Pipeline {
    transport: Arc<MemoryTransport>,
    view: Arc<LedgerView>,
    consumer: ProjectionConsumer,
    service: AccountLedgerService,
}

fn pipeline() -> Pipeline {
    let transport = Arc::new(MemoryTransport::new());
    let view = Arc::new(LedgerView::new());
    let consumer = ProjectionConsumer::new(Arc::clone(&view));
    let publisher = EventPublisher::new(transport.clone(), PublisherConfig::default());
    let service = AccountLedgerService::new(publisher, Arc::clone(&view));
    Pipeline {
        transport,
        view,
        consumer,
        service,
    }
}

async fn subscribe(p: &Pipeline) -> Box<dyn LogSubscription> {
    p.transport
        .subscribe(ACCOUNT_EVENTS_STREAM, STATE_BUILDER_GROUP)
        .await
        .unwrap()
}

/// Pull one delivery, fold it, ack it
async fn consume_one(p: &Pipeline, sub: &mut Box<dyn LogSubscription>) {
    let delivery = sub.next().await.expect("expected a delivery");
    p.consumer.process_record(&delivery.record).await.unwrap();
    delivery.ack().await.unwrap();
}

#[tokio::test]
async fn create_credit_debit_materializes_expected_state() {
    let p = pipeline();
    let mut sub = subscribe(&p).await;

    p.service.create_account("A1", "Alice").await.unwrap();
    p.service.credit("A1", dec!(100.00), "init").await.unwrap();
    p.service.debit("A1", dec!(30.00), "coffee").await.unwrap();

    for _ in 0..3 {
        consume_one(&p, &mut sub).await;
    }

    let state = p.service.query_state("A1").await.unwrap();
    assert_eq!(state.balance, dec!(70.00));
    assert_eq!(
        state.history,
        vec!["created", "Deposited: 100.00", "Withdrawn: 30.00"]
    );

    // Replay/live equivalence after full delivery
    let rebuilt = p.service.rebuild("A1").await.unwrap().unwrap();
    assert_eq!(rebuilt, state);
}

#[tokio::test]
async fn duplicate_redelivery_amplifies_balance() {
    let p = pipeline();
    let mut sub = subscribe(&p).await;

    p.service.create_account("A1", "Alice").await.unwrap();
    p.service.credit("A1", dec!(100.00), "init").await.unwrap();
    p.service.debit("A1", dec!(30.00), "coffee").await.unwrap();

    consume_one(&p, &mut sub).await;

    // At-least-once duplication: the credit record is delivered twice
    // before its ack. This layer does not deduplicate, so the balance
    // amplifies; both the live view and a replay reflect the duplicate.
    let credit = sub.next().await.unwrap();
    p.consumer.process_record(&credit.record).await.unwrap();
    p.consumer.process_record(&credit.record).await.unwrap();
    credit.ack().await.unwrap();

    consume_one(&p, &mut sub).await;

    let state = p.service.query_state("A1").await.unwrap();
    assert_eq!(state.balance, dec!(170.00));
    assert_eq!(
        state.history,
        vec![
            "created",
            "Deposited: 100.00",
            "Deposited: 100.00",
            "Withdrawn: 30.00"
        ]
    );

    let rebuilt = p.service.rebuild("A1").await.unwrap().unwrap();
    assert_eq!(rebuilt, state);
}

#[tokio::test]
async fn transport_redelivers_unacked_record_to_the_same_group() {
    let p = pipeline();
    let mut sub = subscribe(&p).await;

    p.service.create_account("A1", "Alice").await.unwrap();
    p.service.credit("A1", dec!(50.00), "init").await.unwrap();

    consume_one(&p, &mut sub).await;

    // Processing fails mid-flight: the record is dropped without ack
    let credit = sub.next().await.unwrap();
    drop(credit);
    p.transport
        .redeliver_unacked(ACCOUNT_EVENTS_STREAM, STATE_BUILDER_GROUP)
        .await;

    // The same record comes back and processing succeeds this time
    consume_one(&p, &mut sub).await;

    let state = p.service.query_state("A1").await.unwrap();
    assert_eq!(state.balance, dec!(50.00));
}

#[tokio::test]
async fn rebuild_of_unknown_key_returns_absent() {
    let p = pipeline();
    assert_eq!(p.service.rebuild("unknown-key").await.unwrap(), None);
    assert_eq!(p.service.query_state("unknown-key").await, None);
}

#[tokio::test]
async fn background_consumer_loop_drives_the_view() {
    let p = pipeline();
    let sub = subscribe(&p).await;
    tokio::spawn(p.consumer.clone().run(sub));

    p.service.create_account("B1", "Bob").await.unwrap();
    p.service.credit("B1", dec!(42.00), "init").await.unwrap();

    // Poll until the spawned consumer has folded both events
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if let Some(state) = p.view.state("B1").await {
            if state.balance == dec!(42.00) {
                break;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "consumer did not catch up in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn transfer_is_atomic_across_accounts() {
    let p = pipeline();
    let mut sub = subscribe(&p).await;

    p.service.create_account("A1", "Alice").await.unwrap();
    p.service.create_account("B1", "Bob").await.unwrap();
    p.service.credit("A1", dec!(100.00), "init").await.unwrap();
    p.service
        .transfer("A1", "B1", dec!(25.00), "rent share")
        .await
        .unwrap();

    // 3 single sends + 2 records from the committed transaction
    for _ in 0..5 {
        consume_one(&p, &mut sub).await;
    }

    assert_eq!(p.service.query_state("A1").await.unwrap().balance, dec!(75.00));
    assert_eq!(p.service.query_state("B1").await.unwrap().balance, dec!(25.00));
}

#[tokio::test]
async fn aborted_transfer_changes_no_balance() {
    let p = pipeline();
    let mut sub = subscribe(&p).await;

    p.service.create_account("A1", "Alice").await.unwrap();
    p.service.create_account("B1", "Bob").await.unwrap();
    p.service.credit("A1", dec!(100.00), "init").await.unwrap();

    p.transport.fail_next_commit().await;
    let err = p
        .service
        .transfer("A1", "B1", dec!(25.00), "rent share")
        .await
        .unwrap_err();
    assert!(matches!(err, ledgerstream::LedgerError::TransactionAborted(_)));

    for _ in 0..3 {
        consume_one(&p, &mut sub).await;
    }

    assert_eq!(p.service.query_state("A1").await.unwrap().balance, dec!(100.00));
    assert_eq!(p.service.query_state("B1").await.unwrap().balance, dec!(0.00));
}

#[tokio::test]
async fn invalid_amounts_are_rejected_before_publish() {
    let p = pipeline();

    assert!(p.service.credit("A1", dec!(0.00), "x").await.is_err());
    assert!(p.service.debit("A1", dec!(-1.00), "x").await.is_err());

    // Nothing reached the transport
    assert!(p
        .transport
        .visible_records(ACCOUNT_EVENTS_STREAM)
        .await
        .is_empty());
}
