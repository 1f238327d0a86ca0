//! Integration tests for the create → confirm lifecycle

mod common;

use billbank_core::{AuthorizationKey, CoreError, Locale, Role, TransactionStatus};
use billbank_engine::{
    EngineConfig, EngineError, ReconcilePolicy, TransferDetails, TransferEngine, TransferOutcome,
    TransferSource,
};
use billbank_persistence::TransactionRepo;
use chrono::{Duration, Utc};
use common::{bank, bank_with, seeded_bank, TestBank};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn key(value: &str) -> AuthorizationKey {
    AuthorizationKey::new(value).unwrap()
}

fn details(bank: &TestBank, recipient_account_id: &str, amount: Decimal) -> TransferDetails {
    TransferDetails {
        recipient_account_id: recipient_account_id.to_string(),
        amount: bank.major(amount),
        title: "Transfer".to_string(),
        locale: Locale::En,
    }
}

/// Source with 100, confirm of 150: error, balance intact, row still Pending
#[tokio::test]
async fn test_insufficient_funds_leaves_transaction_pending() {
    let bank = bank().await;
    let source = bank.actor("source@example.com", dec!(100)).await;
    let recipient = bank.actor("recipient@example.com", dec!(0)).await;
    let engine = TransferEngine::new(&bank.ctx);

    let created = engine
        .create(
            &source.account.id,
            &details(&bank, &recipient.account.id, dec!(150)),
            &key("T-150"),
        )
        .await
        .unwrap();
    assert_eq!(created.status, TransactionStatus::Pending);

    let err = engine
        .confirm(&source.account.id, &key("T-150"))
        .await
        .unwrap_err();
    assert!(err.is_insufficient_funds());

    assert_eq!(bank.balance(&source.account).await, bank.major(dec!(100)));
    assert_eq!(bank.balance(&recipient.account).await, bank.major(dec!(0)));
    let stored = TransactionRepo::get_by_id(bank.ctx.pool(), &created.id).await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Pending);
}

#[tokio::test]
async fn test_create_validates_amount_and_accounts() {
    let bank = bank().await;
    let source = bank.actor("source@example.com", dec!(100)).await;
    let engine = TransferEngine::new(&bank.ctx);

    let err = engine
        .create(&source.account.id, &details(&bank, "missing", dec!(1)), &key("K"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownAccount(id) if id == "missing"));

    let recipient = bank.actor("recipient@example.com", dec!(0)).await;
    let err = engine
        .create(
            &source.account.id,
            &details(&bank, &recipient.account.id, dec!(0)),
            &key("K"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    // Nothing was persisted
    assert!(TransactionRepo::list_by_account(bank.ctx.pool(), &source.account.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_confirm_without_pending_row() {
    let bank = bank().await;
    let source = bank.actor("source@example.com", dec!(100)).await;

    let err = TransferEngine::new(&bank.ctx)
        .confirm(&source.account.id, &key("NOTHING"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoPendingTransaction { .. }));
}

#[tokio::test]
async fn test_make_transfer_from_actor() {
    let bank = bank().await;
    let source = bank.actor("source@example.com", dec!(100)).await;
    let recipient = bank.actor("recipient@example.com", dec!(0)).await;
    let engine = TransferEngine::new(&bank.ctx);

    let outcome = engine
        .make_transfer(
            details(&bank, &recipient.account.id, dec!(12.34)),
            TransferSource::Actor(source.actor.id.clone()),
            &key("RENT-2024-01"),
        )
        .await
        .unwrap();
    match outcome {
        TransferOutcome::Confirmed(tx) => {
            assert_eq!(tx.status, TransactionStatus::Confirmed);
            assert_eq!(tx.amount, bank.major(dec!(12.34)));
        }
        other => panic!("expected confirmation, got {other:?}"),
    }

    assert_eq!(bank.balance(&source.account).await, bank.major(dec!(87.66)));
    assert_eq!(bank.balance(&recipient.account).await, bank.major(dec!(12.34)));

    // Same key again is a no-op
    let again = engine
        .make_transfer(
            details(&bank, &recipient.account.id, dec!(12.34)),
            TransferSource::Actor(source.actor.id.clone()),
            &key("RENT-2024-01"),
        )
        .await
        .unwrap();
    assert!(matches!(again, TransferOutcome::AlreadySatisfied));
    assert_eq!(bank.balance(&recipient.account).await, bank.major(dec!(12.34)));
}

#[tokio::test]
async fn test_missing_source_role_is_a_skip() {
    let bank = bank().await;
    let recipient = bank.actor("recipient@example.com", dec!(0)).await;

    let outcome = TransferEngine::new(&bank.ctx)
        .make_transfer(
            details(&bank, &recipient.account.id, dec!(10)),
            TransferSource::Role(Role::Root),
            &key("PROMO10"),
        )
        .await
        .unwrap();

    assert!(matches!(outcome, TransferOutcome::SourceUnavailable));
    assert!(TransactionRepo::list_by_account(bank.ctx.pool(), &recipient.account.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_confirm_is_idempotent() {
    let bank = bank().await;
    let source = bank.actor("source@example.com", dec!(100)).await;
    let recipient = bank.actor("recipient@example.com", dec!(0)).await;
    let engine = TransferEngine::new(&bank.ctx);

    let created = engine
        .create(
            &source.account.id,
            &details(&bank, &recipient.account.id, dec!(10)),
            &key("ONCE"),
        )
        .await
        .unwrap();

    let first = engine.confirm_transaction(&created.id).await.unwrap();
    let second = engine.confirm_transaction(&created.id).await.unwrap();
    assert_eq!(first.status, TransactionStatus::Confirmed);
    assert_eq!(second.status, TransactionStatus::Confirmed);
    assert_eq!(bank.balance(&source.account).await, bank.major(dec!(90)));
    assert_eq!(bank.balance(&recipient.account).await, bank.major(dec!(10)));
}

/// Two Pending rows for the same (recipient, key): only one reaches Confirmed
#[tokio::test]
async fn test_second_pending_row_is_abandoned() {
    let bank = bank().await;
    let source = bank.actor("source@example.com", dec!(100)).await;
    let recipient = bank.actor("recipient@example.com", dec!(0)).await;
    let engine = TransferEngine::new(&bank.ctx);
    let transfer = details(&bank, &recipient.account.id, dec!(5));

    let first = engine.create(&source.account.id, &transfer, &key("WELCOME5")).await.unwrap();
    let second = engine.create(&source.account.id, &transfer, &key("WELCOME5")).await.unwrap();

    // Confirm by key picks the most recent Pending row
    let confirmed = engine.confirm(&source.account.id, &key("WELCOME5")).await.unwrap();
    assert_eq!(confirmed.id, second.id);
    assert_eq!(confirmed.status, TransactionStatus::Confirmed);

    let abandoned = engine.confirm_transaction(&first.id).await.unwrap();
    assert_eq!(abandoned.status, TransactionStatus::Abandoned);

    assert_eq!(bank.balance(&source.account).await, bank.major(dec!(95)));
    assert_eq!(bank.balance(&recipient.account).await, bank.major(dec!(5)));
    assert_eq!(
        TransactionRepo::count_for_recipient(
            bank.ctx.pool(),
            &recipient.account.id,
            &key("WELCOME5"),
            TransactionStatus::Confirmed,
        )
        .await
        .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_abandon_transitions() {
    let bank = bank().await;
    let source = bank.actor("source@example.com", dec!(100)).await;
    let recipient = bank.actor("recipient@example.com", dec!(0)).await;
    let engine = TransferEngine::new(&bank.ctx);
    let transfer = details(&bank, &recipient.account.id, dec!(5));

    let pending = engine.create(&source.account.id, &transfer, &key("DROP")).await.unwrap();
    let abandoned = engine.abandon(&pending.id).await.unwrap();
    assert_eq!(abandoned.status, TransactionStatus::Abandoned);

    // Abandoned rows stay abandoned and never move money
    assert_eq!(engine.abandon(&pending.id).await.unwrap().status, TransactionStatus::Abandoned);
    let after = engine.confirm_transaction(&pending.id).await.unwrap();
    assert_eq!(after.status, TransactionStatus::Abandoned);
    assert_eq!(bank.balance(&source.account).await, bank.major(dec!(100)));

    // Confirmed rows cannot be abandoned
    let kept = engine.create(&source.account.id, &transfer, &key("KEEP")).await.unwrap();
    engine.confirm_transaction(&kept.id).await.unwrap();
    let err = engine.abandon(&kept.id).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Core(CoreError::InvalidTransition {
            from: TransactionStatus::Confirmed,
            to: TransactionStatus::Abandoned,
        })
    ));

    assert!(matches!(
        engine.abandon("missing").await,
        Err(EngineError::UnknownTransaction(_))
    ));
}

#[tokio::test]
async fn test_reconcile_retry_policy() {
    let bank = bank().await;
    let rich = bank.actor("rich@example.com", dec!(100)).await;
    let poor = bank.actor("poor@example.com", dec!(1)).await;
    let recipient = bank.actor("recipient@example.com", dec!(0)).await;
    let engine = TransferEngine::new(&bank.ctx);
    let transfer = details(&bank, &recipient.account.id, dec!(10));

    // Orphans: created but never confirmed
    engine.create(&rich.account.id, &transfer, &key("ORPHAN-A")).await.unwrap();
    engine.create(&poor.account.id, &transfer, &key("ORPHAN-B")).await.unwrap();

    // Nothing is stale yet
    let report = engine.reconcile_stale(Utc::now()).await.unwrap();
    assert_eq!(report.scanned, 0);

    let later = Utc::now() + Duration::hours(1);
    let report = engine.reconcile_stale(later).await.unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.confirmed, 1);
    assert_eq!(report.abandoned, 1);
    assert_eq!(report.failed, 0);

    assert_eq!(bank.balance(&rich.account).await, bank.major(dec!(90)));
    assert_eq!(bank.balance(&poor.account).await, bank.major(dec!(1)));
    assert_eq!(bank.balance(&recipient.account).await, bank.major(dec!(10)));
    assert_eq!(
        TransactionRepo::count_by_status(bank.ctx.pool(), TransactionStatus::Pending)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_reconcile_abandon_policy() {
    let mut config = EngineConfig::default();
    config.reconcile.policy = ReconcilePolicy::Abandon;
    let bank = bank_with(config).await;
    let source = bank.actor("source@example.com", dec!(100)).await;
    let recipient = bank.actor("recipient@example.com", dec!(0)).await;
    let engine = TransferEngine::new(&bank.ctx);

    engine
        .create(
            &source.account.id,
            &details(&bank, &recipient.account.id, dec!(10)),
            &key("ORPHAN"),
        )
        .await
        .unwrap();

    let report = engine.reconcile_stale(Utc::now() + Duration::hours(1)).await.unwrap();
    assert_eq!(report.abandoned, 1);
    assert_eq!(report.confirmed, 0);
    assert_eq!(bank.balance(&source.account).await, bank.major(dec!(100)));
    // Abandoned rows are kept
    assert_eq!(
        TransactionRepo::count_by_status(bank.ctx.pool(), TransactionStatus::Abandoned)
            .await
            .unwrap(),
        1
    );
}

/// Many concurrent make_transfer calls for one (recipient, key)
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_make_transfer_confirms_once() {
    let bank = bank().await;
    let source = bank.actor("source@example.com", dec!(100)).await;
    let recipient = bank.actor("recipient@example.com", dec!(0)).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let ctx = bank.ctx.clone();
        let transfer = details(&bank, &recipient.account.id, dec!(10));
        let source_id = source.actor.id.clone();
        handles.push(tokio::spawn(async move {
            TransferEngine::new(&ctx)
                .make_transfer(transfer, TransferSource::Actor(source_id), &key("RACE"))
                .await
        }));
    }

    let mut confirmed = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            TransferOutcome::Confirmed(_) => confirmed += 1,
            TransferOutcome::AlreadySatisfied => {}
            TransferOutcome::SourceUnavailable => panic!("source exists"),
        }
    }

    assert_eq!(confirmed, 1);
    assert_eq!(bank.balance(&source.account).await, bank.major(dec!(90)));
    assert_eq!(bank.balance(&recipient.account).await, bank.major(dec!(10)));
    assert_eq!(
        TransactionRepo::count_for_recipient(
            bank.ctx.pool(),
            &recipient.account.id,
            &key("RACE"),
            TransactionStatus::Confirmed,
        )
        .await
        .unwrap(),
        1
    );
}

/// Balances never go negative however many transfers race on one source
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_debits_never_overdraw() {
    let bank = bank().await;
    let source = bank.actor("source@example.com", dec!(30)).await;
    let recipient = bank.actor("recipient@example.com", dec!(0)).await;

    let mut handles = Vec::new();
    for i in 0..6 {
        let ctx = bank.ctx.clone();
        let transfer = details(&bank, &recipient.account.id, dec!(10));
        let source_id = source.actor.id.clone();
        handles.push(tokio::spawn(async move {
            TransferEngine::new(&ctx)
                .make_transfer(
                    transfer,
                    TransferSource::Actor(source_id),
                    &key(&format!("PAY-{i}")),
                )
                .await
        }));
    }

    let mut confirmed = 0;
    let mut insufficient = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) if outcome.is_confirmed() => confirmed += 1,
            Err(e) if e.is_insufficient_funds() => insufficient += 1,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    assert_eq!(confirmed, 3);
    assert_eq!(insufficient, 3);
    assert_eq!(bank.balance(&source.account).await, bank.major(dec!(0)));
    assert_eq!(bank.balance(&recipient.account).await, bank.major(dec!(30)));
}

#[tokio::test]
async fn test_seeded_roles_fund_transfers() {
    let (bank, root, _admin) = seeded_bank().await;
    let recipient = bank.actor("recipient@example.com", dec!(0)).await;

    let outcome = TransferEngine::new(&bank.ctx)
        .make_transfer(
            details(&bank, &recipient.account.id, dec!(3)),
            TransferSource::Role(Role::Root),
            &key("MANUAL"),
        )
        .await
        .unwrap();

    assert!(outcome.is_confirmed());
    assert_eq!(bank.balance(&root.account).await, bank.major(dec!(997)));
}
