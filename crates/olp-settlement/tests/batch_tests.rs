//! End-to-end batch runs against the in-memory ledger.

mod common;

use common::*;
use olp_models::{AssetRegistry, PoolRiskState, RequestStatus, Tranche, UnderlyingAsset};
use olp_options::{CollateralQuery, InverseSizeSolver, PriceQuantizer, ReferenceModel, SequentialPricer};
use olp_settlement::memory::{MemoryAuditSink, StaticGreeks};
use olp_settlement::{
    unpack_prices, BatchError, BatchOutcome, CommitError, CommitPayload, GreeksFallbackChain, SettlementCommitter,
    StateStore,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::test]
async fn test_commits_and_advances_cursor() {
    let requests = vec![request(0, RequestStatus::Ready), request(1, RequestStatus::Ready)];
    let h = harness(Arc::new(ReferenceModel::default()), requests, Some(pool_greeks(0.0)));

    let outcome = h.executor.run_batch(8).await.unwrap();
    let summary = match outcome {
        BatchOutcome::Committed(summary) => summary,
        other => panic!("unexpected outcome {other:?}"),
    };
    assert_eq!(summary.priced, 2);
    assert_eq!(summary.cursor, 2);
    assert!(summary.audit_emitted);
    assert_eq!(h.cursor.get(), Some(2));

    let commits = h.ledger.commits();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].request_indices, vec![0, 1]);
    assert_eq!(commits[0].instrument_ids, vec![call_id(), call_id()]);
    assert_eq!(commits[0].cursor_after, 2);
    assert_eq!(commits[0].ledger_end_index, 2);
    assert_eq!(unpack_prices(&commits[0].mark_prices, 2), vec![2_500_000, 2_500_000]);
    assert!(h.ledger.requests().iter().all(|r| r.status == RequestStatus::Executed));

    let audit = h.audit.batches();
    assert_eq!(audit[0].open.len(), 2);
    assert!(audit[0].close.is_empty());

    // queue drained
    assert_eq!(h.executor.run_batch(8).await.unwrap(), BatchOutcome::Idle);
}

#[tokio::test]
async fn test_model_failure_commits_nothing() {
    let model = Arc::new(FailingModel::new(1));
    let requests = vec![request(0, RequestStatus::Ready), request(1, RequestStatus::Ready)];
    let h = harness(model.clone(), requests, Some(pool_greeks(0.0)));

    let err = h.executor.run_batch(8).await.unwrap_err();
    assert!(matches!(err, BatchError::Pricing(_)));
    assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    assert!(h.ledger.commits().is_empty());
    assert_eq!(h.cursor.get(), None);
    assert_eq!(h.notifier.messages().len(), 1);
}

#[tokio::test]
async fn test_ignorable_commit_leaves_cursor() {
    let h = harness(
        Arc::new(ReferenceModel::default()),
        vec![request(0, RequestStatus::Ready)],
        Some(pool_greeks(0.0)),
    );
    h.ledger.fail_next_commit("replacement transaction: nonce has already been used");

    let outcome = h.executor.run_batch(8).await.unwrap();
    assert!(matches!(outcome, BatchOutcome::Ignored { .. }));
    assert_eq!(h.cursor.get(), None);
    assert!(h.notifier.messages().is_empty());

    // retried next cycle
    assert!(matches!(h.executor.run_batch(8).await.unwrap(), BatchOutcome::Committed(_)));
    assert_eq!(h.cursor.get(), Some(1));
}

#[tokio::test]
async fn test_fatal_commit_is_escalated() {
    let h = harness(
        Arc::new(ReferenceModel::default()),
        vec![request(0, RequestStatus::Ready)],
        Some(pool_greeks(0.0)),
    );
    h.ledger.fail_next_commit("insufficient funds");

    match h.executor.run_batch(8).await {
        Err(BatchError::Commit(CommitError::Fatal(message))) => assert!(message.contains("insufficient funds")),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(h.cursor.get(), None);
    assert_eq!(h.notifier.messages().len(), 1);
}

#[tokio::test]
async fn test_cancelled_then_open() {
    let requests = vec![request(0, RequestStatus::Cancelled), request(1, RequestStatus::Ready)];
    let h = harness(Arc::new(ReferenceModel::default()), requests, Some(pool_greeks(0.0)));

    match h.executor.run_batch(8).await.unwrap() {
        BatchOutcome::Committed(summary) => {
            assert_eq!(summary.priced, 1);
            assert_eq!(summary.skipped, 1);
            assert_eq!(summary.cursor, 2);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(h.ledger.commits()[0].request_indices, vec![1]);
}

#[tokio::test]
async fn test_skipped_only_and_halted() {
    let requests = vec![request(0, RequestStatus::Cancelled), request(1, RequestStatus::Pending)];
    let h = harness(Arc::new(ReferenceModel::default()), requests, Some(pool_greeks(0.0)));

    assert_eq!(
        h.executor.run_batch(8).await.unwrap(),
        BatchOutcome::SkippedOnly { skipped: 1, cursor: 1 }
    );
    assert_eq!(h.executor.run_batch(8).await.unwrap(), BatchOutcome::Halted { at: Some(1) });
    assert!(h.ledger.commits().is_empty());
    assert_eq!(h.cursor.load().await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_greeks_fall_back_to_secondary() {
    let fallback = harness_with_tiers(
        Arc::new(ReferenceModel::default()),
        vec![request(0, RequestStatus::Ready)],
        None,
        Some(pool_greeks(-20.0)),
    );
    match fallback.executor.run_batch(8).await.unwrap() {
        BatchOutcome::Committed(summary) => assert_eq!(summary.greeks_source, "secondary"),
        other => panic!("unexpected {other:?}"),
    }

    // secondary Greeks reach the premium exactly as primary ones would
    let direct = harness(
        Arc::new(ReferenceModel::default()),
        vec![request(0, RequestStatus::Ready)],
        Some(pool_greeks(-20.0)),
    );
    direct.executor.run_batch(8).await.unwrap();
    let rp = |h: &Harness| unpack_prices(&h.ledger.commits()[0].risk_premiums, 1)[0];
    assert_eq!(rp(&fallback), rp(&direct));
}

#[tokio::test]
async fn test_both_greeks_sources_down_aborts() {
    let chain = GreeksFallbackChain::default()
        .with_source(Arc::new(StaticGreeks::new("primary", None)))
        .with_source(Arc::new(StaticGreeks::new("secondary", None)));
    assert!(matches!(chain.load().await, Err(BatchError::GreeksUnavailable(_))));
}

#[tokio::test]
async fn test_both_greeks_tiers_down_aborts_batch() {
    let h = harness_with_tiers(
        Arc::new(ReferenceModel::default()),
        vec![request(0, RequestStatus::Ready), request(1, RequestStatus::Ready)],
        None,
        None,
    );

    assert!(matches!(h.executor.run_batch(8).await, Err(BatchError::GreeksUnavailable(_))));
    assert!(h.ledger.commits().is_empty());
    assert_eq!(h.cursor.get(), None);
    assert_eq!(h.notifier.messages().len(), 1);
    assert!(h.ledger.requests().iter().all(|r| r.status == RequestStatus::Ready));
}

#[tokio::test]
async fn test_close_request_lands_in_close_audit() {
    let requests = vec![
        request(0, RequestStatus::Ready),
        close_request(1, RequestStatus::Ready, 50_000_000),
    ];
    let h = harness(Arc::new(ReferenceModel::default()), requests, Some(pool_greeks(0.0)));

    assert!(matches!(h.executor.run_batch(8).await.unwrap(), BatchOutcome::Committed(_)));
    assert_eq!(h.ledger.commits()[0].request_indices, vec![0, 1]);

    let audit = h.audit.batches();
    assert_eq!(audit[0].open.len(), 1);
    assert_eq!(audit[0].close.len(), 1);
    let row = &audit[0].close[0];
    assert_eq!(row.index, 1);
    assert!(!row.is_open);
    assert!((row.size - 0.5).abs() < 1e-12);
}

#[tokio::test]
async fn test_ledger_rejects_mismatched_instrument() {
    let model = ReferenceModel::default();
    let ctx = market();
    let registry = AssetRegistry::new();
    let requests = vec![request(0, RequestStatus::Ready), request(1, RequestStatus::Ready)];
    let ledger = olp_settlement::memory::InMemoryLedger::new(requests.clone(), ratios());

    let batch = SequentialPricer::new(
        &model,
        &ctx,
        &registry,
        PriceQuantizer::default(),
        PoolRiskState::new(pool_greeks(0.0), ratios()),
    )
    .price_batch(&requests, 0)
    .unwrap();
    let mut payload = CommitPayload::from_batch(&batch, AS_OF, 2).unwrap();
    payload.instrument_ids[1] = put_id();

    let err = ledger.commit(&payload).await.unwrap_err();
    assert!(err.to_string().contains("instrument mismatch"));
    assert!(ledger.commits().is_empty());
    assert!(ledger.requests().iter().all(|r| r.status == RequestStatus::Ready));

    payload.instrument_ids[1] = call_id();
    assert!(ledger.commit(&payload).await.is_ok());
}

#[tokio::test]
async fn test_audit_failure_does_not_fail_batch() {
    let h = harness_with_audit(
        Arc::new(ReferenceModel::default()),
        vec![request(0, RequestStatus::Ready)],
        Some(pool_greeks(0.0)),
        MemoryAuditSink::failing(),
    );
    match h.executor.run_batch(8).await.unwrap() {
        BatchOutcome::Committed(summary) => assert!(!summary.audit_emitted),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(h.cursor.get(), Some(1));
    assert_eq!(h.notifier.messages().len(), 1);
}

#[tokio::test]
async fn test_pool_delta_seen_by_batch() {
    // pool already short delta from earlier trades changes the committed premium
    let flat = harness(Arc::new(ReferenceModel::default()), vec![request(0, RequestStatus::Ready)], Some(pool_greeks(0.0)));
    let loaded = harness(Arc::new(ReferenceModel::default()), vec![request(0, RequestStatus::Ready)], Some(pool_greeks(-20.0)));
    flat.executor.run_batch(8).await.unwrap();
    loaded.executor.run_batch(8).await.unwrap();

    let rp = |h: &Harness| unpack_prices(&h.ledger.commits()[0].risk_premiums, 1)[0];
    assert_ne!(rp(&flat), rp(&loaded));
}

#[tokio::test]
async fn test_solver_leaves_batch_unchanged() {
    let model = ReferenceModel::default();
    let ctx = market();
    let registry = AssetRegistry::new();
    let mut state = PoolRiskState::new(pool_greeks(-3.0), ratios());
    state.set_greeks(Tranche::Mid, UnderlyingAsset::Btc, olp_models::Greeks::ZERO);
    let requests = vec![request(0, RequestStatus::Ready), request(1, RequestStatus::Ready)];

    let price = |state: PoolRiskState| {
        SequentialPricer::new(&model, &ctx, &registry, PriceQuantizer::default(), state)
            .price_batch(&requests, 0)
            .unwrap()
    };
    let before = price(state.clone());

    let query = CollateralQuery {
        underlying: UnderlyingAsset::Btc,
        expiry: EXPIRY,
        strikes: [50_000, 60_000],
        is_call: false,
        is_buy: true,
        target_collateral: 500.0,
    };
    for _ in 0..5 {
        InverseSizeSolver::default().solve_size_for_collateral(&model, &ctx, &state, &query, 0.002);
    }
    let after = price(state);

    assert_eq!(before.mark_price_ticks(), after.mark_price_ticks());
    assert_eq!(before.risk_premium_ticks(), after.risk_premium_ticks());
}
