mod common;

use common::{Harness, StatusOutcome, SubmitOutcome};
use rust_decimal_macros::dec;
use walletpay::domain::payment::{PaymentId, PaymentStatus};
use walletpay::domain::ports::TransactionRecordStore;
use walletpay::domain::transaction::{CanonicalStatus, TransactionRecord};
use walletpay::domain::wallet::Amount;

fn record(reference: &str, status: CanonicalStatus) -> TransactionRecord {
    TransactionRecord {
        reference: reference.into(),
        amount: Amount::new(dec!(2000)).unwrap(),
        destination_bank: "First Bank".into(),
        destination_account_number: "8169246969".into(),
        destination_account_name: Some("ADA OKAFOR".into()),
        source_account_number: "9000136910".into(),
        narration: None,
        status,
        created_at_ms: 1_700_000_000_000,
    }
}

#[tokio::test]
async fn test_terminal_local_record_answers_without_gateway() {
    let h = Harness::new();
    h.records
        .insert(record("TRF-9", CanonicalStatus::Succeeded))
        .await
        .unwrap();

    let status = h.reconciler.reconcile("TRF-9").await.unwrap();
    assert_eq!(status, CanonicalStatus::Succeeded);
    // Round-trip property: the gateway was never consulted.
    assert_eq!(h.status_calls(), 0);
}

#[tokio::test]
async fn test_non_terminal_local_record_is_rechecked_and_progressed() {
    let h = Harness::new();
    h.records
        .insert(record("TRF-9", CanonicalStatus::Pending))
        .await
        .unwrap();
    h.gateway
        .script_status(StatusOutcome::Status("SUCCESSFUL".into()));

    let status = h.reconciler.reconcile("TRF-9").await.unwrap();
    assert_eq!(status, CanonicalStatus::Succeeded);
    assert_eq!(h.status_calls(), 1);
    // The local record progressed to the terminal verdict.
    let stored = h.records.get("TRF-9").await.unwrap().unwrap();
    assert_eq!(stored.status, CanonicalStatus::Succeeded);
}

#[tokio::test]
async fn test_gateway_vocabulary_is_normalized() {
    let h = Harness::new();
    h.gateway
        .script_status(StatusOutcome::Status("processing".into()));
    assert_eq!(
        h.reconciler.reconcile("TRF-1").await.unwrap(),
        CanonicalStatus::Processing
    );

    h.gateway
        .script_status(StatusOutcome::Status("ON_HOLD".into()));
    assert_eq!(
        h.reconciler.reconcile("TRF-2").await.unwrap(),
        CanonicalStatus::Unknown
    );
}

#[tokio::test]
async fn test_unreachable_gateway_is_indeterminate_not_failed() {
    let h = Harness::new();
    h.gateway.script_status(StatusOutcome::Unreachable);

    let status = h.reconciler.reconcile("TRF-1").await.unwrap();
    assert_eq!(status, CanonicalStatus::Indeterminate);
}

#[tokio::test]
async fn test_reference_unknown_to_gateway_is_unknown() {
    let h = Harness::new();
    h.gateway.script_status(StatusOutcome::NotFound);

    let status = h.reconciler.reconcile("TRF-404").await.unwrap();
    assert_eq!(status, CanonicalStatus::Unknown);
}

/// The timeout scenario end to end: the submission times out after the
/// debit, the payment sits in `Submitted`, reconciliation first reports
/// `Indeterminate`, and once the gateway reports failure the balance is
/// corrected via refund.
#[tokio::test]
async fn test_timed_out_submission_settles_as_failed_with_refund() {
    let h = Harness::new();
    let wallet = h.seed_wallet("w-1", dec!(5000), "4821").await;
    h.gateway.script_submit(SubmitOutcome::Timeout);

    let payment = h.draft_payment("PAY-1", &wallet, dec!(2000));
    h.dispatcher.dispatch(payment, "4821").await.unwrap_err();
    assert_eq!(h.balance(&wallet).await, dec!(3000));
    assert_eq!(h.payment("PAY-1").await.status, PaymentStatus::Submitted);

    // Gateway still unreachable: could-not-check, no refund yet.
    h.gateway.script_status(StatusOutcome::Unreachable);
    let status = h
        .reconciler
        .reconcile_payment(&PaymentId::new("PAY-1"))
        .await
        .unwrap();
    assert_eq!(status, CanonicalStatus::Indeterminate);
    assert_eq!(h.balance(&wallet).await, dec!(3000));
    assert_eq!(h.payment("PAY-1").await.status, PaymentStatus::Submitted);

    // The gateway comes back and reports the transfer failed.
    h.gateway.script_status(StatusOutcome::Status("FAILED".into()));
    let status = h
        .reconciler
        .reconcile_payment(&PaymentId::new("PAY-1"))
        .await
        .unwrap();
    assert_eq!(status, CanonicalStatus::Failed);
    assert_eq!(h.balance(&wallet).await, dec!(5000));

    let settled = h.payment("PAY-1").await;
    assert_eq!(settled.status, PaymentStatus::Failed);
    // The attempt is durably recorded under its client reference.
    let stored = h.records.get("PAY-1").await.unwrap().unwrap();
    assert_eq!(stored.status, CanonicalStatus::Failed);
}

/// Same window, opposite verdict: the gateway executed the transfer, so the
/// debit stands and the payment settles as succeeded.
#[tokio::test]
async fn test_timed_out_submission_settles_as_succeeded_without_refund() {
    let h = Harness::new();
    let wallet = h.seed_wallet("w-1", dec!(5000), "4821").await;
    h.gateway.script_submit(SubmitOutcome::Timeout);

    let payment = h.draft_payment("PAY-1", &wallet, dec!(2000));
    h.dispatcher.dispatch(payment, "4821").await.unwrap_err();

    h.gateway
        .script_status(StatusOutcome::Status("SUCCESSFUL".into()));
    let status = h
        .reconciler
        .reconcile_payment(&PaymentId::new("PAY-1"))
        .await
        .unwrap();
    assert_eq!(status, CanonicalStatus::Succeeded);

    // No refund: the money moved.
    assert_eq!(h.balance(&wallet).await, dec!(3000));
    let settled = h.payment("PAY-1").await;
    assert_eq!(settled.status, PaymentStatus::Succeeded);
    assert_eq!(settled.transaction_reference.as_deref(), Some("PAY-1"));
    let stored = h.records.get("PAY-1").await.unwrap().unwrap();
    assert_eq!(stored.status, CanonicalStatus::Succeeded);
}

/// A submitted payment the gateway still sees as pending keeps its debit and
/// stays submitted, but becomes durably discoverable through a record.
#[tokio::test]
async fn test_pending_verdict_records_without_settling() {
    let h = Harness::new();
    let wallet = h.seed_wallet("w-1", dec!(5000), "4821").await;
    h.gateway.script_submit(SubmitOutcome::Timeout);

    let payment = h.draft_payment("PAY-1", &wallet, dec!(2000));
    h.dispatcher.dispatch(payment, "4821").await.unwrap_err();

    h.gateway
        .script_status(StatusOutcome::Status("PENDING".into()));
    let status = h
        .reconciler
        .reconcile_payment(&PaymentId::new("PAY-1"))
        .await
        .unwrap();
    assert_eq!(status, CanonicalStatus::Pending);

    assert_eq!(h.payment("PAY-1").await.status, PaymentStatus::Submitted);
    assert_eq!(h.balance(&wallet).await, dec!(3000));
    let stored = h.records.get("PAY-1").await.unwrap().unwrap();
    assert_eq!(stored.status, CanonicalStatus::Pending);
}

#[tokio::test]
async fn test_reconcile_payment_maps_local_terminal_states() {
    let h = Harness::new();
    let wallet = h.seed_wallet("w-1", dec!(100), "4821").await;

    let payment = h.draft_payment("PAY-1", &wallet, dec!(500));
    h.dispatcher.dispatch(payment, "4821").await.unwrap_err();
    // Insufficient funds reads as a failed attempt, no gateway involved.
    let status = h
        .reconciler
        .reconcile_payment(&PaymentId::new("PAY-1"))
        .await
        .unwrap();
    assert_eq!(status, CanonicalStatus::Failed);
    assert_eq!(h.status_calls(), 0);
}

#[tokio::test]
async fn test_successful_dispatch_then_reconcile_uses_local_record_once_terminal() {
    let h = Harness::new();
    let wallet = h.seed_wallet("w-1", dec!(5000), "4821").await;
    h.gateway.script_submit(SubmitOutcome::Accept {
        reference: "TRF-1".into(),
        status: Some("PENDING".into()),
    });

    let payment = h.draft_payment("PAY-1", &wallet, dec!(1000));
    h.dispatcher.dispatch(payment, "4821").await.unwrap();

    // First reconcile re-checks the pending record against the gateway.
    h.gateway
        .script_status(StatusOutcome::Status("SUCCESSFUL".into()));
    assert_eq!(
        h.reconciler.reconcile("TRF-1").await.unwrap(),
        CanonicalStatus::Succeeded
    );
    assert_eq!(h.status_calls(), 1);

    // Now terminal locally: answered without another gateway call.
    assert_eq!(
        h.reconciler.reconcile("TRF-1").await.unwrap(),
        CanonicalStatus::Succeeded
    );
    assert_eq!(h.status_calls(), 1);
}
