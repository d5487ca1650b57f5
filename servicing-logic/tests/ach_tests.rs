mod support;

use std::sync::Arc;

use chrono::NaiveDate;
use heapless::String as HeaplessString;
use uuid::Uuid;

use servicing_api::domain::{AchBatchStatus, AchTransactionCode, ReconExceptionStatus};
use servicing_api::service::{AchService, NewAchEntry, PaymentService};
use servicing_api::ServicingError;
use servicing_logic::services::{AchServiceImpl, PaymentServiceImpl, PolicyService};
use servicing_logic::settings::Settings;

use support::TestHarness;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

struct AchFixture {
    harness: TestHarness,
    ach: AchServiceImpl,
}

fn fixture() -> AchFixture {
    servicing_logic::telemetry::init_tracing();
    let harness = TestHarness::new();
    let policy = Arc::new(PolicyService::new(harness.product_repository.clone()));
    let payments = Arc::new(PaymentServiceImpl::new(
        harness.unit_of_work.clone(),
        harness.payment_repository.clone(),
        harness.ledger_repository.clone(),
        harness.loan_repository.clone(),
        harness.schedule_repository.clone(),
        harness.collections_repository.clone(),
        harness.escrow_repository.clone(),
        policy,
    ));
    let ach = AchServiceImpl::new(
        harness.unit_of_work.clone(),
        harness.ach_repository.clone(),
        harness.cash_repository.clone(),
        payments,
        Settings::default().ach,
    );
    AchFixture { harness, ach }
}

fn entry(loan_id: Option<Uuid>, amount: i64, code: AchTransactionCode) -> NewAchEntry {
    NewAchEntry {
        loan_id,
        txn_code: code,
        // 12345678 carries check digit 0
        rdfi_routing: HeaplessString::try_from("123456780").unwrap(),
        account_number_masked: HeaplessString::try_from("****4321").unwrap(),
        amount_minor: amount,
        individual_name: HeaplessString::try_from("DOE JANE").unwrap(),
    }
}

#[tokio::test]
async fn seal_assigns_traces_and_freezes_totals() {
    let f = fixture();
    let batch = f.ach.create_batch("LOANPMT", d(2025, 3, 14)).await.unwrap();

    f.ach
        .add_entry(batch.batch_id, entry(Some(Uuid::new_v4()), 150_000, AchTransactionCode::CheckingDebit))
        .await
        .unwrap();
    f.ach
        .add_entry(batch.batch_id, entry(None, 42_000, AchTransactionCode::CheckingCredit))
        .await
        .unwrap();

    let sealed = f.ach.seal_batch(batch.batch_id).await.unwrap();
    assert_eq!(sealed.status, AchBatchStatus::Sealed);
    assert_eq!(sealed.entry_count, 2);
    assert_eq!(sealed.debit_total_minor, 150_000);
    assert_eq!(sealed.credit_total_minor, 42_000);

    let entries = f.ach.batch_entries(batch.batch_id).await.unwrap();
    let traces: Vec<String> = entries
        .iter()
        .map(|entry| entry.trace_number.as_ref().unwrap().to_string())
        .collect();
    // ODFI prefix + 7-digit sequence
    assert!(traces.contains(&"021000020000001".to_string()));
    assert!(traces.contains(&"021000020000002".to_string()));

    // adding entries after seal is rejected
    let err = f
        .ach
        .add_entry(batch.batch_id, entry(None, 1_000, AchTransactionCode::CheckingDebit))
        .await
        .unwrap_err();
    assert!(matches!(err, ServicingError::BatchNotOpen { .. }));
}

#[tokio::test]
async fn file_generation_moves_the_batch_to_filed() {
    let f = fixture();
    let batch = f.ach.create_batch("LOANPMT", d(2025, 3, 14)).await.unwrap();
    f.ach
        .add_entry(batch.batch_id, entry(Some(Uuid::new_v4()), 98_700, AchTransactionCode::CheckingDebit))
        .await
        .unwrap();

    // cannot file an open batch
    assert!(f.ach.generate_file(batch.batch_id).await.is_err());

    f.ach.seal_batch(batch.batch_id).await.unwrap();
    let file = f.ach.generate_file(batch.batch_id).await.unwrap();

    let lines: Vec<&str> = file.lines().collect();
    assert!(lines.iter().all(|line| line.len() == 94));
    assert_eq!(lines.len() % 10, 0);

    let stored = f.ach.find_batch(batch.batch_id).await.unwrap().unwrap();
    assert_eq!(stored.status, AchBatchStatus::Filed);

    // settle completes the lifecycle; a settled batch cannot fail
    f.ach.mark_settled(batch.batch_id).await.unwrap();
    assert!(f.ach.mark_failed(batch.batch_id).await.is_err());
}

#[tokio::test]
async fn invalid_routing_numbers_are_rejected() {
    let f = fixture();
    let batch = f.ach.create_batch("LOANPMT", d(2025, 3, 14)).await.unwrap();

    let mut bad = entry(None, 1_000, AchTransactionCode::CheckingDebit);
    bad.rdfi_routing = HeaplessString::try_from("123456789").unwrap(); // wrong check digit
    let err = f.ach.add_entry(batch.batch_id, bad).await.unwrap_err();
    assert!(matches!(err, ServicingError::InvalidRoutingNumber(_)));
}

#[tokio::test]
async fn retryable_return_schedules_a_payment_retry() {
    let f = fixture();
    let loan = f.harness.seed_loan(1_000_000, 600, d(2025, 1, 1)).await;
    let batch = f.ach.create_batch("LOANPMT", d(2025, 3, 14)).await.unwrap();
    f.ach
        .add_entry(batch.batch_id, entry(Some(loan.loan_id), 55_000, AchTransactionCode::CheckingDebit))
        .await
        .unwrap();
    f.ach.seal_batch(batch.batch_id).await.unwrap();

    let trace = f.ach.batch_entries(batch.batch_id).await.unwrap()[0]
        .trace_number
        .as_ref()
        .unwrap()
        .to_string();

    let ach_return = f
        .ach
        .process_return(&trace, "R01", d(2025, 3, 20), None)
        .await
        .unwrap();
    assert_eq!(ach_return.return_code.as_str(), "R01");

    // a retry intake entered the pipeline
    let intakes = f.harness.store.intakes.lock().unwrap();
    assert_eq!(intakes.len(), 1);
    assert_eq!(intakes[0].loan_id, loan.loan_id);
    assert_eq!(intakes[0].amount_minor, 55_000);
    drop(intakes);

    // loan-scoped returns emit the reversal request
    assert!(f
        .harness
        .store
        .outbox
        .lock()
        .unwrap()
        .iter()
        .any(|row| row.routing_key == "payment.reversal.requested.v1"));

    // reprocessing the same return is idempotent
    let again = f
        .ach
        .process_return(&trace, "R01", d(2025, 3, 21), None)
        .await
        .unwrap();
    assert_eq!(again.return_id, ach_return.return_id);
    assert_eq!(f.harness.store.ach_returns.lock().unwrap().len(), 1);
    assert_eq!(f.harness.store.intakes.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn non_retryable_return_opens_an_exception() {
    let f = fixture();
    let batch = f.ach.create_batch("LOANPMT", d(2025, 3, 14)).await.unwrap();
    f.ach
        .add_entry(batch.batch_id, entry(None, 77_000, AchTransactionCode::CheckingDebit))
        .await
        .unwrap();
    f.ach.seal_batch(batch.batch_id).await.unwrap();

    let entries = f.ach.batch_entries(batch.batch_id).await.unwrap();
    let trace = entries[0].trace_number.as_ref().unwrap().to_string();

    // R02: account closed
    f.ach
        .process_return(&trace, "R02", d(2025, 3, 20), Some("ACCOUNT CLOSED".to_string()))
        .await
        .unwrap();

    let exception = f
        .harness
        .cash_repository
        .find_exception(entries[0].entry_id)
        .await
        .unwrap()
        .expect("exception for the returned entry");
    assert_eq!(exception.status, ReconExceptionStatus::New);
    assert_eq!(exception.variance_minor, 77_000);

    // nothing re-entered the payment pipeline
    assert!(f.harness.store.intakes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_trace_is_an_error() {
    let f = fixture();
    let err = f
        .ach
        .process_return("021000029999999", "R01", d(2025, 3, 20), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServicingError::AchEntryNotFound(_)));
}
