mod support;

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use servicing_api::domain::{
    BankTxnType, EntryLine, EventSchema, GlAccount, ReconExceptionStatus, StatementFormat,
};
use servicing_api::service::{LedgerService, MatchOutcome, ReconciliationService};
use servicing_logic::services::{LedgerServiceImpl, ReconciliationServiceImpl};
use servicing_logic::settings::ReconSettings;

use support::TestHarness;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

struct ReconFixture {
    harness: TestHarness,
    ledger: Arc<LedgerServiceImpl>,
    recon: ReconciliationServiceImpl,
}

fn fixture() -> ReconFixture {
    servicing_logic::telemetry::init_tracing();
    let harness = TestHarness::new();
    let ledger = Arc::new(LedgerServiceImpl::new(harness.ledger_repository.clone()));
    let recon = ReconciliationServiceImpl::new(
        harness.unit_of_work.clone(),
        harness.cash_repository.clone(),
        harness.ledger_repository.clone(),
        ReconSettings::default(),
    );
    ReconFixture {
        harness,
        ledger,
        recon,
    }
}

/// A payment-shaped cash event: debit cash, credit suspense.
async fn cash_event(
    fixture: &ReconFixture,
    loan_id: Uuid,
    amount: i64,
    date: NaiveDate,
    correlation: &str,
) -> Uuid {
    fixture
        .ledger
        .post_event(
            loan_id,
            date,
            correlation,
            EventSchema::PaymentV1,
            *b"USD",
            vec![
                EntryLine::debit(GlAccount::Cash, amount, "Payment received"),
                EntryLine::credit(GlAccount::Suspense, amount, "Payment received"),
            ],
        )
        .await
        .unwrap()
}

const BAI2_DEPOSIT: &str = "01,BANK,CUST,250310,1200,1,80,1,2/\n\
                            03,100012345678,USD,010,25000,,/\n\
                            16,165,25000,REF001,lockbox payment:loan:17:gw:abc,250310\n\
                            49,25000,2/";

#[tokio::test]
async fn statement_ingest_dedupes_on_content_hash() {
    let f = fixture();
    let account_id = Uuid::new_v4();

    let first = f
        .recon
        .ingest_statement(account_id, d(2025, 3, 10), StatementFormat::Bai2, BAI2_DEPOSIT.as_bytes())
        .await
        .unwrap();
    assert_eq!(first.txn_count, 1);

    let second = f
        .recon
        .ingest_statement(account_id, d(2025, 3, 10), StatementFormat::Bai2, BAI2_DEPOSIT.as_bytes())
        .await
        .unwrap();
    assert_eq!(first.file_id, second.file_id);
    assert_eq!(f.harness.store.bank_txns.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn exact_same_day_correlation_match_auto_matches() {
    let f = fixture();
    let account_id = Uuid::new_v4();
    let loan_id = Uuid::new_v4();

    let event_id = cash_event(&f, loan_id, 25_000, d(2025, 3, 10), "payment:loan:17:gw:ABC").await;

    let file = f
        .recon
        .ingest_statement(account_id, d(2025, 3, 10), StatementFormat::Bai2, BAI2_DEPOSIT.as_bytes())
        .await
        .unwrap();

    let outcomes = f.recon.match_statement(file.file_id).await.unwrap();
    assert_eq!(outcomes.len(), 1);
    match &outcomes[0] {
        MatchOutcome::AutoMatched { event_id: matched, score } => {
            assert_eq!(*matched, event_id);
            // exact amount + same day + correlation substring
            assert_eq!(*score, 190);
        }
        other => panic!("expected auto-match, got {other:?}"),
    }

    let txn = &f.harness.store.bank_txns.lock().unwrap()[0];
    assert!(txn.matched);
    assert_eq!(txn.matched_event_id, Some(event_id));

    // cash.reconciled.v1 queued for downstream consumers
    assert!(f
        .harness
        .store
        .outbox
        .lock()
        .unwrap()
        .iter()
        .any(|row| row.routing_key == "cash.reconciled.v1"));
}

#[tokio::test]
async fn below_threshold_creates_an_exception_with_variance() {
    let f = fixture();
    let account_id = Uuid::new_v4();
    let loan_id = Uuid::new_v4();

    // amount within 1% and two days off, no reference signals: 60 points
    cash_event(&f, loan_id, 25_100, d(2025, 3, 12), "payment:loan:9:gw:Q").await;

    let statement = "03,ACCT,USD/\n16,165,25000,REFX,unref deposit,250310";
    let file = f
        .recon
        .ingest_statement(account_id, d(2025, 3, 10), StatementFormat::Bai2, statement.as_bytes())
        .await
        .unwrap();

    let outcomes = f.recon.match_statement(file.file_id).await.unwrap();
    match &outcomes[0] {
        MatchOutcome::Exception { variance_minor } => {
            // bank +25,000 vs ledger +25,100
            assert_eq!(*variance_minor, -100);
        }
        other => panic!("expected exception, got {other:?}"),
    }

    let txn_id = f.harness.store.bank_txns.lock().unwrap()[0].bank_txn_id;
    let exception = f
        .harness
        .cash_repository
        .find_exception(txn_id)
        .await
        .unwrap()
        .expect("exception row");
    assert_eq!(exception.status, ReconExceptionStatus::New);

    // candidates were retained for the operator
    let candidates = f.recon.candidates(txn_id).await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert!(candidates[0].score < 85);
}

#[tokio::test]
async fn manual_match_resolves_the_exception() {
    let f = fixture();
    let account_id = Uuid::new_v4();
    let loan_id = Uuid::new_v4();

    let event_id = cash_event(&f, loan_id, 30_000, d(2025, 3, 20), "payment:loan:3:gw:M").await;

    let statement = "03,ACCT,USD/\n16,165,25000,R1,stray deposit,250310";
    let file = f
        .recon
        .ingest_statement(account_id, d(2025, 3, 10), StatementFormat::Bai2, statement.as_bytes())
        .await
        .unwrap();
    f.recon.match_statement(file.file_id).await.unwrap();

    let txn_id = f.harness.store.bank_txns.lock().unwrap()[0].bank_txn_id;
    f.recon.manual_match(txn_id, event_id).await.unwrap();

    let exception = f
        .harness
        .cash_repository
        .find_exception(txn_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(exception.status, ReconExceptionStatus::Resolved);

    // a matched txn cannot be matched again
    assert!(f.recon.manual_match(txn_id, event_id).await.is_err());
}

#[tokio::test]
async fn write_off_posts_a_compensating_event() {
    let f = fixture();
    let account_id = Uuid::new_v4();

    // an unexplained bank service fee
    let statement = "03,ACCT,USD/\n16,699,4200,FEE1,Analysis charge,250310";
    let file = f
        .recon
        .ingest_statement(account_id, d(2025, 3, 10), StatementFormat::Bai2, statement.as_bytes())
        .await
        .unwrap();
    f.recon.match_statement(file.file_id).await.unwrap();

    let txn_id = f.harness.store.bank_txns.lock().unwrap()[0].bank_txn_id;
    let event_id = f.recon.write_off(txn_id, "bank analysis fee").await.unwrap();

    let event = f.ledger.find_event(event_id).await.unwrap().unwrap();
    assert_eq!(event.schema, EventSchema::CashWriteoffV1);
    let fee_debit: i64 = event
        .entries
        .iter()
        .filter(|entry| entry.account == GlAccount::FeeExpense)
        .map(|entry| entry.debit_minor)
        .sum();
    assert_eq!(fee_debit, 4_200);

    let exception = f
        .harness
        .cash_repository
        .find_exception(txn_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(exception.status, ReconExceptionStatus::WrittenOff);

    let txn = f.recon.find_bank_txn(txn_id).await.unwrap().unwrap();
    assert!(txn.matched);
    assert_eq!(txn.matched_event_id, Some(event_id));
}

#[tokio::test]
async fn camt_statements_parse_and_match_too() {
    let f = fixture();
    let account_id = Uuid::new_v4();
    let loan_id = Uuid::new_v4();
    let event_id = cash_event(&f, loan_id, 150_000, d(2025, 3, 10), "payment:loan:17:gw:xyz").await;

    let camt = r#"<Document><BkToCstmrStmt><Stmt>
      <Ntry>
        <Amt Ccy="USD">1500.00</Amt>
        <CdtDbtInd>CRDT</CdtDbtInd>
        <BookgDt><Dt>2025-03-10</Dt></BookgDt>
        <AcctSvcrRef>REF-1</AcctSvcrRef>
        <AddtlNtryInf>payment:loan:17:gw:xyz</AddtlNtryInf>
      </Ntry>
    </Stmt></BkToCstmrStmt></Document>"#;

    let file = f
        .recon
        .ingest_statement(account_id, d(2025, 3, 10), StatementFormat::Camt053, camt.as_bytes())
        .await
        .unwrap();
    assert_eq!(file.txn_count, 1);

    let outcomes = f.recon.match_statement(file.file_id).await.unwrap();
    assert!(matches!(
        outcomes[0],
        MatchOutcome::AutoMatched { event_id: matched, .. } if matched == event_id
    ));

    assert_eq!(
        f.harness.store.bank_txns.lock().unwrap()[0].txn_type,
        BankTxnType::Credit
    );
}
