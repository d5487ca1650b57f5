mod support;

use std::sync::Arc;

use chrono::NaiveDate;

use servicing_api::domain::{
    DayCountConvention, EscrowFrequency, EscrowItemType, RoundingMode, ScheduleTerms,
};
use servicing_api::service::{
    CycleTask, LedgerService, ScheduleService, ServicingCycleService,
};
use servicing_db::models::EscrowItemModel;
use servicing_logic::services::{
    CollectionsServiceImpl, EscrowServiceImpl, LedgerServiceImpl, PolicyService,
    ScheduleServiceImpl, ServicingCycleImpl,
};
use uuid::Uuid;

use support::TestHarness;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

struct CycleFixture {
    harness: TestHarness,
    ledger: Arc<LedgerServiceImpl>,
    schedules: ScheduleServiceImpl,
    cycle: ServicingCycleImpl,
}

fn fixture() -> CycleFixture {
    servicing_logic::telemetry::init_tracing();
    let harness = TestHarness::new();
    let policy = Arc::new(PolicyService::new(harness.product_repository.clone()));
    let ledger = Arc::new(LedgerServiceImpl::new(harness.ledger_repository.clone()));
    let schedules = ScheduleServiceImpl::new(harness.schedule_repository.clone());
    let collections = Arc::new(CollectionsServiceImpl::new(
        harness.unit_of_work.clone(),
        harness.collections_repository.clone(),
        harness.schedule_repository.clone(),
        harness.payment_repository.clone(),
        harness.escrow_repository.clone(),
        harness.loan_repository.clone(),
        policy.clone(),
    ));
    let escrow = Arc::new(EscrowServiceImpl::new(
        harness.unit_of_work.clone(),
        harness.escrow_repository.clone(),
        harness.ledger_repository.clone(),
        harness.loan_repository.clone(),
        policy.clone(),
    ));
    let cycle = ServicingCycleImpl::new(
        harness.loan_repository.clone(),
        harness.schedule_repository.clone(),
        ledger.clone(),
        collections,
        escrow,
        policy,
    );
    CycleFixture {
        harness,
        ledger,
        schedules,
        cycle,
    }
}

#[tokio::test]
async fn daily_accrual_is_idempotent_per_date() {
    let f = fixture();
    let loan = f.harness.seed_loan(36_000_000, 600, d(2025, 1, 1)).await;
    f.ledger
        .post_loan_origination(
            loan.loan_id,
            d(2025, 1, 1),
            &format!("origination:loan:{}", loan.loan_id),
            36_000_000,
        )
        .await
        .unwrap();

    let report = f
        .cycle
        .run_task(CycleTask::InterestAccrual, d(2025, 1, 2))
        .await
        .unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 0);

    // one day at 6.00% on 360,000.00 over a 360-day year: 60.00
    let balances = f.ledger.latest_balances(loan.loan_id).await.unwrap();
    assert_eq!(balances.interest_receivable_minor, 6_000);

    // a re-run of the same processing date accrues nothing new
    let rerun = f
        .cycle
        .run_task(CycleTask::InterestAccrual, d(2025, 1, 2))
        .await
        .unwrap();
    assert_eq!(rerun.failed, 0);
    let balances = f.ledger.latest_balances(loan.loan_id).await.unwrap();
    assert_eq!(balances.interest_receivable_minor, 6_000);
}

#[tokio::test]
async fn full_cycle_touches_every_task() {
    let f = fixture();
    let loan = f.harness.seed_loan(12_000, 0, d(2024, 12, 1)).await;
    f.schedules
        .generate(ScheduleTerms {
            loan_id: loan.loan_id,
            principal_minor: 12_000,
            annual_rate_bps: 0,
            term_months: 12,
            first_payment_date: d(2025, 1, 1),
            day_count: DayCountConvention::Us30360,
            rounding: RoundingMode::HalfAwayFromZero,
            interest_only_months: 0,
            balloon_month: None,
        })
        .await
        .unwrap();
    f.harness
        .escrow_repository
        .upsert_item(EscrowItemModel {
            escrow_id: Uuid::new_v4(),
            loan_id: loan.loan_id,
            item_type: EscrowItemType::PropertyTax,
            payee: "County".to_string(),
            amount_minor: 60_000,
            frequency: EscrowFrequency::Annual,
            next_due_date: d(2025, 6, 1),
            active: true,
        })
        .await
        .unwrap();

    let reports = f.cycle.run_daily_cycle(d(2025, 2, 20)).await.unwrap();
    assert_eq!(reports.len(), 7);
    assert!(reports.iter().all(|report| report.failed == 0));

    // the delinquency pass produced a snapshot (Jan + Feb unpaid)
    let snapshot = f
        .harness
        .collections_repository
        .latest_snapshot(loan.loan_id)
        .await
        .unwrap()
        .expect("snapshot");
    assert_eq!(snapshot.earliest_unpaid_due_date, Some(d(2025, 1, 1)));

    // the late-fee pass assessed January and February
    assert_eq!(f.harness.store.late_fees.lock().unwrap().len(), 2);

    // the escrow pass materialized the forecast
    assert!(!f.harness.store.forecast.lock().unwrap().is_empty());
}
