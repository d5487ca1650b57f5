mod support;

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use servicing_api::domain::{
    CollectionCaseStatus, DayCountConvention, DelinquencyBucket, EventSchema,
    ForeclosureCaseStatus, ForeclosureMilestone, GlAccount, InstallmentStatus, LoanStatus,
    PlanInstallment, PlanStatus, RoundingMode, ScheduleTerms,
};
use servicing_api::service::{CollectionsService, LedgerService, ScheduleService};
use servicing_api::ServicingError;
use servicing_logic::services::{
    CollectionsServiceImpl, LedgerServiceImpl, PolicyService, ScheduleServiceImpl,
};

use support::TestHarness;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

struct CollectionsFixture {
    harness: TestHarness,
    ledger: Arc<LedgerServiceImpl>,
    schedules: ScheduleServiceImpl,
    collections: CollectionsServiceImpl,
}

fn fixture() -> CollectionsFixture {
    servicing_logic::telemetry::init_tracing();
    let harness = TestHarness::new();
    let policy = Arc::new(PolicyService::new(harness.product_repository.clone()));
    let ledger = Arc::new(LedgerServiceImpl::new(harness.ledger_repository.clone()));
    let schedules = ScheduleServiceImpl::new(harness.schedule_repository.clone());
    let collections = CollectionsServiceImpl::new(
        harness.unit_of_work.clone(),
        harness.collections_repository.clone(),
        harness.schedule_repository.clone(),
        harness.payment_repository.clone(),
        harness.escrow_repository.clone(),
        harness.loan_repository.clone(),
        policy,
    );
    CollectionsFixture {
        harness,
        ledger,
        schedules,
        collections,
    }
}

/// Twelve periods of 1,000 (interest-free for round numbers) due the
/// first of each month of 2025.
async fn seed_level_schedule(fixture: &CollectionsFixture, loan_id: Uuid) {
    fixture
        .schedules
        .generate(ScheduleTerms {
            loan_id,
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
}

#[tokio::test]
async fn bucket_transition_opens_a_foreclosure_case_at_ninety_days() {
    let f = fixture();
    let loan = f.harness.seed_loan(12_000, 0, d(2024, 12, 1)).await;
    seed_level_schedule(&f, loan.loan_id).await;

    // nothing applied: earliest unpaid is 2025-01-01
    let june = f
        .collections
        .compute_delinquency(loan.loan_id, d(2025, 6, 15))
        .await
        .unwrap();
    assert_eq!(june.earliest_unpaid_due_date, Some(d(2025, 1, 1)));
    assert_eq!(june.bucket, DelinquencyBucket::Dpd90Plus);

    // a case opened on entering dpd_90_plus
    let case = f
        .collections
        .open_case_for_loan(loan.loan_id)
        .await
        .unwrap()
        .expect("case should be open");
    assert_eq!(case.status, ForeclosureCaseStatus::Open);

    // recomputing the same day keeps a single snapshot and case
    f.collections
        .compute_delinquency(loan.loan_id, d(2025, 6, 15))
        .await
        .unwrap();
    assert_eq!(f.harness.store.snapshots.lock().unwrap().len(), 1);
    assert_eq!(f.harness.store.cases.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn seventy_five_to_ninety_two_dpd_crosses_buckets() {
    let f = fixture();
    let loan = f.harness.seed_loan(12_000, 0, d(2024, 12, 1)).await;
    seed_level_schedule(&f, loan.loan_id).await;

    // pay January through March by hand
    f.harness
        .store
        .postings
        .lock()
        .unwrap()
        .insert(Uuid::new_v4(), fake_posting(&f, loan.loan_id, 3_000, d(2025, 3, 1)));

    let mid_june = f
        .collections
        .compute_delinquency(loan.loan_id, d(2025, 6, 15))
        .await
        .unwrap();
    assert_eq!(mid_june.earliest_unpaid_due_date, Some(d(2025, 4, 1)));
    assert_eq!(mid_june.dpd, 75);
    assert_eq!(mid_june.bucket, DelinquencyBucket::Dpd60_89);
    assert!(f
        .collections
        .open_case_for_loan(loan.loan_id)
        .await
        .unwrap()
        .is_none());

    let early_july = f
        .collections
        .compute_delinquency(loan.loan_id, d(2025, 7, 2))
        .await
        .unwrap();
    assert_eq!(early_july.dpd, 92);
    assert_eq!(early_july.bucket, DelinquencyBucket::Dpd90Plus);
    assert!(f
        .collections
        .open_case_for_loan(loan.loan_id)
        .await
        .unwrap()
        .is_some());

    // the bucket change was published
    let outbox = f.harness.store.outbox.lock().unwrap();
    assert!(outbox
        .iter()
        .any(|row| row.routing_key == "delinquency.status.changed.v1"));
    assert!(outbox
        .iter()
        .any(|row| row.routing_key == "foreclosure.case.opened.v1"));
}

/// Shortcut: a posting row with the applied split collapsed to
/// principal, tied to a synthetic intake so applied_through sees it.
fn fake_posting(
    fixture: &CollectionsFixture,
    loan_id: Uuid,
    principal_minor: i64,
    effective: NaiveDate,
) -> servicing_db::models::PaymentPostingModel {
    use chrono::Utc;
    let payment_id = Uuid::new_v4();
    fixture
        .harness
        .store
        .intakes
        .lock()
        .unwrap()
        .push(servicing_db::models::PaymentIntakeModel {
            payment_id,
            loan_id,
            method: servicing_api::domain::PaymentMethod::Ach,
            amount_minor: principal_minor,
            currency: "USD".to_string(),
            received_at: Utc::now(),
            gateway_txn_id: payment_id.to_string(),
            source: servicing_api::domain::PaymentSource::Gateway,
            idempotency_key: payment_id.to_string(),
            effective_date: effective,
            raw_payload: serde_json::json!({}),
            payload_hash: String::new(),
        });
    servicing_db::models::PaymentPostingModel {
        payment_id,
        event_id: Uuid::new_v4(),
        applied_fees_minor: 0,
        applied_interest_minor: 0,
        applied_principal_minor: principal_minor,
        applied_escrow_minor: 0,
        applied_suspense_minor: 0,
        applied_json: serde_json::json!([]),
        new_balances_json: serde_json::json!({}),
        posted_at: Utc::now(),
    }
}

#[tokio::test]
async fn late_fee_assessed_once_per_period_with_grace() {
    let f = fixture();
    let loan = f.harness.seed_loan(12_000, 0, d(2024, 12, 1)).await;
    seed_level_schedule(&f, loan.loan_id).await;

    // inside the 15-day grace window: no fee
    let early = f
        .collections
        .assess_late_fee(loan.loan_id, d(2025, 1, 1), d(2025, 1, 10))
        .await
        .unwrap();
    assert!(early.is_none());

    // past grace: 5% of the 1,000 scheduled payment
    let fee = f
        .collections
        .assess_late_fee(loan.loan_id, d(2025, 1, 1), d(2025, 1, 20))
        .await
        .unwrap()
        .expect("fee should be assessed");
    assert_eq!(fee.amount_minor, 50);
    assert_ne!(fee.event_id, Uuid::nil());

    // second assessment for the same period is a no-op
    let again = f
        .collections
        .assess_late_fee(loan.loan_id, d(2025, 1, 1), d(2025, 2, 20))
        .await
        .unwrap();
    assert!(again.is_none());
    assert_eq!(f.harness.store.late_fees.lock().unwrap().len(), 1);

    // the ledger got exactly one fee event
    let events = f.harness.store.events.lock().unwrap();
    assert_eq!(
        events
            .iter()
            .filter(|event| event.correlation_id.starts_with("latefee:"))
            .count(),
        1
    );
}

#[tokio::test]
async fn late_fee_skipped_when_period_is_paid() {
    let f = fixture();
    let loan = f.harness.seed_loan(12_000, 0, d(2024, 12, 1)).await;
    seed_level_schedule(&f, loan.loan_id).await;

    let posting = fake_posting(&f, loan.loan_id, 1_000, d(2025, 1, 2));
    f.harness
        .store
        .postings
        .lock()
        .unwrap()
        .insert(Uuid::new_v4(), posting);

    let fee = f
        .collections
        .assess_late_fee(loan.loan_id, d(2025, 1, 1), d(2025, 1, 20))
        .await
        .unwrap();
    assert!(fee.is_none());
}

#[tokio::test]
async fn plan_lifecycle_walks_installments_to_completion() {
    let f = fixture();
    let loan = f.harness.seed_loan(12_000, 0, d(2024, 12, 1)).await;

    let installments: Vec<PlanInstallment> = (1..=3)
        .map(|no| PlanInstallment {
            installment_no: no,
            due_date: d(2025, no, 15),
            amount_minor: 2_000,
            paid_minor: 0,
            status: InstallmentStatus::Pending,
        })
        .collect();

    let plan = f
        .collections
        .create_plan(loan.loan_id, installments)
        .await
        .unwrap();
    assert_eq!(plan.status, PlanStatus::Draft);

    let plan = f.collections.activate_plan(plan.plan_id).await.unwrap();
    assert_eq!(plan.status, PlanStatus::Active);

    // one active plan per loan
    let err = f
        .collections
        .create_plan(loan.loan_id, plan.installments.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, ServicingError::ActivePlanExists(_)));

    // 3,000 pays installment one and half of two
    let plan = f
        .collections
        .apply_plan_payment(plan.plan_id, 3_000, d(2025, 1, 20))
        .await
        .unwrap();
    assert_eq!(plan.installments[0].status, InstallmentStatus::Paid);
    assert_eq!(plan.installments[1].status, InstallmentStatus::Partial);
    assert_eq!(plan.installments[1].paid_minor, 1_000);
    assert_eq!(plan.installments[2].status, InstallmentStatus::Pending);
    assert_eq!(plan.status, PlanStatus::Active);

    // the rest completes the plan
    let plan = f
        .collections
        .apply_plan_payment(plan.plan_id, 3_000, d(2025, 2, 20))
        .await
        .unwrap();
    assert_eq!(plan.status, PlanStatus::Completed);
    assert!(plan
        .installments
        .iter()
        .all(|installment| installment.status == InstallmentStatus::Paid));
}

#[tokio::test]
async fn sweep_defaults_plans_with_past_due_installments() {
    let f = fixture();
    let loan = f.harness.seed_loan(12_000, 0, d(2024, 12, 1)).await;

    let plan = f
        .collections
        .create_plan(
            loan.loan_id,
            vec![PlanInstallment {
                installment_no: 1,
                due_date: d(2025, 1, 15),
                amount_minor: 2_000,
                paid_minor: 0,
                status: InstallmentStatus::Pending,
            }],
        )
        .await
        .unwrap();
    f.collections.activate_plan(plan.plan_id).await.unwrap();

    // before the due date nothing defaults
    assert!(f
        .collections
        .sweep_defaulted_plans(d(2025, 1, 10))
        .await
        .unwrap()
        .is_empty());

    let defaulted = f
        .collections
        .sweep_defaulted_plans(d(2025, 2, 1))
        .await
        .unwrap();
    assert_eq!(defaulted, vec![plan.plan_id]);
    let stored = f
        .harness
        .collections_repository
        .find_plan(plan.plan_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PlanStatus::Defaulted);
}

#[tokio::test]
async fn milestones_are_unique_and_terminal_ones_close_the_case() {
    let f = fixture();
    let loan = f.harness.seed_loan(12_000, 0, d(2024, 12, 1)).await;

    let case = f.collections.open_foreclosure_case(loan.loan_id).await.unwrap();
    // idempotent open
    let same = f.collections.open_foreclosure_case(loan.loan_id).await.unwrap();
    assert_eq!(case.case_id, same.case_id);

    f.collections
        .record_milestone(case.case_id, ForeclosureMilestone::Referral, d(2025, 7, 3))
        .await
        .unwrap();
    let err = f
        .collections
        .record_milestone(case.case_id, ForeclosureMilestone::Referral, d(2025, 7, 4))
        .await
        .unwrap_err();
    assert!(matches!(err, ServicingError::DuplicateMilestone { .. }));

    let closed = f
        .collections
        .record_milestone(case.case_id, ForeclosureMilestone::Reinstated, d(2025, 8, 1))
        .await
        .unwrap();
    assert_eq!(closed.status, ForeclosureCaseStatus::Closed);

    // reinstatement returns the collection case to normal
    let stored_loan = f
        .harness
        .loan_repository
        .find_by_id(loan.loan_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored_loan.collection_case_status, CollectionCaseStatus::Normal);

    // no further milestones on a closed case
    let err = f
        .collections
        .record_milestone(case.case_id, ForeclosureMilestone::SaleScheduled, d(2025, 9, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, ServicingError::DuplicateMilestone { .. }));
}

#[tokio::test]
async fn sale_completed_closes_the_case_and_charges_off_the_loan() {
    let f = fixture();
    let loan = f.harness.seed_loan(12_000, 0, d(2024, 12, 1)).await;
    f.ledger
        .post_loan_origination(
            loan.loan_id,
            d(2024, 12, 1),
            &format!("origination:loan:{}", loan.loan_id),
            12_000,
        )
        .await
        .unwrap();
    let case = f.collections.open_foreclosure_case(loan.loan_id).await.unwrap();

    f.collections
        .record_milestone(case.case_id, ForeclosureMilestone::SaleCompleted, d(2025, 9, 1))
        .await
        .unwrap();

    let stored_loan = f
        .harness
        .loan_repository
        .find_by_id(loan.loan_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored_loan.collection_case_status, CollectionCaseStatus::Closed);
    assert_eq!(stored_loan.status, LoanStatus::ChargedOff);

    // the unrecovered principal was charged off
    let balances = f.ledger.latest_balances(loan.loan_id).await.unwrap();
    assert_eq!(balances.principal_minor, 0);

    let charge_off = f
        .ledger
        .find_event_by_correlation(&format!("chargeoff:loan:{}", loan.loan_id))
        .await
        .unwrap()
        .expect("charge-off event");
    assert_eq!(charge_off.schema, EventSchema::ChargeOffV1);
    assert!(charge_off.entries.iter().any(|entry| {
        entry.account == GlAccount::WriteoffExpense && entry.debit_minor == 12_000
    }));

    let trial = f.ledger.trial_balance().await.unwrap();
    assert!(trial.is_balanced());
}
