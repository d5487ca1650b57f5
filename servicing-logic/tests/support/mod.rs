//! In-memory repository implementations backing the integration tests.
//! They enforce the same uniqueness and state-machine constraints the
//! SQL schema does, so the services can be exercised end to end without
//! a database.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use servicing_api::domain::{
    AchBatchStatus, CollectionCaseStatus, DisbursementStatus, EscrowPolicy, FeePolicy,
    ForeclosureCaseStatus, ForeclosureMilestone, GlAccount, LoanStatus, PlanStatus, ProductPolicy,
    ReconExceptionStatus,
};
use servicing_api::{ServicingError, ServicingResult};
use servicing_db::models::*;
use servicing_db::repository::*;

#[derive(Default)]
pub struct InMemoryStore {
    pub events: Mutex<Vec<LedgerEventModel>>,
    pub entries: Mutex<Vec<LedgerEntryModel>>,
    pub intakes: Mutex<Vec<PaymentIntakeModel>>,
    pub validations: Mutex<HashMap<Uuid, PaymentValidationModel>>,
    pub postings: Mutex<HashMap<Uuid, PaymentPostingModel>>,
    pub outbox: Mutex<Vec<OutboxMessageModel>>,
    pub schedules: Mutex<Vec<PaymentScheduleModel>>,
    pub schedule_rows: Mutex<Vec<ScheduleRowModel>>,
    pub loans: Mutex<HashMap<Uuid, LoanModel>>,
    pub audit: Mutex<Vec<AuditRecordModel>>,
    pub escrow_items: Mutex<Vec<EscrowItemModel>>,
    pub forecast: Mutex<Vec<EscrowForecastModel>>,
    pub disbursements: Mutex<Vec<EscrowDisbursementModel>>,
    pub analyses: Mutex<Vec<EscrowAnalysisModel>>,
    pub snapshots: Mutex<Vec<DelinquencySnapshotModel>>,
    pub late_fees: Mutex<Vec<LateFeeAssessmentModel>>,
    pub plans: Mutex<HashMap<Uuid, PaymentPlanModel>>,
    pub installments: Mutex<Vec<PlanInstallmentModel>>,
    pub cases: Mutex<Vec<ForeclosureCaseModel>>,
    pub milestones: Mutex<Vec<ForeclosureEventModel>>,
    pub bank_accounts: Mutex<HashMap<Uuid, BankAccountModel>>,
    pub statement_files: Mutex<Vec<BankStatementFileModel>>,
    pub bank_txns: Mutex<Vec<BankTxnModel>>,
    pub candidates: Mutex<Vec<MatchCandidateModel>>,
    pub exceptions: Mutex<HashMap<Uuid, ReconExceptionModel>>,
    pub ach_batches: Mutex<HashMap<Uuid, AchBatchModel>>,
    pub ach_entries: Mutex<Vec<AchEntryModel>>,
    pub ach_returns: Mutex<Vec<AchReturnModel>>,
    pub product_policies: Mutex<HashMap<String, ProductPolicy>>,
    pub fee_policies: Mutex<HashMap<String, FeePolicy>>,
    pub escrow_policies: Mutex<HashMap<(String, String), EscrowPolicy>>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

fn constraint(name: &str, details: impl Into<String>) -> ServicingError {
    ServicingError::DatabaseConstraintViolation {
        constraint: name.to_string(),
        details: details.into(),
    }
}

// ============================================================================
// LEDGER
// ============================================================================

pub struct MemLedgerRepository {
    store: Arc<InMemoryStore>,
}

impl MemLedgerRepository {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl LedgerRepository for MemLedgerRepository {
    async fn create_event(
        &self,
        mut event: LedgerEventModel,
        entries: Vec<LedgerEntryModel>,
    ) -> ServicingResult<Uuid> {
        let mut events = self.store.events.lock().unwrap();
        if events
            .iter()
            .any(|existing| existing.correlation_id == event.correlation_id)
        {
            return Err(ServicingError::DuplicateCorrelation(event.correlation_id));
        }
        // the finalize procedure's re-check: balance inside the same
        // transaction
        let debits: i64 = entries.iter().map(|entry| entry.debit_minor).sum();
        let credits: i64 = entries.iter().map(|entry| entry.credit_minor).sum();
        if debits != credits || debits == 0 {
            return Err(ServicingError::Unbalanced {
                debit_minor: debits,
                credit_minor: credits,
            });
        }
        for entry in &entries {
            if entry.debit_minor < 0
                || entry.credit_minor < 0
                || (entry.debit_minor > 0) == (entry.credit_minor > 0)
            {
                return Err(ServicingError::InvalidLine {
                    account: entry.account.to_string(),
                    debit_minor: entry.debit_minor,
                    credit_minor: entry.credit_minor,
                });
            }
        }

        event.finalized_at = Some(Utc::now());
        let event_id = event.event_id;
        events.push(event);
        self.store.entries.lock().unwrap().extend(entries);
        Ok(event_id)
    }

    async fn find_by_id(&self, event_id: Uuid) -> ServicingResult<Option<LedgerEventModel>> {
        Ok(self
            .store
            .events
            .lock()
            .unwrap()
            .iter()
            .find(|event| event.event_id == event_id)
            .cloned())
    }

    async fn find_by_correlation(
        &self,
        correlation_id: &str,
    ) -> ServicingResult<Option<LedgerEventModel>> {
        Ok(self
            .store
            .events
            .lock()
            .unwrap()
            .iter()
            .find(|event| event.correlation_id == correlation_id)
            .cloned())
    }

    async fn entries_for_event(&self, event_id: Uuid) -> ServicingResult<Vec<LedgerEntryModel>> {
        Ok(self
            .store
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn account_sums_for_loan(&self, loan_id: Uuid) -> ServicingResult<Vec<AccountSumRow>> {
        let events = self.store.events.lock().unwrap();
        let finalized: Vec<Uuid> = events
            .iter()
            .filter(|event| event.loan_id == loan_id && event.finalized_at.is_some())
            .map(|event| event.event_id)
            .collect();
        drop(events);

        let mut sums: HashMap<GlAccount, (i64, i64)> = HashMap::new();
        for entry in self.store.entries.lock().unwrap().iter() {
            if finalized.contains(&entry.event_id) {
                let slot = sums.entry(entry.account).or_insert((0, 0));
                slot.0 += entry.debit_minor;
                slot.1 += entry.credit_minor;
            }
        }
        Ok(sums
            .into_iter()
            .map(|(account, (debit_minor, credit_minor))| AccountSumRow {
                account,
                debit_minor,
                credit_minor,
            })
            .collect())
    }

    async fn account_sums(&self) -> ServicingResult<Vec<AccountSumRow>> {
        let events = self.store.events.lock().unwrap();
        let finalized: Vec<Uuid> = events
            .iter()
            .filter(|event| event.finalized_at.is_some())
            .map(|event| event.event_id)
            .collect();
        drop(events);

        let mut sums: HashMap<GlAccount, (i64, i64)> = HashMap::new();
        for entry in self.store.entries.lock().unwrap().iter() {
            if finalized.contains(&entry.event_id) {
                let slot = sums.entry(entry.account).or_insert((0, 0));
                slot.0 += entry.debit_minor;
                slot.1 += entry.credit_minor;
            }
        }
        Ok(sums
            .into_iter()
            .map(|(account, (debit_minor, credit_minor))| AccountSumRow {
                account,
                debit_minor,
                credit_minor,
            })
            .collect())
    }

    async fn cash_events_in_window(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ServicingResult<Vec<CashEventRow>> {
        let events = self.store.events.lock().unwrap();
        let entries = self.store.entries.lock().unwrap();

        let mut rows = Vec::new();
        for event in events.iter() {
            if event.finalized_at.is_none()
                || event.effective_date < from
                || event.effective_date > to
            {
                continue;
            }
            let mut cash_net = 0;
            let mut memos = Vec::new();
            let mut touches_cash = false;
            for entry in entries.iter().filter(|entry| entry.event_id == event.event_id) {
                if entry.account == GlAccount::Cash {
                    touches_cash = true;
                    cash_net += entry.debit_minor - entry.credit_minor;
                }
                if let Some(memo) = &entry.memo {
                    memos.push(memo.clone());
                }
            }
            if touches_cash {
                rows.push(CashEventRow {
                    event_id: event.event_id,
                    loan_id: event.loan_id,
                    effective_date: event.effective_date,
                    correlation_id: event.correlation_id.clone(),
                    cash_net_minor: cash_net,
                    memo_blob: memos.join(" | "),
                });
            }
        }
        Ok(rows)
    }
}

// ============================================================================
// PAYMENTS + OUTBOX
// ============================================================================

pub struct MemPaymentRepository {
    store: Arc<InMemoryStore>,
}

impl MemPaymentRepository {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PaymentRepository for MemPaymentRepository {
    async fn create_intake(&self, intake: PaymentIntakeModel) -> ServicingResult<()> {
        let mut intakes = self.store.intakes.lock().unwrap();
        if intakes
            .iter()
            .any(|existing| existing.idempotency_key == intake.idempotency_key)
        {
            return Err(constraint("payment_intake_idempotency_key", &intake.idempotency_key));
        }
        intakes.push(intake);
        Ok(())
    }

    async fn find_intake(&self, payment_id: Uuid) -> ServicingResult<Option<PaymentIntakeModel>> {
        Ok(self
            .store
            .intakes
            .lock()
            .unwrap()
            .iter()
            .find(|intake| intake.payment_id == payment_id)
            .cloned())
    }

    async fn find_intake_by_key(
        &self,
        idempotency_key: &str,
    ) -> ServicingResult<Option<PaymentIntakeModel>> {
        Ok(self
            .store
            .intakes
            .lock()
            .unwrap()
            .iter()
            .find(|intake| intake.idempotency_key == idempotency_key)
            .cloned())
    }

    async fn upsert_validation(&self, validation: PaymentValidationModel) -> ServicingResult<()> {
        self.store
            .validations
            .lock()
            .unwrap()
            .insert(validation.payment_id, validation);
        Ok(())
    }

    async fn find_validation(
        &self,
        payment_id: Uuid,
    ) -> ServicingResult<Option<PaymentValidationModel>> {
        Ok(self.store.validations.lock().unwrap().get(&payment_id).cloned())
    }

    async fn create_posting(&self, posting: PaymentPostingModel) -> ServicingResult<()> {
        let mut postings = self.store.postings.lock().unwrap();
        if postings.contains_key(&posting.payment_id) {
            return Err(constraint("payment_posting_pkey", posting.payment_id.to_string()));
        }
        postings.insert(posting.payment_id, posting);
        Ok(())
    }

    async fn find_posting(
        &self,
        payment_id: Uuid,
    ) -> ServicingResult<Option<PaymentPostingModel>> {
        Ok(self.store.postings.lock().unwrap().get(&payment_id).cloned())
    }

    async fn applied_through(
        &self,
        loan_id: Uuid,
        as_of: NaiveDate,
    ) -> ServicingResult<AppliedTotalsRow> {
        let intakes = self.store.intakes.lock().unwrap();
        let postings = self.store.postings.lock().unwrap();

        let mut totals = AppliedTotalsRow::default();
        for posting in postings.values() {
            let Some(intake) = intakes
                .iter()
                .find(|intake| intake.payment_id == posting.payment_id)
            else {
                continue;
            };
            if intake.loan_id != loan_id || intake.effective_date > as_of {
                continue;
            }
            totals.fees_minor += posting.applied_fees_minor;
            totals.interest_minor += posting.applied_interest_minor;
            totals.principal_minor += posting.applied_principal_minor;
            totals.escrow_minor += posting.applied_escrow_minor;
        }
        Ok(totals)
    }
}

pub struct MemOutboxRepository {
    store: Arc<InMemoryStore>,
}

impl MemOutboxRepository {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OutboxRepository for MemOutboxRepository {
    async fn enqueue(&self, message: OutboxMessageModel) -> ServicingResult<()> {
        self.store.outbox.lock().unwrap().push(message);
        Ok(())
    }

    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> ServicingResult<Vec<OutboxMessageModel>> {
        let outbox = self.store.outbox.lock().unwrap();
        let mut due: Vec<OutboxMessageModel> = outbox
            .iter()
            .filter(|row| {
                row.published_at.is_none()
                    && !row.parked
                    && row.next_retry_at.map(|at| at <= now).unwrap_or(true)
            })
            .cloned()
            .collect();
        due.sort_by_key(|row| row.created_at);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn mark_published(&self, outbox_id: Uuid, at: DateTime<Utc>) -> ServicingResult<()> {
        let mut outbox = self.store.outbox.lock().unwrap();
        let row = outbox
            .iter_mut()
            .find(|row| row.outbox_id == outbox_id)
            .ok_or_else(|| ServicingError::NotFound(format!("outbox {outbox_id}")))?;
        row.published_at = Some(at);
        Ok(())
    }

    async fn record_failure(
        &self,
        outbox_id: Uuid,
        attempt_count: i32,
        next_retry_at: Option<DateTime<Utc>>,
        last_error: &str,
        parked: bool,
    ) -> ServicingResult<()> {
        let mut outbox = self.store.outbox.lock().unwrap();
        let row = outbox
            .iter_mut()
            .find(|row| row.outbox_id == outbox_id)
            .ok_or_else(|| ServicingError::NotFound(format!("outbox {outbox_id}")))?;
        row.attempt_count = attempt_count;
        row.next_retry_at = next_retry_at;
        row.last_error = Some(last_error.to_string());
        row.parked = parked;
        Ok(())
    }

    async fn parked(&self) -> ServicingResult<Vec<OutboxMessageModel>> {
        Ok(self
            .store
            .outbox
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.parked)
            .cloned()
            .collect())
    }

    async fn requeue_parked(&self, outbox_id: Uuid) -> ServicingResult<()> {
        let mut outbox = self.store.outbox.lock().unwrap();
        let row = outbox
            .iter_mut()
            .find(|row| row.outbox_id == outbox_id)
            .ok_or_else(|| ServicingError::NotFound(format!("outbox {outbox_id}")))?;
        row.parked = false;
        row.attempt_count = 0;
        row.next_retry_at = None;
        Ok(())
    }
}

// ============================================================================
// SCHEDULES + LOANS + AUDIT
// ============================================================================

pub struct MemScheduleRepository {
    store: Arc<InMemoryStore>,
}

impl MemScheduleRepository {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ScheduleRepository for MemScheduleRepository {
    async fn insert_plan(
        &self,
        plan: PaymentScheduleModel,
        rows: Vec<ScheduleRowModel>,
    ) -> ServicingResult<()> {
        let mut schedules = self.store.schedules.lock().unwrap();
        for existing in schedules.iter_mut() {
            if existing.loan_id == plan.loan_id {
                existing.active = false;
            }
        }
        schedules.push(plan);
        self.store.schedule_rows.lock().unwrap().extend(rows);
        Ok(())
    }

    async fn find_active(&self, loan_id: Uuid) -> ServicingResult<Option<PaymentScheduleModel>> {
        Ok(self
            .store
            .schedules
            .lock()
            .unwrap()
            .iter()
            .find(|plan| plan.loan_id == loan_id && plan.active)
            .cloned())
    }

    async fn rows_for_schedule(&self, schedule_id: Uuid) -> ServicingResult<Vec<ScheduleRowModel>> {
        let mut rows: Vec<ScheduleRowModel> = self
            .store
            .schedule_rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.schedule_id == schedule_id)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.period_no);
        Ok(rows)
    }

    async fn max_version(&self, loan_id: Uuid) -> ServicingResult<i32> {
        Ok(self
            .store
            .schedules
            .lock()
            .unwrap()
            .iter()
            .filter(|plan| plan.loan_id == loan_id)
            .map(|plan| plan.version)
            .max()
            .unwrap_or(0))
    }
}

pub struct MemLoanRepository {
    store: Arc<InMemoryStore>,
}

impl MemLoanRepository {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl LoanRepository for MemLoanRepository {
    async fn create(&self, loan: LoanModel) -> ServicingResult<()> {
        self.store.loans.lock().unwrap().insert(loan.loan_id, loan);
        Ok(())
    }

    async fn find_by_id(&self, loan_id: Uuid) -> ServicingResult<Option<LoanModel>> {
        Ok(self.store.loans.lock().unwrap().get(&loan_id).cloned())
    }

    async fn update_status(&self, loan_id: Uuid, status: LoanStatus) -> ServicingResult<()> {
        let mut loans = self.store.loans.lock().unwrap();
        let loan = loans
            .get_mut(&loan_id)
            .ok_or(ServicingError::LoanNotFound(loan_id))?;
        loan.status = status;
        Ok(())
    }

    async fn update_collection_case_status(
        &self,
        loan_id: Uuid,
        status: CollectionCaseStatus,
    ) -> ServicingResult<()> {
        let mut loans = self.store.loans.lock().unwrap();
        let loan = loans
            .get_mut(&loan_id)
            .ok_or(ServicingError::LoanNotFound(loan_id))?;
        loan.collection_case_status = status;
        Ok(())
    }

    async fn list_serviceable(&self) -> ServicingResult<Vec<LoanModel>> {
        Ok(self
            .store
            .loans
            .lock()
            .unwrap()
            .values()
            .filter(|loan| !loan.status.is_terminal())
            .cloned()
            .collect())
    }
}

pub struct MemAuditRepository {
    store: Arc<InMemoryStore>,
}

impl MemAuditRepository {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuditRepository for MemAuditRepository {
    async fn record(&self, record: AuditRecordModel) -> ServicingResult<()> {
        self.store.audit.lock().unwrap().push(record);
        Ok(())
    }

    async fn for_entity(&self, entity_id: Uuid) -> ServicingResult<Vec<AuditRecordModel>> {
        Ok(self
            .store
            .audit
            .lock()
            .unwrap()
            .iter()
            .filter(|record| record.entity_id == entity_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// ESCROW
// ============================================================================

pub struct MemEscrowRepository {
    store: Arc<InMemoryStore>,
}

impl MemEscrowRepository {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EscrowRepository for MemEscrowRepository {
    async fn active_items(&self, loan_id: Uuid) -> ServicingResult<Vec<EscrowItemModel>> {
        Ok(self
            .store
            .escrow_items
            .lock()
            .unwrap()
            .iter()
            .filter(|item| item.loan_id == loan_id && item.active)
            .cloned()
            .collect())
    }

    async fn upsert_item(&self, item: EscrowItemModel) -> ServicingResult<()> {
        let mut items = self.store.escrow_items.lock().unwrap();
        items.retain(|existing| existing.escrow_id != item.escrow_id);
        items.push(item);
        Ok(())
    }

    async fn replace_forecast(
        &self,
        loan_id: Uuid,
        rows: Vec<EscrowForecastModel>,
    ) -> ServicingResult<()> {
        let mut forecast = self.store.forecast.lock().unwrap();
        forecast.retain(|row| row.loan_id != loan_id);
        forecast.extend(rows);
        Ok(())
    }

    async fn forecast_between(
        &self,
        loan_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ServicingResult<Vec<EscrowForecastModel>> {
        let mut rows: Vec<EscrowForecastModel> = self
            .store
            .forecast
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.loan_id == loan_id && row.due_date >= from && row.due_date <= to)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.due_date);
        Ok(rows)
    }

    async fn create_disbursement(
        &self,
        disbursement: EscrowDisbursementModel,
    ) -> ServicingResult<()> {
        let mut disbursements = self.store.disbursements.lock().unwrap();
        let duplicate = disbursements.iter().any(|existing| {
            existing.loan_id == disbursement.loan_id
                && existing.escrow_id == disbursement.escrow_id
                && existing.due_date == disbursement.due_date
                && existing.status != DisbursementStatus::Canceled
        });
        if duplicate {
            return Err(constraint(
                "escrow_disbursement_unique_non_canceled",
                format!("{} {}", disbursement.escrow_id, disbursement.due_date),
            ));
        }
        disbursements.push(disbursement);
        Ok(())
    }

    async fn find_non_canceled(
        &self,
        loan_id: Uuid,
        escrow_id: Uuid,
        due_date: NaiveDate,
    ) -> ServicingResult<Option<EscrowDisbursementModel>> {
        Ok(self
            .store
            .disbursements
            .lock()
            .unwrap()
            .iter()
            .find(|d| {
                d.loan_id == loan_id
                    && d.escrow_id == escrow_id
                    && d.due_date == due_date
                    && d.status != DisbursementStatus::Canceled
            })
            .cloned())
    }

    async fn find_disbursement(
        &self,
        disbursement_id: Uuid,
    ) -> ServicingResult<Option<EscrowDisbursementModel>> {
        Ok(self
            .store
            .disbursements
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.disbursement_id == disbursement_id)
            .cloned())
    }

    async fn scheduled_due(
        &self,
        loan_id: Uuid,
        as_of: NaiveDate,
    ) -> ServicingResult<Vec<EscrowDisbursementModel>> {
        Ok(self
            .store
            .disbursements
            .lock()
            .unwrap()
            .iter()
            .filter(|d| {
                d.loan_id == loan_id
                    && d.status == DisbursementStatus::Scheduled
                    && d.due_date <= as_of
            })
            .cloned()
            .collect())
    }

    async fn mark_posted(&self, disbursement_id: Uuid, event_id: Uuid) -> ServicingResult<()> {
        let mut disbursements = self.store.disbursements.lock().unwrap();
        let row = disbursements
            .iter_mut()
            .find(|d| d.disbursement_id == disbursement_id)
            .ok_or_else(|| ServicingError::NotFound(format!("disbursement {disbursement_id}")))?;
        if row.status != DisbursementStatus::Scheduled {
            return Err(ServicingError::DisbursementNotScheduled {
                disbursement_id,
                status: row.status.as_str().to_string(),
            });
        }
        row.status = DisbursementStatus::Posted;
        row.event_id = Some(event_id);
        Ok(())
    }

    async fn mark_canceled(&self, disbursement_id: Uuid) -> ServicingResult<()> {
        let mut disbursements = self.store.disbursements.lock().unwrap();
        let row = disbursements
            .iter_mut()
            .find(|d| d.disbursement_id == disbursement_id)
            .ok_or_else(|| ServicingError::NotFound(format!("disbursement {disbursement_id}")))?;
        if row.status != DisbursementStatus::Scheduled {
            return Err(ServicingError::DisbursementNotScheduled {
                disbursement_id,
                status: row.status.as_str().to_string(),
            });
        }
        row.status = DisbursementStatus::Canceled;
        Ok(())
    }

    async fn insert_analysis(&self, analysis: EscrowAnalysisModel) -> ServicingResult<()> {
        self.store.analyses.lock().unwrap().push(analysis);
        Ok(())
    }

    async fn latest_analysis(
        &self,
        loan_id: Uuid,
    ) -> ServicingResult<Option<EscrowAnalysisModel>> {
        Ok(self
            .store
            .analyses
            .lock()
            .unwrap()
            .iter()
            .filter(|analysis| analysis.loan_id == loan_id)
            .max_by_key(|analysis| analysis.version)
            .cloned())
    }

    async fn max_analysis_version(&self, loan_id: Uuid) -> ServicingResult<i32> {
        Ok(self
            .store
            .analyses
            .lock()
            .unwrap()
            .iter()
            .filter(|analysis| analysis.loan_id == loan_id)
            .map(|analysis| analysis.version)
            .max()
            .unwrap_or(0))
    }
}

// ============================================================================
// COLLECTIONS
// ============================================================================

pub struct MemCollectionsRepository {
    store: Arc<InMemoryStore>,
}

impl MemCollectionsRepository {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CollectionsRepository for MemCollectionsRepository {
    async fn upsert_snapshot(&self, snapshot: DelinquencySnapshotModel) -> ServicingResult<()> {
        let mut snapshots = self.store.snapshots.lock().unwrap();
        snapshots.retain(|existing| {
            !(existing.loan_id == snapshot.loan_id && existing.as_of_date == snapshot.as_of_date)
        });
        snapshots.push(snapshot);
        Ok(())
    }

    async fn find_snapshot(
        &self,
        loan_id: Uuid,
        as_of_date: NaiveDate,
    ) -> ServicingResult<Option<DelinquencySnapshotModel>> {
        Ok(self
            .store
            .snapshots
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.loan_id == loan_id && s.as_of_date == as_of_date)
            .cloned())
    }

    async fn latest_snapshot_before(
        &self,
        loan_id: Uuid,
        as_of_date: NaiveDate,
    ) -> ServicingResult<Option<DelinquencySnapshotModel>> {
        Ok(self
            .store
            .snapshots
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.loan_id == loan_id && s.as_of_date < as_of_date)
            .max_by_key(|s| s.as_of_date)
            .cloned())
    }

    async fn latest_snapshot(
        &self,
        loan_id: Uuid,
    ) -> ServicingResult<Option<DelinquencySnapshotModel>> {
        Ok(self
            .store
            .snapshots
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.loan_id == loan_id)
            .max_by_key(|s| s.as_of_date)
            .cloned())
    }

    async fn create_late_fee(&self, fee: LateFeeAssessmentModel) -> ServicingResult<()> {
        let mut fees = self.store.late_fees.lock().unwrap();
        if fees
            .iter()
            .any(|existing| existing.loan_id == fee.loan_id && existing.period_due_date == fee.period_due_date)
        {
            return Err(ServicingError::LateFeeAlreadyAssessed {
                loan_id: fee.loan_id,
                period_due_date: fee.period_due_date,
            });
        }
        fees.push(fee);
        Ok(())
    }

    async fn find_late_fee(
        &self,
        loan_id: Uuid,
        period_due_date: NaiveDate,
    ) -> ServicingResult<Option<LateFeeAssessmentModel>> {
        Ok(self
            .store
            .late_fees
            .lock()
            .unwrap()
            .iter()
            .find(|fee| fee.loan_id == loan_id && fee.period_due_date == period_due_date)
            .cloned())
    }

    async fn fees_assessed_through(
        &self,
        loan_id: Uuid,
        as_of: NaiveDate,
    ) -> ServicingResult<i64> {
        Ok(self
            .store
            .late_fees
            .lock()
            .unwrap()
            .iter()
            .filter(|fee| fee.loan_id == loan_id && fee.period_due_date <= as_of)
            .map(|fee| fee.amount_minor)
            .sum())
    }

    async fn create_plan(
        &self,
        plan: PaymentPlanModel,
        installments: Vec<PlanInstallmentModel>,
    ) -> ServicingResult<()> {
        self.store.plans.lock().unwrap().insert(plan.plan_id, plan);
        self.store.installments.lock().unwrap().extend(installments);
        Ok(())
    }

    async fn find_plan(&self, plan_id: Uuid) -> ServicingResult<Option<PaymentPlanModel>> {
        Ok(self.store.plans.lock().unwrap().get(&plan_id).cloned())
    }

    async fn plan_installments(
        &self,
        plan_id: Uuid,
    ) -> ServicingResult<Vec<PlanInstallmentModel>> {
        let mut rows: Vec<PlanInstallmentModel> = self
            .store
            .installments
            .lock()
            .unwrap()
            .iter()
            .filter(|installment| installment.plan_id == plan_id)
            .cloned()
            .collect();
        rows.sort_by_key(|installment| installment.installment_no);
        Ok(rows)
    }

    async fn active_plan_for_loan(
        &self,
        loan_id: Uuid,
    ) -> ServicingResult<Option<PaymentPlanModel>> {
        Ok(self
            .store
            .plans
            .lock()
            .unwrap()
            .values()
            .find(|plan| plan.loan_id == loan_id && plan.status == PlanStatus::Active)
            .cloned())
    }

    async fn update_plan_status(&self, plan_id: Uuid, status: PlanStatus) -> ServicingResult<()> {
        let mut plans = self.store.plans.lock().unwrap();
        let plan = plans
            .get_mut(&plan_id)
            .ok_or(ServicingError::PlanNotFound(plan_id))?;
        plan.status = status;
        match status {
            PlanStatus::Active => plan.activated_at = Some(Utc::now()),
            PlanStatus::Completed | PlanStatus::Defaulted | PlanStatus::Canceled => {
                plan.closed_at = Some(Utc::now())
            }
            PlanStatus::Draft => {}
        }
        Ok(())
    }

    async fn update_installment(&self, installment: PlanInstallmentModel) -> ServicingResult<()> {
        let mut installments = self.store.installments.lock().unwrap();
        let row = installments
            .iter_mut()
            .find(|existing| {
                existing.plan_id == installment.plan_id
                    && existing.installment_no == installment.installment_no
            })
            .ok_or_else(|| {
                ServicingError::NotFound(format!(
                    "installment {} of plan {}",
                    installment.installment_no, installment.plan_id
                ))
            })?;
        *row = installment;
        Ok(())
    }

    async fn plans_by_status(&self, status: PlanStatus) -> ServicingResult<Vec<PaymentPlanModel>> {
        Ok(self
            .store
            .plans
            .lock()
            .unwrap()
            .values()
            .filter(|plan| plan.status == status)
            .cloned()
            .collect())
    }

    async fn create_case(&self, case: ForeclosureCaseModel) -> ServicingResult<()> {
        self.store.cases.lock().unwrap().push(case);
        Ok(())
    }

    async fn find_case(&self, case_id: Uuid) -> ServicingResult<Option<ForeclosureCaseModel>> {
        Ok(self
            .store
            .cases
            .lock()
            .unwrap()
            .iter()
            .find(|case| case.case_id == case_id)
            .cloned())
    }

    async fn open_case_for_loan(
        &self,
        loan_id: Uuid,
    ) -> ServicingResult<Option<ForeclosureCaseModel>> {
        Ok(self
            .store
            .cases
            .lock()
            .unwrap()
            .iter()
            .find(|case| case.loan_id == loan_id && case.status == ForeclosureCaseStatus::Open)
            .cloned())
    }

    async fn insert_milestone(&self, event: ForeclosureEventModel) -> ServicingResult<()> {
        let mut milestones = self.store.milestones.lock().unwrap();
        if milestones
            .iter()
            .any(|existing| existing.case_id == event.case_id && existing.milestone == event.milestone)
        {
            return Err(ServicingError::DuplicateMilestone {
                case_id: event.case_id,
                milestone: event.milestone.as_str().to_string(),
            });
        }
        milestones.push(event);
        Ok(())
    }

    async fn milestones_for_case(
        &self,
        case_id: Uuid,
    ) -> ServicingResult<Vec<ForeclosureEventModel>> {
        Ok(self
            .store
            .milestones
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.case_id == case_id)
            .cloned()
            .collect())
    }

    async fn has_milestone(
        &self,
        case_id: Uuid,
        milestone: ForeclosureMilestone,
    ) -> ServicingResult<bool> {
        Ok(self
            .store
            .milestones
            .lock()
            .unwrap()
            .iter()
            .any(|event| event.case_id == case_id && event.milestone == milestone))
    }

    async fn close_case(&self, case_id: Uuid) -> ServicingResult<()> {
        let mut cases = self.store.cases.lock().unwrap();
        let case = cases
            .iter_mut()
            .find(|case| case.case_id == case_id)
            .ok_or(ServicingError::ForeclosureCaseNotFound(case_id))?;
        case.status = ForeclosureCaseStatus::Closed;
        case.closed_at = Some(Utc::now());
        Ok(())
    }
}

// ============================================================================
// CASH / RECON
// ============================================================================

pub struct MemCashRepository {
    store: Arc<InMemoryStore>,
}

impl MemCashRepository {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CashRepository for MemCashRepository {
    async fn find_bank_account(
        &self,
        bank_account_id: Uuid,
    ) -> ServicingResult<Option<BankAccountModel>> {
        Ok(self
            .store
            .bank_accounts
            .lock()
            .unwrap()
            .get(&bank_account_id)
            .cloned())
    }

    async fn upsert_bank_account(&self, account: BankAccountModel) -> ServicingResult<()> {
        self.store
            .bank_accounts
            .lock()
            .unwrap()
            .insert(account.bank_account_id, account);
        Ok(())
    }

    async fn find_file_by_hash(
        &self,
        bank_account_id: Uuid,
        as_of_date: NaiveDate,
        content_hash: &str,
    ) -> ServicingResult<Option<BankStatementFileModel>> {
        Ok(self
            .store
            .statement_files
            .lock()
            .unwrap()
            .iter()
            .find(|file| {
                file.bank_account_id == bank_account_id
                    && file.as_of_date == as_of_date
                    && file.content_hash == content_hash
            })
            .cloned())
    }

    async fn create_file(&self, file: BankStatementFileModel) -> ServicingResult<()> {
        self.store.statement_files.lock().unwrap().push(file);
        Ok(())
    }

    async fn insert_txns(&self, txns: Vec<BankTxnModel>) -> ServicingResult<()> {
        self.store.bank_txns.lock().unwrap().extend(txns);
        Ok(())
    }

    async fn txns_for_file(&self, file_id: Uuid) -> ServicingResult<Vec<BankTxnModel>> {
        Ok(self
            .store
            .bank_txns
            .lock()
            .unwrap()
            .iter()
            .filter(|txn| txn.file_id == file_id)
            .cloned()
            .collect())
    }

    async fn find_txn(&self, bank_txn_id: Uuid) -> ServicingResult<Option<BankTxnModel>> {
        Ok(self
            .store
            .bank_txns
            .lock()
            .unwrap()
            .iter()
            .find(|txn| txn.bank_txn_id == bank_txn_id)
            .cloned())
    }

    async fn mark_matched(&self, bank_txn_id: Uuid, event_id: Uuid) -> ServicingResult<()> {
        let mut txns = self.store.bank_txns.lock().unwrap();
        let txn = txns
            .iter_mut()
            .find(|txn| txn.bank_txn_id == bank_txn_id)
            .ok_or(ServicingError::BankTxnNotFound(bank_txn_id))?;
        txn.matched = true;
        txn.matched_event_id = Some(event_id);
        Ok(())
    }

    async fn replace_candidates(
        &self,
        bank_txn_id: Uuid,
        candidates: Vec<MatchCandidateModel>,
    ) -> ServicingResult<()> {
        let mut all = self.store.candidates.lock().unwrap();
        all.retain(|candidate| candidate.bank_txn_id != bank_txn_id);
        all.extend(candidates);
        Ok(())
    }

    async fn candidates_for(
        &self,
        bank_txn_id: Uuid,
    ) -> ServicingResult<Vec<MatchCandidateModel>> {
        let mut rows: Vec<MatchCandidateModel> = self
            .store
            .candidates
            .lock()
            .unwrap()
            .iter()
            .filter(|candidate| candidate.bank_txn_id == bank_txn_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.score.cmp(&a.score));
        Ok(rows)
    }

    async fn upsert_exception(&self, exception: ReconExceptionModel) -> ServicingResult<()> {
        let mut exceptions = self.store.exceptions.lock().unwrap();
        match exceptions.get_mut(&exception.bank_txn_id) {
            Some(existing) => {
                existing.variance_minor = exception.variance_minor;
                existing.status = exception.status;
                existing.note = exception.note;
                existing.updated_at = Utc::now();
            }
            None => {
                exceptions.insert(exception.bank_txn_id, exception);
            }
        }
        Ok(())
    }

    async fn find_exception(
        &self,
        bank_txn_id: Uuid,
    ) -> ServicingResult<Option<ReconExceptionModel>> {
        Ok(self
            .store
            .exceptions
            .lock()
            .unwrap()
            .get(&bank_txn_id)
            .cloned())
    }

    async fn update_exception_status(
        &self,
        bank_txn_id: Uuid,
        status: ReconExceptionStatus,
        note: Option<String>,
    ) -> ServicingResult<()> {
        let mut exceptions = self.store.exceptions.lock().unwrap();
        let exception = exceptions
            .get_mut(&bank_txn_id)
            .ok_or(ServicingError::ExceptionNotFound(bank_txn_id))?;
        exception.status = status;
        if note.is_some() {
            exception.note = note;
        }
        exception.updated_at = Utc::now();
        Ok(())
    }

    async fn exceptions_by_status(
        &self,
        status: ReconExceptionStatus,
    ) -> ServicingResult<Vec<ReconExceptionModel>> {
        Ok(self
            .store
            .exceptions
            .lock()
            .unwrap()
            .values()
            .filter(|exception| exception.status == status)
            .cloned()
            .collect())
    }
}

// ============================================================================
// ACH
// ============================================================================

pub struct MemAchRepository {
    store: Arc<InMemoryStore>,
}

impl MemAchRepository {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AchRepository for MemAchRepository {
    async fn create_batch(&self, batch: AchBatchModel) -> ServicingResult<()> {
        self.store
            .ach_batches
            .lock()
            .unwrap()
            .insert(batch.batch_id, batch);
        Ok(())
    }

    async fn find_batch(&self, batch_id: Uuid) -> ServicingResult<Option<AchBatchModel>> {
        Ok(self.store.ach_batches.lock().unwrap().get(&batch_id).cloned())
    }

    async fn update_batch_status(
        &self,
        batch_id: Uuid,
        status: AchBatchStatus,
    ) -> ServicingResult<()> {
        let mut batches = self.store.ach_batches.lock().unwrap();
        let batch = batches
            .get_mut(&batch_id)
            .ok_or(ServicingError::AchBatchNotFound(batch_id))?;
        batch.status = status;
        Ok(())
    }

    async fn seal_batch(
        &self,
        batch: AchBatchModel,
        entries: Vec<AchEntryModel>,
    ) -> ServicingResult<()> {
        self.store
            .ach_batches
            .lock()
            .unwrap()
            .insert(batch.batch_id, batch.clone());
        let mut all = self.store.ach_entries.lock().unwrap();
        all.retain(|entry| entry.batch_id != batch.batch_id);
        all.extend(entries);
        Ok(())
    }

    async fn add_entry(&self, entry: AchEntryModel) -> ServicingResult<()> {
        self.store.ach_entries.lock().unwrap().push(entry);
        Ok(())
    }

    async fn entries_for_batch(&self, batch_id: Uuid) -> ServicingResult<Vec<AchEntryModel>> {
        Ok(self
            .store
            .ach_entries
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.batch_id == batch_id)
            .cloned()
            .collect())
    }

    async fn find_entry_by_trace(
        &self,
        trace_number: &str,
    ) -> ServicingResult<Option<AchEntryModel>> {
        Ok(self
            .store
            .ach_entries
            .lock()
            .unwrap()
            .iter()
            .find(|entry| entry.trace_number.as_deref() == Some(trace_number))
            .cloned())
    }

    async fn insert_return(&self, ach_return: AchReturnModel) -> ServicingResult<()> {
        let mut returns = self.store.ach_returns.lock().unwrap();
        if returns
            .iter()
            .any(|existing| existing.entry_id == ach_return.entry_id)
        {
            return Err(ServicingError::DuplicateAchReturn(ach_return.entry_id));
        }
        returns.push(ach_return);
        Ok(())
    }

    async fn find_return_for_entry(
        &self,
        entry_id: Uuid,
    ) -> ServicingResult<Option<AchReturnModel>> {
        Ok(self
            .store
            .ach_returns
            .lock()
            .unwrap()
            .iter()
            .find(|existing| existing.entry_id == entry_id)
            .cloned())
    }
}

// ============================================================================
// PRODUCTS
// ============================================================================

pub struct MemProductRepository {
    store: Arc<InMemoryStore>,
}

impl MemProductRepository {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ProductRepository for MemProductRepository {
    async fn find_product_policy(
        &self,
        product_code: &str,
    ) -> ServicingResult<Option<ProductPolicy>> {
        Ok(self
            .store
            .product_policies
            .lock()
            .unwrap()
            .get(product_code)
            .cloned())
    }

    async fn find_fee_policy(&self, product_code: &str) -> ServicingResult<Option<FeePolicy>> {
        Ok(self
            .store
            .fee_policies
            .lock()
            .unwrap()
            .get(product_code)
            .cloned())
    }

    async fn find_escrow_policy(
        &self,
        product_code: &str,
        jurisdiction: &str,
    ) -> ServicingResult<Option<EscrowPolicy>> {
        Ok(self
            .store
            .escrow_policies
            .lock()
            .unwrap()
            .get(&(product_code.to_string(), jurisdiction.to_string()))
            .cloned())
    }

    async fn upsert_product_policy(&self, policy: ProductPolicy) -> ServicingResult<()> {
        self.store
            .product_policies
            .lock()
            .unwrap()
            .insert(policy.product_code.clone(), policy);
        Ok(())
    }

    async fn upsert_fee_policy(
        &self,
        product_code: &str,
        policy: FeePolicy,
    ) -> ServicingResult<()> {
        self.store
            .fee_policies
            .lock()
            .unwrap()
            .insert(product_code.to_string(), policy);
        Ok(())
    }

    async fn upsert_escrow_policy(
        &self,
        product_code: &str,
        jurisdiction: &str,
        policy: EscrowPolicy,
    ) -> ServicingResult<()> {
        self.store
            .escrow_policies
            .lock()
            .unwrap()
            .insert((product_code.to_string(), jurisdiction.to_string()), policy);
        Ok(())
    }
}

// ============================================================================
// UNIT OF WORK
// ============================================================================

/// Test unit of work: every repository shares the same store, so
/// "sessions" see all writes immediately. Commit and rollback are
/// accounting no-ops; constraint behavior still matches the schema.
pub struct MemUnitOfWork {
    store: Arc<InMemoryStore>,
}

impl MemUnitOfWork {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl UnitOfWork for MemUnitOfWork {
    async fn begin(&self) -> ServicingResult<Box<dyn UnitOfWorkSession>> {
        Ok(Box::new(MemSession {
            store: self.store.clone(),
        }))
    }
}

pub struct MemSession {
    store: Arc<InMemoryStore>,
}

#[async_trait]
impl UnitOfWorkSession for MemSession {
    fn ledger(&self) -> Arc<dyn LedgerRepository> {
        Arc::new(MemLedgerRepository::new(self.store.clone()))
    }
    fn payments(&self) -> Arc<dyn PaymentRepository> {
        Arc::new(MemPaymentRepository::new(self.store.clone()))
    }
    fn outbox(&self) -> Arc<dyn OutboxRepository> {
        Arc::new(MemOutboxRepository::new(self.store.clone()))
    }
    fn schedules(&self) -> Arc<dyn ScheduleRepository> {
        Arc::new(MemScheduleRepository::new(self.store.clone()))
    }
    fn loans(&self) -> Arc<dyn LoanRepository> {
        Arc::new(MemLoanRepository::new(self.store.clone()))
    }
    fn escrow(&self) -> Arc<dyn EscrowRepository> {
        Arc::new(MemEscrowRepository::new(self.store.clone()))
    }
    fn collections(&self) -> Arc<dyn CollectionsRepository> {
        Arc::new(MemCollectionsRepository::new(self.store.clone()))
    }
    fn cash(&self) -> Arc<dyn CashRepository> {
        Arc::new(MemCashRepository::new(self.store.clone()))
    }
    fn ach(&self) -> Arc<dyn AchRepository> {
        Arc::new(MemAchRepository::new(self.store.clone()))
    }
    fn audit(&self) -> Arc<dyn AuditRepository> {
        Arc::new(MemAuditRepository::new(self.store.clone()))
    }

    async fn commit(self: Box<Self>) -> ServicingResult<()> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> ServicingResult<()> {
        Ok(())
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// Everything a test needs, wired over one shared store.
pub struct TestHarness {
    pub store: Arc<InMemoryStore>,
    pub unit_of_work: Arc<dyn UnitOfWork>,
    pub ledger_repository: Arc<dyn LedgerRepository>,
    pub payment_repository: Arc<dyn PaymentRepository>,
    pub outbox_repository: Arc<dyn OutboxRepository>,
    pub schedule_repository: Arc<dyn ScheduleRepository>,
    pub loan_repository: Arc<dyn LoanRepository>,
    pub escrow_repository: Arc<dyn EscrowRepository>,
    pub collections_repository: Arc<dyn CollectionsRepository>,
    pub cash_repository: Arc<dyn CashRepository>,
    pub ach_repository: Arc<dyn AchRepository>,
    pub product_repository: Arc<dyn ProductRepository>,
}

impl TestHarness {
    pub fn new() -> Self {
        let store = InMemoryStore::new();
        Self {
            unit_of_work: Arc::new(MemUnitOfWork::new(store.clone())),
            ledger_repository: Arc::new(MemLedgerRepository::new(store.clone())),
            payment_repository: Arc::new(MemPaymentRepository::new(store.clone())),
            outbox_repository: Arc::new(MemOutboxRepository::new(store.clone())),
            schedule_repository: Arc::new(MemScheduleRepository::new(store.clone())),
            loan_repository: Arc::new(MemLoanRepository::new(store.clone())),
            escrow_repository: Arc::new(MemEscrowRepository::new(store.clone())),
            collections_repository: Arc::new(MemCollectionsRepository::new(store.clone())),
            cash_repository: Arc::new(MemCashRepository::new(store.clone())),
            ach_repository: Arc::new(MemAchRepository::new(store.clone())),
            product_repository: Arc::new(MemProductRepository::new(store.clone())),
            store,
        }
    }

    /// Seed a serviceable loan with default product, fee, and escrow
    /// policies.
    pub async fn seed_loan(
        &self,
        principal_minor: i64,
        annual_rate_bps: i32,
        origination_date: NaiveDate,
    ) -> LoanModel {
        let loan = LoanModel {
            loan_id: Uuid::new_v4(),
            product_code: "STD-30Y".to_string(),
            status: LoanStatus::Active,
            collection_case_status: CollectionCaseStatus::Normal,
            origination_date,
            original_principal_minor: principal_minor,
            annual_rate_bps,
            term_months: 360,
            jurisdiction: "US-CA".to_string(),
            late_fee_grace_days: 15,
            created_at: Utc::now(),
        };
        self.loan_repository.create(loan.clone()).await.unwrap();
        self.product_repository
            .upsert_product_policy(ProductPolicy::default())
            .await
            .unwrap();
        self.product_repository
            .upsert_fee_policy("STD-30Y", FeePolicy::default())
            .await
            .unwrap();
        self.product_repository
            .upsert_escrow_policy("STD-30Y", "US-CA", EscrowPolicy::default())
            .await
            .unwrap();
        loan
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
