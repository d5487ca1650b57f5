use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use servicing_api::domain::{
    EntryLine, EventSchema, GlAccount, LedgerEvent, LoanBalances, TrialBalance,
};
use servicing_api::service::LedgerService;
use servicing_api::{ServicingError, ServicingResult};
use servicing_db::repository::LedgerRepository;

use crate::mappers::LedgerMapper;

const USD: [u8; 3] = *b"USD";

/// Ledger core over any `LedgerRepository`. All invariant checks run
/// here before the repository re-checks balance inside its transaction.
pub struct LedgerServiceImpl {
    ledger_repository: Arc<dyn LedgerRepository>,
}

impl LedgerServiceImpl {
    pub fn new(ledger_repository: Arc<dyn LedgerRepository>) -> Self {
        Self { ledger_repository }
    }

    fn validate_lines(lines: &[EntryLine]) -> ServicingResult<()> {
        for line in lines {
            if !line.is_well_formed() {
                return Err(ServicingError::InvalidLine {
                    account: line.account.to_string(),
                    debit_minor: line.debit_minor,
                    credit_minor: line.credit_minor,
                });
            }
        }
        let debits: i64 = lines.iter().map(|line| line.debit_minor).sum();
        let credits: i64 = lines.iter().map(|line| line.credit_minor).sum();
        if debits != credits || debits == 0 {
            return Err(ServicingError::Unbalanced {
                debit_minor: debits,
                credit_minor: credits,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerService for LedgerServiceImpl {
    async fn post_event(
        &self,
        loan_id: Uuid,
        effective_date: NaiveDate,
        correlation_id: &str,
        schema: EventSchema,
        currency: [u8; 3],
        lines: Vec<EntryLine>,
    ) -> ServicingResult<Uuid> {
        Self::validate_lines(&lines)?;

        if self
            .ledger_repository
            .find_by_correlation(correlation_id)
            .await?
            .is_some()
        {
            return Err(ServicingError::DuplicateCorrelation(
                correlation_id.to_string(),
            ));
        }

        let event = LedgerMapper::event_model(loan_id, effective_date, correlation_id, schema, currency);
        let event_id = event.event_id;
        let entries = lines
            .iter()
            .map(|line| LedgerMapper::entry_to_model(event_id, currency, line))
            .collect();

        let posted = self.ledger_repository.create_event(event, entries).await?;
        tracing::debug!(
            %loan_id,
            correlation_id,
            schema = %schema,
            "posted ledger event {posted}"
        );
        Ok(posted)
    }

    async fn latest_balances(&self, loan_id: Uuid) -> ServicingResult<LoanBalances> {
        let sums = self.ledger_repository.account_sums_for_loan(loan_id).await?;
        Ok(LedgerMapper::balances_from_sums(&sums))
    }

    async fn trial_balance(&self) -> ServicingResult<TrialBalance> {
        let sums = self.ledger_repository.account_sums().await?;
        Ok(LedgerMapper::trial_balance_from_sums(sums))
    }

    async fn find_event(&self, event_id: Uuid) -> ServicingResult<Option<LedgerEvent>> {
        let Some(model) = self.ledger_repository.find_by_id(event_id).await? else {
            return Ok(None);
        };
        let entries = self.ledger_repository.entries_for_event(event_id).await?;
        LedgerMapper::event_from_model(model, entries).map(Some)
    }

    async fn find_event_by_correlation(
        &self,
        correlation_id: &str,
    ) -> ServicingResult<Option<LedgerEvent>> {
        let Some(model) = self
            .ledger_repository
            .find_by_correlation(correlation_id)
            .await?
        else {
            return Ok(None);
        };
        let entries = self
            .ledger_repository
            .entries_for_event(model.event_id)
            .await?;
        LedgerMapper::event_from_model(model, entries).map(Some)
    }

    async fn post_payment_received(
        &self,
        loan_id: Uuid,
        effective_date: NaiveDate,
        correlation_id: &str,
        amount_minor: i64,
    ) -> ServicingResult<Uuid> {
        self.post_event(
            loan_id,
            effective_date,
            correlation_id,
            EventSchema::PaymentV1,
            USD,
            vec![
                EntryLine::debit(GlAccount::Cash, amount_minor, "Payment received"),
                EntryLine::credit(GlAccount::Suspense, amount_minor, "Payment pending allocation"),
            ],
        )
        .await
    }

    async fn post_interest_accrual(
        &self,
        loan_id: Uuid,
        effective_date: NaiveDate,
        correlation_id: &str,
        amount_minor: i64,
    ) -> ServicingResult<Uuid> {
        self.post_event(
            loan_id,
            effective_date,
            correlation_id,
            EventSchema::AccrualV1,
            USD,
            vec![
                EntryLine::debit(GlAccount::InterestReceivable, amount_minor, "Interest accrual"),
                EntryLine::credit(GlAccount::InterestIncome, amount_minor, "Interest accrual"),
            ],
        )
        .await
    }

    async fn post_escrow_payment(
        &self,
        loan_id: Uuid,
        effective_date: NaiveDate,
        correlation_id: &str,
        amount_minor: i64,
        payee_memo: &str,
    ) -> ServicingResult<Uuid> {
        self.post_event(
            loan_id,
            effective_date,
            correlation_id,
            EventSchema::EscrowV1,
            USD,
            vec![
                EntryLine::debit(GlAccount::EscrowLiability, amount_minor, payee_memo),
                EntryLine::credit(GlAccount::Cash, amount_minor, payee_memo),
            ],
        )
        .await
    }

    async fn post_loan_origination(
        &self,
        loan_id: Uuid,
        effective_date: NaiveDate,
        correlation_id: &str,
        principal_minor: i64,
    ) -> ServicingResult<Uuid> {
        self.post_event(
            loan_id,
            effective_date,
            correlation_id,
            EventSchema::OriginationV1,
            USD,
            vec![
                EntryLine::debit(GlAccount::LoanPrincipal, principal_minor, "Loan origination"),
                EntryLine::credit(GlAccount::Suspense, principal_minor, "Origination funding"),
            ],
        )
        .await
    }

    async fn post_charge_off(
        &self,
        loan_id: Uuid,
        effective_date: NaiveDate,
        correlation_id: &str,
        amount_minor: i64,
    ) -> ServicingResult<Uuid> {
        self.post_event(
            loan_id,
            effective_date,
            correlation_id,
            EventSchema::ChargeOffV1,
            USD,
            vec![
                EntryLine::debit(GlAccount::WriteoffExpense, amount_minor, "Charge-off"),
                EntryLine::credit(GlAccount::LoanPrincipal, amount_minor, "Charge-off"),
            ],
        )
        .await
    }

    async fn reverse_event(
        &self,
        event_id: Uuid,
        correlation_id: &str,
        effective_date: NaiveDate,
    ) -> ServicingResult<Uuid> {
        let original = self
            .find_event(event_id)
            .await?
            .ok_or(ServicingError::EventNotFound(event_id))?;
        if original.finalized_at.is_none() {
            return Err(ServicingError::EventNotFinalized(event_id));
        }

        let lines = original
            .entries
            .iter()
            .map(|entry| EntryLine {
                account: entry.account,
                debit_minor: entry.credit_minor,
                credit_minor: entry.debit_minor,
                memo: entry.memo.clone(),
            })
            .collect();

        self.post_event(
            original.loan_id,
            effective_date,
            correlation_id,
            EventSchema::ReversalV1,
            original.currency,
            lines,
        )
        .await
    }
}
