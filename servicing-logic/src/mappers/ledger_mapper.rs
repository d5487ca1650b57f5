use chrono::Utc;
use heapless::String as HeaplessString;
use servicing_api::domain::{
    EntryLine, EventSchema, GlAccount, LedgerEntry, LedgerEvent, LoanBalances, TrialBalance,
    TrialBalanceRow,
};
use servicing_api::ServicingResult;
use servicing_db::models::{AccountSumRow, LedgerEntryModel, LedgerEventModel};
use uuid::Uuid;

use super::{currency_from_str, currency_to_string};

pub struct LedgerMapper;

impl LedgerMapper {
    pub fn entry_to_model(
        event_id: Uuid,
        currency: [u8; 3],
        line: &EntryLine,
    ) -> LedgerEntryModel {
        LedgerEntryModel {
            entry_id: Uuid::new_v4(),
            event_id,
            account: line.account,
            debit_minor: line.debit_minor,
            credit_minor: line.credit_minor,
            currency: currency_to_string(currency),
            memo: line.memo.as_ref().map(|m| m.to_string()),
        }
    }

    pub fn event_model(
        loan_id: Uuid,
        effective_date: chrono::NaiveDate,
        correlation_id: &str,
        schema: EventSchema,
        currency: [u8; 3],
    ) -> LedgerEventModel {
        LedgerEventModel {
            event_id: Uuid::new_v4(),
            loan_id,
            effective_date,
            schema,
            correlation_id: correlation_id.to_string(),
            currency: currency_to_string(currency),
            finalized_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn event_from_model(
        model: LedgerEventModel,
        entries: Vec<LedgerEntryModel>,
    ) -> ServicingResult<LedgerEvent> {
        let currency = currency_from_str(&model.currency)?;
        Ok(LedgerEvent {
            event_id: model.event_id,
            loan_id: model.loan_id,
            effective_date: model.effective_date,
            schema: model.schema,
            correlation_id: model.correlation_id,
            currency,
            entries: entries
                .into_iter()
                .map(Self::entry_from_model)
                .collect::<ServicingResult<Vec<_>>>()?,
            finalized_at: model.finalized_at,
            created_at: model.created_at,
        })
    }

    pub fn entry_from_model(model: LedgerEntryModel) -> ServicingResult<LedgerEntry> {
        let currency = currency_from_str(&model.currency)?;
        Ok(LedgerEntry {
            entry_id: model.entry_id,
            event_id: model.event_id,
            account: model.account,
            debit_minor: model.debit_minor,
            credit_minor: model.credit_minor,
            currency,
            memo: model.memo.and_then(|m| HeaplessString::try_from(m.as_str()).ok()),
        })
    }

    /// Collapse per-account sums into the loan balance view. Sums are
    /// debit − credit, so liabilities come out negative when funded.
    pub fn balances_from_sums(sums: &[AccountSumRow]) -> LoanBalances {
        let mut balances = LoanBalances::default();
        for row in sums {
            let net = row.debit_minor - row.credit_minor;
            match row.account {
                GlAccount::LoanPrincipal => balances.principal_minor = net,
                GlAccount::InterestReceivable => balances.interest_receivable_minor = net,
                GlAccount::EscrowLiability => balances.escrow_liability_minor = net,
                GlAccount::FeesReceivable => balances.fees_receivable_minor = net,
                GlAccount::Cash => balances.cash_minor = net,
                GlAccount::Suspense => balances.suspense_minor = net,
                _ => {}
            }
        }
        balances
    }

    pub fn trial_balance_from_sums(sums: Vec<AccountSumRow>) -> TrialBalance {
        TrialBalance {
            as_of: Utc::now(),
            rows: sums
                .into_iter()
                .map(|row| TrialBalanceRow {
                    account: row.account,
                    debit_minor: row.debit_minor,
                    credit_minor: row.credit_minor,
                })
                .collect(),
        }
    }
}
