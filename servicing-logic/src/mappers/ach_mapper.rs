use heapless::String as HeaplessString;
use servicing_api::domain::{AchBatch, AchEntry, AchReturn};
use servicing_db::models::{AchBatchModel, AchEntryModel, AchReturnModel};

pub struct AchMapper;

impl AchMapper {
    pub fn batch_from_model(model: AchBatchModel) -> AchBatch {
        AchBatch {
            batch_id: model.batch_id,
            status: model.status,
            company_entry_description: HeaplessString::try_from(
                model.company_entry_description.as_str(),
            )
            .unwrap_or_default(),
            effective_entry_date: model.effective_entry_date,
            entry_count: model.entry_count,
            debit_total_minor: model.debit_total_minor,
            credit_total_minor: model.credit_total_minor,
            entry_hash: model.entry_hash,
            sealed_at: model.sealed_at,
            created_at: model.created_at,
        }
    }

    pub fn entry_from_model(model: AchEntryModel) -> AchEntry {
        AchEntry {
            entry_id: model.entry_id,
            batch_id: model.batch_id,
            loan_id: model.loan_id,
            txn_code: model.txn_code,
            rdfi_routing: HeaplessString::try_from(model.rdfi_routing.as_str())
                .unwrap_or_default(),
            account_number_masked: HeaplessString::try_from(
                model.account_number_masked.as_str(),
            )
            .unwrap_or_default(),
            amount_minor: model.amount_minor,
            individual_name: HeaplessString::try_from(model.individual_name.as_str())
                .unwrap_or_default(),
            trace_number: model
                .trace_number
                .and_then(|t| HeaplessString::try_from(t.as_str()).ok()),
        }
    }

    pub fn return_from_model(model: AchReturnModel) -> AchReturn {
        AchReturn {
            return_id: model.return_id,
            entry_id: model.entry_id,
            return_code: HeaplessString::try_from(model.return_code.as_str())
                .unwrap_or_default(),
            return_date: model.return_date,
            addenda: model.addenda,
            received_at: model.received_at,
        }
    }
}
