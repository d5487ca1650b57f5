use heapless::String as HeaplessString;
use servicing_api::domain::{BankStatementFile, BankTxn, MatchCandidate, ReconException};
use servicing_db::models::{
    BankStatementFileModel, BankTxnModel, MatchCandidateModel, ReconExceptionModel,
};

pub struct CashMapper;

impl CashMapper {
    pub fn file_from_model(model: BankStatementFileModel) -> BankStatementFile {
        BankStatementFile {
            file_id: model.file_id,
            bank_account_id: model.bank_account_id,
            as_of_date: model.as_of_date,
            format: model.format,
            content_hash: model.content_hash,
            txn_count: model.txn_count,
            ingested_at: model.ingested_at,
        }
    }

    pub fn txn_from_model(model: BankTxnModel) -> BankTxn {
        BankTxn {
            bank_txn_id: model.bank_txn_id,
            bank_account_id: model.bank_account_id,
            file_id: model.file_id,
            posted_date: model.posted_date,
            amount_minor: model.amount_minor,
            txn_type: model.txn_type,
            bank_ref: HeaplessString::try_from(model.bank_ref.as_str()).unwrap_or_default(),
            description: model.description,
            matched: model.matched,
            matched_event_id: model.matched_event_id,
        }
    }

    pub fn candidate_from_model(model: MatchCandidateModel) -> MatchCandidate {
        MatchCandidate {
            bank_txn_id: model.bank_txn_id,
            event_id: model.event_id,
            score: model.score,
            reason: model.reason,
        }
    }

    pub fn exception_from_model(model: ReconExceptionModel) -> ReconException {
        ReconException {
            bank_txn_id: model.bank_txn_id,
            variance_minor: model.variance_minor,
            status: model.status,
            note: model.note,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
