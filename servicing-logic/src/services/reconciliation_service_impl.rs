use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use servicing_api::domain::{
    BankStatementFile, BankTxn, BankTxnType, EntryLine, EventSchema, GlAccount, MatchCandidate,
    MessageEnvelope, ReconException, ReconExceptionStatus, StatementFormat, StageEvent,
};
use servicing_api::service::{LedgerService, MatchOutcome, ReconciliationService};
use servicing_api::{ServicingError, ServicingResult};
use servicing_db::models::{
    BankStatementFileModel, BankTxnModel, MatchCandidateModel, OutboxMessageModel,
    ReconExceptionModel,
};
use servicing_db::repository::{CashRepository, LedgerRepository, UnitOfWork, UnitOfWorkSession};

use crate::engines::{bai2, camt053, match_score};
use crate::mappers::CashMapper;
use crate::services::ledger_service_impl::LedgerServiceImpl;
use crate::settings::ReconSettings;

pub struct ReconciliationServiceImpl {
    unit_of_work: Arc<dyn UnitOfWork>,
    cash_repository: Arc<dyn CashRepository>,
    ledger_repository: Arc<dyn LedgerRepository>,
    settings: ReconSettings,
}

impl ReconciliationServiceImpl {
    pub fn new(
        unit_of_work: Arc<dyn UnitOfWork>,
        cash_repository: Arc<dyn CashRepository>,
        ledger_repository: Arc<dyn LedgerRepository>,
        settings: ReconSettings,
    ) -> Self {
        Self {
            unit_of_work,
            cash_repository,
            ledger_repository,
            settings,
        }
    }

    fn outbox_row(
        aggregate_id: Uuid,
        correlation_id: &str,
        event: &StageEvent,
    ) -> ServicingResult<OutboxMessageModel> {
        let envelope = MessageEnvelope::wrap(
            event.schema(),
            correlation_id,
            Uuid::new_v4(),
            event.to_payload()?,
        )?;
        Ok(OutboxMessageModel {
            outbox_id: Uuid::new_v4(),
            event_id: aggregate_id,
            exchange: event.exchange().to_string(),
            routing_key: event.schema().to_string(),
            payload: serde_json::to_value(&envelope)
                .map_err(|e| ServicingError::Internal(format!("encode envelope: {e}")))?,
            created_at: Utc::now(),
            published_at: None,
            attempt_count: 0,
            next_retry_at: None,
            last_error: None,
            parked: false,
        })
    }

    fn parse_txns(
        format: StatementFormat,
        bytes: &[u8],
        bank_account_id: Uuid,
        file_id: Uuid,
        as_of_date: NaiveDate,
    ) -> ServicingResult<Vec<BankTxnModel>> {
        let text = std::str::from_utf8(bytes).map_err(|_| ServicingError::StatementParse {
            line: 0,
            message: "statement is not valid UTF-8".to_string(),
        })?;

        let txns = match format {
            StatementFormat::Bai2 => bai2::parse(text)?
                .txns
                .into_iter()
                .map(|txn| BankTxnModel {
                    bank_txn_id: Uuid::new_v4(),
                    bank_account_id,
                    file_id,
                    posted_date: txn.posted_date.unwrap_or(as_of_date),
                    amount_minor: txn.amount_minor,
                    txn_type: txn.txn_type,
                    bank_ref: txn.bank_ref,
                    description: txn.description,
                    matched: false,
                    matched_event_id: None,
                })
                .collect(),
            StatementFormat::Camt053 => camt053::parse(text)?
                .into_iter()
                .map(|entry| BankTxnModel {
                    bank_txn_id: Uuid::new_v4(),
                    bank_account_id,
                    file_id,
                    posted_date: entry
                        .booking_date
                        .or(entry.value_date)
                        .unwrap_or(as_of_date),
                    amount_minor: entry.amount_minor,
                    txn_type: entry.txn_type,
                    bank_ref: entry.acct_svcr_ref,
                    description: entry.additional_info,
                    matched: false,
                    matched_event_id: None,
                })
                .collect(),
        };
        Ok(txns)
    }

    async fn score_and_decide(&self, txn: &BankTxnModel) -> ServicingResult<MatchOutcome> {
        let window = Duration::days(self.settings.date_window_days as i64);
        let events = self
            .ledger_repository
            .cash_events_in_window(txn.posted_date - window, txn.posted_date + window)
            .await?;

        let facts = match_score::BankTxnFacts {
            posted_date: txn.posted_date,
            amount_minor: txn.amount_minor,
            txn_type: txn.txn_type,
            bank_ref: txn.bank_ref.clone(),
            description: txn.description.clone(),
        };
        let scored = match_score::score_candidates(&facts, &events);

        self.cash_repository
            .replace_candidates(
                txn.bank_txn_id,
                scored
                    .iter()
                    .map(|candidate| MatchCandidateModel {
                        bank_txn_id: txn.bank_txn_id,
                        event_id: candidate.event_id,
                        score: candidate.score,
                        reason: candidate.reason.clone(),
                    })
                    .collect(),
            )
            .await?;

        let best = scored.first();
        match best {
            Some(candidate) if candidate.score >= self.settings.match_threshold => {
                let session = self.unit_of_work.begin().await?;
                let result: ServicingResult<()> = async {
                    session
                        .cash()
                        .mark_matched(txn.bank_txn_id, candidate.event_id)
                        .await?;
                    if session.cash().find_exception(txn.bank_txn_id).await?.is_some() {
                        session
                            .cash()
                            .update_exception_status(
                                txn.bank_txn_id,
                                ReconExceptionStatus::Resolved,
                                Some("auto-matched".to_string()),
                            )
                            .await?;
                    }
                    let event = StageEvent::CashReconciled {
                        bank_txn_id: txn.bank_txn_id,
                        event_id: candidate.event_id,
                    };
                    let correlation = format!("recon:banktxn:{}", txn.bank_txn_id);
                    session
                        .outbox()
                        .enqueue(Self::outbox_row(txn.bank_txn_id, &correlation, &event)?)
                        .await?;
                    Ok(())
                }
                .await;

                match result {
                    Ok(()) => {
                        session.commit().await?;
                        tracing::info!(
                            bank_txn_id = %txn.bank_txn_id,
                            event_id = %candidate.event_id,
                            score = candidate.score,
                            "bank txn auto-matched"
                        );
                        Ok(MatchOutcome::AutoMatched {
                            event_id: candidate.event_id,
                            score: candidate.score,
                        })
                    }
                    Err(err) => {
                        session.rollback().await?;
                        Err(err)
                    }
                }
            }
            _ => {
                let signed_bank_amount = facts.expected_ledger_net();
                let variance = match best {
                    Some(candidate) => {
                        let ledger_net = events
                            .iter()
                            .find(|event| event.event_id == candidate.event_id)
                            .map(|event| event.cash_net_minor)
                            .unwrap_or(0);
                        signed_bank_amount - ledger_net
                    }
                    None => signed_bank_amount,
                };

                let now = Utc::now();
                self.cash_repository
                    .upsert_exception(ReconExceptionModel {
                        bank_txn_id: txn.bank_txn_id,
                        variance_minor: variance,
                        status: ReconExceptionStatus::New,
                        note: None,
                        created_at: now,
                        updated_at: now,
                    })
                    .await?;
                tracing::debug!(
                    bank_txn_id = %txn.bank_txn_id,
                    variance,
                    "bank txn unmatched, exception recorded"
                );
                Ok(MatchOutcome::Exception {
                    variance_minor: variance,
                })
            }
        }
    }
}

#[async_trait]
impl ReconciliationService for ReconciliationServiceImpl {
    async fn ingest_statement(
        &self,
        bank_account_id: Uuid,
        as_of_date: NaiveDate,
        format: StatementFormat,
        bytes: &[u8],
    ) -> ServicingResult<BankStatementFile> {
        let content_hash = BankStatementFile::content_hash_for(bytes);
        if let Some(existing) = self
            .cash_repository
            .find_file_by_hash(bank_account_id, as_of_date, &content_hash)
            .await?
        {
            tracing::debug!(file_id = %existing.file_id, "statement file already ingested");
            return Ok(CashMapper::file_from_model(existing));
        }

        let file_id = Uuid::new_v4();
        let txns = Self::parse_txns(format, bytes, bank_account_id, file_id, as_of_date)?;
        let file = BankStatementFileModel {
            file_id,
            bank_account_id,
            as_of_date,
            format,
            content_hash,
            txn_count: txns.len() as i32,
            ingested_at: Utc::now(),
        };

        let event = StageEvent::StatementIngested {
            file_id,
            bank_account_id,
            txn_count: txns.len() as i64,
        };
        let correlation = format!("stmt:{bank_account_id}:{as_of_date}");

        let session = self.unit_of_work.begin().await?;
        let result: ServicingResult<()> = async {
            session.cash().create_file(file.clone()).await?;
            session.cash().insert_txns(txns).await?;
            session
                .outbox()
                .enqueue(Self::outbox_row(file_id, &correlation, &event)?)
                .await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                session.commit().await?;
                tracing::info!(%file_id, %bank_account_id, txns = file.txn_count, "statement ingested");
                Ok(CashMapper::file_from_model(file))
            }
            Err(err) => {
                session.rollback().await?;
                Err(err)
            }
        }
    }

    async fn match_statement(&self, file_id: Uuid) -> ServicingResult<Vec<MatchOutcome>> {
        let txns = self.cash_repository.txns_for_file(file_id).await?;
        let mut outcomes = Vec::with_capacity(txns.len());
        for txn in txns {
            if txn.matched {
                outcomes.push(MatchOutcome::AlreadyMatched);
                continue;
            }
            outcomes.push(self.score_and_decide(&txn).await?);
        }
        Ok(outcomes)
    }

    async fn match_bank_txn(&self, bank_txn_id: Uuid) -> ServicingResult<MatchOutcome> {
        let txn = self
            .cash_repository
            .find_txn(bank_txn_id)
            .await?
            .ok_or(ServicingError::BankTxnNotFound(bank_txn_id))?;
        if txn.matched {
            return Ok(MatchOutcome::AlreadyMatched);
        }
        self.score_and_decide(&txn).await
    }

    async fn manual_match(&self, bank_txn_id: Uuid, event_id: Uuid) -> ServicingResult<()> {
        let txn = self
            .cash_repository
            .find_txn(bank_txn_id)
            .await?
            .ok_or(ServicingError::BankTxnNotFound(bank_txn_id))?;
        if txn.matched {
            return Err(ServicingError::BankTxnAlreadyMatched(bank_txn_id));
        }
        if self.ledger_repository.find_by_id(event_id).await?.is_none() {
            return Err(ServicingError::EventNotFound(event_id));
        }

        let event = StageEvent::CashReconciled {
            bank_txn_id,
            event_id,
        };
        let correlation = format!("recon:banktxn:{bank_txn_id}");

        let session = self.unit_of_work.begin().await?;
        let result: ServicingResult<()> = async {
            session.cash().mark_matched(bank_txn_id, event_id).await?;
            if session.cash().find_exception(bank_txn_id).await?.is_some() {
                session
                    .cash()
                    .update_exception_status(
                        bank_txn_id,
                        ReconExceptionStatus::Resolved,
                        Some("manual match".to_string()),
                    )
                    .await?;
            }
            session
                .outbox()
                .enqueue(Self::outbox_row(bank_txn_id, &correlation, &event)?)
                .await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                session.commit().await?;
                tracing::info!(%bank_txn_id, %event_id, "bank txn manually matched");
                Ok(())
            }
            Err(err) => {
                session.rollback().await?;
                Err(err)
            }
        }
    }

    async fn write_off(&self, bank_txn_id: Uuid, note: &str) -> ServicingResult<Uuid> {
        let txn = self
            .cash_repository
            .find_txn(bank_txn_id)
            .await?
            .ok_or(ServicingError::BankTxnNotFound(bank_txn_id))?;
        if txn.matched {
            return Err(ServicingError::BankTxnAlreadyMatched(bank_txn_id));
        }

        // compensating lines: unexplained outflows are expensed,
        // unexplained inflows land in suspense until claimed
        let lines = match txn.txn_type {
            BankTxnType::Debit | BankTxnType::Fee | BankTxnType::Return => vec![
                EntryLine::debit(GlAccount::FeeExpense, txn.amount_minor, "Reconciliation write-off"),
                EntryLine::credit(GlAccount::Cash, txn.amount_minor, "Reconciliation write-off"),
            ],
            BankTxnType::Credit => vec![
                EntryLine::debit(GlAccount::Cash, txn.amount_minor, "Unidentified receipt"),
                EntryLine::credit(GlAccount::Suspense, txn.amount_minor, "Unidentified receipt"),
            ],
        };
        let correlation = format!("writeoff:banktxn:{bank_txn_id}");

        let session = self.unit_of_work.begin().await?;
        let result: ServicingResult<Uuid> = async {
            let ledger = LedgerServiceImpl::new(session.ledger());
            let event_id = ledger
                .post_event(
                    // book-level event; not tied to a loan
                    Uuid::nil(),
                    txn.posted_date,
                    &correlation,
                    EventSchema::CashWriteoffV1,
                    *b"USD",
                    lines,
                )
                .await?;

            session.cash().mark_matched(bank_txn_id, event_id).await?;
            let now = Utc::now();
            let exception = session.cash().find_exception(bank_txn_id).await?;
            if exception.is_some() {
                session
                    .cash()
                    .update_exception_status(
                        bank_txn_id,
                        ReconExceptionStatus::WrittenOff,
                        Some(note.to_string()),
                    )
                    .await?;
            } else {
                session
                    .cash()
                    .upsert_exception(ReconExceptionModel {
                        bank_txn_id,
                        variance_minor: txn.amount_minor,
                        status: ReconExceptionStatus::WrittenOff,
                        note: Some(note.to_string()),
                        created_at: now,
                        updated_at: now,
                    })
                    .await?;
            }
            Ok(event_id)
        }
        .await;

        match result {
            Ok(event_id) => {
                session.commit().await?;
                tracing::info!(%bank_txn_id, %event_id, "bank txn written off");
                Ok(event_id)
            }
            Err(err) => {
                session.rollback().await?;
                Err(err)
            }
        }
    }

    async fn candidates(&self, bank_txn_id: Uuid) -> ServicingResult<Vec<MatchCandidate>> {
        Ok(self
            .cash_repository
            .candidates_for(bank_txn_id)
            .await?
            .into_iter()
            .map(CashMapper::candidate_from_model)
            .collect())
    }

    async fn open_exceptions(&self) -> ServicingResult<Vec<ReconException>> {
        let mut exceptions = self
            .cash_repository
            .exceptions_by_status(ReconExceptionStatus::New)
            .await?;
        exceptions.extend(
            self.cash_repository
                .exceptions_by_status(ReconExceptionStatus::Investigating)
                .await?,
        );
        Ok(exceptions
            .into_iter()
            .map(CashMapper::exception_from_model)
            .collect())
    }

    async fn find_bank_txn(&self, bank_txn_id: Uuid) -> ServicingResult<Option<BankTxn>> {
        Ok(self
            .cash_repository
            .find_txn(bank_txn_id)
            .await?
            .map(CashMapper::txn_from_model))
    }
}
