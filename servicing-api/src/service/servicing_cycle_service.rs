use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ServicingResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleTask {
    InterestAccrual,
    Delinquency,
    LateFees,
    PlanSweep,
    EscrowForecast,
    EscrowScheduling,
    EscrowDisbursement,
}

/// Per-task outcome of one daily cycle run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub task: CycleTask,
    pub processing_date: NaiveDate,
    pub processed: i64,
    pub succeeded: i64,
    pub failed: i64,
    pub errors: Vec<String>,
}

impl CycleReport {
    pub fn new(task: CycleTask, processing_date: NaiveDate) -> Self {
        Self {
            task,
            processing_date,
            processed: 0,
            succeeded: 0,
            failed: 0,
            errors: Vec::new(),
        }
    }

    pub fn record_success(&mut self) {
        self.processed += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, loan_id: Uuid, error: impl std::fmt::Display) {
        self.processed += 1;
        self.failed += 1;
        self.errors.push(format!("{loan_id}: {error}"));
    }
}

/// Daily scheduler fanning out per-loan servicing work. Components are
/// reached through typed service dependencies rather than shared mutable
/// state.
#[async_trait]
pub trait ServicingCycleService: Send + Sync {
    /// Run every daily task for every serviceable loan.
    async fn run_daily_cycle(&self, processing_date: NaiveDate) -> ServicingResult<Vec<CycleReport>>;

    /// Run a single task across all serviceable loans.
    async fn run_task(
        &self,
        task: CycleTask,
        processing_date: NaiveDate,
    ) -> ServicingResult<CycleReport>;
}
