use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use servicing_api::domain::{PaymentSchedule, ScheduleTerms};
use servicing_api::service::ScheduleService;
use servicing_api::ServicingResult;
use servicing_db::repository::ScheduleRepository;

use crate::engines::amortization;
use crate::mappers::ScheduleMapper;

pub struct ScheduleServiceImpl {
    schedule_repository: Arc<dyn ScheduleRepository>,
}

impl ScheduleServiceImpl {
    pub fn new(schedule_repository: Arc<dyn ScheduleRepository>) -> Self {
        Self { schedule_repository }
    }

    async fn build_and_store(&self, terms: ScheduleTerms) -> ServicingResult<PaymentSchedule> {
        let rows = amortization::generate_rows(&terms)?;
        let version = self.schedule_repository.max_version(terms.loan_id).await? + 1;

        let plan = PaymentSchedule {
            schedule_id: Uuid::new_v4(),
            loan_id: terms.loan_id,
            version,
            active: true,
            terms,
            rows,
            created_at: Utc::now(),
        };

        self.schedule_repository
            .insert_plan(
                ScheduleMapper::plan_to_model(&plan),
                ScheduleMapper::rows_to_models(&plan),
            )
            .await?;

        tracing::info!(
            loan_id = %plan.loan_id,
            version,
            periods = plan.rows.len(),
            "activated payment schedule"
        );
        Ok(plan)
    }
}

#[async_trait]
impl ScheduleService for ScheduleServiceImpl {
    async fn generate(&self, terms: ScheduleTerms) -> ServicingResult<PaymentSchedule> {
        self.build_and_store(terms).await
    }

    async fn regenerate(&self, terms: ScheduleTerms) -> ServicingResult<PaymentSchedule> {
        // same path: insert_plan deactivates the prior active plan in the
        // same transaction, and the version counter is monotone
        self.build_and_store(terms).await
    }

    async fn active_schedule(&self, loan_id: Uuid) -> ServicingResult<Option<PaymentSchedule>> {
        let Some(model) = self.schedule_repository.find_active(loan_id).await? else {
            return Ok(None);
        };
        let rows = self
            .schedule_repository
            .rows_for_schedule(model.schedule_id)
            .await?;
        Ok(Some(ScheduleMapper::plan_from_models(model, rows)))
    }
}
