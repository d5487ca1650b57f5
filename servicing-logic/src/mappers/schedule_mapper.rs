use servicing_api::domain::{PaymentSchedule, ScheduleRow, ScheduleTerms};
use servicing_db::models::{PaymentScheduleModel, ScheduleRowModel};

pub struct ScheduleMapper;

impl ScheduleMapper {
    pub fn plan_to_model(plan: &PaymentSchedule) -> PaymentScheduleModel {
        PaymentScheduleModel {
            schedule_id: plan.schedule_id,
            loan_id: plan.loan_id,
            version: plan.version,
            active: plan.active,
            principal_minor: plan.terms.principal_minor,
            annual_rate_bps: plan.terms.annual_rate_bps,
            term_months: plan.terms.term_months as i32,
            first_payment_date: plan.terms.first_payment_date,
            day_count: plan.terms.day_count,
            rounding: plan.terms.rounding,
            interest_only_months: plan.terms.interest_only_months as i32,
            balloon_month: plan.terms.balloon_month.map(|m| m as i32),
            created_at: plan.created_at,
        }
    }

    pub fn rows_to_models(plan: &PaymentSchedule) -> Vec<ScheduleRowModel> {
        plan.rows
            .iter()
            .map(|row| ScheduleRowModel {
                schedule_id: plan.schedule_id,
                period_no: row.period_no as i32,
                due_date: row.due_date,
                principal_minor: row.principal_minor,
                interest_minor: row.interest_minor,
                total_payment_minor: row.total_payment_minor,
                balance_minor: row.balance_minor,
            })
            .collect()
    }

    pub fn plan_from_models(
        model: PaymentScheduleModel,
        rows: Vec<ScheduleRowModel>,
    ) -> PaymentSchedule {
        PaymentSchedule {
            schedule_id: model.schedule_id,
            loan_id: model.loan_id,
            version: model.version,
            active: model.active,
            terms: ScheduleTerms {
                loan_id: model.loan_id,
                principal_minor: model.principal_minor,
                annual_rate_bps: model.annual_rate_bps,
                term_months: model.term_months as u32,
                first_payment_date: model.first_payment_date,
                day_count: model.day_count,
                rounding: model.rounding,
                interest_only_months: model.interest_only_months as u32,
                balloon_month: model.balloon_month.map(|m| m as u32),
            },
            rows: rows
                .into_iter()
                .map(|row| ScheduleRow {
                    period_no: row.period_no as u32,
                    due_date: row.due_date,
                    principal_minor: row.principal_minor,
                    interest_minor: row.interest_minor,
                    total_payment_minor: row.total_payment_minor,
                    balance_minor: row.balance_minor,
                })
                .collect(),
            created_at: model.created_at,
        }
    }
}
