use servicing_api::domain::{
    DelinquencySnapshot, ForeclosureCase, ForeclosureEvent, LateFeeAssessment, PaymentPlan,
    PlanInstallment,
};
use servicing_db::models::{
    DelinquencySnapshotModel, ForeclosureCaseModel, ForeclosureEventModel, LateFeeAssessmentModel,
    PaymentPlanModel, PlanInstallmentModel,
};

pub struct CollectionsMapper;

impl CollectionsMapper {
    pub fn snapshot_to_model(snapshot: &DelinquencySnapshot) -> DelinquencySnapshotModel {
        DelinquencySnapshotModel {
            loan_id: snapshot.loan_id,
            as_of_date: snapshot.as_of_date,
            earliest_unpaid_due_date: snapshot.earliest_unpaid_due_date,
            unpaid_due_minor: snapshot.unpaid_due_minor,
            dpd: snapshot.dpd as i32,
            bucket: snapshot.bucket,
        }
    }

    pub fn snapshot_from_model(model: DelinquencySnapshotModel) -> DelinquencySnapshot {
        DelinquencySnapshot {
            loan_id: model.loan_id,
            as_of_date: model.as_of_date,
            earliest_unpaid_due_date: model.earliest_unpaid_due_date,
            unpaid_due_minor: model.unpaid_due_minor,
            dpd: model.dpd.max(0) as u32,
            bucket: model.bucket,
        }
    }

    pub fn late_fee_to_model(fee: &LateFeeAssessment) -> LateFeeAssessmentModel {
        LateFeeAssessmentModel {
            fee_id: fee.fee_id,
            loan_id: fee.loan_id,
            period_due_date: fee.period_due_date,
            amount_minor: fee.amount_minor,
            template_id: fee.template_id.clone(),
            event_id: fee.event_id,
            assessed_at: fee.assessed_at,
        }
    }

    pub fn late_fee_from_model(model: LateFeeAssessmentModel) -> LateFeeAssessment {
        LateFeeAssessment {
            fee_id: model.fee_id,
            loan_id: model.loan_id,
            period_due_date: model.period_due_date,
            amount_minor: model.amount_minor,
            template_id: model.template_id,
            event_id: model.event_id,
            assessed_at: model.assessed_at,
        }
    }

    pub fn plan_to_models(plan: &PaymentPlan) -> (PaymentPlanModel, Vec<PlanInstallmentModel>) {
        let header = PaymentPlanModel {
            plan_id: plan.plan_id,
            loan_id: plan.loan_id,
            status: plan.status,
            created_at: plan.created_at,
            activated_at: plan.activated_at,
            closed_at: plan.closed_at,
        };
        let installments = plan
            .installments
            .iter()
            .map(|installment| PlanInstallmentModel {
                plan_id: plan.plan_id,
                installment_no: installment.installment_no as i32,
                due_date: installment.due_date,
                amount_minor: installment.amount_minor,
                paid_minor: installment.paid_minor,
                status: installment.status,
            })
            .collect();
        (header, installments)
    }

    pub fn plan_from_models(
        model: PaymentPlanModel,
        installments: Vec<PlanInstallmentModel>,
    ) -> PaymentPlan {
        PaymentPlan {
            plan_id: model.plan_id,
            loan_id: model.loan_id,
            status: model.status,
            installments: installments
                .into_iter()
                .map(|installment| PlanInstallment {
                    installment_no: installment.installment_no.max(0) as u32,
                    due_date: installment.due_date,
                    amount_minor: installment.amount_minor,
                    paid_minor: installment.paid_minor,
                    status: installment.status,
                })
                .collect(),
            created_at: model.created_at,
            activated_at: model.activated_at,
            closed_at: model.closed_at,
        }
    }

    pub fn case_from_model(model: ForeclosureCaseModel) -> ForeclosureCase {
        ForeclosureCase {
            case_id: model.case_id,
            loan_id: model.loan_id,
            status: model.status,
            opened_at: model.opened_at,
            closed_at: model.closed_at,
        }
    }

    pub fn milestone_from_model(model: ForeclosureEventModel) -> ForeclosureEvent {
        ForeclosureEvent {
            case_id: model.case_id,
            milestone: model.milestone,
            occurred_on: model.occurred_on,
            recorded_at: model.recorded_at,
        }
    }
}
