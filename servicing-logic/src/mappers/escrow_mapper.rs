use servicing_api::domain::{EscrowAnalysis, EscrowDisbursement, EscrowForecastRow, EscrowItem};
use servicing_db::models::{
    EscrowAnalysisModel, EscrowDisbursementModel, EscrowForecastModel, EscrowItemModel,
};

pub struct EscrowMapper;

impl EscrowMapper {
    pub fn item_from_model(model: EscrowItemModel) -> EscrowItem {
        EscrowItem {
            escrow_id: model.escrow_id,
            loan_id: model.loan_id,
            item_type: model.item_type,
            payee: model.payee,
            amount_minor: model.amount_minor,
            frequency: model.frequency,
            next_due_date: model.next_due_date,
            active: model.active,
        }
    }

    pub fn forecast_to_model(row: &EscrowForecastRow) -> EscrowForecastModel {
        EscrowForecastModel {
            loan_id: row.loan_id,
            escrow_id: row.escrow_id,
            due_date: row.due_date,
            amount_minor: row.amount_minor,
        }
    }

    pub fn forecast_from_model(model: EscrowForecastModel) -> EscrowForecastRow {
        EscrowForecastRow {
            loan_id: model.loan_id,
            escrow_id: model.escrow_id,
            due_date: model.due_date,
            amount_minor: model.amount_minor,
        }
    }

    pub fn disbursement_to_model(disbursement: &EscrowDisbursement) -> EscrowDisbursementModel {
        EscrowDisbursementModel {
            disbursement_id: disbursement.disbursement_id,
            loan_id: disbursement.loan_id,
            escrow_id: disbursement.escrow_id,
            due_date: disbursement.due_date,
            amount_minor: disbursement.amount_minor,
            status: disbursement.status,
            event_id: disbursement.event_id,
            created_at: disbursement.created_at,
        }
    }

    pub fn disbursement_from_model(model: EscrowDisbursementModel) -> EscrowDisbursement {
        EscrowDisbursement {
            disbursement_id: model.disbursement_id,
            loan_id: model.loan_id,
            escrow_id: model.escrow_id,
            due_date: model.due_date,
            amount_minor: model.amount_minor,
            status: model.status,
            event_id: model.event_id,
            created_at: model.created_at,
        }
    }

    pub fn analysis_to_model(analysis: &EscrowAnalysis) -> EscrowAnalysisModel {
        EscrowAnalysisModel {
            analysis_id: analysis.analysis_id,
            loan_id: analysis.loan_id,
            as_of: analysis.as_of,
            period_start: analysis.period_start,
            period_end: analysis.period_end,
            annual_expected_minor: analysis.annual_expected_minor,
            cushion_target_minor: analysis.cushion_target_minor,
            current_balance_minor: analysis.current_balance_minor,
            lowest_projected_minor: analysis.lowest_projected_minor,
            shortage_minor: analysis.shortage_minor,
            deficiency_minor: analysis.deficiency_minor,
            surplus_minor: analysis.surplus_minor,
            new_monthly_target_minor: analysis.new_monthly_target_minor,
            deficiency_recovery_monthly_minor: analysis.deficiency_recovery_monthly_minor,
            version: analysis.version,
            created_at: analysis.created_at,
        }
    }

    pub fn analysis_from_model(model: EscrowAnalysisModel) -> EscrowAnalysis {
        EscrowAnalysis {
            analysis_id: model.analysis_id,
            loan_id: model.loan_id,
            as_of: model.as_of,
            period_start: model.period_start,
            period_end: model.period_end,
            annual_expected_minor: model.annual_expected_minor,
            cushion_target_minor: model.cushion_target_minor,
            current_balance_minor: model.current_balance_minor,
            lowest_projected_minor: model.lowest_projected_minor,
            shortage_minor: model.shortage_minor,
            deficiency_minor: model.deficiency_minor,
            surplus_minor: model.surplus_minor,
            new_monthly_target_minor: model.new_monthly_target_minor,
            deficiency_recovery_monthly_minor: model.deficiency_recovery_monthly_minor,
            version: model.version,
            created_at: model.created_at,
        }
    }
}
