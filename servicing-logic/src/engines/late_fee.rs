use chrono::NaiveDate;
use servicing_api::domain::{add_days, FeePolicy, LateFeeBase, LateFeeType, Minor};

/// Amounts the fee base can be computed against, as of the assessment
/// date.
#[derive(Debug, Clone, Copy, Default)]
pub struct LateFeeContext {
    pub scheduled_pi_minor: Minor,
    pub total_due_minor: Minor,
    pub principal_due_minor: Minor,
    /// Amount already applied against the selected base.
    pub base_paid_minor: Minor,
}

/// Compute the late fee for one period, or None when no fee applies:
/// still inside the grace window, base fully paid, or a zero fee.
pub fn compute(
    policy: &FeePolicy,
    ctx: LateFeeContext,
    period_due_date: NaiveDate,
    as_of: NaiveDate,
) -> Option<Minor> {
    let grace_end = add_days(period_due_date, policy.late_fee_grace_days as u64);
    if as_of < grace_end {
        return None;
    }

    let base = match policy.late_fee_base {
        LateFeeBase::ScheduledPi => ctx.scheduled_pi_minor,
        LateFeeBase::TotalDue => ctx.total_due_minor,
        LateFeeBase::PrincipalOnly => ctx.principal_due_minor,
    };
    if base <= 0 || ctx.base_paid_minor >= base {
        return None;
    }

    let fee = match policy.late_fee_type {
        LateFeeType::Amount => policy.late_fee_amount_minor,
        LateFeeType::Percent => {
            let raw = (base as i128 * policy.late_fee_percent_bps as i128 / 10_000) as i64;
            raw.min(policy.late_fee_cap_minor)
        }
    };

    (fee > 0).then_some(fee)
}
