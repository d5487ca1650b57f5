use chrono::NaiveDate;
use indexmap::IndexMap;
use servicing_api::domain::{add_months, round_div, EscrowForecastRow, EscrowPolicy, Minor};

/// Computed outcome of one projection pass, before persistence concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    pub annual_expected_minor: Minor,
    pub monthly_average_minor: Minor,
    pub cushion_target_minor: Minor,
    pub lowest_projected_minor: Minor,
    pub shortage_minor: Minor,
    pub deficiency_minor: Minor,
    pub surplus_minor: Minor,
    pub new_monthly_target_minor: Minor,
    pub deficiency_recovery_monthly_minor: Minor,
}

/// RESPA-style annual analysis over [as_of, as_of + 12 months).
///
/// Projects the running balance month by month (deposit the monthly
/// average, then pay that month's disbursements) and derives shortage,
/// deficiency, or surplus from the lowest projected month against the
/// cushion target.
pub fn analyze(
    policy: &EscrowPolicy,
    current_balance_minor: Minor,
    forecast: &[EscrowForecastRow],
    as_of: NaiveDate,
) -> AnalysisOutcome {
    let monthly = monthly_expected(forecast, as_of);
    let annual_expected: Minor = monthly.values().sum();
    let monthly_average = round_div(annual_expected as i128, 12, policy.rounding);
    let cushion_target = monthly_average * policy.cushion_months as i64;

    let mut balance = current_balance_minor;
    let mut lowest = balance;
    for disbursed in monthly.values() {
        balance += monthly_average;
        balance -= disbursed;
        lowest = lowest.min(balance);
    }

    let (shortage, deficiency) = if lowest < 0 {
        let deficiency = -lowest;
        (cushion_target - current_balance_minor + deficiency, deficiency)
    } else if lowest < cushion_target {
        (cushion_target - lowest, 0)
    } else {
        (0, 0)
    };

    let surplus_raw = if lowest >= cushion_target {
        lowest - cushion_target
    } else {
        0
    };
    let surplus = if surplus_raw >= policy.surplus_refund_threshold_minor {
        surplus_raw
    } else {
        0
    };

    let new_monthly_target = monthly_average
        + round_div(cushion_target as i128, 12, policy.rounding)
        + round_div(
            shortage as i128,
            policy.shortage_amortization_months as i128,
            policy.rounding,
        );
    let deficiency_recovery = round_div(
        deficiency as i128,
        policy.deficiency_amortization_months as i128,
        policy.rounding,
    );

    AnalysisOutcome {
        annual_expected_minor: annual_expected,
        monthly_average_minor: monthly_average,
        cushion_target_minor: cushion_target,
        lowest_projected_minor: lowest,
        shortage_minor: shortage.max(0),
        deficiency_minor: deficiency,
        surplus_minor: surplus,
        new_monthly_target_minor: new_monthly_target,
        deficiency_recovery_monthly_minor: deficiency_recovery,
    }
}

/// Sum forecast disbursements into the 12 monthly windows starting at
/// `as_of`, preserving month order.
fn monthly_expected(forecast: &[EscrowForecastRow], as_of: NaiveDate) -> IndexMap<u32, Minor> {
    let mut monthly: IndexMap<u32, Minor> = (0..12).map(|i| (i, 0)).collect();
    for row in forecast {
        for month in 0..12u32 {
            let window_start = add_months(as_of, month);
            let window_end = add_months(as_of, month + 1);
            if row.due_date >= window_start && row.due_date < window_end {
                *monthly.entry(month).or_insert(0) += row.amount_minor;
                break;
            }
        }
    }
    monthly
}
