use chrono::NaiveDate;
use servicing_api::domain::{
    add_months, days_between, level_payment, round_div, simple_interest, Minor, ScheduleRow,
    ScheduleTerms,
};
use servicing_api::{ServicingError, ServicingResult};

/// Generate amortization rows for the given terms.
///
/// Supports level payment, an interest-only prefix, and a balloon period
/// that absorbs all remaining principal. The final period always absorbs
/// the rounding residue so the ending balance is exactly zero.
pub fn generate_rows(terms: &ScheduleTerms) -> ServicingResult<Vec<ScheduleRow>> {
    if terms.term_months == 0 {
        return Err(ServicingError::ScheduleGeneration(
            "term must be at least one month".to_string(),
        ));
    }
    if terms.principal_minor <= 0 {
        return Err(ServicingError::ScheduleGeneration(format!(
            "principal must be positive, got {}",
            terms.principal_minor
        )));
    }
    if terms.interest_only_months >= terms.term_months {
        return Err(ServicingError::ScheduleGeneration(
            "interest-only period must be shorter than the term".to_string(),
        ));
    }
    if let Some(balloon) = terms.balloon_month {
        if balloon == 0 || balloon > terms.term_months {
            return Err(ServicingError::ScheduleGeneration(format!(
                "balloon month {balloon} outside term"
            )));
        }
        if balloon <= terms.interest_only_months {
            return Err(ServicingError::ScheduleGeneration(
                "balloon month falls inside the interest-only period".to_string(),
            ));
        }
    }

    let last_period = terms.balloon_month.unwrap_or(terms.term_months);
    let amortizing_periods = terms.term_months - terms.interest_only_months;
    let payment = level_payment(
        terms.principal_minor,
        terms.annual_rate_bps,
        amortizing_periods,
        terms.rounding,
    )?;

    let mut rows = Vec::with_capacity(last_period as usize);
    let mut balance = terms.principal_minor;
    let mut prev_date = origin_date(terms);

    for period_no in 1..=last_period {
        let due_date = if period_no == 1 {
            terms.first_payment_date
        } else {
            add_months(terms.first_payment_date, period_no - 1)
        };

        let interest = period_interest(terms, balance, prev_date, due_date);

        let principal = if period_no <= terms.interest_only_months {
            0
        } else if period_no == last_period {
            // final period absorbs the rounding residue (or the balloon)
            balance
        } else {
            (payment - interest).clamp(0, balance)
        };

        balance -= principal;
        rows.push(ScheduleRow {
            period_no,
            due_date,
            principal_minor: principal,
            interest_minor: interest,
            total_payment_minor: principal + interest,
            balance_minor: balance,
        });
        prev_date = due_date;
    }

    Ok(rows)
}

/// Interest for one period: actual day count between due dates for the
/// ACT conventions, level monthly rate otherwise.
fn period_interest(
    terms: &ScheduleTerms,
    balance: Minor,
    prev_date: NaiveDate,
    due_date: NaiveDate,
) -> Minor {
    if terms.day_count.uses_actual_days() {
        let days = days_between(prev_date, due_date, terms.day_count);
        simple_interest(
            balance,
            terms.annual_rate_bps,
            days,
            terms.day_count.base_days(prev_date),
            terms.rounding,
        )
    } else {
        round_div(
            balance as i128 * terms.annual_rate_bps as i128,
            10_000 * 12,
            terms.rounding,
        )
    }
}

/// The accrual start for period 1 is one month before the first due
/// date.
fn origin_date(terms: &ScheduleTerms) -> NaiveDate {
    servicing_api::domain::sub_months(terms.first_payment_date, 1)
}
