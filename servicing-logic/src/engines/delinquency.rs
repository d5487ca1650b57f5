use chrono::NaiveDate;
use servicing_api::domain::{DelinquencyBucket, Minor, ScheduleRow};

/// Inputs to one delinquency computation: the active schedule, the
/// escrow portion collected with each period, assessed fees, and the
/// cumulative amount applied from posted payments.
#[derive(Debug, Clone, Copy)]
pub struct DelinquencyInput<'a> {
    pub rows: &'a [ScheduleRow],
    pub monthly_escrow_minor: Minor,
    pub fees_assessed_minor: Minor,
    pub applied_total_minor: Minor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelinquencyStanding {
    pub earliest_unpaid_due_date: Option<NaiveDate>,
    pub unpaid_due_minor: Minor,
    pub dpd: u32,
    pub bucket: DelinquencyBucket,
}

/// Compute days past due at `as_of`.
///
/// Walks schedule periods due on or before `as_of` in order, comparing
/// cumulative scheduled (principal + interest + escrow) against the
/// cumulative applied amount; the first period whose cumulative exceeds
/// what was applied is the earliest unpaid due date. Assessed fees count
/// toward the unpaid total but carry no due date of their own.
pub fn compute(input: DelinquencyInput<'_>, as_of: NaiveDate) -> DelinquencyStanding {
    let mut cumulative_scheduled: Minor = 0;
    let mut earliest_unpaid: Option<NaiveDate> = None;

    for row in input.rows.iter().filter(|row| row.due_date <= as_of) {
        cumulative_scheduled +=
            row.principal_minor + row.interest_minor + input.monthly_escrow_minor;
        if earliest_unpaid.is_none() && cumulative_scheduled > input.applied_total_minor {
            earliest_unpaid = Some(row.due_date);
        }
    }

    let unpaid_due =
        (cumulative_scheduled + input.fees_assessed_minor - input.applied_total_minor).max(0);

    let dpd = earliest_unpaid
        .map(|due| (as_of - due).num_days().max(0) as u32)
        .unwrap_or(0);

    DelinquencyStanding {
        earliest_unpaid_due_date: earliest_unpaid,
        unpaid_due_minor: unpaid_due,
        dpd,
        bucket: DelinquencyBucket::for_dpd(dpd),
    }
}
