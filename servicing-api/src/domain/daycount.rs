use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Day-count conventions recognized by the accrual and schedule engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayCountConvention {
    Act360,
    #[default]
    Act365F,
    ActAct,
    Us30360,
    Euro30360,
}

impl DayCountConvention {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayCountConvention::Act360 => "ACT_360",
            DayCountConvention::Act365F => "ACT_365F",
            DayCountConvention::ActAct => "ACT_ACT",
            DayCountConvention::Us30360 => "US_30_360",
            DayCountConvention::Euro30360 => "EURO_30_360",
        }
    }

    /// Denominator days for one year under this convention, anchored at
    /// `as_of` for ACT/ACT leap-year handling.
    pub fn base_days(&self, as_of: NaiveDate) -> u32 {
        match self {
            DayCountConvention::Act360
            | DayCountConvention::Us30360
            | DayCountConvention::Euro30360 => 360,
            DayCountConvention::Act365F => 365,
            DayCountConvention::ActAct => {
                if as_of.leap_year() {
                    366
                } else {
                    365
                }
            }
        }
    }

    /// Whether period interest uses actual days between due dates rather
    /// than a level monthly rate.
    pub fn uses_actual_days(&self) -> bool {
        matches!(
            self,
            DayCountConvention::Act360 | DayCountConvention::Act365F | DayCountConvention::ActAct
        )
    }
}

impl std::str::FromStr for DayCountConvention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACT_360" => Ok(DayCountConvention::Act360),
            "ACT_365F" => Ok(DayCountConvention::Act365F),
            "ACT_ACT" => Ok(DayCountConvention::ActAct),
            "US_30_360" => Ok(DayCountConvention::Us30360),
            "EURO_30_360" => Ok(DayCountConvention::Euro30360),
            other => Err(format!("unknown day count convention: {other}")),
        }
    }
}

/// Numerator days from `d1` to `d2` under `convention`. Negative when
/// `d2 < d1`. The 30/360 conventions use
/// `360·Δy + 30·Δm + (min(d2, 30) − min(d1, 30))`.
pub fn days_between(d1: NaiveDate, d2: NaiveDate, convention: DayCountConvention) -> i64 {
    match convention {
        DayCountConvention::Act360 | DayCountConvention::Act365F | DayCountConvention::ActAct => {
            (d2 - d1).num_days()
        }
        DayCountConvention::Us30360 | DayCountConvention::Euro30360 => {
            let dy = d2.year() as i64 - d1.year() as i64;
            let dm = d2.month() as i64 - d1.month() as i64;
            let dd = (d2.day().min(30)) as i64 - (d1.day().min(30)) as i64;
            360 * dy + 30 * dm + dd
        }
    }
}

/// Add `k` calendar months, clamping to the last day of the target month
/// when the source day exceeds it (Jan 31 + 1 month = Feb 28/29).
pub fn add_months(date: NaiveDate, k: u32) -> NaiveDate {
    date.checked_add_months(Months::new(k)).unwrap_or(date)
}

/// Subtract `k` calendar months with the same clamping rule.
pub fn sub_months(date: NaiveDate, k: u32) -> NaiveDate {
    date.checked_sub_months(Months::new(k)).unwrap_or(date)
}

pub fn add_days(date: NaiveDate, k: u64) -> NaiveDate {
    date.checked_add_days(Days::new(k)).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn same_day_is_zero_under_all_conventions() {
        let date = d(2025, 3, 15);
        for convention in [
            DayCountConvention::Act360,
            DayCountConvention::Act365F,
            DayCountConvention::ActAct,
            DayCountConvention::Us30360,
            DayCountConvention::Euro30360,
        ] {
            assert_eq!(days_between(date, date, convention), 0);
        }
    }

    #[test]
    fn actual_conventions_count_calendar_days() {
        assert_eq!(
            days_between(d(2025, 1, 1), d(2025, 2, 1), DayCountConvention::Act360),
            31
        );
        assert_eq!(
            days_between(d(2024, 2, 1), d(2024, 3, 1), DayCountConvention::Act365F),
            29
        );
    }

    #[test]
    fn thirty_360_treats_every_month_as_thirty_days() {
        assert_eq!(
            days_between(d(2025, 1, 1), d(2025, 2, 1), DayCountConvention::Us30360),
            30
        );
        // 31sts clamp to 30
        assert_eq!(
            days_between(d(2025, 1, 31), d(2025, 3, 31), DayCountConvention::Us30360),
            60
        );
        assert_eq!(
            days_between(d(2025, 1, 15), d(2026, 1, 15), DayCountConvention::Euro30360),
            360
        );
    }

    #[test]
    fn act_act_base_days_follows_leap_years() {
        assert_eq!(DayCountConvention::ActAct.base_days(d(2024, 6, 1)), 366);
        assert_eq!(DayCountConvention::ActAct.base_days(d(2025, 6, 1)), 365);
        assert_eq!(DayCountConvention::Act360.base_days(d(2024, 6, 1)), 360);
    }

    #[test]
    fn add_months_clamps_to_month_end() {
        assert_eq!(add_months(d(2025, 1, 31), 1), d(2025, 2, 28));
        assert_eq!(add_months(d(2024, 1, 31), 1), d(2024, 2, 29));
        assert_eq!(add_months(d(2025, 1, 31), 2), d(2025, 3, 31));
        assert_eq!(add_months(d(2025, 11, 30), 3), d(2026, 2, 28));
    }

    #[test]
    fn convention_round_trips_through_strings() {
        for convention in [
            DayCountConvention::Act360,
            DayCountConvention::Act365F,
            DayCountConvention::ActAct,
            DayCountConvention::Us30360,
            DayCountConvention::Euro30360,
        ] {
            assert_eq!(convention.as_str().parse(), Ok(convention));
        }
    }
}
