use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{ServicingError, ServicingResult};

/// Money is an integer count of the currency's minor unit (USD cents).
/// No floating point touches a stored balance.
pub type Minor = i64;

/// Basis points: 600 = 6.00% annual.
pub type RateBps = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    #[default]
    HalfAwayFromZero,
    HalfEven,
}

impl RoundingMode {
    fn strategy(self) -> RoundingStrategy {
        match self {
            RoundingMode::HalfAwayFromZero => RoundingStrategy::MidpointAwayFromZero,
            RoundingMode::HalfEven => RoundingStrategy::MidpointNearestEven,
        }
    }
}

/// Integer division of `numer / denom` rounded per `mode`.
/// `denom` must be positive.
pub fn round_div(numer: i128, denom: i128, mode: RoundingMode) -> i64 {
    debug_assert!(denom > 0);
    let quot = numer.div_euclid(denom);
    let rem = numer.rem_euclid(denom);
    let twice = rem * 2;
    let rounded = if twice > denom {
        quot + 1
    } else if twice < denom {
        quot
    } else {
        match mode {
            // div_euclid floors, so the midpoint always rounds toward +inf here;
            // away-from-zero must look at the sign of the true quotient
            RoundingMode::HalfAwayFromZero => {
                if numer < 0 {
                    quot
                } else {
                    quot + 1
                }
            }
            RoundingMode::HalfEven => {
                if quot % 2 == 0 {
                    quot
                } else {
                    quot + 1
                }
            }
        }
    };
    rounded as i64
}

/// Standard annuity payment for `pv` minor units over `n` periods at
/// `annual_rate_bps`, rounded to minor units. The zero-rate path is `pv / n`.
pub fn level_payment(
    pv: Minor,
    annual_rate_bps: RateBps,
    n: u32,
    rounding: RoundingMode,
) -> ServicingResult<Minor> {
    if n == 0 {
        return Err(ServicingError::InvalidMoney(
            "level payment requires at least one period".to_string(),
        ));
    }
    if pv < 0 {
        return Err(ServicingError::InvalidMoney(format!(
            "negative present value: {pv}"
        )));
    }
    if annual_rate_bps == 0 {
        return Ok(round_div(pv as i128, n as i128, rounding));
    }

    let pv_dec = Decimal::from(pv);
    let monthly_rate = Decimal::from(annual_rate_bps) / Decimal::from(10_000) / Decimal::from(12);
    let factor = (Decimal::ONE + monthly_rate).powi(n as i64);
    let payment = pv_dec * monthly_rate * factor / (factor - Decimal::ONE);

    payment
        .round_dp_with_strategy(0, rounding.strategy())
        .to_i64()
        .ok_or_else(|| ServicingError::InvalidMoney(format!("level payment overflow for pv {pv}")))
}

/// One day of interest on `principal` at `annual_rate_bps` over a
/// `base_days` year.
pub fn per_diem(
    principal: Minor,
    annual_rate_bps: RateBps,
    base_days: u32,
    rounding: RoundingMode,
) -> Minor {
    simple_interest(principal, annual_rate_bps, 1, base_days, rounding)
}

/// Simple interest: `principal × (bps / 10000) × days / base_days`.
pub fn simple_interest(
    principal: Minor,
    annual_rate_bps: RateBps,
    days: i64,
    base_days: u32,
    rounding: RoundingMode,
) -> Minor {
    if days <= 0 || principal == 0 || annual_rate_bps == 0 {
        return 0;
    }
    let numer = principal as i128 * annual_rate_bps as i128 * days as i128;
    let denom = 10_000i128 * base_days as i128;
    round_div(numer, denom, rounding)
}

/// Basis-point fraction of a base amount, floored at zero after rounding
/// toward nearest. Used for percent-of-base fee computation.
pub fn bps_of(base: Minor, bps: i64) -> Minor {
    if base <= 0 || bps <= 0 {
        return 0;
    }
    ((base as i128 * bps as i128) / 10_000) as i64
}

/// Convert an external decimal string ("1234.56") to minor units using
/// `round(value × 100)` under the configured mode.
pub fn decimal_str_to_minor(s: &str, rounding: RoundingMode) -> ServicingResult<Minor> {
    let value: Decimal = s
        .trim()
        .parse()
        .map_err(|e| ServicingError::InvalidMoney(format!("unparseable amount {s:?}: {e}")))?;
    decimal_to_minor(value, rounding)
}

/// Convert a `Decimal` major-unit amount to minor units.
pub fn decimal_to_minor(value: Decimal, rounding: RoundingMode) -> ServicingResult<Minor> {
    (value * Decimal::from(100))
        .round_dp_with_strategy(0, rounding.strategy())
        .to_i64()
        .ok_or_else(|| ServicingError::InvalidMoney(format!("amount out of range: {value}")))
}

/// Render minor units as a major-unit decimal string for memos and files.
pub fn minor_to_display(minor: Minor) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}


impl RoundingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundingMode::HalfAwayFromZero => "half_away_from_zero",
            RoundingMode::HalfEven => "half_even",
        }
    }
}

impl std::str::FromStr for RoundingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "half_away_from_zero" => Ok(RoundingMode::HalfAwayFromZero),
            "half_even" => Ok(RoundingMode::HalfEven),
            other => Err(format!("unknown rounding mode: {other}")),
        }
    }
}
