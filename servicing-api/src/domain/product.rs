use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::allocation::WaterfallBucket;
use crate::domain::daycount::DayCountConvention;
use crate::domain::money::{Minor, RoundingMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Compounding {
    #[default]
    Monthly,
    Daily,
}

/// Per-product servicing policy: the knobs the poster and schedule
/// generator read.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProductPolicy {
    #[validate(length(min = 1, max = 32))]
    pub product_code: String,
    pub currency: [u8; 3],
    pub rounding: RoundingMode,
    pub default_day_count: DayCountConvention,
    pub default_compounding: Compounding,
    #[validate(range(min = 0))]
    pub min_payment_minor: Minor,
    pub payment_waterfall: Vec<WaterfallBucket>,
}

impl Default for ProductPolicy {
    fn default() -> Self {
        Self {
            product_code: "STD-30Y".to_string(),
            currency: *b"USD",
            rounding: RoundingMode::HalfAwayFromZero,
            default_day_count: DayCountConvention::Us30360,
            default_compounding: Compounding::Monthly,
            min_payment_minor: 0,
            payment_waterfall: WaterfallBucket::DEFAULT.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LateFeeType {
    Amount,
    Percent,
}

/// What a percent-based late fee is computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LateFeeBase {
    #[default]
    ScheduledPi,
    TotalDue,
    PrincipalOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FeePolicy {
    #[validate(length(min = 1, max = 64))]
    pub template_id: String,
    pub late_fee_type: LateFeeType,
    #[validate(range(min = 0))]
    pub late_fee_amount_minor: Minor,
    #[validate(range(min = 0, max = 10_000))]
    pub late_fee_percent_bps: i64,
    #[validate(range(min = 0, max = 60))]
    pub late_fee_grace_days: u16,
    #[validate(range(min = 0))]
    pub late_fee_cap_minor: Minor,
    pub late_fee_base: LateFeeBase,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            template_id: "late-fee-standard".to_string(),
            late_fee_type: LateFeeType::Percent,
            late_fee_amount_minor: 0,
            late_fee_percent_bps: 500,
            late_fee_grace_days: 15,
            late_fee_cap_minor: 5_000,
            late_fee_base: LateFeeBase::ScheduledPi,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn default_policy_validates() {
        assert!(ProductPolicy::default().validate().is_ok());
        assert!(FeePolicy::default().validate().is_ok());
    }

    #[test]
    fn default_waterfall_order() {
        let policy = ProductPolicy::default();
        assert_eq!(policy.payment_waterfall[0], WaterfallBucket::FeesDue);
        // escrow stays funded ahead of principal reduction
        assert_eq!(policy.payment_waterfall[3], WaterfallBucket::Escrow);
        assert_eq!(policy.payment_waterfall[4], WaterfallBucket::Principal);
        assert_eq!(policy.payment_waterfall[5], WaterfallBucket::Future);
    }

    #[test]
    fn bad_fee_policy_rejected() {
        let policy = FeePolicy {
            late_fee_percent_bps: 20_000,
            ..FeePolicy::default()
        };
        assert!(policy.validate().is_err());
    }
}
