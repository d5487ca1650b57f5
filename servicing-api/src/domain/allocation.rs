use serde::{Deserialize, Serialize};

use crate::domain::ledger::GlAccount;
use crate::domain::money::Minor;

/// Waterfall allocation buckets; `DEFAULT` carries the order payments
/// consume them in for standard products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterfallBucket {
    FeesDue,
    InterestPastDue,
    InterestCurrent,
    Principal,
    Escrow,
    Future,
}

impl WaterfallBucket {
    /// Default waterfall order for standard products. Escrow is kept
    /// current ahead of principal so payments fund the escrow account
    /// before paying the loan down.
    pub const DEFAULT: [WaterfallBucket; 6] = [
        WaterfallBucket::FeesDue,
        WaterfallBucket::InterestPastDue,
        WaterfallBucket::InterestCurrent,
        WaterfallBucket::Escrow,
        WaterfallBucket::Principal,
        WaterfallBucket::Future,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WaterfallBucket::FeesDue => "fees_due",
            WaterfallBucket::InterestPastDue => "interest_past_due",
            WaterfallBucket::InterestCurrent => "interest_current",
            WaterfallBucket::Principal => "principal",
            WaterfallBucket::Escrow => "escrow",
            WaterfallBucket::Future => "future",
        }
    }

    /// Fixed bucket → GL credit account and posting memo.
    pub fn credit_account(&self) -> (GlAccount, &'static str) {
        match self {
            WaterfallBucket::FeesDue => (GlAccount::FeesReceivable, "Fees paid"),
            WaterfallBucket::InterestPastDue => {
                (GlAccount::InterestReceivable, "Past-due interest paid")
            }
            WaterfallBucket::InterestCurrent => {
                (GlAccount::InterestReceivable, "Current interest paid")
            }
            WaterfallBucket::Principal => (GlAccount::LoanPrincipal, "Principal reduction"),
            WaterfallBucket::Escrow => (GlAccount::EscrowLiability, "Escrow deposit"),
            WaterfallBucket::Future => (GlAccount::Suspense, "Prepayment / Future payment"),
        }
    }
}

impl std::str::FromStr for WaterfallBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WaterfallBucket::DEFAULT
            .iter()
            .copied()
            .find(|bucket| bucket.as_str() == s)
            .ok_or_else(|| format!("unknown waterfall bucket: {s}"))
    }
}

impl std::fmt::Display for WaterfallBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Amounts outstanding per bucket at posting time, derived from the ledger
/// and the active schedule. `future` has no outstanding; it absorbs any
/// remainder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outstanding {
    pub fees_due_minor: Minor,
    pub interest_past_due_minor: Minor,
    pub interest_current_minor: Minor,
    pub principal_minor: Minor,
    pub escrow_minor: Minor,
}

impl Outstanding {
    pub fn for_bucket(&self, bucket: WaterfallBucket) -> Option<Minor> {
        match bucket {
            WaterfallBucket::FeesDue => Some(self.fees_due_minor),
            WaterfallBucket::InterestPastDue => Some(self.interest_past_due_minor),
            WaterfallBucket::InterestCurrent => Some(self.interest_current_minor),
            WaterfallBucket::Principal => Some(self.principal_minor),
            WaterfallBucket::Escrow => Some(self.escrow_minor),
            WaterfallBucket::Future => None,
        }
    }
}

/// One bucket's share of an allocated payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub bucket: WaterfallBucket,
    pub amount_minor: Minor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_gl_mapping_is_fixed() {
        assert_eq!(
            WaterfallBucket::Principal.credit_account(),
            (GlAccount::LoanPrincipal, "Principal reduction")
        );
        assert_eq!(
            WaterfallBucket::Future.credit_account().0,
            GlAccount::Suspense
        );
    }

    #[test]
    fn bucket_names_round_trip() {
        for bucket in WaterfallBucket::DEFAULT {
            assert_eq!(bucket.as_str().parse(), Ok(bucket));
        }
    }

    #[test]
    fn future_has_no_outstanding() {
        let outstanding = Outstanding::default();
        assert_eq!(outstanding.for_bucket(WaterfallBucket::Future), None);
        assert_eq!(outstanding.for_bucket(WaterfallBucket::Principal), Some(0));
    }
}
