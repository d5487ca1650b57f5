use servicing_api::domain::{Allocation, Minor, Outstanding, WaterfallBucket};

/// Walk the waterfall in order, taking `min(remaining, outstanding)` per
/// bucket; `future` absorbs any remainder. Allocations are non-negative
/// and sum to `payment_minor`; zero allocations are omitted.
pub fn allocate_payment(
    payment_minor: Minor,
    waterfall: &[WaterfallBucket],
    outstanding: &Outstanding,
) -> Vec<Allocation> {
    let mut remaining = payment_minor.max(0);
    let mut allocations = Vec::new();

    for &bucket in waterfall {
        if remaining == 0 {
            break;
        }
        let taken = match outstanding.for_bucket(bucket) {
            Some(due) => remaining.min(due.max(0)),
            // future: everything left
            None => remaining,
        };
        if taken > 0 {
            allocations.push(Allocation {
                bucket,
                amount_minor: taken,
            });
            remaining -= taken;
        }
    }

    allocations
}

/// Expected minimum payment: everything due ahead of principal in the
/// waterfall order, plus the scheduled principal portion.
pub fn minimum_payment_due(
    waterfall: &[WaterfallBucket],
    outstanding: &Outstanding,
    scheduled_principal_minor: Minor,
) -> Minor {
    let mut due = 0;
    for &bucket in waterfall {
        match bucket {
            WaterfallBucket::Principal => {
                due += scheduled_principal_minor.max(0);
            }
            WaterfallBucket::Future => {}
            _ => {
                due += outstanding.for_bucket(bucket).unwrap_or(0).max(0);
            }
        }
    }
    due
}

/// Amount by which a payment falls short of the expected minimum.
pub fn shortfall(
    payment_minor: Minor,
    waterfall: &[WaterfallBucket],
    outstanding: &Outstanding,
    scheduled_principal_minor: Minor,
) -> Minor {
    (minimum_payment_due(waterfall, outstanding, scheduled_principal_minor) - payment_minor).max(0)
}
