use chrono::NaiveDate;
use servicing_api::domain::{BankTxnType, Minor};
use servicing_db::models::CashEventRow;
use uuid::Uuid;

/// The bank-side facts a candidate is scored against.
#[derive(Debug, Clone)]
pub struct BankTxnFacts {
    pub posted_date: NaiveDate,
    pub amount_minor: Minor,
    pub txn_type: BankTxnType,
    pub bank_ref: String,
    pub description: String,
}

impl BankTxnFacts {
    /// Expected net cash movement on the ledger: deposits show up as a
    /// cash debit (+), everything else as a cash credit (−).
    pub fn expected_ledger_net(&self) -> Minor {
        match self.txn_type {
            BankTxnType::Credit => self.amount_minor,
            BankTxnType::Debit | BankTxnType::Fee | BankTxnType::Return => -self.amount_minor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredCandidate {
    pub event_id: Uuid,
    pub score: i32,
    pub reason: String,
}

/// Score every ledger candidate and keep the best three, highest first.
pub fn score_candidates(facts: &BankTxnFacts, events: &[CashEventRow]) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = events
        .iter()
        .map(|event| score_one(facts, event))
        .filter(|candidate| candidate.score > 0)
        .collect();
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(3);
    scored
}

fn score_one(facts: &BankTxnFacts, event: &CashEventRow) -> ScoredCandidate {
    let mut score = 0;
    let mut reasons: Vec<&str> = Vec::new();

    let expected = facts.expected_ledger_net();
    let diff = (event.cash_net_minor - expected).abs();
    if diff == 0 {
        score += 60;
        reasons.push("amount exact");
    } else if within_pct(diff, expected, 1) {
        score += 50;
        reasons.push("amount within 1%");
    } else if within_pct(diff, expected, 5) {
        score += 30;
        reasons.push("amount within 5%");
    }

    let day_gap = (facts.posted_date - event.effective_date).num_days().abs();
    if day_gap == 0 {
        score += 30;
        reasons.push("same day");
    } else if day_gap <= 1 {
        score += 25;
        reasons.push("within 1 day");
    } else if day_gap <= 3 {
        score += 10;
        reasons.push("within 3 days");
    }

    let bank_ref = facts.bank_ref.to_lowercase();
    let description = facts.description.to_lowercase();
    let correlation = event.correlation_id.to_lowercase();
    let memo = event.memo_blob.to_lowercase();

    if !bank_ref.is_empty() && correlation.contains(&bank_ref) {
        score += 15;
        reasons.push("bank ref in correlation");
    }
    if !bank_ref.is_empty() && memo.contains(&bank_ref) {
        score += 10;
        reasons.push("bank ref in memo");
    }
    if !correlation.is_empty() && description.contains(&correlation) {
        score += 100;
        reasons.push("correlation in description");
    }

    ScoredCandidate {
        event_id: event.event_id,
        score,
        reason: reasons.join(", "),
    }
}

fn within_pct(diff: Minor, expected: Minor, pct: i64) -> bool {
    let magnitude = expected.abs();
    magnitude > 0 && diff as i128 * 100 <= magnitude as i128 * pct as i128
}
