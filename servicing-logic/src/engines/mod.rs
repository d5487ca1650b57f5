pub mod allocation;
pub mod amortization;
pub mod bai2;
pub mod camt053;
pub mod delinquency;
pub mod escrow_analysis;
pub mod late_fee;
pub mod match_score;
pub mod nacha;
