pub mod ach_mapper;
pub mod cash_mapper;
pub mod collections_mapper;
pub mod escrow_mapper;
pub mod ledger_mapper;
pub mod payment_mapper;
pub mod schedule_mapper;

pub use ach_mapper::AchMapper;
pub use cash_mapper::CashMapper;
pub use collections_mapper::CollectionsMapper;
pub use escrow_mapper::EscrowMapper;
pub use ledger_mapper::LedgerMapper;
pub use payment_mapper::PaymentMapper;
pub use schedule_mapper::ScheduleMapper;

use servicing_api::{ServicingError, ServicingResult};

/// ISO 4217 code as a fixed 3-byte array.
pub fn currency_from_str(code: &str) -> ServicingResult<[u8; 3]> {
    let bytes = code.as_bytes();
    if bytes.len() != 3 || !bytes.iter().all(|b| b.is_ascii_uppercase()) {
        return Err(ServicingError::UnsupportedCurrency(code.to_string()));
    }
    Ok([bytes[0], bytes[1], bytes[2]])
}

pub fn currency_to_string(code: [u8; 3]) -> String {
    String::from_utf8_lossy(&code).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_round_trip() {
        assert_eq!(currency_from_str("USD").unwrap(), *b"USD");
        assert_eq!(currency_to_string(*b"USD"), "USD");
        assert!(currency_from_str("usd").is_err());
        assert!(currency_from_str("USDX").is_err());
    }
}
