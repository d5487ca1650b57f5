use chrono::{NaiveDate, NaiveTime};
use servicing_api::domain::{routing_check_digit, AchOriginator};
use servicing_db::models::{AchBatchModel, AchEntryModel};
use servicing_api::{ServicingError, ServicingResult};

const RECORD_LEN: usize = 94;
const BLOCKING_FACTOR: usize = 10;

/// Render a sealed batch as a NACHA file: records 1/5/6/8/9 padded with
/// 9-filled lines to a multiple of ten.
pub fn build_file(
    originator: &AchOriginator,
    batch: &AchBatchModel,
    entries: &[AchEntryModel],
    creation_date: NaiveDate,
    creation_time: NaiveTime,
) -> ServicingResult<String> {
    let odfi_first_eight = odfi_prefix(originator)?;
    let service_class = service_class_code(entries);

    let mut lines: Vec<String> = Vec::with_capacity(entries.len() + 4);
    lines.push(file_header(originator, creation_date, creation_time));
    lines.push(batch_header(originator, batch, service_class, &odfi_first_eight));
    for entry in entries {
        lines.push(entry_detail(entry)?);
    }
    lines.push(batch_control(originator, batch, entries, service_class, &odfi_first_eight));
    lines.push(file_control(batch, entries, lines.len() + 1));

    while lines.len() % BLOCKING_FACTOR != 0 {
        lines.push("9".repeat(RECORD_LEN));
    }

    debug_assert!(lines.iter().all(|line| line.len() == RECORD_LEN));
    Ok(lines.join("\n"))
}

/// Sum of the first-8 routing digits across entries, mod 10^10.
pub fn entry_hash(entries: &[AchEntryModel]) -> i64 {
    let sum: i128 = entries
        .iter()
        .filter_map(|entry| entry.rdfi_routing.get(0..8))
        .filter_map(|prefix| prefix.parse::<i128>().ok())
        .sum();
    (sum % 10_000_000_000) as i64
}

/// Trace number: first 8 of the ODFI routing + 7-digit sequence.
pub fn trace_number(odfi_routing: &str, sequence: u32) -> String {
    format!("{}{:07}", &odfi_routing[..8], sequence)
}

fn odfi_prefix(originator: &AchOriginator) -> ServicingResult<String> {
    if originator.odfi_routing.len() != 9
        || !originator.odfi_routing.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(ServicingError::InvalidRoutingNumber(
            originator.odfi_routing.clone(),
        ));
    }
    Ok(originator.odfi_routing[..8].to_string())
}

/// 200 mixed, 220 credits only, 225 debits only.
fn service_class_code(entries: &[AchEntryModel]) -> &'static str {
    let has_debits = entries.iter().any(|e| e.txn_code.is_debit());
    let has_credits = entries.iter().any(|e| !e.txn_code.is_debit());
    match (has_debits, has_credits) {
        (true, false) => "225",
        (false, true) => "220",
        _ => "200",
    }
}

fn file_header(
    originator: &AchOriginator,
    creation_date: NaiveDate,
    creation_time: NaiveTime,
) -> String {
    format!(
        "101{dest:>10}{orig:>10}{date}{time}A094101{dest_name:<23}{orig_name:<23}{reference:<8}",
        dest = originator.immediate_destination,
        orig = originator.immediate_origin,
        date = creation_date.format("%y%m%d"),
        time = creation_time.format("%H%M"),
        dest_name = truncate(&originator.destination_name, 23),
        orig_name = truncate(&originator.origin_name, 23),
        reference = "",
    )
}

fn batch_header(
    originator: &AchOriginator,
    batch: &AchBatchModel,
    service_class: &str,
    odfi_first_eight: &str,
) -> String {
    format!(
        "5{class}{company:<16}{discretionary:<20}{company_id:<10}PPD{description:<10}{desc_date:<6}{eff_date}{settle:<3}1{odfi}{batch_no:07}",
        class = service_class,
        company = truncate(&originator.company_name, 16),
        discretionary = "",
        company_id = originator.company_id,
        description = truncate(&batch.company_entry_description, 10),
        desc_date = "",
        eff_date = batch.effective_entry_date.format("%y%m%d"),
        settle = "",
        odfi = odfi_first_eight,
        batch_no = 1,
    )
}

fn entry_detail(entry: &AchEntryModel) -> ServicingResult<String> {
    let routing_prefix = entry
        .rdfi_routing
        .get(0..8)
        .ok_or_else(|| ServicingError::InvalidRoutingNumber(entry.rdfi_routing.clone()))?;
    let check_digit = routing_check_digit(routing_prefix)
        .ok_or_else(|| ServicingError::InvalidRoutingNumber(entry.rdfi_routing.clone()))?;
    let trace = entry
        .trace_number
        .clone()
        .ok_or_else(|| ServicingError::Internal("entry has no trace number".to_string()))?;
    let individual_id = entry
        .loan_id
        .map(|loan| loan.simple().to_string()[..15].to_string())
        .unwrap_or_default();

    Ok(format!(
        "6{code}{routing}{check}{account:<17}{amount:010}{individual_id:<15}{name:<22}{discretionary:<2}0{trace:<15}",
        code = entry.txn_code.code(),
        routing = routing_prefix,
        check = check_digit,
        account = truncate(&entry.account_number_masked, 17),
        amount = entry.amount_minor,
        individual_id = individual_id,
        name = truncate(&entry.individual_name, 22),
        discretionary = "",
        trace = trace,
    ))
}

fn batch_control(
    originator: &AchOriginator,
    batch: &AchBatchModel,
    entries: &[AchEntryModel],
    service_class: &str,
    odfi_first_eight: &str,
) -> String {
    format!(
        "8{class}{count:06}{hash:010}{debits:012}{credits:012}{company_id:<10}{mac:<19}{reserved:<6}{odfi}{batch_no:07}",
        class = service_class,
        count = entries.len(),
        hash = entry_hash(entries),
        debits = batch.debit_total_minor,
        credits = batch.credit_total_minor,
        company_id = originator.company_id,
        mac = "",
        reserved = "",
        odfi = odfi_first_eight,
        batch_no = 1,
    )
}

fn file_control(batch: &AchBatchModel, entries: &[AchEntryModel], line_count: usize) -> String {
    let block_count = line_count.div_ceil(BLOCKING_FACTOR);
    format!(
        "9{batches:06}{blocks:06}{count:08}{hash:010}{debits:012}{credits:012}{reserved:<39}",
        batches = 1,
        blocks = block_count,
        count = entries.len(),
        hash = entry_hash(entries),
        debits = batch.debit_total_minor,
        credits = batch.credit_total_minor,
        reserved = "",
    )
}

fn truncate(s: &str, max: usize) -> &str {
    &s[..s.len().min(max)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use servicing_api::domain::{AchBatchStatus, AchTransactionCode};
    use uuid::Uuid;

    fn originator() -> AchOriginator {
        AchOriginator {
            odfi_routing: "021000021".to_string(),
            immediate_destination: "021000021".to_string(),
            immediate_origin: "1234567890".to_string(),
            destination_name: "FRB NEW YORK".to_string(),
            origin_name: "SERVICER INC".to_string(),
            company_name: "SERVICER INC".to_string(),
            company_id: "1234567890".to_string(),
        }
    }

    fn batch(entries: &[AchEntryModel]) -> AchBatchModel {
        AchBatchModel {
            batch_id: Uuid::new_v4(),
            status: AchBatchStatus::Sealed,
            company_entry_description: "LOANPMT".to_string(),
            effective_entry_date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            entry_count: entries.len() as i32,
            debit_total_minor: entries
                .iter()
                .filter(|e| e.txn_code.is_debit())
                .map(|e| e.amount_minor)
                .sum(),
            credit_total_minor: entries
                .iter()
                .filter(|e| !e.txn_code.is_debit())
                .map(|e| e.amount_minor)
                .sum(),
            entry_hash: entry_hash(entries),
            sealed_at: Some(Utc::now()),
            created_at: Utc::now(),
        }
    }

    fn entry(sequence: u32, amount: i64, code: AchTransactionCode) -> AchEntryModel {
        AchEntryModel {
            entry_id: Uuid::new_v4(),
            batch_id: Uuid::nil(),
            loan_id: Some(Uuid::new_v4()),
            txn_code: code,
            rdfi_routing: "123456780".to_string(),
            account_number_masked: "****1234".to_string(),
            amount_minor: amount,
            individual_name: "DOE JANE".to_string(),
            trace_number: Some(trace_number("021000021", sequence)),
        }
    }

    #[test]
    fn every_line_is_94_bytes_and_blocked_by_ten() {
        let entries = vec![
            entry(1, 150_000, AchTransactionCode::CheckingDebit),
            entry(2, 98_765, AchTransactionCode::CheckingDebit),
        ];
        let file = build_file(
            &originator(),
            &batch(&entries),
            &entries,
            NaiveDate::from_ymd_opt(2025, 3, 13).unwrap(),
            NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
        )
        .unwrap();

        let lines: Vec<&str> = file.lines().collect();
        assert!(lines.iter().all(|line| line.len() == 94));
        assert_eq!(lines.len() % 10, 0);
        // records 1,5,6,6,8,9 then 9-filled padding
        assert!(lines[0].starts_with('1'));
        assert!(lines[1].starts_with('5'));
        assert!(lines[2].starts_with('6'));
        assert!(lines[3].starts_with('6'));
        assert!(lines[4].starts_with('8'));
        assert!(lines[5].starts_with('9'));
        assert!(lines[6..].iter().all(|line| *line == "9".repeat(94)));
    }

    #[test]
    fn entry_detail_layout() {
        let entries = vec![entry(1, 12_345, AchTransactionCode::CheckingDebit)];
        let file = build_file(
            &originator(),
            &batch(&entries),
            &entries,
            NaiveDate::from_ymd_opt(2025, 3, 13).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        )
        .unwrap();
        let detail = file.lines().nth(2).unwrap();

        assert_eq!(&detail[0..1], "6");
        assert_eq!(&detail[1..3], "27");
        assert_eq!(&detail[3..11], "12345678");
        // check digit for 12345678 is 0
        assert_eq!(&detail[11..12], "0");
        // amount, zero padded to 10
        assert_eq!(&detail[29..39], "0000012345");
        // trace = ODFI prefix + sequence
        assert_eq!(&detail[79..94], "021000020000001");
    }

    #[test]
    fn entry_hash_is_mod_ten_to_the_ten() {
        let entries: Vec<AchEntryModel> = (0..3)
            .map(|i| entry(i + 1, 100, AchTransactionCode::CheckingDebit))
            .collect();
        assert_eq!(entry_hash(&entries), 3 * 12_345_678);

        let mut many = entries.clone();
        for _ in 0..1000 {
            many.extend(entries.iter().cloned());
        }
        assert!(entry_hash(&many) < 10_000_000_000);
    }

    #[test]
    fn service_class_reflects_entry_mix() {
        let debits = vec![entry(1, 100, AchTransactionCode::CheckingDebit)];
        let credits = vec![entry(1, 100, AchTransactionCode::SavingsCredit)];
        let mixed = vec![
            entry(1, 100, AchTransactionCode::CheckingDebit),
            entry(2, 100, AchTransactionCode::CheckingCredit),
        ];
        assert_eq!(service_class_code(&debits), "225");
        assert_eq!(service_class_code(&credits), "220");
        assert_eq!(service_class_code(&mixed), "200");
    }

    #[test]
    fn unsealed_entry_without_trace_is_rejected() {
        let mut bad = entry(1, 100, AchTransactionCode::CheckingDebit);
        bad.trace_number = None;
        let entries = vec![bad];
        let result = build_file(
            &originator(),
            &batch(&entries),
            &entries,
            NaiveDate::from_ymd_opt(2025, 3, 13).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        );
        assert!(result.is_err());
    }
}
