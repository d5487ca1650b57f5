use chrono::NaiveDate;
use servicing_api::domain::{decimal_str_to_minor, BankTxnType, Minor, RoundingMode};
use servicing_api::{ServicingError, ServicingResult};

/// One `<Ntry>` booking entry from an ISO 20022 CAMT.053 statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    pub amount_minor: Minor,
    pub txn_type: BankTxnType,
    pub booking_date: Option<NaiveDate>,
    pub value_date: Option<NaiveDate>,
    pub acct_svcr_ref: String,
    pub additional_info: String,
}

/// Extract every `<Ntry>` block and its booking fields. The document is
/// treated as a stream of tagged blocks; namespace prefixes and
/// attributes on tags are tolerated.
pub fn parse(input: &str) -> ServicingResult<Vec<ParsedEntry>> {
    let mut entries = Vec::new();

    for (idx, block) in blocks(input, "Ntry").into_iter().enumerate() {
        let amount_str = text(block, "Amt").ok_or_else(|| ServicingError::StatementParse {
            line: idx + 1,
            message: "Ntry missing Amt".to_string(),
        })?;
        let amount_minor = decimal_str_to_minor(&amount_str, RoundingMode::HalfAwayFromZero)
            .map_err(|e| ServicingError::StatementParse {
                line: idx + 1,
                message: format!("Ntry amount: {e}"),
            })?;

        let indicator = text(block, "CdtDbtInd").unwrap_or_default();
        let txn_type = if indicator == "CRDT" {
            BankTxnType::Credit
        } else {
            BankTxnType::Debit
        };

        let booking_date = date_in(block, "BookgDt");
        let value_date = date_in(block, "ValDt");

        entries.push(ParsedEntry {
            amount_minor: amount_minor.abs(),
            txn_type,
            booking_date,
            value_date,
            acct_svcr_ref: text(block, "AcctSvcrRef").unwrap_or_default(),
            additional_info: text(block, "AddtlNtryInf").unwrap_or_default(),
        });
    }

    Ok(entries)
}

/// All top-level blocks delimited by `<tag ...>` / `</tag>`.
fn blocks<'a>(input: &'a str, tag: &str) -> Vec<&'a str> {
    let open_a = format!("<{tag}>");
    let open_b = format!("<{tag} ");
    let close = format!("</{tag}>");
    let mut found = Vec::new();
    let mut cursor = 0;

    while cursor < input.len() {
        let rest = &input[cursor..];
        let open_at = match (rest.find(&open_a), rest.find(&open_b)) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => break,
        };
        let body_start = match input[cursor + open_at..].find('>') {
            Some(gt) => cursor + open_at + gt + 1,
            None => break,
        };
        let close_at = match input[body_start..].find(&close) {
            Some(c) => body_start + c,
            None => break,
        };
        found.push(&input[body_start..close_at]);
        cursor = close_at + close.len();
    }

    found
}

/// Text content of the first `<tag>` in the block.
fn text(block: &str, tag: &str) -> Option<String> {
    blocks(block, tag)
        .first()
        .map(|inner| inner.trim().to_string())
}

/// `<Dt>` inside a wrapping date element such as `<BookgDt>`.
fn date_in(block: &str, wrapper: &str) -> Option<NaiveDate> {
    let inner = blocks(block, wrapper).first().copied()?;
    let date_text = text(inner, "Dt")?;
    NaiveDate::parse_from_str(&date_text, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Document xmlns="urn:iso:std:iso:20022:tech:xsd:camt.053.001.02">
  <BkToCstmrStmt>
    <Stmt>
      <Ntry>
        <Amt Ccy="USD">1500.00</Amt>
        <CdtDbtInd>CRDT</CdtDbtInd>
        <BookgDt><Dt>2025-03-10</Dt></BookgDt>
        <ValDt><Dt>2025-03-11</Dt></ValDt>
        <AcctSvcrRef>REF-77</AcctSvcrRef>
        <AddtlNtryInf>payment:loan:17:gw:abc</AddtlNtryInf>
      </Ntry>
      <Ntry>
        <Amt Ccy="USD">42.50</Amt>
        <CdtDbtInd>DBIT</CdtDbtInd>
        <BookgDt><Dt>2025-03-12</Dt></BookgDt>
        <AcctSvcrRef>REF-78</AcctSvcrRef>
        <AddtlNtryInf>Analysis fee</AddtlNtryInf>
      </Ntry>
    </Stmt>
  </BkToCstmrStmt>
</Document>"#;

    #[test]
    fn extracts_every_entry_block() {
        let entries = parse(SAMPLE).unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].amount_minor, 150_000);
        assert_eq!(entries[0].txn_type, BankTxnType::Credit);
        assert_eq!(
            entries[0].booking_date,
            NaiveDate::from_ymd_opt(2025, 3, 10)
        );
        assert_eq!(entries[0].value_date, NaiveDate::from_ymd_opt(2025, 3, 11));
        assert_eq!(entries[0].acct_svcr_ref, "REF-77");
        assert_eq!(entries[0].additional_info, "payment:loan:17:gw:abc");

        assert_eq!(entries[1].amount_minor, 4_250);
        assert_eq!(entries[1].txn_type, BankTxnType::Debit);
        assert_eq!(entries[1].value_date, None);
    }

    #[test]
    fn missing_amount_fails() {
        let doc = "<Ntry><CdtDbtInd>CRDT</CdtDbtInd></Ntry>";
        assert!(matches!(
            parse(doc).unwrap_err(),
            ServicingError::StatementParse { .. }
        ));
    }

    #[test]
    fn empty_document_yields_no_entries() {
        assert!(parse("<Document></Document>").unwrap().is_empty());
    }
}
