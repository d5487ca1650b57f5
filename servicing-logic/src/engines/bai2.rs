use chrono::NaiveDate;
use servicing_api::domain::{BankTxnType, Minor};
use servicing_api::{ServicingError, ServicingResult};

/// One `16` transaction record with its account context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBankTxn {
    pub account_number: String,
    pub posted_date: Option<NaiveDate>,
    pub amount_minor: Minor,
    pub txn_type: BankTxnType,
    pub bank_ref: String,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedStatement {
    pub sender: Option<String>,
    pub txns: Vec<ParsedBankTxn>,
}

/// Parse a BAI2 statement (record codes 01/02/03/16/88/49/98/99).
///
/// `03` sets the current account; `16` records carry
/// `typeCode, amountCents, reference, description, date?`. Amounts are
/// already minor units and are stored unsigned; the direction comes from
/// the type code's first digit (1|2 credit, 4|5 debit, 6 fee, 7 return,
/// anything else credit). `88` continues the previous record's
/// description.
pub fn parse(input: &str) -> ServicingResult<ParsedStatement> {
    let mut statement = ParsedStatement::default();
    let mut current_account: Option<String> = None;

    for (line_no, raw_line) in input.lines().enumerate() {
        let line_no = line_no + 1;
        let line = raw_line.trim().trim_end_matches('/');
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();

        match fields[0] {
            "01" => {
                statement.sender = fields.get(1).map(|s| s.to_string());
            }
            "02" | "49" | "98" | "99" => {
                // group/trailer records carry control totals we do not
                // reconcile against here
            }
            "03" => {
                let account = fields.get(1).filter(|s| !s.is_empty()).ok_or_else(|| {
                    ServicingError::StatementParse {
                        line: line_no,
                        message: "03 record missing account number".to_string(),
                    }
                })?;
                current_account = Some(account.to_string());
            }
            "16" => {
                let account =
                    current_account
                        .clone()
                        .ok_or_else(|| ServicingError::StatementParse {
                            line: line_no,
                            message: "16 record before any 03 account record".to_string(),
                        })?;
                let txn = parse_txn_record(&fields, account, line_no)?;
                statement.txns.push(txn);
            }
            "88" => {
                let continuation = fields[1..].join(",");
                match statement.txns.last_mut() {
                    Some(txn) => {
                        if !txn.description.is_empty() {
                            txn.description.push(' ');
                        }
                        txn.description.push_str(continuation.trim());
                    }
                    None => {
                        return Err(ServicingError::StatementParse {
                            line: line_no,
                            message: "88 continuation with no preceding 16 record".to_string(),
                        })
                    }
                }
            }
            other => {
                return Err(ServicingError::StatementParse {
                    line: line_no,
                    message: format!("unknown record code {other}"),
                })
            }
        }
    }

    Ok(statement)
}

fn parse_txn_record(
    fields: &[&str],
    account: String,
    line_no: usize,
) -> ServicingResult<ParsedBankTxn> {
    let type_code = fields.get(1).copied().unwrap_or_default();
    if type_code.is_empty() {
        return Err(ServicingError::StatementParse {
            line: line_no,
            message: "16 record missing type code".to_string(),
        });
    }

    let amount_raw: i64 = fields
        .get(2)
        .copied()
        .unwrap_or_default()
        .parse()
        .map_err(|_| ServicingError::StatementParse {
            line: line_no,
            message: format!("unparseable amount {:?}", fields.get(2).copied().unwrap_or("")),
        })?;

    let bank_ref = fields.get(3).copied().unwrap_or_default().to_string();
    let description = fields.get(4).copied().unwrap_or_default().to_string();
    let posted_date = match fields.get(5).copied().filter(|s| !s.is_empty()) {
        Some(date_str) => Some(parse_yymmdd(date_str, line_no)?),
        None => None,
    };

    Ok(ParsedBankTxn {
        account_number: account,
        posted_date,
        // amounts arrive already in minor units; direction comes from
        // the type code, not the sign
        amount_minor: amount_raw.abs(),
        txn_type: txn_type_for(type_code),
        bank_ref,
        description,
    })
}

/// Type-code first digit map: 1|2 credit, 4|5 debit, 6 fee, 7 return.
fn txn_type_for(type_code: &str) -> BankTxnType {
    match type_code.as_bytes().first() {
        Some(b'1') | Some(b'2') => BankTxnType::Credit,
        Some(b'4') | Some(b'5') => BankTxnType::Debit,
        Some(b'6') => BankTxnType::Fee,
        Some(b'7') => BankTxnType::Return,
        _ => BankTxnType::Credit,
    }
}

/// BAI2 `YYMMDD` with a century pivot: YY < 50 ⇒ 20YY, else 19YY.
fn parse_yymmdd(s: &str, line_no: usize) -> ServicingResult<NaiveDate> {
    let parse_err = || ServicingError::StatementParse {
        line: line_no,
        message: format!("invalid YYMMDD date {s:?}"),
    };
    if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(parse_err());
    }
    let yy: i32 = s[0..2].parse().map_err(|_| parse_err())?;
    let mm: u32 = s[2..4].parse().map_err(|_| parse_err())?;
    let dd: u32 = s[4..6].parse().map_err(|_| parse_err())?;
    let year = if yy < 50 { 2000 + yy } else { 1900 + yy };
    NaiveDate::from_ymd_opt(year, mm, dd).ok_or_else(parse_err)
}
