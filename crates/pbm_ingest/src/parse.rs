//! Row parsing: turns one CSV record into an [`IngestedClaim`], resolving
//! columns by name so column order is never assumed.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use csv::StringRecord;
use rust_decimal::Decimal;

use pbm_protocol::{ClaimNumber, ClaimRequest, IngestedClaim, TransactionType};

use crate::discover::IngestError;

const REQUIRED_COLUMNS: &[&str] = &[
    "member_id",
    "pharmacy_id",
    "ndc",
    "quantity_dispensed",
    "days_supply",
    "refill_number",
    "date_of_service",
    "ingredient_cost_submitted",
    "dispensing_fee_submitted",
];

/// A per-row parse failure. Counted and logged by the caller; never
/// propagated as a fatal error (it does not implement `std::error::Error`
/// on purpose, matching the spec's "non-fatal, counted" taxonomy entry).
#[derive(Debug, Clone)]
pub struct ParseWarning(pub String);

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn warn(msg: impl Into<String>) -> ParseWarning {
    ParseWarning(msg.into())
}

/// Builds a column-name -> index map from the file's header row, failing
/// fast (fatal for the whole file) if a required column is absent.
pub fn header_index(
    reader: &mut csv::Reader<std::fs::File>,
    path: &Path,
) -> Result<HashMap<String, usize>, IngestError> {
    let headers = reader
        .headers()
        .map_err(|err| IngestError::Csv { file: path.to_path_buf(), source: err })?;
    let index: HashMap<String, usize> =
        headers.iter().enumerate().map(|(i, name)| (name.trim().to_string(), i)).collect();

    for column in REQUIRED_COLUMNS {
        if !index.contains_key(*column) {
            return Err(IngestError::MissingColumn { file: path.to_path_buf(), column });
        }
    }
    Ok(index)
}

fn cell<'a>(record: &'a StringRecord, index: &HashMap<String, usize>, column: &str) -> Option<&'a str> {
    index.get(column).and_then(|&i| record.get(i)).map(str::trim)
}

fn required_cell<'a>(
    record: &'a StringRecord,
    index: &HashMap<String, usize>,
    column: &str,
) -> Result<&'a str, ParseWarning> {
    match cell(record, index, column) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(warn(format!("missing required column `{column}`"))),
    }
}

fn optional_cell<'a>(record: &'a StringRecord, index: &HashMap<String, usize>, column: &str) -> Option<&'a str> {
    cell(record, index, column).filter(|v| !v.is_empty())
}

/// Parses a `member_id` cell that is either purely numeric or a prefixed
/// string form (`MBR000466742`): an alphabetic prefix is stripped and the
/// numeric remainder is parsed.
fn parse_member_id(raw: &str) -> Result<u64, ParseWarning> {
    if let Ok(n) = u64::from_str(raw) {
        return Ok(n);
    }
    let digits = raw.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    u64::from_str(digits).map_err(|_| warn(format!("unparseable member_id `{raw}`")))
}

fn parse_decimal(raw: &str, field: &'static str) -> Result<Decimal, ParseWarning> {
    Decimal::from_str(raw).map_err(|_| warn(format!("unparseable {field} `{raw}`")))
}

/// Monetary cell: fixed-point with 2 fractional digits (spec.md §3.1).
/// Rounds rather than rejecting extra precision, since the source CSVs are
/// generated rather than hand-entered and sub-cent noise is not a row-level
/// parse failure.
fn parse_money(raw: &str, field: &'static str) -> Result<Decimal, ParseWarning> {
    Ok(parse_decimal(raw, field)?.round_dp(2))
}

/// Quantity cell: fixed-point with up to 3 fractional digits (spec.md §3.1).
fn parse_quantity(raw: &str) -> Result<Decimal, ParseWarning> {
    Ok(parse_decimal(raw, "quantity_dispensed")?.round_dp(3))
}

fn generate_claim_number() -> ClaimNumber {
    ClaimNumber::new(format!("CLM-{}", uuid::Uuid::new_v4().simple()))
        .expect("generated claim numbers are always well-formed")
}

pub fn parse_row(
    record: &StringRecord,
    index: &HashMap<String, usize>,
    ingest_time: DateTime<Utc>,
) -> Result<IngestedClaim, ParseWarning> {
    let member_id = parse_member_id(required_cell(record, index, "member_id")?)?;
    let pharmacy_id = parse_member_id(required_cell(record, index, "pharmacy_id")?)?;

    let ndc = required_cell(record, index, "ndc")?.to_string();
    if ndc.len() != 11 {
        return Err(warn(format!("ndc must be 11 characters, got `{ndc}`")));
    }

    let quantity_dispensed = parse_quantity(required_cell(record, index, "quantity_dispensed")?)?;
    let days_supply: i32 = required_cell(record, index, "days_supply")?
        .parse()
        .map_err(|_| warn("unparseable days_supply"))?;
    let refill_number: i32 = required_cell(record, index, "refill_number")?
        .parse()
        .map_err(|_| warn("unparseable refill_number"))?;

    let date_of_service = NaiveDate::parse_from_str(required_cell(record, index, "date_of_service")?, "%Y-%m-%d")
        .map_err(|_| warn("unparseable date_of_service, expected YYYY-MM-DD"))?;

    let ingredient_cost_submitted =
        parse_money(required_cell(record, index, "ingredient_cost_submitted")?, "ingredient_cost_submitted")?;
    let dispensing_fee_submitted =
        parse_money(required_cell(record, index, "dispensing_fee_submitted")?, "dispensing_fee_submitted")?;

    let daw_code = optional_cell(record, index, "daw_code").map(str::to_string);
    let prescriber_npi = optional_cell(record, index, "prescriber_npi").map(str::to_string);

    let transaction_type = match optional_cell(record, index, "transaction_type") {
        Some(raw) => {
            TransactionType::parse(raw).ok_or_else(|| warn(format!("unrecognized transaction_type `{raw}`")))?
        }
        None => TransactionType::default(),
    };

    let claim_number = match optional_cell(record, index, "claim_number") {
        Some(raw) => ClaimNumber::new(raw).map_err(|err| warn(err.to_string()))?,
        None => generate_claim_number(),
    };

    let received_timestamp = match optional_cell(record, index, "received_timestamp") {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| warn(format!("unparseable received_timestamp `{raw}`")))?,
        None => ingest_time,
    };

    let request = ClaimRequest {
        member_id,
        pharmacy_id,
        ndc,
        quantity_dispensed,
        days_supply,
        refill_number,
        date_of_service,
        ingredient_cost_submitted,
        dispensing_fee_submitted,
        daw_code,
        prescriber_npi,
        transaction_type,
    };

    if !request.is_valid() {
        return Err(warn("row parsed but failed request validation"));
    }

    Ok(IngestedClaim { claim_number, received_timestamp, request })
}
