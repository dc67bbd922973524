//! Load and save payment records in the claims snapshot CSV layout
//!
//! Columns: `Id,Type,AccidentDt,Paid,EventDt`. Any further columns (the
//! `AccidentYr`, `EventYr`, `MovementDelay` helpers written by [`write_payments`])
//! are ignored on load.

use super::PaymentRecord;
use crate::error::{ReservingError, Result};
use crate::period::{Grain, Period};
use csv::{Reader, Writer};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;

/// Raw CSV row; every field optional so missing values can be reported per row
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Id")]
    id: Option<String>,
    #[serde(rename = "Type")]
    line_of_business: Option<String>,
    #[serde(rename = "AccidentDt")]
    accident_date: Option<String>,
    #[serde(rename = "Paid")]
    paid: Option<String>,
    #[serde(rename = "EventDt")]
    event_date: Option<String>,
}

fn required<'a>(value: &'a Option<String>, column: &str, row: usize) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ReservingError::InvalidRecord {
            row,
            reason: format!("missing {}", column),
        }),
    }
}

impl CsvRow {
    fn to_record(&self, row: usize) -> Result<PaymentRecord> {
        let invalid = |column: &str, value: &str| ReservingError::InvalidRecord {
            row,
            reason: format!("invalid {} '{}'", column, value),
        };

        let id = required(&self.id, "Id", row)?;
        let claim_id: u64 = id.parse().map_err(|_| invalid("Id", id))?;

        let lob = required(&self.line_of_business, "Type", row)?;
        let line_of_business: u32 = lob.parse().map_err(|_| invalid("Type", lob))?;

        let accident = required(&self.accident_date, "AccidentDt", row)?;
        let origin_period: Period = accident.parse().map_err(|_| invalid("AccidentDt", accident))?;

        let event = required(&self.event_date, "EventDt", row)?;
        let event_period: Period = event.parse().map_err(|_| invalid("EventDt", event))?;

        let paid = required(&self.paid, "Paid", row)?;
        let amount: f64 = paid.parse().map_err(|_| invalid("Paid", paid))?;
        if !amount.is_finite() {
            return Err(invalid("Paid", paid));
        }

        Ok(PaymentRecord {
            claim_id,
            line_of_business,
            origin_period,
            event_period,
            amount,
        })
    }
}

/// Row written by [`write_payments`], with yearly helper columns
#[derive(Debug, Serialize)]
struct OutputRow {
    #[serde(rename = "Id")]
    id: u64,
    #[serde(rename = "Type")]
    line_of_business: u32,
    #[serde(rename = "AccidentDt")]
    accident_date: Period,
    #[serde(rename = "Paid")]
    paid: f64,
    #[serde(rename = "EventDt")]
    event_date: Period,
    #[serde(rename = "AccidentYr")]
    accident_year: i32,
    #[serde(rename = "EventYr")]
    event_year: i32,
    #[serde(rename = "MovementDelay")]
    movement_delay: i64,
}

impl From<&PaymentRecord> for OutputRow {
    fn from(record: &PaymentRecord) -> Self {
        Self {
            id: record.claim_id,
            line_of_business: record.line_of_business,
            accident_date: record.origin_period,
            paid: record.amount,
            event_date: record.event_period,
            accident_year: record.origin_period.year(),
            event_year: record.event_period.year(),
            movement_delay: record.lag(Grain::Year),
        }
    }
}

/// Load all payment records from a CSV file
pub fn load_payments<P: AsRef<Path>>(path: P) -> Result<Vec<PaymentRecord>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let records = load_payments_from_reader(file)?;
    info!("Loaded {} payment records from {}", records.len(), path.display());
    Ok(records)
}

/// Load payment records from any reader (e.g., string buffer, request body)
pub fn load_payments_from_reader<R: Read>(reader: R) -> Result<Vec<PaymentRecord>> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut records = Vec::new();

    for (index, result) in csv_reader.deserialize().enumerate() {
        let row: CsvRow = result.map_err(|e| ReservingError::from_csv_row(e, index + 1))?;
        records.push(row.to_record(index + 1)?);
    }

    debug!("Parsed {} payment rows", records.len());
    Ok(records)
}

/// Write payment records to a CSV file
pub fn write_payments<P: AsRef<Path>>(path: P, records: &[PaymentRecord]) -> Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)?;
    write_payments_to_writer(file, records)?;
    info!("Wrote {} payment records to {}", records.len(), path.display());
    Ok(())
}

pub fn write_payments_to_writer<W: Write>(writer: W, records: &[PaymentRecord]) -> Result<()> {
    let mut csv_writer = Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(OutputRow::from(record))?;
    }
    csv_writer.flush()?;
    Ok(())
}
