//! Build payment records from raw claim headers and paid-event tables
//!
//! The raw extract comes as two files: `claims.csv` with one row per claim
//! (accident date, accident month index, reporting month) and `paid.csv` with
//! one row per payment event (event month index, amount). Month indices are
//! on a common scale, so the event period is the accident period shifted by
//! `EventMonth - AccMonth` months.

use super::PaymentRecord;
use crate::error::{ReservingError, Result};
use crate::period::Period;
use csv::Reader;
use log::{info, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// One claim from the raw claims table
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimHeader {
    pub claim_id: u64,
    pub line_of_business: u32,
    pub accident_period: Period,
    /// Accident month on the extract's month-index scale
    pub accident_month: i64,
    /// Whether the claim has been reported; unreported claims carry no payments
    pub reported: bool,
}

/// One payment event from the raw paid table
#[derive(Debug, Clone, PartialEq)]
pub struct PaidEvent {
    pub claim_id: u64,
    pub event_id: u64,
    /// Event month on the extract's month-index scale
    pub event_month: i64,
    pub paid: f64,
}

#[derive(Debug, Deserialize)]
struct ClaimRow {
    #[serde(rename = "Id")]
    id: u64,
    #[serde(rename = "Type")]
    line_of_business: u32,
    #[serde(rename = "AccDate")]
    accident_date: String,
    #[serde(rename = "AccMonth")]
    accident_month: i64,
    #[serde(rename = "RepMonth", default)]
    reporting_month: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaidRow {
    #[serde(rename = "Id")]
    id: u64,
    #[serde(rename = "EventId")]
    event_id: u64,
    #[serde(rename = "EventMonth")]
    event_month: i64,
    #[serde(rename = "Paid")]
    paid: f64,
}

fn is_reported(reporting_month: &Option<String>) -> bool {
    match reporting_month.as_deref().map(str::trim) {
        None | Some("") => false,
        Some(v) => !v.eq_ignore_ascii_case("na") && !v.eq_ignore_ascii_case("nan"),
    }
}

pub fn load_claim_headers<P: AsRef<Path>>(path: P) -> Result<Vec<ClaimHeader>> {
    load_claim_headers_from_reader(std::fs::File::open(path)?)
}

pub fn load_claim_headers_from_reader<R: Read>(reader: R) -> Result<Vec<ClaimHeader>> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut claims = Vec::new();

    for (index, result) in csv_reader.deserialize().enumerate() {
        let row: ClaimRow = result.map_err(|e| ReservingError::from_csv_row(e, index + 1))?;
        let accident_period: Period =
            row.accident_date
                .parse()
                .map_err(|_| ReservingError::InvalidRecord {
                    row: index + 1,
                    reason: format!("invalid AccDate '{}'", row.accident_date),
                })?;

        claims.push(ClaimHeader {
            claim_id: row.id,
            line_of_business: row.line_of_business,
            accident_period,
            accident_month: row.accident_month,
            reported: is_reported(&row.reporting_month),
        });
    }

    Ok(claims)
}

pub fn load_paid_events<P: AsRef<Path>>(path: P) -> Result<Vec<PaidEvent>> {
    load_paid_events_from_reader(std::fs::File::open(path)?)
}

pub fn load_paid_events_from_reader<R: Read>(reader: R) -> Result<Vec<PaidEvent>> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut events = Vec::new();

    for (index, result) in csv_reader.deserialize().enumerate() {
        let row: PaidRow = result.map_err(|e| ReservingError::from_csv_row(e, index + 1))?;
        events.push(PaidEvent {
            claim_id: row.id,
            event_id: row.event_id,
            event_month: row.event_month,
            paid: row.paid,
        });
    }

    Ok(events)
}

/// Join reported claims with their payment events, ordered by event period
pub fn join_claims_and_payments(claims: &[ClaimHeader], paid: &[PaidEvent]) -> Vec<PaymentRecord> {
    let reported: HashMap<u64, &ClaimHeader> = claims
        .iter()
        .filter(|c| c.reported)
        .map(|c| (c.claim_id, c))
        .collect();

    let mut skipped = 0usize;
    let mut records: Vec<PaymentRecord> = paid
        .iter()
        .filter_map(|event| match reported.get(&event.claim_id) {
            Some(claim) => {
                let delay = event.event_month - claim.accident_month;
                Some(PaymentRecord {
                    claim_id: claim.claim_id,
                    line_of_business: claim.line_of_business,
                    origin_period: claim.accident_period,
                    event_period: claim.accident_period.add_months(delay),
                    amount: event.paid,
                })
            }
            None => {
                skipped += 1;
                None
            }
        })
        .collect();

    if skipped > 0 {
        warn!("Skipped {} payment events with no reported claim", skipped);
    }

    records.sort_by_key(|r| r.event_period);
    info!(
        "Prepared {} payment records from {} claims",
        records.len(),
        reported.len()
    );
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const CLAIMS: &str = "\
Id,Type,AccDate,AccYear,AccMonth,RepMonth
1,1,2019-11-14,2019,83,84
2,1,2020-02-03,2020,86,
3,2,2020-03-30,2020,87,NA
4,2,2020-05-09,2020,89,90
";

    const PAID: &str = "\
Id,EventId,EventMonth,Paid,PayInd,OpenInd
1,1,85,100.0,1,1
1,2,96,50.0,1,0
2,1,87,75.0,1,0
4,1,89,-5.0,1,1
9,1,90,10.0,1,0
";

    #[test]
    fn test_bad_numeric_field_is_data_error() {
        let claims = "Id,Type,AccDate,AccMonth,RepMonth\n1,1,2019-11-14,83,84\n2,1,2020-02-03,soon,87\n";
        let err = load_claim_headers_from_reader(claims.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataIntegrity);
        assert!(matches!(err, ReservingError::InvalidRecord { row: 2, .. }));

        let paid = "Id,EventId,EventMonth,Paid\n1,1,85,lots\n";
        let err = load_paid_events_from_reader(paid.as_bytes()).unwrap_err();
        assert!(matches!(err, ReservingError::InvalidRecord { row: 1, .. }));
    }

    #[test]
    fn test_ragged_paid_row_is_data_error() {
        let paid = "Id,EventId,EventMonth,Paid\n1,1,85,10.0\n1,2\n";
        let err = load_paid_events_from_reader(paid.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataIntegrity);
        assert_eq!(err.to_string(), "invalid record at row 2: expected 4 fields, found 2");
    }

    #[test]
    fn test_join_claims_and_payments() {
        let claims = load_claim_headers_from_reader(CLAIMS.as_bytes()).unwrap();
        let paid = load_paid_events_from_reader(PAID.as_bytes()).unwrap();

        assert_eq!(claims.len(), 4);
        assert!(claims[0].reported);
        assert!(!claims[1].reported);
        assert!(!claims[2].reported);

        let records = join_claims_and_payments(&claims, &paid);

        // Claim 2 is unreported and claim 9 is unknown
        assert_eq!(records.len(), 3);

        // Sorted by event period
        assert_eq!(records[0].claim_id, 1);
        assert_eq!(records[0].event_period, Period::new(2020, 1).unwrap());
        assert_eq!(records[1].claim_id, 4);
        assert_eq!(records[1].event_period, Period::new(2020, 5).unwrap());
        assert_eq!(records[2].claim_id, 1);
        assert_eq!(records[2].event_period, Period::new(2020, 12).unwrap());
        assert_eq!(records[2].origin_period, Period::new(2019, 11).unwrap());
    }
}
