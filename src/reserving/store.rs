//! Historical IBNR series: one row per valuation period and line of business
//!
//! Re-submitting a key replaces the stored value. The CSV store keeps only a
//! path; each operation opens the file, reads or rewrites it, and closes it.

use super::ResultSink;
use crate::error::{ReservingError, Result};
use crate::period::Period;
use csv::{Reader, Writer};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Persisted form of a reserve estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IbnrRecord {
    #[serde(rename = "ValuationPeriod")]
    pub valuation_period: Period,
    #[serde(rename = "Type")]
    pub line_of_business: u32,
    #[serde(rename = "IBNR")]
    pub ibnr: f64,
}

type SeriesKey = (u32, Period);

fn to_series(records: impl IntoIterator<Item = IbnrRecord>) -> BTreeMap<SeriesKey, IbnrRecord> {
    records
        .into_iter()
        .map(|r| ((r.line_of_business, r.valuation_period), r))
        .collect()
}

/// In-memory result sink
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: BTreeMap<SeriesKey, IbnrRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl ResultSink for MemoryStore {
    fn upsert(&mut self, record: IbnrRecord) -> Result<()> {
        self.rows
            .insert((record.line_of_business, record.valuation_period), record);
        Ok(())
    }

    fn history(&self) -> Result<Vec<IbnrRecord>> {
        Ok(self.rows.values().copied().collect())
    }
}

/// Result sink backed by a CSV file (`ValuationPeriod,Type,IBNR`)
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_series(&self) -> Result<BTreeMap<SeriesKey, IbnrRecord>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let mut reader = Reader::from_path(&self.path)?;
        let mut rows = Vec::new();
        for (index, result) in reader.deserialize().enumerate() {
            let row: IbnrRecord = result.map_err(|e| ReservingError::from_csv_row(e, index + 1))?;
            rows.push(row);
        }
        Ok(to_series(rows))
    }

    fn write_series(&self, series: &BTreeMap<SeriesKey, IbnrRecord>) -> Result<()> {
        // Write beside the target and rename, so a failed write leaves the old series intact
        let staging = self.path.with_extension("csv.tmp");
        {
            let mut writer = Writer::from_path(&staging)?;
            for row in series.values() {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        std::fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl ResultSink for CsvStore {
    fn upsert(&mut self, record: IbnrRecord) -> Result<()> {
        self.upsert_all(std::slice::from_ref(&record))
    }

    fn upsert_all(&mut self, records: &[IbnrRecord]) -> Result<()> {
        let mut series = self.read_series()?;
        let before = series.len();
        for record in records {
            series.insert((record.line_of_business, record.valuation_period), *record);
        }
        self.write_series(&series)?;

        debug!(
            "Upserted {} IBNR rows into {} ({} new)",
            records.len(),
            self.path.display(),
            series.len() - before
        );
        Ok(())
    }

    fn history(&self) -> Result<Vec<IbnrRecord>> {
        let series = self.read_series()?;
        info!("Read {} IBNR rows from {}", series.len(), self.path.display());
        Ok(series.into_values().collect())
    }
}
