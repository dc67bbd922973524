//! Error types shared by the triangle builder, projector and record sources

use crate::period::Period;
use thiserror::Error;

/// Broad classification of a [`ReservingError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input: negative lag, missing field, unparseable period
    DataIntegrity,
    /// Filters left nothing to triangulate
    EmptyInput,
    /// A development factor or standard error could not be computed
    Computation,
    /// Failure in a file-backed record source or result sink
    Io,
}

#[derive(Debug, Error)]
pub enum ReservingError {
    #[error("claim {claim_id}: event period {event} is before origin period {origin}")]
    NegativeLag {
        claim_id: u64,
        origin: Period,
        event: Period,
    },

    #[error("invalid record at row {row}: {reason}")]
    InvalidRecord { row: usize, reason: String },

    #[error("unparseable period '{0}'")]
    InvalidPeriod(String),

    #[error("no payment records for line of business {line_of_business} up to {cutoff}")]
    EmptyInput { line_of_business: u32, cutoff: Period },

    #[error("zero volume for development factor {from_lag}->{to_lag}")]
    ZeroVolume { from_lag: usize, to_lag: usize },

    #[error("at least two origin periods with data are required, found {found}")]
    InsufficientOrigins { found: usize },

    #[error("projected cumulative for origin {origin} at lag {lag} is zero")]
    ZeroProjection { origin: String, lag: usize },

    #[error("tail factor must be finite and positive, got {0}")]
    InvalidTailFactor(f64),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReservingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReservingError::NegativeLag { .. }
            | ReservingError::InvalidRecord { .. }
            | ReservingError::InvalidPeriod(_) => ErrorKind::DataIntegrity,
            ReservingError::EmptyInput { .. } => ErrorKind::EmptyInput,
            ReservingError::ZeroVolume { .. }
            | ReservingError::InsufficientOrigins { .. }
            | ReservingError::ZeroProjection { .. }
            | ReservingError::InvalidTailFactor(_) => ErrorKind::Computation,
            ReservingError::Csv(_) | ReservingError::Io(_) => ErrorKind::Io,
        }
    }

    /// Classify an error raised while reading CSV row `row` (1-based, header excluded).
    ///
    /// Malformed rows become [`ReservingError::InvalidRecord`]; the position
    /// reported by the reader wins over `row` when present. Read failures stay I/O.
    pub(crate) fn from_csv_row(err: csv::Error, row: usize) -> Self {
        if err.is_io_error() {
            return ReservingError::Csv(err);
        }

        let row = err
            .position()
            .map(|pos| pos.record() as usize)
            .filter(|&record| record > 0)
            .unwrap_or(row);
        let reason = match err.kind() {
            csv::ErrorKind::UnequalLengths {
                expected_len, len, ..
            } => format!("expected {} fields, found {}", expected_len, len),
            csv::ErrorKind::Utf8 { err, .. } => format!("invalid UTF-8: {}", err),
            csv::ErrorKind::Deserialize { err, .. } => err.to_string(),
            _ => err.to_string(),
        };
        ReservingError::InvalidRecord { row, reason }
    }
}

pub type Result<T> = std::result::Result<T, ReservingError>;
