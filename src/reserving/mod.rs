//! Reserve estimation from development triangles
//!
//! - **Chain ladder**: volume-weighted age-to-age factors, projection to
//!   ultimate, IBNR per origin and in total
//! - **Mack**: standard error of the chain-ladder IBNR
//! - **Stores**: historical IBNR series keyed by valuation period and line of business
//!
//! # Example
//!
//! ```rust,ignore
//! use claims_reserving::reserving::{ChainLadder, ChainLadderConfig};
//! use claims_reserving::triangle::TriangleBuilder;
//! use claims_reserving::period::{Grain, Period};
//!
//! let triangle = TriangleBuilder::new(1, Grain::Year, Period::year_start(2021)).build(&records)?;
//! let estimate = ChainLadder::new(ChainLadderConfig::default()).project(&triangle)?;
//! println!("IBNR: {:.2}", estimate.ibnr_total);
//! ```

mod chain_ladder;
mod estimate;
mod mack;
pub mod store;

pub use chain_ladder::{
    ChainLadder, ChainLadderConfig, DevelopmentFactor, DEFAULT_TAIL_FACTOR, ZERO_VOLUME_TOLERANCE,
};
pub use estimate::{OriginEstimate, ReserveEstimate};
pub use mack::{mack_std_err, MackStdErr, SigmaInterpolation};
pub use store::{CsvStore, IbnrRecord, MemoryStore};

use crate::error::Result;

/// Durable storage for the historical IBNR series
///
/// Implementations key rows by `(valuation_period, line_of_business)`;
/// writing an existing key replaces it.
pub trait ResultSink {
    /// Insert or replace one row
    fn upsert(&mut self, record: IbnrRecord) -> Result<()>;

    /// Insert or replace several rows
    fn upsert_all(&mut self, records: &[IbnrRecord]) -> Result<()> {
        for record in records {
            self.upsert(*record)?;
        }
        Ok(())
    }

    /// All rows, ordered by line of business then valuation period
    fn history(&self) -> Result<Vec<IbnrRecord>>;
}
