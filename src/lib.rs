//! Claims Reserving - development triangles and chain-ladder IBNR estimates
//!
//! This library provides:
//! - Payment record sources (claims snapshot CSV, raw claims/paid extracts)
//! - Valuation data roll-forward and reconciliation
//! - Triangle aggregation by origin period and development lag (month, quarter, year)
//! - Volume-weighted chain-ladder projection with optional tail factor
//! - Mack standard errors and a historical IBNR series store

pub mod error;
pub mod period;
pub mod claims;
pub mod triangle;
pub mod reserving;
pub mod valuation;

// Re-export commonly used types
pub use error::{ErrorKind, ReservingError, Result};
pub use period::{Grain, Period};
pub use claims::PaymentRecord;
pub use triangle::{Triangle, TriangleBuilder};
pub use reserving::{ChainLadder, ChainLadderConfig, ReserveEstimate, ResultSink};
pub use valuation::{Valuation, ValuationConfig, ValuationRunner};
