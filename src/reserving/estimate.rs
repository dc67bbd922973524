//! Reserve estimate produced by projecting a triangle

use crate::period::{Grain, Period};
use crate::reserving::store::IbnrRecord;
use serde::{Deserialize, Serialize};

/// Projection detail for one origin period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginEstimate {
    /// Origin period (start of its grain bucket)
    pub origin: Period,

    /// Origin label at the triangle's grain
    pub label: String,

    /// Latest observed development lag
    pub latest_lag: usize,

    /// Cumulative amount at the latest observed lag
    pub latest: f64,

    /// Product of remaining development factors and the tail
    pub cdf_to_ultimate: f64,

    /// Projected ultimate cumulative amount
    pub ultimate: f64,

    /// `ultimate - latest`
    pub ibnr: f64,

    /// Mack standard error of the IBNR, when requested
    pub std_err: Option<f64>,
}

/// Chain-ladder reserve estimate for one line of business at one valuation cutoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveEstimate {
    /// Cutoff used to build the source triangle
    pub valuation_period: Period,

    pub line_of_business: u32,

    pub grain: Grain,

    /// Sum of ultimates minus sum of latest cumulative amounts
    pub ibnr_total: f64,

    /// Volume-weighted age-to-age factors, one per adjacent lag pair
    pub development_factors: Vec<f64>,

    /// Factor applied beyond the last development lag
    pub tail_factor: f64,

    /// Per-origin detail, in origin order
    pub origins: Vec<OriginEstimate>,

    /// Mack standard error of the total IBNR, when requested
    pub total_std_err: Option<f64>,
}

impl ReserveEstimate {
    pub fn latest_total(&self) -> f64 {
        self.origins.iter().map(|o| o.latest).sum()
    }

    pub fn ultimate_total(&self) -> f64 {
        self.origins.iter().map(|o| o.ultimate).sum()
    }

    /// Row for the historical IBNR series
    pub fn to_record(&self) -> IbnrRecord {
        IbnrRecord {
            valuation_period: self.valuation_period,
            line_of_business: self.line_of_business,
            ibnr: self.ibnr_total,
        }
    }
}
