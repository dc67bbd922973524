//! Volume-weighted chain-ladder projection
//!
//! For each adjacent lag pair `(L, L+1)` the development factor is
//!
//! ```text
//! f(L) = Σ cum[o, L+1] / Σ cum[o, L]
//! ```
//!
//! over the origins that have reached lag `L+1`. Each origin's latest
//! cumulative amount is rolled forward through the factors it has not yet
//! developed through, then multiplied by the tail factor. The whole thing is
//! closed form; nothing is fitted iteratively.

use super::{OriginEstimate, ReserveEstimate};
use crate::error::{ReservingError, Result};
use crate::triangle::Triangle;
use log::debug;
use serde::{Deserialize, Serialize};

/// Tail factor used when none is configured (no development past the last lag)
pub const DEFAULT_TAIL_FACTOR: f64 = 1.0;

/// A factor denominator within this fraction of the summed absolute volume is zero
pub const ZERO_VOLUME_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainLadderConfig {
    /// Multiplier for development beyond the last observed lag
    pub tail_factor: f64,
}

impl Default for ChainLadderConfig {
    fn default() -> Self {
        Self {
            tail_factor: DEFAULT_TAIL_FACTOR,
        }
    }
}

/// Age-to-age factor for one lag pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DevelopmentFactor {
    pub from_lag: usize,
    pub to_lag: usize,
    pub factor: f64,
    /// Denominator: summed cumulative amount at `from_lag`
    pub volume: f64,
    /// Number of origins contributing to this factor
    pub n_origins: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ChainLadder {
    config: ChainLadderConfig,
}

impl ChainLadder {
    pub fn new(config: ChainLadderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChainLadderConfig {
        &self.config
    }

    /// Volume-weighted factors for every adjacent lag pair of the triangle
    pub fn development_factors(&self, triangle: &Triangle) -> Result<Vec<DevelopmentFactor>> {
        let cumulative = triangle.cumulative();

        (0..triangle.max_lag())
            .map(|from_lag| {
                let to_lag = from_lag + 1;
                let mut numerator = 0.0;
                let mut volume = 0.0;
                let mut gross = 0.0;
                let mut n_origins = 0;

                for (row, cum) in cumulative.iter().enumerate() {
                    if triangle.is_observed(row, to_lag) {
                        numerator += cum[to_lag];
                        volume += cum[from_lag];
                        gross += cum[from_lag].abs();
                        n_origins += 1;
                    }
                }

                // Offsetting recoveries can cancel to rounding noise rather than exact zero
                if n_origins == 0 || volume.abs() <= ZERO_VOLUME_TOLERANCE * gross {
                    return Err(ReservingError::ZeroVolume { from_lag, to_lag });
                }
                let factor = numerator / volume;
                if !factor.is_finite() {
                    return Err(ReservingError::ZeroVolume { from_lag, to_lag });
                }

                Ok(DevelopmentFactor {
                    from_lag,
                    to_lag,
                    factor,
                    volume,
                    n_origins,
                })
            })
            .collect()
    }

    /// Project every origin to ultimate and total the IBNR
    pub fn project(&self, triangle: &Triangle) -> Result<ReserveEstimate> {
        let tail = self.config.tail_factor;
        if !tail.is_finite() || tail <= 0.0 {
            return Err(ReservingError::InvalidTailFactor(tail));
        }

        let factors = self.development_factors(triangle)?;
        let latest = triangle.latest_diagonal();
        let labels = triangle.origin_labels();

        let origins: Vec<OriginEstimate> = triangle
            .origins()
            .iter()
            .zip(labels)
            .enumerate()
            .map(|(row, (origin, label))| {
                let latest_lag = triangle.latest_lag(row);
                let cdf_to_ultimate = factors[latest_lag..]
                    .iter()
                    .map(|f| f.factor)
                    .product::<f64>()
                    * tail;
                let ultimate = latest[row] * cdf_to_ultimate;

                OriginEstimate {
                    origin: *origin,
                    label,
                    latest_lag,
                    latest: latest[row],
                    cdf_to_ultimate,
                    ultimate,
                    ibnr: ultimate - latest[row],
                    std_err: None,
                }
            })
            .collect();

        let ibnr_total: f64 = origins.iter().map(|o| o.ibnr).sum();

        debug!(
            "Chain ladder for line {} at {}: {} factors, IBNR {:.2}",
            triangle.line_of_business(),
            triangle.cutoff(),
            factors.len(),
            ibnr_total
        );

        Ok(ReserveEstimate {
            valuation_period: triangle.cutoff(),
            line_of_business: triangle.line_of_business(),
            grain: triangle.grain(),
            ibnr_total,
            development_factors: factors.iter().map(|f| f.factor).collect(),
            tail_factor: tail,
            origins,
            total_std_err: None,
        })
    }
}
