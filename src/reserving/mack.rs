//! Mack standard errors for the chain-ladder reserve
//!
//! Distribution-free variance model (Mack, 1993). The variance parameter of
//! each lag pair is estimated from the spread of the individual link ratios
//! around the volume-weighted factor. Pairs with a single contributing origin
//! (always the last one) are filled in by [`SigmaInterpolation`]: by default a
//! log-linear fit through the estimable pairs, or Mack's own minimum rule.

use super::chain_ladder::DevelopmentFactor;
use super::ReserveEstimate;
use crate::error::{ReservingError, Result};
use crate::triangle::Triangle;
use log::debug;
use serde::{Deserialize, Serialize};

/// Standard errors of a chain-ladder projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MackStdErr {
    /// Variance parameter per lag pair
    pub sigma_squared: Vec<f64>,
    /// Standard error of each origin's IBNR
    pub origin_std_err: Vec<f64>,
    /// Standard error of the total IBNR, including cross-origin covariance
    pub total_std_err: f64,
}

/// How sigma² is filled in for lag pairs with fewer than two contributing origins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SigmaInterpolation {
    /// Least-squares line through `ln σ²` of the estimable, positive pairs.
    /// Falls back to [`SigmaInterpolation::Mack`] with fewer than two such pairs.
    #[default]
    LogLinear,
    /// `min(σ⁴(k-1) / σ²(k-2), σ²(k-2), σ²(k-1))`, or 0 without two predecessors
    Mack,
}

/// Variance parameters for each lag pair where at least two origins contribute
fn estimate_sigma_squared(
    triangle: &Triangle,
    cumulative: &[Vec<f64>],
    factors: &[DevelopmentFactor],
) -> Vec<Option<f64>> {
    factors
        .iter()
        .map(|f| {
            let mut weighted = 0.0;
            let mut n = 0usize;
            for (row, cum) in cumulative.iter().enumerate() {
                let c = cum[f.from_lag];
                if triangle.is_observed(row, f.to_lag) && c != 0.0 {
                    let residual = cum[f.to_lag] - f.factor * c;
                    // |C| so recoveries can't drive the variance negative
                    weighted += residual * residual / c.abs();
                    n += 1;
                }
            }
            if n >= 2 {
                Some(weighted / (n - 1) as f64)
            } else {
                None
            }
        })
        .collect()
}

fn fill_mack(mut sigma2: Vec<Option<f64>>) -> Vec<f64> {
    for k in 0..sigma2.len() {
        if sigma2[k].is_some() {
            continue;
        }
        let older = k.checked_sub(2).and_then(|i| sigma2[i]);
        let prev = k.checked_sub(1).and_then(|i| sigma2[i]);
        let extrapolated = match (older, prev) {
            (Some(older), Some(prev)) if older > 0.0 => (prev * prev / older).min(older).min(prev),
            _ => 0.0,
        };
        sigma2[k] = Some(extrapolated);
    }
    sigma2.into_iter().map(|s| s.unwrap_or(0.0)).collect()
}

fn fill_log_linear(sigma2: Vec<Option<f64>>) -> Vec<f64> {
    let points: Vec<(f64, f64)> = sigma2
        .iter()
        .enumerate()
        .filter_map(|(k, s)| s.filter(|&v| v > 0.0).map(|v| (k as f64, v.ln())))
        .collect();
    if points.len() < 2 {
        return fill_mack(sigma2);
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
    let sxy: f64 = points.iter().map(|(x, y)| (x - mean_x) * (y - mean_y)).sum();
    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    sigma2
        .into_iter()
        .enumerate()
        .map(|(k, s)| s.unwrap_or_else(|| (intercept + slope * k as f64).exp()))
        .collect()
}

/// Variance parameters for each lag pair, interpolating the sparse ones
fn sigma_squared(
    triangle: &Triangle,
    cumulative: &[Vec<f64>],
    factors: &[DevelopmentFactor],
    interpolation: SigmaInterpolation,
) -> Vec<f64> {
    let estimated = estimate_sigma_squared(triangle, cumulative, factors);
    match interpolation {
        SigmaInterpolation::LogLinear => fill_log_linear(estimated),
        SigmaInterpolation::Mack => fill_mack(estimated),
    }
}

/// Mack standard errors for every origin and for the total.
///
/// `factors` must come from the same triangle; `tail_factor` scales the
/// ultimates the same way the point projection does.
pub fn mack_std_err(
    triangle: &Triangle,
    factors: &[DevelopmentFactor],
    tail_factor: f64,
    interpolation: SigmaInterpolation,
) -> Result<MackStdErr> {
    if triangle.n_origins() < 2 {
        return Err(ReservingError::InsufficientOrigins {
            found: triangle.n_origins(),
        });
    }

    let cumulative = triangle.cumulative();
    let sigma2 = sigma_squared(triangle, &cumulative, factors, interpolation);
    let labels = triangle.origin_labels();

    // sigma²(k) / f(k)² per pair, rejecting a zero factor where it matters
    let mut scaled = Vec::with_capacity(factors.len());
    for (k, f) in factors.iter().enumerate() {
        if sigma2[k] > 0.0 && f.factor == 0.0 {
            return Err(ReservingError::ZeroVolume {
                from_lag: f.from_lag,
                to_lag: f.to_lag,
            });
        }
        scaled.push(if sigma2[k] > 0.0 { sigma2[k] / (f.factor * f.factor) } else { 0.0 });
    }

    let mut ultimates = Vec::with_capacity(triangle.n_origins());
    let mut origin_mse = Vec::with_capacity(triangle.n_origins());

    for (row, cum) in cumulative.iter().enumerate() {
        let latest_lag = triangle.latest_lag(row);
        let mut projected = cum[latest_lag];
        let mut weight_sum = 0.0;

        for k in latest_lag..factors.len() {
            if scaled[k] > 0.0 {
                if projected == 0.0 {
                    return Err(ReservingError::ZeroProjection {
                        origin: labels[row].clone(),
                        lag: k,
                    });
                }
                weight_sum += scaled[k] * (1.0 / projected + 1.0 / factors[k].volume);
            }
            projected *= factors[k].factor;
        }

        let ultimate = projected * tail_factor;
        ultimates.push(ultimate);
        origin_mse.push(ultimate * ultimate * weight_sum);
    }

    let mut total_mse: f64 = origin_mse.iter().sum();
    for i in 0..ultimates.len() {
        for j in (i + 1)..ultimates.len() {
            let start = triangle.latest_lag(i).max(triangle.latest_lag(j));
            let parameter: f64 = (start..factors.len())
                .map(|k| 2.0 * scaled[k] / factors[k].volume)
                .sum();
            total_mse += ultimates[i] * ultimates[j] * parameter;
        }
    }

    debug!(
        "Mack sigma² for line {}: {:?}",
        triangle.line_of_business(),
        sigma2
    );

    Ok(MackStdErr {
        sigma_squared: sigma2,
        origin_std_err: origin_mse.iter().map(|m| m.max(0.0).sqrt()).collect(),
        total_std_err: total_mse.max(0.0).sqrt(),
    })
}

impl ReserveEstimate {
    /// Attach Mack standard errors to this estimate
    pub fn with_std_err(mut self, mack: &MackStdErr) -> Self {
        for (origin, std_err) in self.origins.iter_mut().zip(&mack.origin_std_err) {
            origin.std_err = Some(*std_err);
        }
        self.total_std_err = Some(mack.total_std_err);
        self
    }
}
