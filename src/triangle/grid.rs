//! Development triangle: origin period × development lag grid of incremental amounts

use crate::error::{ReservingError, Result};
use crate::period::{Grain, Period};
use serde::Serialize;

/// Aggregated incremental amounts for one line of business at one valuation cutoff
///
/// Rows are the origin periods present in the data (rounded to the grain),
/// columns are development lags `0..=max_lag`. Cells with no payments hold
/// zero. Each origin's latest observed lag marks the diagonal: cells past it
/// have not happened yet as of the evaluation period.
///
/// Only [`Triangle::from_incremental`] constructs one, so the grid is always
/// rectangular with one latest lag per origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Triangle {
    line_of_business: u32,
    grain: Grain,
    /// Valuation cutoff used to filter the records
    cutoff: Period,
    /// Latest event period (grain bucket) present in the data
    evaluation_period: Period,
    origins: Vec<Period>,
    latest_lags: Vec<usize>,
    /// Incremental amounts, one row per origin, one column per lag
    cells: Vec<Vec<f64>>,
}

impl Triangle {
    /// Assemble a triangle from incremental rows.
    ///
    /// `origins` must be sorted and bucketed to `grain`; the diagonal is derived
    /// from `evaluation_period`. Rows must all have the same, non-zero length.
    pub fn from_incremental(
        line_of_business: u32,
        grain: Grain,
        cutoff: Period,
        evaluation_period: Period,
        origins: Vec<Period>,
        cells: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if origins.is_empty() || cells.is_empty() {
            return Err(ReservingError::EmptyInput {
                line_of_business,
                cutoff,
            });
        }

        let n_lags = cells[0].len();
        if origins.len() != cells.len() || n_lags == 0 {
            return Err(ReservingError::InvalidRecord {
                row: cells.len().min(origins.len()) + 1,
                reason: format!(
                    "{} origins for {} rows of {} lags",
                    origins.len(),
                    cells.len(),
                    n_lags
                ),
            });
        }

        let mut latest_lags = Vec::with_capacity(origins.len());
        for (i, (origin, row)) in origins.iter().zip(&cells).enumerate() {
            if row.len() != n_lags {
                return Err(ReservingError::InvalidRecord {
                    row: i + 1,
                    reason: format!("expected {} lags, found {}", n_lags, row.len()),
                });
            }
            let lag = grain.lag(*origin, evaluation_period);
            if lag < 0 {
                return Err(ReservingError::InvalidRecord {
                    row: i + 1,
                    reason: format!(
                        "origin {} is after evaluation period {}",
                        origin, evaluation_period
                    ),
                });
            }
            latest_lags.push((lag as usize).min(n_lags - 1));
        }

        Ok(Self {
            line_of_business,
            grain,
            cutoff,
            evaluation_period: evaluation_period.start_of(grain),
            origins,
            latest_lags,
            cells,
        })
    }

    pub fn line_of_business(&self) -> u32 {
        self.line_of_business
    }

    pub fn grain(&self) -> Grain {
        self.grain
    }

    pub fn cutoff(&self) -> Period {
        self.cutoff
    }

    pub fn evaluation_period(&self) -> Period {
        self.evaluation_period
    }

    pub fn origins(&self) -> &[Period] {
        &self.origins
    }

    /// Origin labels at the triangle's grain, e.g. `2019` or `2019Q3`
    pub fn origin_labels(&self) -> Vec<String> {
        self.origins.iter().map(|o| o.label(self.grain)).collect()
    }

    pub fn n_origins(&self) -> usize {
        self.origins.len()
    }

    /// Number of lag columns (max lag + 1)
    pub fn n_lags(&self) -> usize {
        self.cells[0].len()
    }

    pub fn max_lag(&self) -> usize {
        self.n_lags() - 1
    }

    /// Latest lag observed for the origin at `row`
    pub fn latest_lag(&self, row: usize) -> usize {
        self.latest_lags[row]
    }

    pub fn latest_lags(&self) -> &[usize] {
        &self.latest_lags
    }

    pub fn is_observed(&self, row: usize, lag: usize) -> bool {
        lag <= self.latest_lags[row]
    }

    pub fn incremental(&self, row: usize, lag: usize) -> f64 {
        self.cells[row][lag]
    }

    pub fn incremental_rows(&self) -> &[Vec<f64>] {
        &self.cells
    }

    /// Cumulative view: running sum along the lag axis for each origin
    pub fn cumulative(&self) -> Vec<Vec<f64>> {
        self.cells
            .iter()
            .map(|row| {
                row.iter()
                    .scan(0.0, |acc, v| {
                        *acc += v;
                        Some(*acc)
                    })
                    .collect()
            })
            .collect()
    }

    /// Latest known cumulative value per origin
    pub fn latest_diagonal(&self) -> Vec<f64> {
        self.cells
            .iter()
            .zip(&self.latest_lags)
            .map(|(row, &latest)| row[..=latest].iter().sum::<f64>())
            .collect()
    }

    /// Sum of every cell
    pub fn total(&self) -> f64 {
        self.cells.iter().flatten().sum()
    }

    /// Age-to-age ratios per origin, `cum[L+1] / cum[L]`.
    ///
    /// `None` where lag `L+1` is not yet observed or `cum[L]` is zero.
    pub fn link_ratios(&self) -> Vec<Vec<Option<f64>>> {
        self.cumulative()
            .iter()
            .enumerate()
            .map(|(row, cum)| {
                (0..self.max_lag())
                    .map(|lag| {
                        if self.is_observed(row, lag + 1) && cum[lag] != 0.0 {
                            Some(cum[lag + 1] / cum[lag])
                        } else {
                            None
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample() -> Triangle {
        Triangle::from_incremental(
            1,
            Grain::Year,
            Period::year_start(2021),
            Period::year_start(2021),
            vec![
                Period::year_start(2019),
                Period::year_start(2020),
                Period::year_start(2021),
            ],
            vec![
                vec![100.0, 50.0, -10.0],
                vec![200.0, 60.0, 0.0],
                vec![300.0, 0.0, 0.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_diagonal() {
        let tri = sample();
        assert_eq!(tri.latest_lags(), &[2, 1, 0]);
        assert!(tri.is_observed(1, 1));
        assert!(!tri.is_observed(1, 2));
        assert_eq!(tri.latest_diagonal(), vec![140.0, 260.0, 300.0]);
        assert_eq!(tri.origin_labels(), vec!["2019", "2020", "2021"]);
    }

    #[test]
    fn test_cumulative_supports_negative_increments() {
        let cum = sample().cumulative();
        assert_eq!(cum[0], vec![100.0, 150.0, 140.0]);
        assert_eq!(cum[1], vec![200.0, 260.0, 260.0]);
    }

    #[test]
    fn test_link_ratios() {
        let ratios = sample().link_ratios();
        assert_abs_diff_eq!(ratios[0][0].unwrap(), 1.5);
        assert_abs_diff_eq!(ratios[0][1].unwrap(), 140.0 / 150.0);
        assert_abs_diff_eq!(ratios[1][0].unwrap(), 1.3);
        assert_eq!(ratios[1][1], None);
        assert_eq!(ratios[2], vec![None, None]);
    }

    #[test]
    fn test_serializes_grid_and_diagonal() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["latest_lags"], serde_json::json!([2, 1, 0]));
        assert_eq!(json["grain"], "year");
        assert_eq!(json["evaluation_period"], "2021-01");
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let result = Triangle::from_incremental(
            1,
            Grain::Year,
            Period::year_start(2020),
            Period::year_start(2020),
            vec![Period::year_start(2019), Period::year_start(2020)],
            vec![vec![1.0, 2.0], vec![3.0]],
        );
        assert!(matches!(result, Err(ReservingError::InvalidRecord { row: 2, .. })));
    }
}
