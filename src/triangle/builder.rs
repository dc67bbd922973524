//! Aggregate payment records into a development triangle

use super::Triangle;
use crate::claims::PaymentRecord;
use crate::error::{ReservingError, Result};
use crate::period::{Grain, Period};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// Builds triangles for one line of business, grain and valuation cutoff
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleBuilder {
    pub line_of_business: u32,
    pub grain: Grain,
    /// Records with an event after this month are excluded
    pub cutoff: Period,
}

impl TriangleBuilder {
    pub fn new(line_of_business: u32, grain: Grain, cutoff: Period) -> Self {
        Self {
            line_of_business,
            grain,
            cutoff,
        }
    }

    fn within_cutoff(&self, record: &PaymentRecord) -> bool {
        record.event_period <= self.cutoff
    }

    /// Aggregate `records` into a triangle.
    ///
    /// Any record for this line of business with an event before its origin
    /// fails the whole build; nothing partial is returned.
    pub fn build(&self, records: &[PaymentRecord]) -> Result<Triangle> {
        let grain = self.grain;

        // (origin bucket, lag) -> amounts
        let mut buckets: BTreeMap<(Period, usize), Vec<f64>> = BTreeMap::new();
        let mut evaluation: Option<Period> = None;

        for record in records
            .iter()
            .filter(|r| r.line_of_business == self.line_of_business)
        {
            if !record.has_valid_lag() {
                return Err(ReservingError::NegativeLag {
                    claim_id: record.claim_id,
                    origin: record.origin_period,
                    event: record.event_period,
                });
            }
            if !self.within_cutoff(record) {
                continue;
            }

            let origin = record.origin_period.start_of(grain);
            let lag = record.lag(grain) as usize;
            buckets.entry((origin, lag)).or_default().push(record.amount);

            let event = record.event_period.start_of(grain);
            evaluation = Some(evaluation.map_or(event, |e| e.max(event)));
        }

        let evaluation = match evaluation {
            Some(e) => e,
            None => {
                return Err(ReservingError::EmptyInput {
                    line_of_business: self.line_of_business,
                    cutoff: self.cutoff,
                })
            }
        };

        let origins: Vec<Period> = buckets
            .keys()
            .map(|(origin, _)| *origin)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let n_lags = buckets.keys().map(|(_, lag)| *lag).max().unwrap_or(0) + 1;
        let row_of: BTreeMap<Period, usize> =
            origins.iter().enumerate().map(|(i, o)| (*o, i)).collect();

        let mut cells = vec![vec![0.0; n_lags]; origins.len()];
        for ((origin, lag), mut amounts) in buckets {
            // Summed in sorted order so the cell doesn't depend on input order
            amounts.sort_by(f64::total_cmp);
            cells[row_of[&origin]][lag] = amounts.iter().sum();
        }

        debug!(
            "Built {} triangle for line {}: {} origins x {} lags, evaluated {}",
            grain,
            self.line_of_business,
            origins.len(),
            n_lags,
            evaluation
        );

        Triangle::from_incremental(
            self.line_of_business,
            grain,
            self.cutoff,
            evaluation,
            origins,
            cells,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use approx::assert_abs_diff_eq;

    fn rec(claim_id: u64, lob: u32, origin: Period, event: Period, amount: f64) -> PaymentRecord {
        PaymentRecord::new(claim_id, lob, origin, event, amount)
    }

    fn y(year: i32) -> Period {
        Period::year_start(year)
    }

    fn year_end(year: i32) -> Period {
        Period::year_end(year)
    }

    fn mixed_records() -> Vec<PaymentRecord> {
        vec![
            rec(1, 1, Period::new(2018, 3).unwrap(), Period::new(2018, 9).unwrap(), 120.25),
            rec(1, 1, Period::new(2018, 3).unwrap(), Period::new(2020, 2).unwrap(), -15.5),
            rec(2, 1, Period::new(2018, 11).unwrap(), Period::new(2019, 1).unwrap(), 80.0),
            rec(3, 1, Period::new(2019, 6).unwrap(), Period::new(2019, 6).unwrap(), 0.1),
            rec(3, 1, Period::new(2019, 6).unwrap(), Period::new(2019, 7).unwrap(), 0.2),
            rec(4, 1, Period::new(2020, 12).unwrap(), Period::new(2021, 3).unwrap(), 55.0),
            rec(5, 2, Period::new(2019, 1).unwrap(), Period::new(2019, 2).unwrap(), 999.0),
            rec(6, 1, Period::new(2021, 4).unwrap(), Period::new(2022, 1).unwrap(), 70.0),
        ]
    }

    #[test]
    fn test_rectangular_grid() {
        let tri = TriangleBuilder::new(1, Grain::Year, year_end(2021))
            .build(&mixed_records())
            .unwrap();

        assert_eq!(tri.origins(), &[y(2018), y(2019), y(2020)]);
        assert_eq!(tri.n_lags(), 3);
        assert_eq!(tri.evaluation_period(), y(2021));
        for row in tri.incremental_rows() {
            assert_eq!(row.len(), 3);
        }

        assert_abs_diff_eq!(tri.incremental(0, 0), 120.25);
        assert_abs_diff_eq!(tri.incremental(0, 1), 80.0);
        assert_abs_diff_eq!(tri.incremental(0, 2), -15.5);
        assert_abs_diff_eq!(tri.incremental(1, 0), 0.3, epsilon = 1e-12);
        assert_eq!(tri.incremental(1, 1), 0.0);
        assert_abs_diff_eq!(tri.incremental(2, 1), 55.0);
        assert_eq!(tri.latest_lags(), &[2, 2, 1]);
    }

    #[test]
    fn test_sum_conservation() {
        let records = mixed_records();
        let cutoff = year_end(2021);
        let tri = TriangleBuilder::new(1, Grain::Quarter, cutoff)
            .build(&records)
            .unwrap();

        let expected: f64 = records
            .iter()
            .filter(|r| r.line_of_business == 1 && r.event_period.year() <= 2021)
            .map(|r| r.amount)
            .sum();
        assert_abs_diff_eq!(tri.total(), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_order_independence() {
        let records = mixed_records();
        let builder = TriangleBuilder::new(1, Grain::Month, Period::new(2022, 6).unwrap());
        let forward = builder.build(&records).unwrap();

        let mut reversed = records.clone();
        reversed.reverse();
        assert_eq!(builder.build(&reversed).unwrap(), forward);

        let mut rotated = records;
        rotated.rotate_left(3);
        assert_eq!(builder.build(&rotated).unwrap(), forward);
    }

    #[test]
    fn test_cumulative_consistency() {
        let tri = TriangleBuilder::new(1, Grain::Year, year_end(2022))
            .build(&mixed_records())
            .unwrap();
        let cum = tri.cumulative();

        for row in 0..tri.n_origins() {
            for lag in 0..tri.n_lags() {
                let expected: f64 = (0..=lag).map(|l| tri.incremental(row, l)).sum();
                assert_abs_diff_eq!(cum[row][lag], expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_cutoff_excludes_later_events() {
        let tri = TriangleBuilder::new(1, Grain::Year, year_end(2019))
            .build(&mixed_records())
            .unwrap();

        assert_eq!(tri.origins(), &[y(2018), y(2019)]);
        assert_eq!(tri.n_lags(), 2);
        assert_abs_diff_eq!(tri.total(), 120.25 + 80.0 + 0.3, epsilon = 1e-9);
    }

    #[test]
    fn test_mid_year_cutoff_is_exact() {
        let records = vec![
            rec(1, 1, Period::new(2020, 2).unwrap(), Period::new(2020, 5).unwrap(), 100.0),
            rec(1, 1, Period::new(2020, 2).unwrap(), Period::new(2021, 2).unwrap(), 20.0),
            rec(2, 1, Period::new(2021, 1).unwrap(), Period::new(2021, 11).unwrap(), 500.0),
        ];
        let tri = TriangleBuilder::new(1, Grain::Year, Period::new(2021, 3).unwrap())
            .build(&records)
            .unwrap();

        // The November payment falls in the cutoff's year but after its month
        assert_abs_diff_eq!(tri.total(), 120.0, epsilon = 1e-9);
        assert_eq!(tri.origins(), &[y(2020)]);
        assert_eq!(tri.evaluation_period(), y(2021));

        let tri = TriangleBuilder::new(1, Grain::Year, year_end(2021))
            .build(&records)
            .unwrap();
        assert_abs_diff_eq!(tri.total(), 620.0, epsilon = 1e-9);
    }

    #[test]
    fn test_negative_lag_rejected() {
        let mut records = mixed_records();
        records.push(rec(42, 1, Period::new(2020, 5).unwrap(), Period::new(2020, 4).unwrap(), 10.0));

        let err = TriangleBuilder::new(1, Grain::Year, year_end(2021))
            .build(&records)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataIntegrity);
        assert!(matches!(err, ReservingError::NegativeLag { claim_id: 42, .. }));
    }

    #[test]
    fn test_negative_lag_in_other_line_ignored() {
        let mut records = mixed_records();
        records.push(rec(43, 2, Period::new(2020, 5).unwrap(), Period::new(2020, 4).unwrap(), 10.0));

        assert!(TriangleBuilder::new(1, Grain::Year, year_end(2021))
            .build(&records)
            .is_ok());
    }

    #[test]
    fn test_empty_input() {
        let err = TriangleBuilder::new(3, Grain::Year, y(2021))
            .build(&mixed_records())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyInput);

        let err = TriangleBuilder::new(1, Grain::Year, y(2017))
            .build(&mixed_records())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyInput);
    }
}
