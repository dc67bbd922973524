//! Valuation runner for single and batch reserve estimates
//!
//! Holds one snapshot of payment records and runs the
//! build-triangle / project / extract-IBNR sequence for any line of business,
//! grain and cutoff without reloading the source.

use crate::claims::{load_payments, PaymentRecord};
use crate::error::Result;
use crate::period::{Grain, Period};
use crate::reserving::{
    mack_std_err, ChainLadder, ChainLadderConfig, ReserveEstimate, SigmaInterpolation,
};
use crate::triangle::{Triangle, TriangleBuilder};
use log::{info, warn};
use rayon::prelude::*;
use std::path::Path;

/// Inputs for one valuation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValuationConfig {
    pub line_of_business: u32,
    pub grain: Grain,
    /// Events after this month are excluded
    pub cutoff: Period,
    pub chain_ladder: ChainLadderConfig,
    /// Also compute Mack standard errors; failure to do so fails the valuation
    pub std_err: bool,
    pub sigma_interpolation: SigmaInterpolation,
}

impl ValuationConfig {
    pub fn new(line_of_business: u32, grain: Grain, cutoff: Period) -> Self {
        Self {
            line_of_business,
            grain,
            cutoff,
            chain_ladder: ChainLadderConfig::default(),
            std_err: false,
            sigma_interpolation: SigmaInterpolation::default(),
        }
    }

    pub fn with_tail_factor(mut self, tail_factor: f64) -> Self {
        self.chain_ladder.tail_factor = tail_factor;
        self
    }

    pub fn with_std_err(mut self) -> Self {
        self.std_err = true;
        self
    }

    /// Same configuration at a different cutoff
    pub fn at_cutoff(mut self, cutoff: Period) -> Self {
        self.cutoff = cutoff;
        self
    }
}

/// Triangle and the estimate projected from it
#[derive(Debug, Clone)]
pub struct Valuation {
    pub triangle: Triangle,
    pub estimate: ReserveEstimate,
}

/// Pre-loaded record snapshot for repeated valuations
///
/// # Example
/// ```ignore
/// let runner = ValuationRunner::from_csv("data/claims_2021.csv")?;
/// let config = ValuationConfig::new(1, Grain::Year, Period::year_start(2021));
/// let valuation = runner.run(&config)?;
/// println!("IBNR: {:.0}", valuation.estimate.ibnr_total);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ValuationRunner {
    records: Vec<PaymentRecord>,
}

impl ValuationRunner {
    pub fn new(records: Vec<PaymentRecord>) -> Self {
        Self { records }
    }

    /// Create runner by loading a claims snapshot CSV
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(load_payments(path)?))
    }

    pub fn records(&self) -> &[PaymentRecord] {
        &self.records
    }

    /// Run one valuation; either the full result or the first error, never a partial estimate
    pub fn run(&self, config: &ValuationConfig) -> Result<Valuation> {
        let triangle = TriangleBuilder::new(config.line_of_business, config.grain, config.cutoff)
            .build(&self.records)?;

        let chain_ladder = ChainLadder::new(config.chain_ladder);
        let mut estimate = chain_ladder.project(&triangle)?;

        if config.std_err {
            let factors = chain_ladder.development_factors(&triangle)?;
            let mack = mack_std_err(
                &triangle,
                &factors,
                config.chain_ladder.tail_factor,
                config.sigma_interpolation,
            )?;
            estimate = estimate.with_std_err(&mack);
        }

        info!(
            "Valuation line {} at {} ({}): IBNR {:.0}",
            config.line_of_business, config.cutoff, config.grain, estimate.ibnr_total
        );

        Ok(Valuation { triangle, estimate })
    }

    /// Run the same configuration at several cutoffs.
    ///
    /// Cutoffs are independent and evaluated in parallel; results come back
    /// in the order given.
    pub fn run_history(
        &self,
        config: &ValuationConfig,
        cutoffs: &[Period],
    ) -> Vec<(Period, Result<Valuation>)> {
        cutoffs
            .par_iter()
            .map(|&cutoff| {
                let result = self.run(&config.at_cutoff(cutoff));
                if let Err(ref e) = result {
                    warn!("Valuation at {} failed: {}", cutoff, e);
                }
                (cutoff, result)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::reserving::{MemoryStore, ResultSink};
    use approx::assert_abs_diff_eq;

    fn y(year: i32) -> Period {
        Period::year_start(year)
    }

    fn records() -> Vec<PaymentRecord> {
        let mut records = Vec::new();
        let mut id = 0;
        // Three accident years with a consistent development pattern
        for (origin, base) in [(2018, 1000.0), (2019, 1200.0), (2020, 900.0)] {
            for (lag, share) in [(0, 1.0), (1, 0.5), (2, 0.2)] {
                if origin + lag <= 2020 {
                    id += 1;
                    records.push(PaymentRecord::new(id, 1, y(origin), y(origin + lag), base * share));
                }
            }
        }
        records.push(PaymentRecord::new(99, 2, y(2019), y(2020), 10.0));
        records
    }

    #[test]
    fn test_run_single_valuation() {
        let runner = ValuationRunner::new(records());
        let config = ValuationConfig::new(1, Grain::Year, y(2020));
        let valuation = runner.run(&config).unwrap();

        assert_eq!(valuation.triangle.n_origins(), 3);
        let estimate = &valuation.estimate;
        assert_abs_diff_eq!(estimate.development_factors[0], 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(estimate.development_factors[1], 1.7 / 1.5, epsilon = 1e-12);
        // 2019: 1800 -> 2040, 2020: 900 -> 1530
        assert_abs_diff_eq!(estimate.ibnr_total, 240.0 + 630.0, epsilon = 1e-9);
        assert_eq!(estimate.total_std_err, None);
    }

    #[test]
    fn test_run_with_std_err() {
        let runner = ValuationRunner::new(records());
        let config = ValuationConfig::new(1, Grain::Year, y(2020)).with_std_err();
        let estimate = runner.run(&config).unwrap().estimate;

        // Identical link ratios leave no spread to estimate
        assert_abs_diff_eq!(estimate.total_std_err.unwrap(), 0.0);
        assert!(estimate.origins.iter().all(|o| o.std_err.is_some()));
    }

    #[test]
    fn test_run_history_keeps_order_and_isolates_failures() {
        let runner = ValuationRunner::new(records());
        let config = ValuationConfig::new(1, Grain::Year, y(2020));
        let cutoffs = [y(2017), y(2018), y(2019), y(2020)];

        let results = runner.run_history(&config, &cutoffs);
        assert_eq!(results.len(), 4);
        assert_eq!(
            results.iter().map(|(c, _)| *c).collect::<Vec<_>>(),
            cutoffs.to_vec()
        );

        // Nothing paid by 2017
        let err = results[0].1.as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyInput);

        // 2018: single origin, nothing to project
        let v2018 = results[1].1.as_ref().unwrap();
        assert_abs_diff_eq!(v2018.estimate.ibnr_total, 0.0);

        let mut store = MemoryStore::new();
        for (_, result) in &results {
            if let Ok(valuation) = result {
                store.upsert(valuation.estimate.to_record()).unwrap();
            }
        }
        let history = store.history().unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].valuation_period, y(2020));
        assert_abs_diff_eq!(history[2].ibnr, 870.0, epsilon = 1e-9);
    }
}
