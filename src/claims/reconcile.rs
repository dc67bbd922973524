//! Valuation data set-up: roll a claims snapshot forward and reconcile history
//!
//! Each year the prior snapshot is extended with that year's payments. Paid
//! amounts for events before the new year must not move between snapshots;
//! [`reconcile`] reports any difference.

use super::PaymentRecord;
use crate::period::Period;
use log::{info, warn};
use serde::Serialize;

/// Historical paid totals in two snapshots
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reconciliation {
    /// Events strictly before this period are compared
    pub before: Period,
    pub prior_total: f64,
    pub current_total: f64,
}

impl Reconciliation {
    pub fn difference(&self) -> f64 {
        self.current_total - self.prior_total
    }

    /// Difference below one cent
    pub fn is_balanced(&self) -> bool {
        self.difference().abs() < 0.005
    }
}

fn paid_before(records: &[PaymentRecord], before: Period) -> f64 {
    records
        .iter()
        .filter(|r| r.event_period < before)
        .map(|r| r.amount)
        .sum()
}

/// Compare paid amounts with events before January of `year`
pub fn reconcile(prior: &[PaymentRecord], current: &[PaymentRecord], year: i32) -> Reconciliation {
    let before = Period::year_start(year);
    let result = Reconciliation {
        before,
        prior_total: paid_before(prior, before),
        current_total: paid_before(current, before),
    };

    if result.is_balanced() {
        info!(
            "Historical paid before {} reconciles: {:.0}",
            before, result.current_total
        );
    } else {
        warn!(
            "Historical paid before {} moved: prior {:.0}, now {:.0}, diff {:.0}",
            before,
            result.prior_total,
            result.current_total,
            result.difference()
        );
    }

    result
}

/// Extend a prior snapshot with newly recorded payments
pub fn roll_forward(prior: &[PaymentRecord], new_payments: &[PaymentRecord]) -> Vec<PaymentRecord> {
    let mut snapshot = Vec::with_capacity(prior.len() + new_payments.len());
    snapshot.extend_from_slice(prior);
    snapshot.extend_from_slice(new_payments);
    info!(
        "Rolled snapshot forward: {} prior + {} new payments",
        prior.len(),
        new_payments.len()
    );
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn payment(event: Period, amount: f64) -> PaymentRecord {
        PaymentRecord::new(1, 1, Period::new(2019, 1).unwrap(), event, amount)
    }

    #[test]
    fn test_roll_forward_reconciles() {
        let prior = vec![
            payment(Period::new(2019, 4).unwrap(), 100.0),
            payment(Period::new(2020, 8).unwrap(), 40.0),
        ];
        let new = vec![
            payment(Period::new(2021, 1).unwrap(), 25.0),
            payment(Period::new(2021, 11).unwrap(), -5.0),
        ];

        let current = roll_forward(&prior, &new);
        assert_eq!(current.len(), 4);

        let rec = reconcile(&prior, &current, 2021);
        assert_eq!(rec.before, Period::new(2021, 1).unwrap());
        assert_abs_diff_eq!(rec.prior_total, 140.0);
        assert_abs_diff_eq!(rec.current_total, 140.0);
        assert!(rec.is_balanced());
    }

    #[test]
    fn test_restated_history_detected() {
        let prior = vec![payment(Period::new(2020, 3).unwrap(), 100.0)];
        let current = vec![
            payment(Period::new(2020, 3).unwrap(), 100.0),
            // Late-booked payment dated inside the prior year
            payment(Period::new(2020, 12).unwrap(), 30.0),
        ];

        let rec = reconcile(&prior, &current, 2021);
        assert!(!rec.is_balanced());
        assert_abs_diff_eq!(rec.difference(), 30.0);
    }
}
