//! Payment record structure shared by all record sources

use crate::period::{Grain, Period};
use serde::{Deserialize, Serialize};

/// One observed payment event against a claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Claim identifier (a claim may have many payments)
    pub claim_id: u64,

    /// Line of business the claim belongs to
    pub line_of_business: u32,

    /// Period in which the accident occurred
    pub origin_period: Period,

    /// Period in which the payment was recorded
    pub event_period: Period,

    /// Incremental payment amount; negative for recoveries and reversals
    pub amount: f64,
}

impl PaymentRecord {
    pub fn new(
        claim_id: u64,
        line_of_business: u32,
        origin_period: Period,
        event_period: Period,
        amount: f64,
    ) -> Self {
        Self {
            claim_id,
            line_of_business,
            origin_period,
            event_period,
            amount,
        }
    }

    /// Development lag in grain units
    pub fn lag(&self, grain: Grain) -> i64 {
        grain.lag(self.origin_period, self.event_period)
    }

    /// Payment was recorded no earlier than the accident
    pub fn has_valid_lag(&self) -> bool {
        self.event_period >= self.origin_period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_lag() {
        let record = PaymentRecord::new(
            1,
            1,
            Period::new(2019, 11).unwrap(),
            Period::new(2021, 2).unwrap(),
            250.0,
        );

        assert!(record.has_valid_lag());
        assert_eq!(record.lag(Grain::Year), 2);
        assert_eq!(record.lag(Grain::Quarter), 5);
        assert_eq!(record.lag(Grain::Month), 15);
    }

    #[test]
    fn test_record_negative_lag() {
        let record = PaymentRecord::new(
            2,
            1,
            Period::new(2020, 6).unwrap(),
            Period::new(2020, 5).unwrap(),
            -10.0,
        );
        assert!(!record.has_valid_lag());
        // Same year bucket, so the yearly lag rounds to zero
        assert_eq!(record.lag(Grain::Year), 0);
    }
}
