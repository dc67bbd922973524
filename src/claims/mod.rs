//! Payment records and the record sources that produce them

mod data;
pub mod loader;
pub mod prepare;
pub mod reconcile;

pub use data::PaymentRecord;
pub use loader::{load_payments, load_payments_from_reader, write_payments};
pub use prepare::{join_claims_and_payments, ClaimHeader, PaidEvent};
pub use reconcile::{reconcile, roll_forward, Reconciliation};
