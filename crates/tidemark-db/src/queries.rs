//! Database query functions organized by domain.

pub mod accrual;
pub mod ingest;
pub mod ledger;
pub mod payout;
pub mod settings;
