// printflow_server/src/db/mod.rs

pub mod payment_ledger;

pub use payment_ledger::PgPaymentLedger;
