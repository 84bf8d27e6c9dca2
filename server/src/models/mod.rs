// printflow_server/src/models/mod.rs

pub mod payment_detail;

pub use payment_detail::PaymentDetail;
