// printflow_server/src/services/mod.rs

pub mod email_mock;
pub mod payment_mock;
pub mod razorpay;
pub mod smtp_mailer;

pub use email_mock::LogMailer;
pub use payment_mock::MockGateway;
pub use razorpay::RazorpayGateway;
pub use smtp_mailer::SmtpMailer;
