// printflow/src/webhook/mod.rs

pub mod event;
pub mod processor;

pub use event::{PaymentEntity, WebhookEvent, PAYMENT_CAPTURED, SIGNATURE_HEADER};
pub use processor::{WebhookContext, WebhookOutcome, WebhookProcessor, WebhookSettings, WebhookState};
