// printflow_server/src/web/handlers/mod.rs

pub mod payment_handlers;
pub mod photo_handlers;
pub mod upload_handlers;
pub mod webhook_handlers;
