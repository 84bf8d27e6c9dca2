// printflow_server/src/lib.rs

//! HTTP application around the `printflow` pipeline: configuration, adapters
//! for the gateway, mail and ledger, and the actix-web routes.

pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod services;
pub mod state;
pub mod web;

pub use config::AppConfig;
pub use errors::AppError;
pub use state::AppState;
