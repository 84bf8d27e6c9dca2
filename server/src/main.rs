// printflow_server/src/main.rs

use actix_web::{web as actix_data, App, HttpServer};
use printflow::{InMemoryLedger, PaymentLedger};
use printflow_server::config::AppConfig;
use printflow_server::db::PgPaymentLedger;
use printflow_server::state::AppState;
use printflow_server::web::configure_app_routes;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

async fn open_ledger(config: &AppConfig) -> anyhow::Result<Arc<dyn PaymentLedger>> {
  match &config.database_url {
    Some(url) => {
      let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
      tracing::info!("Successfully connected to the database.");
      let ledger = PgPaymentLedger::new(pool);
      ledger.migrate().await?;
      tracing::info!("Database migrations applied.");
      Ok(Arc::new(ledger))
    }
    None => {
      tracing::warn!("DATABASE_URL is not set; payments are recorded in memory and lost on restart.");
      Ok(Arc::new(InMemoryLedger::new()))
    }
  }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_span_events(FmtSpan::CLOSE)
    .init();

  tracing::info!("Starting print service...");

  let app_config = match AppConfig::from_env() {
    Ok(cfg) => Arc::new(cfg),
    Err(e) => {
      tracing::error!(error = %e, "Failed to load application configuration.");
      return Err(std::io::Error::other(e.to_string()));
    }
  };

  let ledger = match open_ledger(&app_config).await {
    Ok(ledger) => ledger,
    Err(e) => {
      tracing::error!(error = %e, "Failed to initialise the payment ledger.");
      return Err(std::io::Error::other(e.to_string()));
    }
  };

  let app_state = match AppState::from_config(app_config.clone(), ledger) {
    Ok(state) => state,
    Err(e) => {
      tracing::error!(error = %e, "Failed to assemble application state.");
      return Err(std::io::Error::other(e.to_string()));
    }
  };

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!("Attempting to bind server to {}...", server_address);

  let json_limit = 256 * 1024;
  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .app_data(actix_data::JsonConfig::default().limit(json_limit))
      .app_data(actix_data::PayloadConfig::new(json_limit))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
