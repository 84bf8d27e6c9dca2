// printflow_server/src/web/handlers/payment_handlers.rs

use actix_web::{web, HttpResponse};
use chrono::{NaiveDate, Utc};
use printflow::ledger::summarize_payments;
use printflow::{OrderItemRequest, SummaryFilter};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::errors::{AppError, Result};
use crate::state::AppState;

/// The items may be posted bare or wrapped as `{"items": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum InitiatePaymentRequest {
  Items(Vec<OrderItemRequest>),
  Wrapped { items: Vec<OrderItemRequest> },
}

impl InitiatePaymentRequest {
  pub fn into_items(self) -> Vec<OrderItemRequest> {
    match self {
      InitiatePaymentRequest::Items(items) | InitiatePaymentRequest::Wrapped { items } => items,
    }
  }
}

#[instrument(name = "handler::initiate_payment", skip(app_state, req_body))]
pub async fn initiate_payment_handler(
  app_state: web::Data<AppState>,
  req_body: web::Json<InitiatePaymentRequest>,
) -> Result<HttpResponse> {
  let items = req_body.into_inner().into_items();
  let summary = app_state.intake.initiate(items).await?;
  info!(
    order_id = %summary.order_id,
    amount = summary.amount,
    status = ?summary.status,
    "Payment initiated."
  );
  Ok(HttpResponse::Ok().json(summary))
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
  pub phone: String,
  pub filter: Option<String>,
  pub start: Option<NaiveDate>,
  pub end: Option<NaiveDate>,
}

#[instrument(name = "handler::payment_summary", skip(app_state, query), fields(filter = ?query.filter))]
pub async fn payment_summary_handler(
  app_state: web::Data<AppState>,
  query: web::Query<SummaryQuery>,
) -> Result<HttpResponse> {
  let query = query.into_inner();
  let filter = SummaryFilter::parse(query.filter.as_deref().unwrap_or("DAY"), query.start, query.end)?;
  let phone = query.phone.trim();
  if !printflow::ledger::is_valid_phone(phone) {
    return Err(AppError::Validation("Phone number must be exactly 10 digits.".to_string()));
  }
  let printer = app_state
    .printers
    .find_by_phone(phone)
    .ok_or_else(|| AppError::NotFound("No printer is registered with this phone number.".to_string()))?;

  let today = Utc::now().with_timezone(&app_state.config.ledger_offset).date_naive();
  let name = if printer.name.is_empty() {
    printer.id.clone()
  } else {
    printer.name.clone()
  };
  let summary = summarize_payments(app_state.ledger.as_ref(), name, phone, filter, today).await?;
  Ok(HttpResponse::Ok().json(summary))
}
