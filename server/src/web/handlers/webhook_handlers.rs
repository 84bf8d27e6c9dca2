// printflow_server/src/web/handlers/webhook_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use printflow::webhook::SIGNATURE_HEADER;
use printflow::WebhookOutcome;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::errors::Result;
use crate::state::AppState;

#[instrument(
  name = "handler::payment_webhook",
  skip(app_state, req, body),
  fields(bytes = body.len(), signed = req.headers().contains_key(SIGNATURE_HEADER))
)]
pub async fn payment_webhook_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  body: web::Bytes,
) -> Result<HttpResponse> {
  let signature = req
    .headers()
    .get(SIGNATURE_HEADER)
    .and_then(|h| h.to_str().ok())
    .map(str::to_string);

  let (state, outcome) = app_state.webhook.process_with_state(&body, signature.as_deref()).await;
  let outcome = outcome?;
  info!(state = ?state, outcome = outcome.label(), "Webhook handled.");

  let payload = match &outcome {
    WebhookOutcome::Processed {
      payment_id,
      order_id,
      report,
    } => {
      if !report.is_clean() {
        warn!(%payment_id, "Payment captured but fulfillment was partial.");
      }
      json!({
        "status": outcome.label(),
        "paymentId": payment_id,
        "orderId": order_id,
        "emailSent": report.sent(),
      })
    }
    WebhookOutcome::Ignored { event } => json!({"status": outcome.label(), "event": event}),
    WebhookOutcome::Acknowledged { payment_id, reason } => {
      json!({"status": outcome.label(), "paymentId": payment_id, "warning": reason})
    }
    WebhookOutcome::Duplicate { payment_id } => json!({"status": outcome.label(), "paymentId": payment_id}),
  };
  Ok(HttpResponse::Ok().json(payload))
}
