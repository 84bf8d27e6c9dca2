// printflow/src/webhook/processor.rs

//! WebhookProcessor. The state machine
//! `Received -> SignatureVerified -> EventFiltered -> ItemsParsed -> {Fulfilled | Rejected}`
//! runs as a step pipeline; a step that acknowledges without fulfilling
//! stops the run.

use crate::error::{FlowError, PipelineError};
use crate::fulfillment::{FulfillmentExecutor, FulfillmentReport, FulfillmentRequest};
use crate::ledger::NewPayment;
use crate::order::item::OrderItem;
use crate::order::manifest::{decode_manifest, Manifest};
use crate::pipeline::{ContextData, Pipeline, PipelineControl};
use crate::ports::{PaymentGateway, PaymentLedger};
use crate::printers::{Printer, PrinterDirectory};
use crate::webhook::event::{PaymentEntity, WebhookEvent};
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookState {
  Received,
  SignatureVerified,
  EventFiltered,
  ItemsParsed,
  Fulfilled,
  Rejected,
}

/// Every outcome is acknowledged to the sender with 200.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
  Processed {
    payment_id: String,
    order_id: Option<String>,
    report: FulfillmentReport,
  },
  /// Not a payment capture.
  Ignored { event: String },
  /// A capture that cannot be fulfilled (missing or truncated manifest, no
  /// valid items). Needs manual reconciliation.
  Acknowledged { payment_id: String, reason: String },
  /// The payment id is already in the ledger.
  Duplicate { payment_id: String },
}

impl WebhookOutcome {
  pub fn label(&self) -> &'static str {
    match self {
      WebhookOutcome::Processed { .. } => "processed",
      WebhookOutcome::Ignored { .. } => "ignored",
      WebhookOutcome::Acknowledged { .. } => "acknowledged",
      WebhookOutcome::Duplicate { .. } => "duplicate",
    }
  }
}

#[derive(Debug, Clone)]
pub struct WebhookSettings {
  pub webhook_secret: Option<String>,
  /// Fixed timezone of ledger dates and times.
  pub ledger_offset: FixedOffset,
}

#[derive(Debug)]
pub struct WebhookContext {
  pub raw_body: Vec<u8>,
  pub signature: Option<String>,
  pub received_at: DateTime<Utc>,
  pub state: WebhookState,
  pub payment: Option<PaymentEntity>,
  pub items: Vec<OrderItem>,
  pub printer: Option<Printer>,
  pub report: Option<FulfillmentReport>,
  pub outcome: Option<WebhookOutcome>,
}

impl WebhookContext {
  pub fn new(raw_body: Vec<u8>, signature: Option<String>) -> Self {
    Self {
      raw_body,
      signature,
      received_at: Utc::now(),
      state: WebhookState::Received,
      payment: None,
      items: Vec::new(),
      printer: None,
      report: None,
      outcome: None,
    }
  }
}

struct WebhookDeps {
  gateway: Arc<dyn PaymentGateway>,
  ledger: Arc<dyn PaymentLedger>,
  printers: Arc<PrinterDirectory>,
  fulfillment: Arc<FulfillmentExecutor>,
  settings: WebhookSettings,
}

pub struct WebhookProcessor {
  pipeline: Pipeline<WebhookContext, FlowError>,
}

impl WebhookProcessor {
  pub fn new(
    gateway: Arc<dyn PaymentGateway>,
    ledger: Arc<dyn PaymentLedger>,
    printers: Arc<PrinterDirectory>,
    fulfillment: Arc<FulfillmentExecutor>,
    settings: WebhookSettings,
  ) -> Self {
    let deps = Arc::new(WebhookDeps {
      gateway,
      ledger,
      printers,
      fulfillment,
      settings,
    });

    let mut pipeline = Pipeline::<WebhookContext, FlowError>::new(
      "payment_webhook",
      &[
        ("verify_signature", false, None),
        ("filter_event", false, None),
        ("parse_items", false, None),
        ("check_ledger", false, None),
        ("fulfill_order", false, None),
        ("record_payment", false, None),
      ],
    );

    let d = deps.clone();
    pipeline.on_step("verify_signature", move |ctx| verify_signature_step(d.clone(), ctx));
    pipeline.on_step("filter_event", filter_event_step);
    let d = deps.clone();
    pipeline.on_step("parse_items", move |ctx| parse_items_step(d.clone(), ctx));
    let d = deps.clone();
    pipeline.on_step("check_ledger", move |ctx| check_ledger_step(d.clone(), ctx));
    let d = deps.clone();
    pipeline.on_step("fulfill_order", move |ctx| fulfill_order_step(d.clone(), ctx));
    let d = deps;
    pipeline.on_step("record_payment", move |ctx| record_payment_step(d.clone(), ctx));

    Self { pipeline }
  }

  pub async fn process(&self, raw_body: &[u8], signature: Option<&str>) -> Result<WebhookOutcome, FlowError> {
    self.process_with_state(raw_body, signature).await.1
  }

  /// Like `process`, also returning the last state the machine reached.
  #[instrument(name = "WebhookProcessor::process", skip_all, fields(bytes = raw_body.len()))]
  pub async fn process_with_state(
    &self,
    raw_body: &[u8],
    signature: Option<&str>,
  ) -> (WebhookState, Result<WebhookOutcome, FlowError>) {
    let ctx = ContextData::new(WebhookContext::new(raw_body.to_vec(), signature.map(str::to_string)));
    let run = self.pipeline.run(ctx.clone()).await;

    let mut guard = ctx.write();
    if let Err(e) = run {
      if e.is_client_error() || matches!(e, FlowError::Signature) {
        warn!(reached = ?guard.state, error = %e, "Webhook delivery rejected.");
      } else {
        error!(reached = ?guard.state, error = %e, "Webhook processing failed.");
      }
      guard.state = WebhookState::Rejected;
      return (guard.state, Err(e));
    }
    let outcome = guard.outcome.take().ok_or_else(|| {
      FlowError::from(PipelineError::MissingOutput {
        pipeline: self.pipeline.name(),
        field: "outcome",
      })
    });
    (guard.state, outcome)
  }
}

async fn verify_signature_step(deps: Arc<WebhookDeps>, ctx: ContextData<WebhookContext>) -> Result<PipelineControl, FlowError> {
  let Some(secret) = deps.settings.webhook_secret.as_deref().filter(|s| !s.is_empty()) else {
    error!("Webhook secret is not configured; cannot verify deliveries.");
    return Err(FlowError::Config("webhook secret is not configured".to_string()));
  };

  let mut guard = ctx.write();
  let verified = match guard.signature.as_deref() {
    Some(signature) if !signature.trim().is_empty() => {
      deps.gateway.verify_signature(&guard.raw_body, signature.trim(), secret)
    }
    _ => {
      warn!("Webhook delivery without a signature header.");
      false
    }
  };
  if !verified {
    warn!("Webhook signature verification failed.");
    return Err(FlowError::Signature);
  }
  guard.state = WebhookState::SignatureVerified;
  Ok(PipelineControl::Continue)
}

async fn filter_event_step(ctx: ContextData<WebhookContext>) -> Result<PipelineControl, FlowError> {
  let mut guard = ctx.write();
  let event = WebhookEvent::parse(&guard.raw_body)?;
  if !event.is_payment_captured() {
    info!(event = %event.event, "Ignoring webhook event.");
    guard.outcome = Some(WebhookOutcome::Ignored { event: event.event });
    return Ok(PipelineControl::Stop);
  }

  let payment = event.payment_entity()?;
  info!(payment_id = %payment.id, order_id = ?payment.order_id, amount = payment.amount, "Payment captured.");
  guard.payment = Some(payment);
  guard.state = WebhookState::EventFiltered;
  Ok(PipelineControl::Continue)
}

fn captured(guard: &WebhookContext) -> Result<&PaymentEntity, FlowError> {
  guard.payment.as_ref().ok_or_else(|| {
    FlowError::from(PipelineError::MissingOutput {
      pipeline: "payment_webhook",
      field: "payment",
    })
  })
}

async fn parse_items_step(deps: Arc<WebhookDeps>, ctx: ContextData<WebhookContext>) -> Result<PipelineControl, FlowError> {
  let mut guard = ctx.write();
  let payment = captured(&guard)?;
  let payment_id = payment.id.clone();
  let order_id = payment.order_id.clone().unwrap_or_default();

  let (items, printer_id) = match decode_manifest(&payment.notes)? {
    Manifest::Items {
      items,
      printer_id,
      skipped,
    } => {
      if skipped > 0 {
        warn!(%payment_id, %order_id, skipped, "Some manifest entries were unusable.");
      }
      (items, printer_id)
    }
    Manifest::Truncated { marker } => {
      error!(%payment_id, %order_id, %marker, "Manifest was truncated at order creation; order needs manual fulfillment.");
      guard.outcome = Some(WebhookOutcome::Acknowledged {
        payment_id,
        reason: "item manifest truncated".to_string(),
      });
      return Ok(PipelineControl::Stop);
    }
    Manifest::Missing => {
      error!(%payment_id, %order_id, "Captured payment carries no item manifest; order needs manual fulfillment.");
      guard.outcome = Some(WebhookOutcome::Acknowledged {
        payment_id,
        reason: "item manifest missing".to_string(),
      });
      return Ok(PipelineControl::Stop);
    }
  };

  if items.is_empty() {
    warn!(%payment_id, %order_id, "No valid items found in the manifest.");
    guard.outcome = Some(WebhookOutcome::Acknowledged {
      payment_id,
      reason: "no valid items".to_string(),
    });
    return Ok(PipelineControl::Stop);
  }

  let printer = match deps.printers.resolve(printer_id.as_deref()) {
    Ok(printer) => printer.clone(),
    Err(e) => {
      error!(%payment_id, error = %e, "Unknown printer in paid order; sending to the default printer.");
      deps.printers.default_printer().clone()
    }
  };

  guard.items = items;
  guard.printer = Some(printer);
  guard.state = WebhookState::ItemsParsed;
  Ok(PipelineControl::Continue)
}

async fn check_ledger_step(deps: Arc<WebhookDeps>, ctx: ContextData<WebhookContext>) -> Result<PipelineControl, FlowError> {
  let payment_id = captured(&ctx.read())?.id.clone();
  if deps.ledger.find_by_payment_id(&payment_id).await?.is_some() {
    info!(%payment_id, "Payment already recorded; skipping redelivery.");
    ctx.write().outcome = Some(WebhookOutcome::Duplicate { payment_id });
    return Ok(PipelineControl::Stop);
  }
  Ok(PipelineControl::Continue)
}

async fn fulfill_order_step(deps: Arc<WebhookDeps>, ctx: ContextData<WebhookContext>) -> Result<PipelineControl, FlowError> {
  let request = {
    let guard = ctx.read();
    let payment = captured(&guard)?;
    let printer = guard.printer.clone().ok_or(PipelineError::MissingOutput {
      pipeline: "payment_webhook",
      field: "printer",
    })?;
    FulfillmentRequest {
      order_reference: payment.order_id.clone().unwrap_or_else(|| payment.id.clone()),
      payment_id: Some(payment.id.clone()),
      printer,
      items: guard.items.clone(),
    }
  };

  let report = deps.fulfillment.execute(request).await;
  let mut guard = ctx.write();
  guard.report = Some(report);
  guard.state = WebhookState::Fulfilled;
  Ok(PipelineControl::Continue)
}

/// Payment instant in the ledger timezone. Falls back to `received_at`.
fn payment_instant(payment: &PaymentEntity, received_at: DateTime<Utc>, offset: FixedOffset) -> DateTime<FixedOffset> {
  let utc = match payment.created_at.and_then(|secs| Utc.timestamp_opt(secs, 0).single()) {
    Some(instant) => instant,
    None => {
      warn!(payment_id = %payment.id, "Payment has no usable created_at; using the processing time.");
      received_at
    }
  };
  utc.with_timezone(&offset)
}

async fn record_payment_step(deps: Arc<WebhookDeps>, ctx: ContextData<WebhookContext>) -> Result<PipelineControl, FlowError> {
  let (new_payment, order_id, report) = {
    let guard = ctx.read();
    let payment = captured(&guard)?;
    let paid_at = payment_instant(payment, guard.received_at, deps.settings.ledger_offset);
    let phone = guard.printer.as_ref().map(|p| p.phone.clone()).unwrap_or_default();
    (
      NewPayment::from_capture(payment.id.clone(), payment.amount, paid_at, phone),
      payment.order_id.clone(),
      guard.report.clone().unwrap_or_default(),
    )
  };
  let payment_id = new_payment.payment_id.clone();

  let outcome = match deps.ledger.insert(new_payment).await {
    Ok(record) => {
      info!(%payment_id, ledger_id = record.id, amount = %record.amount, "Payment recorded.");
      WebhookOutcome::Processed {
        payment_id,
        order_id,
        report,
      }
    }
    Err(FlowError::DuplicatePayment(_)) => {
      warn!(%payment_id, "Concurrent delivery recorded this payment first; order may have been fulfilled twice.");
      WebhookOutcome::Duplicate { payment_id }
    }
    Err(e) => {
      error!(%payment_id, ?order_id, error = %e, "Order fulfilled but the payment could not be recorded.");
      return Err(e);
    }
  };

  ctx.write().outcome = Some(outcome);
  Ok(PipelineControl::Continue)
}
