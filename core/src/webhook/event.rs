// printflow/src/webhook/event.rs

//! Gateway webhook envelope:
//! `{event, payload: {payment: {entity: {id, order_id, amount, currency, created_at, notes}}}}`.

use crate::error::FlowError;
use serde::Deserialize;
use serde_json::Value;

pub const PAYMENT_CAPTURED: &str = "payment.captured";
pub const SIGNATURE_HEADER: &str = "X-Razorpay-Signature";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentEntity {
  pub id: String,
  #[serde(default)]
  pub order_id: Option<String>,
  /// Minor currency units.
  pub amount: i64,
  #[serde(default)]
  pub currency: Option<String>,
  /// Unix seconds, UTC.
  #[serde(default)]
  pub created_at: Option<i64>,
  #[serde(default)]
  pub notes: Value,
}

#[derive(Debug, Clone)]
pub struct WebhookEvent {
  pub event: String,
  payload: Value,
}

impl WebhookEvent {
  pub fn parse(raw_body: &[u8]) -> Result<Self, FlowError> {
    let body: Value = serde_json::from_slice(raw_body)
      .map_err(|e| FlowError::MalformedPayload(format!("body is not JSON: {}", e)))?;
    let event = body
      .get("event")
      .and_then(Value::as_str)
      .unwrap_or_default()
      .to_string();
    let payload = body.get("payload").cloned().unwrap_or(Value::Null);
    Ok(Self { event, payload })
  }

  pub fn is_payment_captured(&self) -> bool {
    self.event == PAYMENT_CAPTURED
  }

  pub fn payment_entity(&self) -> Result<PaymentEntity, FlowError> {
    let entity = self
      .payload
      .pointer("/payment/entity")
      .cloned()
      .ok_or_else(|| FlowError::MalformedPayload("missing payload.payment.entity".to_string()))?;
    serde_json::from_value(entity).map_err(|e| FlowError::MalformedPayload(format!("bad payment entity: {}", e)))
  }
}
