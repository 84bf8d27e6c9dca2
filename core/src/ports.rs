// printflow/src/ports.rs

//! Traits at the external seams: the payment gateway, outbound mail, and the
//! payment ledger. The server crate supplies the real adapters.

use crate::error::FlowError;
use crate::ledger::{NewPayment, PaymentRecord};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateOrderRequest {
  /// Amount in minor currency units (paise for INR).
  pub amount_minor: u64,
  pub currency: String,
  pub receipt_id: String,
  pub notes: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
  pub order_id: String,
  pub amount_minor: u64,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  async fn create_order(&self, request: CreateOrderRequest) -> Result<GatewayOrder, FlowError>;

  /// Checks `signature` against `raw_body` with `secret`. Must compare in
  /// constant time.
  fn verify_signature(&self, raw_body: &[u8], signature: &str, secret: &str) -> bool;

  /// Key id handed to the browser checkout widget.
  fn public_key_id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAttachment {
  pub file_name: String,
  pub content_type: String,
  pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutboundEmail {
  pub from: String,
  pub to: String,
  pub subject: String,
  pub body: String,
  pub attachments: Vec<EmailAttachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
  /// Sends one message. Returns a transport message id or a short receipt.
  async fn send(&self, email: OutboundEmail) -> Result<String, FlowError>;
}

#[async_trait]
pub trait PaymentLedger: Send + Sync {
  async fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<PaymentRecord>, FlowError>;

  /// Appends a payment. A payment id that is already present fails with
  /// `FlowError::DuplicatePayment` and leaves the existing row untouched.
  async fn insert(&self, payment: NewPayment) -> Result<PaymentRecord, FlowError>;

  /// Payments recorded for `phone` with a payment date in `from..=to`, oldest first.
  async fn payments_for_phone(&self, phone: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<PaymentRecord>, FlowError>;
}
