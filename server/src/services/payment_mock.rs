// printflow_server/src/services/payment_mock.rs

//! Offline gateway for local runs and tests. Orders get a random id; webhook
//! signatures are checked the same way the real gateway signs them.

use crate::services::razorpay::verify_hmac_sha256;
use async_trait::async_trait;
use printflow::{CreateOrderRequest, FlowError, GatewayOrder, PaymentGateway};
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct MockGateway {
  key_id: String,
}

impl MockGateway {
  pub fn new(key_id: impl Into<String>) -> Self {
    Self { key_id: key_id.into() }
  }
}

impl Default for MockGateway {
  fn default() -> Self {
    Self::new("mock_key")
  }
}

#[async_trait]
impl PaymentGateway for MockGateway {
  #[instrument(name = "MockGateway::create_order", skip_all, fields(receipt = %request.receipt_id, amount = request.amount_minor))]
  async fn create_order(&self, request: CreateOrderRequest) -> Result<GatewayOrder, FlowError> {
    if request.amount_minor == 0 {
      return Err(FlowError::Gateway("amount must be greater than zero".to_string()));
    }
    let order_id = format!("order_mock_{}", Uuid::new_v4().simple());
    info!(%order_id, "Simulated gateway order.");
    Ok(GatewayOrder {
      order_id,
      amount_minor: request.amount_minor,
    })
  }

  fn verify_signature(&self, raw_body: &[u8], signature: &str, secret: &str) -> bool {
    verify_hmac_sha256(raw_body, signature, secret)
  }

  fn public_key_id(&self) -> &str {
    &self.key_id
  }
}
