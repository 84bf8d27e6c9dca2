// printflow_server/src/services/razorpay.rs

//! Razorpay adapter: order creation over the REST API and webhook signature
//! verification (hex HMAC-SHA256 of the raw body).

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use printflow::{CreateOrderRequest, FlowError, GatewayOrder, PaymentGateway};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 of `body` under `secret`.
pub fn sign_hmac_sha256(body: &[u8], secret: &str) -> String {
  let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
    Ok(mac) => mac,
    Err(_) => return String::new(),
  };
  mac.update(body);
  hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex HMAC-SHA256 signature.
pub fn verify_hmac_sha256(body: &[u8], signature_hex: &str, secret: &str) -> bool {
  let Ok(expected) = hex::decode(signature_hex.trim()) else {
    return false;
  };
  let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
    return false;
  };
  mac.update(body);
  mac.verify_slice(&expected).is_ok()
}

#[derive(Debug, Serialize)]
struct OrderBody<'a> {
  amount: u64,
  currency: &'a str,
  receipt: &'a str,
  notes: &'a Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
  id: String,
  amount: u64,
}

pub struct RazorpayGateway {
  client: reqwest::Client,
  api_base: String,
  key_id: String,
  key_secret: String,
}

impl RazorpayGateway {
  pub fn new(api_base: impl Into<String>, key_id: impl Into<String>, key_secret: impl Into<String>) -> anyhow::Result<Self> {
    let client = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self {
      client,
      api_base: api_base.into().trim_end_matches('/').to_string(),
      key_id: key_id.into(),
      key_secret: key_secret.into(),
    })
  }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
  #[instrument(name = "RazorpayGateway::create_order", skip_all, fields(receipt = %request.receipt_id, amount = request.amount_minor))]
  async fn create_order(&self, request: CreateOrderRequest) -> Result<GatewayOrder, FlowError> {
    if request.amount_minor == 0 {
      return Err(FlowError::Gateway("amount must be greater than zero".to_string()));
    }

    let body = OrderBody {
      amount: request.amount_minor,
      currency: &request.currency,
      receipt: &request.receipt_id,
      notes: &request.notes,
    };
    let response = self
      .client
      .post(format!("{}/orders", self.api_base))
      .basic_auth(&self.key_id, Some(&self.key_secret))
      .json(&body)
      .send()
      .await
      .map_err(|e| FlowError::Gateway(format!("failed to reach gateway: {}", e)))?;

    let status = response.status();
    let text = response
      .text()
      .await
      .map_err(|e| FlowError::Gateway(format!("failed to read gateway response: {}", e)))?;

    if status == StatusCode::UNAUTHORIZED {
      warn!("Gateway rejected the API credentials.");
      return Err(FlowError::Gateway("authentication failed".to_string()));
    }
    if !status.is_success() {
      warn!(%status, body = %text, "Gateway refused order creation.");
      return Err(FlowError::Gateway(format!("order creation failed with status {}", status)));
    }

    let order: OrderResponse =
      serde_json::from_str(&text).map_err(|e| FlowError::Gateway(format!("unexpected gateway response: {}", e)))?;
    debug!(order_id = %order.id, "Gateway order response parsed.");
    info!(order_id = %order.id, "Razorpay order created.");
    Ok(GatewayOrder {
      order_id: order.id,
      amount_minor: order.amount,
    })
  }

  fn verify_signature(&self, raw_body: &[u8], signature: &str, secret: &str) -> bool {
    verify_hmac_sha256(raw_body, signature, secret)
  }

  fn public_key_id(&self) -> &str {
    &self.key_id
  }
}
