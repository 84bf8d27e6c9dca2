// printflow_server/src/errors.rs

use actix_web::{HttpResponse, ResponseError};
use printflow::FlowError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Malformed Payload: {0}")]
  MalformedPayload(String),

  #[error("Signature Verification Failed")]
  Signature,

  #[error("Payment Gateway Error: {0}")]
  Gateway(String),

  #[error("Duplicate Payment: {0}")]
  DuplicatePayment(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Fulfillment Error: {source}")]
  Flow {
    #[source]
    source: FlowError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<FlowError> for AppError {
  fn from(err: FlowError) -> Self {
    match err {
      FlowError::Validation(m) => AppError::Validation(m),
      e @ (FlowError::InvalidRange { .. } | FlowError::UnsupportedDocument(_) | FlowError::PathTraversal(_)) => {
        AppError::Validation(e.to_string())
      }
      FlowError::MalformedPayload(m) => AppError::MalformedPayload(m),
      FlowError::Signature => AppError::Signature,
      FlowError::Gateway(m) => AppError::Gateway(m),
      FlowError::DuplicatePayment(id) => AppError::DuplicatePayment(id),
      FlowError::Config(m) => AppError::Config(m),
      other => AppError::Flow { source: other },
    }
  }
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<sqlx::Error>() {
      Ok(sqlx_err) => AppError::Sqlx(sqlx_err),
      Err(err) => AppError::Internal(err.to_string()),
    }
  }
}

impl ResponseError for AppError {
  fn error_response(&self) -> HttpResponse {
    tracing::error!(application_error = %self, "Responding with error");
    match self {
      AppError::Validation(m) => HttpResponse::BadRequest().json(json!({"error": m})),
      AppError::MalformedPayload(m) => HttpResponse::BadRequest().json(json!({"error": "Malformed payload", "detail": m})),
      AppError::Signature => HttpResponse::Unauthorized().json(json!({"error": "Webhook signature verification failed"})),
      AppError::Gateway(m) => HttpResponse::BadGateway().json(json!({"error": "Payment gateway error", "detail": m})),
      AppError::DuplicatePayment(id) => {
        HttpResponse::Conflict().json(json!({"error": "Payment already recorded", "paymentId": id}))
      }
      AppError::NotFound(m) => HttpResponse::NotFound().json(json!({"error": m})),
      AppError::Config(m) => {
        HttpResponse::InternalServerError().json(json!({"error": "Configuration issue", "detail": m}))
      }
      AppError::Sqlx(_) => HttpResponse::InternalServerError().json(json!({"error": "Database operation failed"})),
      AppError::Flow { source } => {
        tracing::error!(flow_error_source = ?source, "Fulfillment pipeline error details");
        HttpResponse::InternalServerError().json(json!({"error": "Processing error", "detail": source.to_string()}))
      }
      AppError::Internal(m) => {
        HttpResponse::InternalServerError().json(json!({"error": "An internal error occurred", "detail": m}))
      }
    }
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
