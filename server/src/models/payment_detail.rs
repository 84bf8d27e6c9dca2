// printflow_server/src/models/payment_detail.rs

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use printflow::PaymentRecord;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// One row of `payment_details`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PaymentDetail {
  pub id: i64,
  pub payment_id: String,
  pub payment_date: NaiveDate,
  pub payment_time: NaiveTime,
  pub amount: Decimal,
  pub phone_number: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl From<PaymentDetail> for PaymentRecord {
  fn from(row: PaymentDetail) -> Self {
    PaymentRecord {
      id: row.id,
      payment_id: row.payment_id,
      payment_date: row.payment_date,
      payment_time: row.payment_time,
      amount: row.amount,
      phone_number: row.phone_number,
      created_at: row.created_at,
      updated_at: row.updated_at,
    }
  }
}
