// printflow_server/src/db/payment_ledger.rs

//! Postgres-backed payment ledger. Uniqueness of `payment_id` is enforced by
//! the table; a violation surfaces as a duplicate.

use crate::models::PaymentDetail;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use printflow::{FlowError, NewPayment, PaymentLedger, PaymentRecord};
use sqlx::PgPool;
use tracing::{debug, instrument};

const UNIQUE_VIOLATION: &str = "23505";

// Timestamps are bound by the caller, the table has no defaults for them.
const INSERT_PAYMENT: &str = "INSERT INTO payment_details \
   (payment_date, payment_time, payment_id, phone_number, amount, created_at, updated_at) \
   VALUES ($1, $2, $3, $4, $5, $6, $7) \
   RETURNING id, payment_id, payment_date, payment_time, amount, phone_number, created_at, updated_at";

#[derive(Clone)]
pub struct PgPaymentLedger {
  pool: PgPool,
}

impl PgPaymentLedger {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(&self.pool).await
  }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
  err
    .as_database_error()
    .and_then(|db_err| db_err.code())
    .is_some_and(|code| code == UNIQUE_VIOLATION)
}

#[async_trait]
impl PaymentLedger for PgPaymentLedger {
  #[instrument(name = "PgPaymentLedger::find_by_payment_id", skip(self))]
  async fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<PaymentRecord>, FlowError> {
    let row = sqlx::query_as::<_, PaymentDetail>(
      "SELECT id, payment_id, payment_date, payment_time, amount, phone_number, created_at, updated_at \
       FROM payment_details WHERE payment_id = $1",
    )
    .bind(payment_id)
    .fetch_optional(&self.pool)
    .await
    .map_err(FlowError::ledger)?;
    Ok(row.map(PaymentRecord::from))
  }

  #[instrument(name = "PgPaymentLedger::insert", skip_all, fields(payment_id = %payment.payment_id))]
  async fn insert(&self, payment: NewPayment) -> Result<PaymentRecord, FlowError> {
    let stamped = PaymentRecord::from_new(0, payment, Utc::now());
    let result = sqlx::query_as::<_, PaymentDetail>(INSERT_PAYMENT)
      .bind(stamped.payment_date)
      .bind(stamped.payment_time)
      .bind(&stamped.payment_id)
      .bind(&stamped.phone_number)
      .bind(stamped.amount)
      .bind(stamped.created_at)
      .bind(stamped.updated_at)
      .fetch_one(&self.pool)
      .await;

    match result {
      Ok(row) => {
        debug!(id = row.id, "Payment row inserted.");
        Ok(row.into())
      }
      Err(e) if is_unique_violation(&e) => Err(FlowError::DuplicatePayment(stamped.payment_id)),
      Err(e) => Err(FlowError::ledger(e)),
    }
  }

  #[instrument(name = "PgPaymentLedger::payments_for_phone", skip(self))]
  async fn payments_for_phone(&self, phone: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<PaymentRecord>, FlowError> {
    let rows = sqlx::query_as::<_, PaymentDetail>(
      "SELECT id, payment_id, payment_date, payment_time, amount, phone_number, created_at, updated_at \
       FROM payment_details \
       WHERE phone_number = $1 AND payment_date BETWEEN $2 AND $3 \
       ORDER BY payment_date, payment_time, id",
    )
    .bind(phone)
    .bind(from)
    .bind(to)
    .fetch_all(&self.pool)
    .await
    .map_err(FlowError::ledger)?;
    Ok(rows.into_iter().map(PaymentRecord::from).collect())
  }
}
