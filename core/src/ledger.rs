// printflow/src/ledger.rs

//! Payment ledger records, the summary query, and an in-memory ledger.

use crate::error::FlowError;
use crate::ports::PaymentLedger;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A captured payment about to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
  pub payment_id: String,
  pub payment_date: NaiveDate,
  pub payment_time: NaiveTime,
  pub amount: Decimal,
  pub phone_number: String,
}

impl NewPayment {
  /// `amount_minor` is in minor units and becomes a 2-decimal amount.
  /// `paid_at` must already be in the ledger's timezone.
  pub fn from_capture(
    payment_id: impl Into<String>,
    amount_minor: i64,
    paid_at: DateTime<FixedOffset>,
    phone_number: impl Into<String>,
  ) -> Self {
    Self {
      payment_id: payment_id.into(),
      payment_date: paid_at.date_naive(),
      payment_time: paid_at.time(),
      amount: Decimal::new(amount_minor, 2),
      phone_number: phone_number.into(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
  pub id: i64,
  pub payment_id: String,
  pub payment_date: NaiveDate,
  pub payment_time: NaiveTime,
  pub amount: Decimal,
  pub phone_number: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
  /// Stamps both timestamps with `now`. Records are never updated afterwards.
  pub fn from_new(id: i64, payment: NewPayment, now: DateTime<Utc>) -> Self {
    Self {
      id,
      payment_id: payment.payment_id,
      payment_date: payment.payment_date,
      payment_time: payment.payment_time,
      amount: payment.amount,
      phone_number: payment.phone_number,
      created_at: now,
      updated_at: now,
    }
  }
}

/// Date window of a payment summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryFilter {
  Day,
  Month,
  Custom { start: NaiveDate, end: NaiveDate },
}

impl SummaryFilter {
  /// Parses the `filter`/`start`/`end` query triple. Filter names are case-insensitive.
  pub fn parse(filter: &str, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self, FlowError> {
    match filter.trim().to_ascii_uppercase().as_str() {
      "DAY" => Ok(SummaryFilter::Day),
      "MONTH" => Ok(SummaryFilter::Month),
      "CUSTOM" => match (start, end) {
        (Some(start), Some(end)) if end >= start => Ok(SummaryFilter::Custom { start, end }),
        (Some(_), Some(_)) => Err(FlowError::Validation("End date must not be before start date.".to_string())),
        _ => Err(FlowError::Validation(
          "Start and end dates are required for a custom filter.".to_string(),
        )),
      },
      other => Err(FlowError::Validation(format!("Unknown filter type '{}'", other))),
    }
  }

  pub fn name(&self) -> &'static str {
    match self {
      SummaryFilter::Day => "DAY",
      SummaryFilter::Month => "MONTH",
      SummaryFilter::Custom { .. } => "CUSTOM",
    }
  }

  /// Inclusive date range relative to `today` (already in the ledger's timezone).
  pub fn range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    match *self {
      SummaryFilter::Day => (today, today),
      SummaryFilter::Month => (today.with_day(1).unwrap_or(today), today),
      SummaryFilter::Custom { start, end } => (start, end),
    }
  }
}

pub fn is_valid_phone(phone: &str) -> bool {
  phone.len() == 10 && phone.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSummary {
  pub name: String,
  pub phone: String,
  pub filter_type: &'static str,
  pub start_date: NaiveDate,
  pub end_date: NaiveDate,
  pub payments: Vec<PaymentRecord>,
  pub total_payment: Decimal,
}

/// Builds the summary for one printer phone over `filter`.
pub async fn summarize_payments(
  ledger: &dyn PaymentLedger,
  name: String,
  phone: &str,
  filter: SummaryFilter,
  today: NaiveDate,
) -> Result<PaymentSummary, FlowError> {
  if !is_valid_phone(phone) {
    return Err(FlowError::Validation("Phone number must be exactly 10 digits.".to_string()));
  }
  let (start_date, end_date) = filter.range(today);
  let payments = ledger.payments_for_phone(phone, start_date, end_date).await?;
  let total_payment = payments.iter().map(|p| p.amount).sum();
  Ok(PaymentSummary {
    name,
    phone: phone.to_string(),
    filter_type: filter.name(),
    start_date,
    end_date,
    payments,
    total_payment,
  })
}

/// Process-local ledger for tests and database-less deployments.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
  rows: Mutex<Vec<PaymentRecord>>,
}

impl InMemoryLedger {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.rows.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.lock().is_empty()
  }

  pub fn records(&self) -> Vec<PaymentRecord> {
    self.rows.lock().clone()
  }
}

#[async_trait]
impl PaymentLedger for InMemoryLedger {
  async fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<PaymentRecord>, FlowError> {
    Ok(self.rows.lock().iter().find(|r| r.payment_id == payment_id).cloned())
  }

  async fn insert(&self, payment: NewPayment) -> Result<PaymentRecord, FlowError> {
    let mut rows = self.rows.lock();
    if rows.iter().any(|r| r.payment_id == payment.payment_id) {
      return Err(FlowError::DuplicatePayment(payment.payment_id));
    }
    let record = PaymentRecord::from_new(rows.len() as i64 + 1, payment, Utc::now());
    rows.push(record.clone());
    Ok(record)
  }

  async fn payments_for_phone(&self, phone: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<PaymentRecord>, FlowError> {
    let mut found: Vec<PaymentRecord> = self
      .rows
      .lock()
      .iter()
      .filter(|r| r.phone_number == phone && r.payment_date >= from && r.payment_date <= to)
      .cloned()
      .collect();
    found.sort_by_key(|r| (r.payment_date, r.payment_time));
    Ok(found)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn ist() -> FixedOffset {
    FixedOffset::east_opt(330 * 60).unwrap()
  }

  #[test]
  fn capture_amount_is_two_decimal_and_local() {
    let paid_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap().with_timezone(&ist());
    let payment = NewPayment::from_capture("pay_1", 4_550, paid_at, "9999999999");
    assert_eq!(payment.amount.to_string(), "45.50");
    assert_eq!(payment.payment_date, NaiveDate::from_ymd_opt(2023, 11, 15).unwrap());
    assert_eq!(payment.payment_time, NaiveTime::from_hms_opt(3, 43, 20).unwrap());
  }

  #[test]
  fn summary_filters() {
    let today = NaiveDate::from_ymd_opt(2024, 3, 17).unwrap();
    let month = SummaryFilter::parse("month", None, None).unwrap();
    assert_eq!(month.range(today), (NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), today));
    assert_eq!(SummaryFilter::parse("DAY", None, None).unwrap().range(today), (today, today));

    let start = NaiveDate::from_ymd_opt(2024, 1, 1);
    let end = NaiveDate::from_ymd_opt(2024, 1, 31);
    assert!(SummaryFilter::parse("CUSTOM", start, end).is_ok());
    assert!(SummaryFilter::parse("CUSTOM", end, start).is_err());
    assert!(SummaryFilter::parse("CUSTOM", start, None).is_err());
    assert!(SummaryFilter::parse("WEEK", None, None).is_err());
  }

  #[test]
  fn phone_shape() {
    assert!(is_valid_phone("9876543210"));
    assert!(!is_valid_phone("98765432"));
    assert!(!is_valid_phone("98765x3210"));
  }
}
