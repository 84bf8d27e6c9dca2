// printflow_server/src/services/email_mock.rs

//! Mailer that logs instead of sending. Used with `MAILER=log`.

use async_trait::async_trait;
use printflow::{FlowError, Mailer, OutboundEmail};
use std::sync::Mutex;
use tracing::info;

#[derive(Debug, Default)]
pub struct LogMailer {
  // (subject, attachment names)
  sent: Mutex<Vec<(String, Vec<String>)>>,
}

impl LogMailer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn sent(&self) -> Vec<(String, Vec<String>)> {
    match self.sent.lock() {
      Ok(guard) => guard.clone(),
      Err(poisoned) => poisoned.into_inner().clone(),
    }
  }
}

#[async_trait]
impl Mailer for LogMailer {
  async fn send(&self, email: OutboundEmail) -> Result<String, FlowError> {
    let names: Vec<String> = email.attachments.iter().map(|a| a.file_name.clone()).collect();
    let bytes: usize = email.attachments.iter().map(|a| a.bytes.len()).sum();
    info!(
      to = %email.to,
      from = %email.from,
      subject = %email.subject,
      attachments = ?names,
      bytes,
      "Simulating email send."
    );
    let message_id = format!("log_email_{}", uuid::Uuid::new_v4());
    match self.sent.lock() {
      Ok(mut guard) => guard.push((email.subject, names)),
      Err(poisoned) => poisoned.into_inner().push((email.subject, names)),
    }
    Ok(message_id)
  }
}
