// printflow/src/fulfillment.rs

//! FulfillmentExecutor: one email per paid order, then cleanup of the sources.

use crate::document::naming::split_extension;
use crate::order::item::OrderItem;
use crate::ports::{EmailAttachment, Mailer, OutboundEmail};
use crate::printers::Printer;
use crate::storage::StorageRoot;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct FulfillmentRequest {
  /// Gateway order id, or the synthesized reference of a zero-amount order.
  pub order_reference: String,
  pub payment_id: Option<String>,
  pub printer: Printer,
  pub items: Vec<OrderItem>,
}

/// What happened. Fulfillment never fails as a whole; partial failures are
/// collected here and logged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FulfillmentReport {
  pub order_reference: String,
  pub attachments: Vec<String>,
  pub attachment_failures: Vec<String>,
  pub message_id: Option<String>,
  pub send_error: Option<String>,
  pub deleted: Vec<String>,
  pub deletion_failures: Vec<String>,
}

impl FulfillmentReport {
  pub fn sent(&self) -> bool {
    self.message_id.is_some()
  }

  pub fn is_clean(&self) -> bool {
    self.sent() && self.attachment_failures.is_empty() && self.deletion_failures.is_empty()
  }
}

pub fn attachment_content_type(file_name: &str) -> &'static str {
  match split_extension(file_name).1.as_str() {
    ".pdf" => "application/pdf",
    ".jpg" | ".jpeg" => "image/jpeg",
    ".png" => "image/png",
    _ => "application/octet-stream",
  }
}

/// Attachment name for copy `k` (1-based) of `file_name`: the name itself
/// for the first copy, `stem (copy k).ext` after that.
pub fn copy_name(file_name: &str, copy: u32) -> String {
  if copy <= 1 {
    return file_name.to_string();
  }
  let (stem, ext) = match file_name.rfind('.') {
    Some(idx) if idx > 0 => (&file_name[..idx], &file_name[idx..]),
    _ => (file_name, ""),
  };
  format!("{} (copy {}){}", stem, copy, ext)
}

/// Picks a name not yet in `used`, stepping the copy number past clashes.
fn unique_copy_name(file_name: &str, copy: u32, used: &mut HashSet<String>) -> String {
  let mut k = copy;
  loop {
    let candidate = copy_name(file_name, k);
    if used.insert(candidate.clone()) {
      return candidate;
    }
    k = k.max(1) + 1;
  }
}

pub struct FulfillmentExecutor {
  mailer: Arc<dyn Mailer>,
  storage: StorageRoot,
  from: String,
}

impl FulfillmentExecutor {
  pub fn new(mailer: Arc<dyn Mailer>, storage: StorageRoot, from: impl Into<String>) -> Self {
    Self {
      mailer,
      storage,
      from: from.into(),
    }
  }

  /// Emails every `(item, copy)` to the printer, then deletes each source file.
  ///
  /// A failed attachment only loses that copy; failures are listed in the
  /// mail body. Deletion runs after the send attempt whatever its outcome.
  #[instrument(
    name = "FulfillmentExecutor::execute",
    skip_all,
    fields(order = %request.order_reference, printer = %request.printer.id, items = request.items.len())
  )]
  pub async fn execute(&self, request: FulfillmentRequest) -> FulfillmentReport {
    let mut report = FulfillmentReport {
      order_reference: request.order_reference.clone(),
      ..FulfillmentReport::default()
    };

    let mut attachments = Vec::new();
    let mut used_names = HashSet::new();
    for item in &request.items {
      let bytes = self.storage.read(&item.file_name).await;
      for copy in 1..=item.copies {
        let name = unique_copy_name(&item.file_name, copy, &mut used_names);
        match &bytes {
          Ok(bytes) => {
            attachments.push(EmailAttachment {
              file_name: name.clone(),
              content_type: attachment_content_type(&item.file_name).to_string(),
              bytes: bytes.clone(),
            });
            report.attachments.push(name);
          }
          Err(e) => {
            warn!(file = %item.file_name, copy, error = %e, "Attachment failed.");
            report.attachment_failures.push(format!("{}: {}", name, e));
          }
        }
      }
    }

    match self.compose(&request, &report.attachment_failures, attachments) {
      Some(email) => match self.mailer.send(email).await {
        Ok(message_id) => {
          info!(%message_id, attachments = report.attachments.len(), "Order email sent.");
          report.message_id = Some(message_id);
        }
        Err(e) => {
          error!(error = %e, "Order email failed to send.");
          report.send_error = Some(e.to_string());
        }
      },
      None => {
        error!("Order email could not be built: sender or recipient address missing.");
        report.send_error = Some("sender or recipient address missing".to_string());
      }
    }

    let mut seen = HashSet::new();
    for item in &request.items {
      if !seen.insert(item.file_name.as_str()) {
        continue;
      }
      match self.storage.delete_file(&item.file_name).await {
        Ok(()) => report.deleted.push(item.file_name.clone()),
        Err(e) => {
          warn!(file = %item.file_name, error = %e, "Source file deletion failed.");
          report.deletion_failures.push(format!("{}: {}", item.file_name, e));
        }
      }
    }

    if report.is_clean() {
      info!("Fulfillment complete.");
    } else {
      warn!(
        attachment_failures = report.attachment_failures.len(),
        deletion_failures = report.deletion_failures.len(),
        sent = report.sent(),
        "Fulfillment finished with failures."
      );
    }
    report
  }

  fn compose(
    &self,
    request: &FulfillmentRequest,
    failures: &[String],
    attachments: Vec<EmailAttachment>,
  ) -> Option<OutboundEmail> {
    if self.from.trim().is_empty() || request.printer.email.trim().is_empty() {
      return None;
    }

    let total_copies: u64 = request.items.iter().map(|i| u64::from(i.copies)).sum();
    let subject = format!(
      "Print Request: Order {} - {} file(s) - {} copies",
      request.order_reference,
      request.items.len(),
      total_copies
    );

    let mut body = String::from("Print Request Details:\n\n");
    let _ = writeln!(body, "Order: {}", request.order_reference);
    if let Some(payment_id) = &request.payment_id {
      let _ = writeln!(body, "Payment: {}", payment_id);
    }
    body.push('\n');
    for item in &request.items {
      let _ = writeln!(
        body,
        "File: {} | Type: {} | Pages: {} | Copies: {}",
        item.file_name,
        item.print_type.label(),
        item.page_count,
        item.copies
      );
    }
    body.push_str("\nPlease find the files attached.\n");
    if !failures.is_empty() {
      body.push_str("\nWARNING: some attachments could not be included:\n");
      for failure in failures {
        let _ = writeln!(body, "- {}", failure);
      }
    }

    Some(OutboundEmail {
      from: self.from.clone(),
      to: request.printer.email.clone(),
      subject,
      body,
      attachments,
    })
  }
}
