// printflow/src/order/item.rs

//! Order items: the wire shape sent by the browser and the validated shape
//! the rest of the pipeline works with.

use crate::error::FlowError;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Colour class of a print job. On the wire this is the integer `0` (BW) or `1` (COLOR).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrintType {
  Bw,
  Color,
}

impl PrintType {
  pub fn from_code(code: i64) -> Option<Self> {
    match code {
      0 => Some(PrintType::Bw),
      1 => Some(PrintType::Color),
      _ => None,
    }
  }

  pub fn code(self) -> u8 {
    match self {
      PrintType::Bw => 0,
      PrintType::Color => 1,
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      PrintType::Bw => "B&W",
      PrintType::Color => "Color",
    }
  }
}

/// Printer ids arrive either as JSON numbers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrinterRef {
  Number(i64),
  Text(String),
}

impl PrinterRef {
  pub fn as_id(&self) -> String {
    match self {
      PrinterRef::Number(n) => n.to_string(),
      PrinterRef::Text(s) => s.trim().to_string(),
    }
  }
}

/// One line of a payment initiation request, exactly as the client sent it.
///
/// Every field is optional or signed so that a bad value surfaces as a
/// validation error with a useful message rather than a deserialization error.
/// Any client-computed price is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
  #[serde(default)]
  pub unique_id: Option<String>,
  #[serde(default)]
  pub file_name: Option<String>,
  #[serde(default)]
  pub page_count: Option<i64>,
  #[serde(default)]
  pub print_type: Option<i64>,
  #[serde(default, alias = "copies")]
  pub number_of_copies: Option<i64>,
  #[serde(default)]
  pub printer_id: Option<PrinterRef>,
}

/// A validated order line. `calculated_price` is always server-computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
  pub file_name: String,
  pub page_count: u32,
  pub print_type: PrintType,
  pub copies: u32,
  pub printer_id: Option<String>,
  pub calculated_price: u64,
}

impl OrderItem {
  pub fn new(file_name: impl Into<String>, page_count: u32, print_type: PrintType, copies: u32) -> Self {
    Self {
      file_name: file_name.into(),
      page_count,
      print_type,
      copies,
      printer_id: None,
      calculated_price: 0,
    }
  }

  pub fn with_printer(mut self, printer_id: impl Into<String>) -> Self {
    self.printer_id = Some(printer_id.into());
    self
  }

  /// Pages this line puts through the printer (`page_count * copies`).
  pub fn billable_pages(&self) -> u64 {
    u64::from(self.page_count) * u64::from(self.copies)
  }
}

/// Validates a whole batch. The first bad item rejects the entire order.
pub fn validate_items(requests: &[OrderItemRequest]) -> Result<Vec<OrderItem>, FlowError> {
  if requests.is_empty() {
    return Err(FlowError::Validation("No items provided for payment.".to_string()));
  }

  requests
    .iter()
    .enumerate()
    .map(|(idx, request)| validate_item(idx, request))
    .collect()
}

fn validate_item(idx: usize, request: &OrderItemRequest) -> Result<OrderItem, FlowError> {
  let label = request.unique_id.clone().unwrap_or_else(|| format!("#{}", idx + 1));
  let reject = |reason: &str| {
    warn!(item = %label, reason, "Rejecting order item.");
    Err(FlowError::Validation(format!("Invalid data for item {}: {}", label, reason)))
  };

  let file_name = match request.file_name.as_deref().map(str::trim) {
    Some(name) if !name.is_empty() => name.to_string(),
    _ => return reject("fileName is required"),
  };
  if file_name.contains('/') || file_name.contains('\\') || file_name.contains("..") {
    return reject("fileName must be a bare stored file name");
  }

  let page_count = match request.page_count {
    Some(n) if (0..=i64::from(u32::MAX)).contains(&n) => n as u32,
    _ => return reject("pageCount must be >= 0"),
  };

  let copies = match request.number_of_copies {
    Some(n) if (1..=i64::from(u32::MAX)).contains(&n) => n as u32,
    _ => return reject("numberOfCopies must be >= 1"),
  };

  let print_type = match request.print_type.and_then(PrintType::from_code) {
    Some(pt) => pt,
    None => return reject("printType must be 0 (B&W) or 1 (Color)"),
  };

  Ok(OrderItem {
    file_name,
    page_count,
    print_type,
    copies,
    printer_id: request.printer_id.as_ref().map(PrinterRef::as_id).filter(|id| !id.is_empty()),
    calculated_price: 0,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn request(name: &str, pages: i64, print_type: i64, copies: i64) -> OrderItemRequest {
    OrderItemRequest {
      unique_id: None,
      file_name: Some(name.to_string()),
      page_count: Some(pages),
      print_type: Some(print_type),
      number_of_copies: Some(copies),
      printer_id: None,
    }
  }

  #[test]
  fn accepts_well_formed_batch() {
    let items = validate_items(&[request("a.pdf", 3, 0, 1), request("b.pdf", 0, 1, 2)]).unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].print_type, PrintType::Color);
    assert_eq!(items[1].billable_pages(), 0);
  }

  #[test]
  fn one_bad_item_rejects_the_batch() {
    let err = validate_items(&[request("a.pdf", 3, 0, 1), request("b.pdf", 2, 7, 1)]).unwrap_err();
    assert!(matches!(err, FlowError::Validation(msg) if msg.contains("printType")));
  }

  #[test]
  fn rejects_empty_batch_zero_copies_and_negative_pages() {
    assert!(validate_items(&[]).is_err());
    assert!(validate_items(&[request("a.pdf", 1, 0, 0)]).is_err());
    assert!(validate_items(&[request("a.pdf", -1, 0, 1)]).is_err());
    assert!(validate_items(&[request("  ", 1, 0, 1)]).is_err());
    assert!(validate_items(&[request("../x.pdf", 1, 0, 1)]).is_err());
  }

  #[test]
  fn decodes_browser_payload() {
    let raw = r#"[{"uniqueId":"f1","fileName":"bw_doc_1a2b3c4d.pdf","pageCount":4,"printType":0,"numberOfCopies":2,"printerId":1,"calculatedPrice":1}]"#;
    let requests: Vec<OrderItemRequest> = serde_json::from_str(raw).unwrap();
    let items = validate_items(&requests).unwrap();
    assert_eq!(items[0].printer_id.as_deref(), Some("1"));
    assert_eq!(items[0].copies, 2);
    assert_eq!(items[0].calculated_price, 0);
  }
}
