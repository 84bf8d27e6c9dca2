// printflow/src/printers.rs

//! Printer directory: where an order is delivered and what it costs there.
//! Loaded from configuration so adding a printer needs no rebuild.

use crate::error::FlowError;
use crate::ledger::is_valid_phone;
use crate::order::pricing::PricingTable;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Printer {
  pub id: String,
  pub email: String,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub phone: String,
  #[serde(default)]
  pub rates: PricingTable,
}

#[derive(Debug, Clone)]
pub struct PrinterDirectory {
  printers: Vec<Printer>,
}

impl PrinterDirectory {
  pub fn new(printers: Vec<Printer>) -> Result<Self, FlowError> {
    if printers.is_empty() {
      return Err(FlowError::Config("printer directory is empty".to_string()));
    }
    for (idx, printer) in printers.iter().enumerate() {
      if printer.id.trim().is_empty() || printer.email.trim().is_empty() {
        return Err(FlowError::Config(format!("printer #{} needs an id and an email", idx + 1)));
      }
      // The ledger keys payments by this phone and stores exactly ten digits.
      if !printer.phone.is_empty() && !is_valid_phone(&printer.phone) {
        return Err(FlowError::Config(format!(
          "printer '{}' phone must be exactly 10 digits, got '{}'",
          printer.id, printer.phone
        )));
      }
      if printers[..idx].iter().any(|p| p.id == printer.id) {
        return Err(FlowError::Config(format!("duplicate printer id '{}'", printer.id)));
      }
    }
    Ok(Self { printers })
  }

  /// A directory with one printer on the default rates.
  pub fn single(id: impl Into<String>, email: impl Into<String>) -> Result<Self, FlowError> {
    Self::new(vec![Printer {
      id: id.into(),
      email: email.into(),
      name: String::new(),
      phone: String::new(),
      rates: PricingTable::default(),
    }])
  }

  pub fn from_json_str(raw: &str) -> Result<Self, FlowError> {
    let printers: Vec<Printer> =
      serde_json::from_str(raw).map_err(|e| FlowError::Config(format!("invalid printer directory: {}", e)))?;
    Self::new(printers)
  }

  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FlowError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
      .map_err(|e| FlowError::Config(format!("cannot read printer directory {}: {}", path.display(), e)))?;
    Self::from_json_str(&raw)
  }

  pub fn get(&self, id: &str) -> Option<&Printer> {
    self.printers.iter().find(|p| p.id == id)
  }

  /// The first configured printer. Orders that name no printer go here.
  pub fn default_printer(&self) -> &Printer {
    &self.printers[0]
  }

  /// Looks up `id`, falling back to the default printer when `id` is `None`.
  pub fn resolve(&self, id: Option<&str>) -> Result<&Printer, FlowError> {
    match id {
      None => Ok(self.default_printer()),
      Some(id) => self
        .get(id)
        .ok_or_else(|| FlowError::Validation(format!("Unknown printer id '{}'", id))),
    }
  }

  pub fn find_by_phone(&self, phone: &str) -> Option<&Printer> {
    self.printers.iter().find(|p| !p.phone.is_empty() && p.phone == phone)
  }

  pub fn iter(&self) -> impl Iterator<Item = &Printer> {
    self.printers.iter()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const DIRECTORY: &str = r#"[
    {"id":"1","email":"front@example.com","name":"Front desk","phone":"9999999999"},
    {"id":"2","email":"lab@example.com","name":"Lab","phone":"8888888888",
     "rates":{"bw":{"thresholdPages":3,"baseRate":15,"remainderRate":8},"color":{"thresholdPages":1,"baseRate":30,"remainderRate":10}}}
  ]"#;

  #[test]
  fn loads_and_resolves_printers() {
    let dir = PrinterDirectory::from_json_str(DIRECTORY).unwrap();
    assert_eq!(dir.resolve(None).unwrap().id, "1");
    assert_eq!(dir.resolve(Some("2")).unwrap().rates.bw.price(4), 53);
    assert_eq!(dir.get("1").unwrap().rates, PricingTable::default());
    assert_eq!(dir.find_by_phone("8888888888").unwrap().name, "Lab");
    assert!(dir.find_by_phone("").is_none());
    assert!(matches!(dir.resolve(Some("9")), Err(FlowError::Validation(_))));
  }

  #[test]
  fn rejects_bad_directories() {
    assert!(PrinterDirectory::from_json_str("[]").is_err());
    assert!(PrinterDirectory::from_json_str(r#"[{"id":"1","email":""}]"#).is_err());
    assert!(PrinterDirectory::from_json_str(r#"[{"id":"1","email":"a@x"},{"id":"1","email":"b@x"}]"#).is_err());
    assert!(PrinterDirectory::from_json_str("not json").is_err());
  }

  #[test]
  fn rejects_phones_the_ledger_cannot_store() {
    for phone in ["+919502884420", "95028844", "95028 84420", "950288442a"] {
      let raw = format!(r#"[{{"id":"1","email":"a@x","phone":"{}"}}]"#, phone);
      assert!(
        matches!(PrinterDirectory::from_json_str(&raw), Err(FlowError::Config(_))),
        "{}",
        phone
      );
    }
    let no_phone = PrinterDirectory::from_json_str(r#"[{"id":"1","email":"a@x"}]"#).unwrap();
    assert_eq!(no_phone.default_printer().phone, "");
    assert!(PrinterDirectory::from_json_str(r#"[{"id":"1","email":"a@x","phone":"9502884420"}]"#).is_ok());
  }
}
