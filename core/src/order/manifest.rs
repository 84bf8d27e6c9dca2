// printflow/src/order/manifest.rs

//! The item manifest carried in gateway order notes.
//!
//! Gateways cap note sizes, so the manifest is dropped in favour of a marker
//! when it does not fit. An order with a truncated manifest cannot be
//! fulfilled from the webhook alone.

use crate::error::FlowError;
use crate::order::item::{OrderItem, PrintType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::error;

pub const NOTES_BUDGET_BYTES: usize = 1800;

pub const NOTE_ITEMS: &str = "items";
pub const NOTE_ITEMS_TRUNCATED: &str = "items_truncated";
pub const NOTE_ITEM_COUNT: &str = "item_count";
pub const NOTE_PRINTER_ID: &str = "printer_id";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestEntry {
  #[serde(rename = "fName")]
  file_name: String,
  #[serde(rename = "pCount")]
  page_count: u32,
  #[serde(rename = "pType")]
  print_type: u8,
  copies: u32,
}

/// Builds the gateway notes for an order.
pub fn build_order_notes(items: &[OrderItem], printer_id: Option<&str>, receipt_id: &str) -> Map<String, Value> {
  let entries: Vec<ManifestEntry> = items
    .iter()
    .map(|item| ManifestEntry {
      file_name: item.file_name.clone(),
      page_count: item.page_count,
      print_type: item.print_type.code(),
      copies: item.copies,
    })
    .collect();

  let mut notes = Map::new();
  match serde_json::to_string(&entries) {
    Ok(encoded) if encoded.len() <= NOTES_BUDGET_BYTES => {
      notes.insert(NOTE_ITEMS.to_string(), Value::String(encoded));
    }
    _ => {
      notes.insert(
        NOTE_ITEMS_TRUNCATED.to_string(),
        Value::String(format!("Data exceeds notes limit. See receipt {}", receipt_id)),
      );
    }
  }
  notes.insert(NOTE_ITEM_COUNT.to_string(), Value::String(items.len().to_string()));
  if let Some(id) = printer_id {
    notes.insert(NOTE_PRINTER_ID.to_string(), Value::String(id.to_string()));
  }
  notes
}

/// What could be recovered from the notes of a captured payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Manifest {
  Items {
    items: Vec<OrderItem>,
    printer_id: Option<String>,
    /// Entries dropped because a field was missing or out of range.
    skipped: usize,
  },
  Truncated {
    marker: String,
  },
  Missing,
}

/// Decodes the manifest from gateway notes.
///
/// An `items` note that is not a JSON array is malformed. Individual bad
/// entries are skipped and counted instead.
pub fn decode_manifest(notes: &Value) -> Result<Manifest, FlowError> {
  let Some(notes) = notes.as_object() else {
    return Ok(Manifest::Missing);
  };

  let printer_id = notes.get(NOTE_PRINTER_ID).and_then(note_as_string);

  let raw_items = match notes.get(NOTE_ITEMS) {
    Some(Value::String(encoded)) => serde_json::from_str::<Value>(encoded)
      .map_err(|e| FlowError::MalformedPayload(format!("'items' note is not valid JSON: {}", e)))?,
    Some(Value::Array(entries)) => Value::Array(entries.clone()),
    Some(other) => {
      return Err(FlowError::MalformedPayload(format!(
        "'items' note has unexpected type: {}",
        json_type(other)
      )))
    }
    None => {
      return Ok(match notes.get(NOTE_ITEMS_TRUNCATED) {
        Some(marker) => Manifest::Truncated {
          marker: note_as_string(marker).unwrap_or_default(),
        },
        None => Manifest::Missing,
      });
    }
  };

  let Value::Array(entries) = raw_items else {
    return Err(FlowError::MalformedPayload("'items' note is not a JSON array".to_string()));
  };

  let mut items = Vec::with_capacity(entries.len());
  let mut skipped = 0;
  for (idx, entry) in entries.into_iter().enumerate() {
    match decode_entry(entry) {
      Ok(mut item) => {
        item.printer_id = printer_id.clone();
        items.push(item);
      }
      Err(reason) => {
        error!(entry_index = idx, %reason, "Skipping manifest entry.");
        skipped += 1;
      }
    }
  }

  Ok(Manifest::Items {
    items,
    printer_id,
    skipped,
  })
}

fn decode_entry(entry: Value) -> Result<OrderItem, String> {
  let entry: ManifestEntry = serde_json::from_value(entry).map_err(|e| e.to_string())?;
  let file_name = entry.file_name.trim();
  if file_name.is_empty() {
    return Err("empty fName".to_string());
  }
  if entry.copies == 0 {
    return Err("copies must be >= 1".to_string());
  }
  let print_type = PrintType::from_code(i64::from(entry.print_type)).ok_or_else(|| format!("pType {}", entry.print_type))?;
  Ok(OrderItem::new(file_name, entry.page_count, print_type, entry.copies))
}

fn note_as_string(value: &Value) -> Option<String> {
  match value {
    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

fn json_type(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "bool",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn manifest_survives_the_notes_round_trip() {
    let items = vec![OrderItem::new("orig_a_1234abcd.pdf", 3, PrintType::Color, 2)];
    let notes = build_order_notes(&items, Some("1"), "receipt_1_ab12");
    assert_eq!(notes[NOTE_ITEM_COUNT], json!("1"));

    match decode_manifest(&Value::Object(notes)).unwrap() {
      Manifest::Items {
        items: decoded,
        printer_id,
        skipped,
      } => {
        assert_eq!(skipped, 0);
        assert_eq!(printer_id.as_deref(), Some("1"));
        assert_eq!(decoded[0].file_name, "orig_a_1234abcd.pdf");
        assert_eq!(decoded[0].copies, 2);
        assert_eq!(decoded[0].print_type, PrintType::Color);
      }
      other => panic!("unexpected manifest: {:?}", other),
    }
  }

  #[test]
  fn oversized_manifest_is_replaced_by_marker() {
    let items: Vec<OrderItem> = (0..60)
      .map(|i| OrderItem::new(format!("orig_some_long_document_name_{}_deadbeef.pdf", i), 9, PrintType::Bw, 1))
      .collect();
    let notes = build_order_notes(&items, None, "receipt_42_ffff");
    assert!(!notes.contains_key(NOTE_ITEMS));
    assert_eq!(notes[NOTE_ITEM_COUNT], json!("60"));

    let decoded = decode_manifest(&Value::Object(notes)).unwrap();
    assert!(matches!(decoded, Manifest::Truncated { marker } if marker.contains("receipt_42_ffff")));
  }

  #[test]
  fn bad_entries_are_skipped_but_non_arrays_are_malformed() {
    let notes = json!({
      "items": r#"[{"fName":"a.pdf","pCount":1,"pType":0,"copies":1},{"fName":"b.pdf","pCount":1,"pType":4,"copies":1},{"pCount":2}]"#
    });
    match decode_manifest(&notes).unwrap() {
      Manifest::Items { items, skipped, .. } => {
        assert_eq!(items.len(), 1);
        assert_eq!(skipped, 2);
      }
      other => panic!("unexpected manifest: {:?}", other),
    }

    assert!(decode_manifest(&json!({ "items": r#"{"fName":"a.pdf"}"# })).is_err());
    assert_eq!(decode_manifest(&json!([])).unwrap(), Manifest::Missing);
    assert_eq!(decode_manifest(&json!({ "item_count": "2" })).unwrap(), Manifest::Missing);
  }
}
