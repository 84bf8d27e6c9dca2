// printflow/src/document/pdf.rs

//! Page-level PDF work on in-memory bytes. Parsing is CPU bound, so the async
//! entry points run it on the blocking pool.

use crate::error::FlowError;
use lopdf::Document;

fn load(bytes: &[u8]) -> Result<Document, FlowError> {
  Document::load_mem(bytes).map_err(|e| FlowError::Pdf(format!("cannot parse PDF: {}", e)))
}

pub fn count_pages_sync(bytes: &[u8]) -> Result<u32, FlowError> {
  Ok(load(bytes)?.get_pages().len() as u32)
}

/// Builds a new PDF holding pages `start..=end` (1-based) of `bytes`.
/// The caller has already checked the range against the page count.
pub fn extract_pages_sync(bytes: &[u8], start: u32, end: u32) -> Result<Vec<u8>, FlowError> {
  let mut doc = load(bytes)?;
  let doomed: Vec<u32> = doc
    .get_pages()
    .keys()
    .copied()
    .filter(|page| *page < start || *page > end)
    .collect();
  doc.delete_pages(&doomed);
  doc.prune_objects();
  doc.renumber_objects();
  doc.compress();

  let mut out = Vec::new();
  doc
    .save_to(&mut out)
    .map_err(|e| FlowError::Pdf(format!("cannot write extracted pages: {}", e)))?;
  Ok(out)
}

pub async fn count_pages(bytes: Vec<u8>) -> Result<u32, FlowError> {
  tokio::task::spawn_blocking(move || count_pages_sync(&bytes))
    .await
    .map_err(|e| FlowError::Pdf(format!("page count task failed: {}", e)))?
}

pub async fn extract_pages(bytes: Vec<u8>, start: u32, end: u32) -> Result<Vec<u8>, FlowError> {
  tokio::task::spawn_blocking(move || extract_pages_sync(&bytes, start, end))
    .await
    .map_err(|e| FlowError::Pdf(format!("page extraction task failed: {}", e)))?
}
