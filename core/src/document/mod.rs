// printflow/src/document/mod.rs

//! DocumentPreparer: turns an upload into stored, page-addressable artifacts.

pub mod grayscale;
pub mod naming;
pub mod pdf;
pub mod photo_sheet;

pub use grayscale::{run_bounded, ConversionTools};
pub use photo_sheet::SheetLayout;

use crate::error::FlowError;
use crate::storage::StorageRoot;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
  Pdf,
  Image,
  Unknown,
}

impl DocumentKind {
  /// Extension wins; the declared content type is the fallback.
  pub fn detect(extension: &str, content_type: Option<&str>) -> Self {
    match extension {
      ".pdf" => return DocumentKind::Pdf,
      ".jpg" | ".jpeg" | ".png" => return DocumentKind::Image,
      _ => {}
    }
    match content_type.map(|ct| ct.trim().to_ascii_lowercase()) {
      Some(ct) if ct == "application/pdf" => DocumentKind::Pdf,
      Some(ct) if ct == "image/jpeg" || ct == "image/png" => DocumentKind::Image,
      _ => DocumentKind::Unknown,
    }
  }

  pub fn content_type(self) -> &'static str {
    match self {
      DocumentKind::Pdf => "application/pdf",
      DocumentKind::Image => "image/*",
      DocumentKind::Unknown => "application/octet-stream",
    }
  }
}

/// An upload as received, before anything touches the disk.
#[derive(Debug, Clone)]
pub struct IncomingFile {
  pub file_name: String,
  pub content_type: Option<String>,
  pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageRangeRequest {
  #[default]
  All,
  Custom {
    start: u32,
    end: u32,
  },
}

/// A stored artifact. `page_count` is 0 when the kind has no page notion or
/// the PDF could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedDocument {
  pub file_name: String,
  pub path: PathBuf,
  pub kind: DocumentKind,
  pub page_count: u32,
}

/// Everything `store` produced for one upload.
#[derive(Debug, Clone)]
pub struct StoredUpload {
  pub original: UploadedDocument,
  /// The artifact to print in colour: the custom range if one was cut, else the original.
  pub color: UploadedDocument,
  /// Absent when grayscale rendering failed or is unsupported for the kind.
  pub grayscale: Option<UploadedDocument>,
}

impl StoredUpload {
  pub fn page_count(&self) -> u32 {
    self.color.page_count
  }
}

pub fn check_range(start: u32, end: u32, page_count: u32) -> Result<(), FlowError> {
  if start < 1 || end < start || end > page_count {
    return Err(FlowError::InvalidRange { start, end, page_count });
  }
  Ok(())
}

#[derive(Debug, Clone)]
pub struct DocumentPreparer {
  storage: StorageRoot,
  tools: ConversionTools,
}

impl DocumentPreparer {
  pub fn new(storage: StorageRoot, tools: ConversionTools) -> Self {
    Self { storage, tools }
  }

  pub fn storage(&self) -> &StorageRoot {
    &self.storage
  }

  /// Stores an upload, cuts the requested page range, and attempts a grayscale variant.
  ///
  /// The page count comes from the uploaded bytes, so a bad custom range is
  /// rejected before anything is written.
  #[instrument(name = "DocumentPreparer::store", skip_all, fields(file = %upload.file_name, bytes = upload.bytes.len()))]
  pub async fn store(&self, upload: IncomingFile, range: PageRangeRequest) -> Result<StoredUpload, FlowError> {
    if upload.bytes.is_empty() {
      return Err(FlowError::Validation("Uploaded file is empty.".to_string()));
    }

    let (base, ext) = naming::split_extension(&naming::sanitize_file_name(&upload.file_name));
    let kind = DocumentKind::detect(&ext, upload.content_type.as_deref());
    let page_count = match kind {
      DocumentKind::Pdf => match pdf::count_pages(upload.bytes.clone()).await {
        Ok(count) => count,
        Err(e) => {
          warn!(error = %e, "Could not read PDF page count; range operations disabled.");
          0
        }
      },
      DocumentKind::Image => 1,
      DocumentKind::Unknown => 0,
    };

    let custom = match range {
      PageRangeRequest::Custom { start, end } if kind == DocumentKind::Pdf && page_count > 0 => {
        check_range(start, end, page_count)?;
        Some((start, end))
      }
      PageRangeRequest::Custom { start, end } => {
        warn!(start, end, ?kind, "Ignoring custom page range for a document without readable pages.");
        None
      }
      PageRangeRequest::All => None,
    };

    let original_name = naming::original_name(&base, &ext);
    let path = self.storage.write(&original_name, &upload.bytes).await?;
    let original = UploadedDocument {
      file_name: original_name,
      path,
      kind,
      page_count,
    };

    let color = match custom {
      Some((start, end)) => self.extract_range(&original, start, end).await?,
      None => original.clone(),
    };

    let grayscale = match self.render_grayscale(&color).await {
      Ok(doc) => Some(doc),
      Err(e) => {
        warn!(error = %e, file = %color.file_name, "Grayscale variant unavailable; continuing with colour only.");
        None
      }
    };

    info!(
      original = %original.file_name,
      color = %color.file_name,
      grayscale = grayscale.as_ref().map(|d| d.file_name.as_str()).unwrap_or("-"),
      pages = color.page_count,
      "Upload stored."
    );
    Ok(StoredUpload {
      original,
      color,
      grayscale,
    })
  }

  /// Writes a new PDF containing exactly pages `start..=end` of `doc`.
  #[instrument(name = "DocumentPreparer::extract_range", skip(self, doc), fields(file = %doc.file_name))]
  pub async fn extract_range(&self, doc: &UploadedDocument, start: u32, end: u32) -> Result<UploadedDocument, FlowError> {
    check_range(start, end, doc.page_count)?;
    if doc.kind != DocumentKind::Pdf {
      return Err(FlowError::UnsupportedDocument(format!(
        "page ranges need a PDF, got {:?}",
        doc.kind
      )));
    }

    let source = self.storage.read(&doc.file_name).await?;
    let extracted = pdf::extract_pages(source, start, end).await?;
    let expected = end - start + 1;
    let actual = pdf::count_pages(extracted.clone()).await?;
    if actual != expected {
      return Err(FlowError::Pdf(format!(
        "extracted {} pages, expected {}",
        actual, expected
      )));
    }

    let (base, ext) = naming::split_extension(&doc.file_name);
    let base = base.strip_prefix("orig_").unwrap_or(&base);
    let file_name = naming::custom_range_name(base, start, end, &ext);
    let path = self.storage.write(&file_name, &extracted).await?;
    Ok(UploadedDocument {
      file_name,
      path,
      kind: DocumentKind::Pdf,
      page_count: actual,
    })
  }

  /// Renders `bw_<name>` next to `doc`. Failures are `Conversion` errors and
  /// leave no partial output behind.
  #[instrument(name = "DocumentPreparer::render_grayscale", skip_all, fields(file = %doc.file_name))]
  pub async fn render_grayscale(&self, doc: &UploadedDocument) -> Result<UploadedDocument, FlowError> {
    let file_name = naming::grayscale_name(&doc.file_name);
    let output = self.storage.resolve(&file_name)?;
    let (cmd, label, limit) = match doc.kind {
      DocumentKind::Pdf => (self.tools.pdf_command(&doc.path, &output), "ghostscript", self.tools.pdf_timeout),
      DocumentKind::Image => (self.tools.image_command(&doc.path, &output), "imagemagick", self.tools.image_timeout),
      DocumentKind::Unknown => {
        return Err(FlowError::UnsupportedDocument(format!(
          "no grayscale renderer for {}",
          doc.file_name
        )))
      }
    };

    let mut result = run_bounded(cmd, label, limit).await;
    if result.is_ok() && !tokio::fs::try_exists(&output).await.unwrap_or(false) {
      result = Err(FlowError::Conversion(format!("{} produced no output", label)));
    }
    if let Err(e) = result {
      if let Err(rm) = tokio::fs::remove_file(&output).await {
        if rm.kind() != std::io::ErrorKind::NotFound {
          warn!(error = %rm, "Could not remove partial grayscale output.");
        }
      }
      return Err(e);
    }

    Ok(UploadedDocument {
      file_name,
      path: output,
      kind: doc.kind,
      page_count: doc.page_count,
    })
  }
}
