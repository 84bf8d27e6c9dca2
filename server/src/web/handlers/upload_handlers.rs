// printflow_server/src/web/handlers/upload_handlers.rs

use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use futures_util::TryStreamExt;
use printflow::{IncomingFile, PageRangeRequest};
use serde::Serialize;
use tracing::{info, instrument};

use crate::errors::{AppError, Result};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
  pub original_file_name: String,
  pub color_file_name: String,
  pub color_url: String,
  pub bw_file_name: Option<String>,
  pub bw_url: Option<String>,
  pub page_count: u32,
}

#[derive(Debug, Default)]
struct UploadForm {
  file: Option<IncomingFile>,
  page_range: Option<String>,
  start_page: Option<String>,
  end_page: Option<String>,
}

impl UploadForm {
  fn range(&self) -> Result<PageRangeRequest> {
    let custom = self
      .page_range
      .as_deref()
      .is_some_and(|r| r.trim().eq_ignore_ascii_case("custom"));
    if !custom {
      return Ok(PageRangeRequest::All);
    }
    let parse = |raw: Option<&str>, label: &str| -> Result<u32> {
      raw
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{} is required for a custom page range.", label)))?
        .parse::<u32>()
        .map_err(|_| AppError::Validation(format!("{} must be a positive whole number.", label)))
    };
    Ok(PageRangeRequest::Custom {
      start: parse(self.start_page.as_deref(), "startPage")?,
      end: parse(self.end_page.as_deref(), "endPage")?,
    })
  }
}

pub(crate) fn multipart_error(e: impl std::fmt::Display) -> AppError {
  AppError::Validation(format!("Invalid multipart body: {}", e))
}

pub(crate) async fn read_field(field: &mut Field, limit: usize) -> Result<Vec<u8>> {
  let mut bytes = Vec::new();
  while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
    if bytes.len() + chunk.len() > limit {
      return Err(AppError::Validation(format!("File exceeds the {} byte upload limit.", limit)));
    }
    bytes.extend_from_slice(&chunk);
  }
  Ok(bytes)
}

async fn read_form(mut payload: Multipart, limit: usize) -> Result<UploadForm> {
  let mut form = UploadForm::default();
  while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
    let name = field.name().unwrap_or_default().to_string();
    match name.as_str() {
      "file" => {
        let file_name = field
          .content_disposition()
          .and_then(|cd| cd.get_filename())
          .map(str::to_string)
          .unwrap_or_default();
        let content_type = field.content_type().map(|m| m.essence_str().to_string());
        let bytes = read_field(&mut field, limit).await?;
        form.file = Some(IncomingFile {
          file_name,
          content_type,
          bytes,
        });
      }
      "pageRange" | "startPage" | "endPage" => {
        let raw = read_field(&mut field, 64).await?;
        let value = String::from_utf8_lossy(&raw).into_owned();
        match name.as_str() {
          "pageRange" => form.page_range = Some(value),
          "startPage" => form.start_page = Some(value),
          _ => form.end_page = Some(value),
        }
      }
      _ => {
        read_field(&mut field, limit).await?;
      }
    }
  }
  Ok(form)
}

#[instrument(name = "handler::upload", skip(app_state, payload))]
pub async fn upload_handler(app_state: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse> {
  let form = read_form(payload, app_state.config.max_upload_bytes).await?;
  let range = form.range()?;
  let file = form
    .file
    .ok_or_else(|| AppError::Validation("No file uploaded.".to_string()))?;

  let stored = app_state.preparer.store(file, range).await?;
  let config = &app_state.config;
  let response = UploadResponse {
    original_file_name: stored.original.file_name.clone(),
    color_url: config.upload_url(&stored.color.file_name),
    color_file_name: stored.color.file_name.clone(),
    bw_url: stored.grayscale.as_ref().map(|d| config.upload_url(&d.file_name)),
    bw_file_name: stored.grayscale.as_ref().map(|d| d.file_name.clone()),
    page_count: stored.page_count(),
  };
  info!(
    color = %response.color_file_name,
    bw = ?response.bw_file_name,
    pages = response.page_count,
    "Upload stored."
  );
  Ok(HttpResponse::Ok().json(response))
}
