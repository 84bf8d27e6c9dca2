// printflow_server/src/web/handlers/photo_handlers.rs

use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{web, HttpResponse};
use futures_util::TryStreamExt;
use printflow::document::photo_sheet;
use printflow::SheetLayout;
use tracing::{info, instrument};

use crate::errors::{AppError, Result};
use crate::state::AppState;
use crate::web::handlers::upload_handlers::{multipart_error, read_field};

#[derive(Debug, Default)]
struct PhotoForm {
  photo: Option<Vec<u8>>,
  copies: Option<String>,
}

impl PhotoForm {
  fn copies(&self) -> Result<u32> {
    self
      .copies
      .as_deref()
      .map(str::trim)
      .filter(|v| !v.is_empty())
      .ok_or_else(|| AppError::Validation("copies is required.".to_string()))?
      .parse::<u32>()
      .map_err(|_| AppError::Validation("copies must be a positive whole number.".to_string()))
  }
}

async fn read_form(mut payload: Multipart, limit: usize) -> Result<PhotoForm> {
  let mut form = PhotoForm::default();
  while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
    match field.name().unwrap_or_default() {
      "photo" => form.photo = Some(read_field(&mut field, limit).await?),
      "copies" => {
        let raw = read_field(&mut field, 16).await?;
        form.copies = Some(String::from_utf8_lossy(&raw).into_owned());
      }
      _ => {
        read_field(&mut field, limit).await?;
      }
    }
  }
  Ok(form)
}

#[instrument(name = "handler::generate_photo_sheet", skip(app_state, payload))]
pub async fn generate_photo_sheet_handler(app_state: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse> {
  let form = read_form(payload, app_state.config.max_upload_bytes).await?;
  let copies = form.copies()?;
  let photo = form
    .photo
    .filter(|p| !p.is_empty())
    .ok_or_else(|| AppError::Validation("No photo uploaded.".to_string()))?;

  let sheet = photo_sheet::build_sheet(photo, copies, SheetLayout::default()).await?;
  info!(copies, bytes = sheet.len(), "Photo sheet generated.");
  Ok(
    HttpResponse::Ok()
      .content_type("application/pdf")
      .insert_header((header::CONTENT_DISPOSITION, "attachment; filename=photos.pdf"))
      .body(sheet),
  )
}
