// printflow/src/document/photo_sheet.rs

//! Passport-photo sheets: one photo resampled to print size and tiled in a
//! fixed grid, as many pages as the copies need.

use crate::error::FlowError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ExtendedColorType;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use tracing::{debug, instrument};

const POINTS_PER_MM: f32 = 72.0 / 25.4;
const MM_PER_INCH: f32 = 25.4;
const JPEG_QUALITY: u8 = 95;

/// Upper bound on copies in one request.
pub const MAX_COPIES: u32 = 500;

/// Geometry of a photo sheet, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SheetLayout {
  pub photo_width_mm: f32,
  pub photo_height_mm: f32,
  pub margin_mm: f32,
  pub gap_mm: f32,
  pub per_row: u32,
  pub per_page: u32,
  /// Resolution the photo is resampled to before embedding.
  pub dpi: f32,
}

impl Default for SheetLayout {
  /// 35x45 mm passport photos, 5 per row, 25 per page, 300 DPI.
  fn default() -> Self {
    Self {
      photo_width_mm: 35.0,
      photo_height_mm: 45.0,
      margin_mm: 10.0,
      gap_mm: 5.0,
      per_row: 5,
      per_page: 25,
      dpi: 300.0,
    }
  }
}

impl SheetLayout {
  pub fn rows_per_page(&self) -> u32 {
    self.per_page.div_ceil(self.per_row)
  }

  /// Page width and height in points. The page fits the grid plus margins.
  pub fn page_size_pt(&self) -> (f32, f32) {
    let cols = self.per_row as f32;
    let rows = self.rows_per_page() as f32;
    let width = self.photo_width_mm * cols + self.gap_mm * (cols - 1.0) + self.margin_mm * 2.0;
    let height = self.photo_height_mm * rows + self.gap_mm * (rows - 1.0) + self.margin_mm * 2.0;
    (width * POINTS_PER_MM, height * POINTS_PER_MM)
  }

  /// Pixel size of the resampled photo.
  pub fn pixel_size(&self) -> (u32, u32) {
    (
      (self.photo_width_mm / MM_PER_INCH * self.dpi) as u32,
      (self.photo_height_mm / MM_PER_INCH * self.dpi) as u32,
    )
  }

  pub fn page_count(&self, copies: u32) -> u32 {
    copies.div_ceil(self.per_page)
  }

  /// Lower-left corner (points) of every photo, grouped by page. Filled row
  /// by row from the top left.
  pub fn placements(&self, copies: u32) -> Vec<Vec<(f32, f32)>> {
    let (_, page_height) = self.page_size_pt();
    let step_x = (self.photo_width_mm + self.gap_mm) * POINTS_PER_MM;
    let step_y = (self.photo_height_mm + self.gap_mm) * POINTS_PER_MM;
    let start_x = self.margin_mm * POINTS_PER_MM;
    let start_y = page_height - (self.margin_mm + self.photo_height_mm) * POINTS_PER_MM;

    (0..self.page_count(copies))
      .map(|page| {
        let on_page = (copies - page * self.per_page).min(self.per_page);
        (0..on_page)
          .map(|slot| {
            let col = (slot % self.per_row) as f32;
            let row = (slot / self.per_row) as f32;
            (start_x + col * step_x, start_y - row * step_y)
          })
          .collect()
      })
      .collect()
  }
}

fn pdf_error(e: lopdf::Error) -> FlowError {
  FlowError::Pdf(format!("cannot build photo sheet: {}", e))
}

/// Decodes `photo`, stretches it to the layout's pixel size, and re-encodes it
/// as an RGB JPEG. Returns the JPEG with its width and height.
pub fn resample_photo(photo: &[u8], layout: &SheetLayout) -> Result<(Vec<u8>, u32, u32), FlowError> {
  let decoded = image::load_from_memory(photo)
    .map_err(|e| FlowError::UnsupportedDocument(format!("photo could not be decoded: {}", e)))?;
  let (width, height) = layout.pixel_size();
  let rgb = decoded.resize_exact(width, height, FilterType::Lanczos3).to_rgb8();

  let mut jpeg = Vec::new();
  JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
    .encode(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
    .map_err(|e| FlowError::Conversion(format!("photo could not be encoded: {}", e)))?;
  Ok((jpeg, width, height))
}

/// Builds the sheet PDF for `copies` prints of `photo`.
pub fn build_sheet_sync(photo: &[u8], copies: u32, layout: &SheetLayout) -> Result<Vec<u8>, FlowError> {
  if copies == 0 || copies > MAX_COPIES {
    return Err(FlowError::Validation(format!(
      "Copies must be between 1 and {}.",
      MAX_COPIES
    )));
  }
  let (jpeg, px_width, px_height) = resample_photo(photo, layout)?;
  let (page_width, page_height) = layout.page_size_pt();
  let photo_width = layout.photo_width_mm * POINTS_PER_MM;
  let photo_height = layout.photo_height_mm * POINTS_PER_MM;

  let mut doc = Document::with_version("1.5");
  let pages_id = doc.new_object_id();
  let image_id = doc.add_object(
    Stream::new(
      dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => px_width as i64,
        "Height" => px_height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => "DCTDecode",
      },
      jpeg,
    )
    .with_compression(false),
  );
  let resources_id = doc.add_object(dictionary! {
    "XObject" => dictionary! { "Photo" => image_id },
  });

  let mut kids: Vec<Object> = Vec::new();
  for page in layout.placements(copies) {
    let mut operations = Vec::with_capacity(page.len() * 4);
    for (x, y) in page {
      operations.push(Operation::new("q", vec![]));
      operations.push(Operation::new(
        "cm",
        vec![photo_width.into(), 0.into(), 0.into(), photo_height.into(), x.into(), y.into()],
      ));
      operations.push(Operation::new("Do", vec![Object::Name(b"Photo".to_vec())]));
      operations.push(Operation::new("Q", vec![]));
    }
    let content = Content { operations }.encode().map_err(pdf_error)?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));
    let page_id = doc.add_object(dictionary! {
      "Type" => "Page",
      "Parent" => pages_id,
      "Contents" => content_id,
    });
    kids.push(page_id.into());
  }

  let count = kids.len() as i64;
  doc.objects.insert(
    pages_id,
    Object::Dictionary(dictionary! {
      "Type" => "Pages",
      "Kids" => kids,
      "Count" => count,
      "Resources" => resources_id,
      "MediaBox" => vec![0.into(), 0.into(), page_width.into(), page_height.into()],
    }),
  );
  let catalog_id = doc.add_object(dictionary! {
    "Type" => "Catalog",
    "Pages" => pages_id,
  });
  doc.trailer.set("Root", catalog_id);

  let mut out = Vec::new();
  doc.save_to(&mut out).map_err(|e| FlowError::Pdf(format!("cannot write photo sheet: {}", e)))?;
  debug!(copies, pages = count, bytes = out.len(), "Photo sheet built.");
  Ok(out)
}

#[instrument(name = "photo_sheet::build_sheet", skip(photo, layout), fields(bytes = photo.len()))]
pub async fn build_sheet(photo: Vec<u8>, copies: u32, layout: SheetLayout) -> Result<Vec<u8>, FlowError> {
  tokio::task::spawn_blocking(move || build_sheet_sync(&photo, copies, &layout))
    .await
    .map_err(|e| FlowError::Pdf(format!("photo sheet task failed: {}", e)))?
}
