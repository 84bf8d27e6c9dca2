// printflow/src/document/naming.rs

//! File name sanitation and the stored-artifact naming convention:
//! `orig_<base>_<rand><ext>`, `custom_<base>_<rand>_p<start>-<end><ext>`,
//! `bw_<color name>`.

use uuid::Uuid;

const FALLBACK_BASE: &str = "file";

/// Reduces a client-supplied name to a portable bare file name.
///
/// Directory parts are dropped, `-` becomes `_`, anything outside
/// `[A-Za-z0-9._]` is removed, and dot runs collapse to a single dot.
pub fn sanitize_file_name(raw: &str) -> String {
  let bare = raw.rsplit(&['/', '\\'][..]).next().unwrap_or(raw);
  let mut out = String::with_capacity(bare.len());
  for ch in bare.chars() {
    let ch = if ch == '-' { '_' } else { ch };
    if !(ch.is_ascii_alphanumeric() || ch == '.' || ch == '_') {
      continue;
    }
    if ch == '.' && out.ends_with('.') {
      continue;
    }
    out.push(ch);
  }
  let trimmed = out.trim_start_matches('.');
  if trimmed.is_empty() || trimmed.chars().all(|c| c == '.' || c == '_') {
    FALLBACK_BASE.to_string()
  } else {
    trimmed.to_string()
  }
}

/// Splits `name` into base and lowercase extension (with the leading dot).
pub fn split_extension(name: &str) -> (String, String) {
  match name.rfind('.') {
    Some(idx) if idx > 0 && idx + 1 < name.len() => (name[..idx].to_string(), name[idx..].to_ascii_lowercase()),
    _ => (name.trim_end_matches('.').to_string(), String::new()),
  }
}

/// Random lowercase hex, at most 32 characters.
pub fn short_id(len: usize) -> String {
  let mut id = Uuid::new_v4().simple().to_string();
  id.truncate(len.min(32));
  id
}

pub fn original_name(base: &str, ext: &str) -> String {
  format!("orig_{}_{}{}", base, short_id(8), ext)
}

pub fn custom_range_name(base: &str, start: u32, end: u32, ext: &str) -> String {
  format!("custom_{}_{}_p{}-{}{}", base, short_id(8), start, end, ext)
}

pub fn grayscale_name(color_name: &str) -> String {
  format!("bw_{}", color_name)
}
