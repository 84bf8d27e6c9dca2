// printflow_server/src/config.rs

use crate::errors::{AppError, Result};
use chrono::FixedOffset;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
  Razorpay,
  Mock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailerKind {
  Smtp,
  Log,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
  pub host: String,
  pub port: u16,
  pub username: Option<String>,
  pub password: Option<String>,
}

#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub database_url: Option<String>,

  pub upload_dir: PathBuf,
  pub uploads_base_url: String,
  pub max_upload_bytes: usize,

  pub gateway: GatewayKind,
  pub razorpay_key_id: String,
  pub razorpay_key_secret: String,
  pub razorpay_webhook_secret: Option<String>,
  pub razorpay_api_base: String,
  pub currency: String,

  pub mailer: MailerKind,
  pub smtp: SmtpConfig,
  pub mail_from: String,

  pub printers_file: Option<PathBuf>,
  pub default_printer_id: String,
  pub default_printer_email: Option<String>,

  pub ledger_offset: FixedOffset,

  pub ghostscript_bin: PathBuf,
  pub imagemagick_bin: PathBuf,
  pub pdf_conversion_timeout: Duration,
  pub image_conversion_timeout: Duration,
}

// Secrets stay out of logs: key ids show only their tail.
impl std::fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("database", &self.database_url.as_ref().map(|_| "[REDACTED]"))
      .field("upload_dir", &self.upload_dir)
      .field("gateway", &self.gateway)
      .field("razorpay_key_id", &key_tail(&self.razorpay_key_id))
      .field("currency", &self.currency)
      .field("mailer", &self.mailer)
      .field("smtp_host", &self.smtp.host)
      .field("printers_file", &self.printers_file)
      .field("ledger_offset", &self.ledger_offset)
      .finish_non_exhaustive()
  }
}

/// Last four characters of a key id, for logs.
pub fn key_tail(key: &str) -> String {
  let chars: Vec<char> = key.chars().collect();
  let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
  format!("…{}", tail)
}

fn get_env(var_name: &str) -> Option<String> {
  env::var(var_name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_env<T>(var_name: &str, default: T) -> Result<T>
where
  T: std::str::FromStr,
  T::Err: std::fmt::Display,
{
  match get_env(var_name) {
    Some(raw) => raw
      .parse::<T>()
      .map_err(|e| AppError::Config(format!("Invalid {}: {}", var_name, e))),
    None => Ok(default),
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
    let server_port = parse_env("SERVER_PORT", 8080u16)?;

    let gateway = match get_env("PAYMENT_GATEWAY").as_deref().map(str::to_ascii_lowercase).as_deref() {
      None | Some("razorpay") => GatewayKind::Razorpay,
      Some("mock") => GatewayKind::Mock,
      Some(other) => return Err(AppError::Config(format!("Unknown PAYMENT_GATEWAY '{}'", other))),
    };
    let razorpay_key_id = get_env("RAZORPAY_KEY_ID").unwrap_or_default();
    let razorpay_key_secret = get_env("RAZORPAY_KEY_SECRET").unwrap_or_default();
    if gateway == GatewayKind::Razorpay && (razorpay_key_id.is_empty() || razorpay_key_secret.is_empty()) {
      return Err(AppError::Config(
        "RAZORPAY_KEY_ID and RAZORPAY_KEY_SECRET are required for the razorpay gateway".to_string(),
      ));
    }

    let mailer = match get_env("MAILER").as_deref().map(str::to_ascii_lowercase).as_deref() {
      None | Some("smtp") => MailerKind::Smtp,
      Some("log") => MailerKind::Log,
      Some(other) => return Err(AppError::Config(format!("Unknown MAILER '{}'", other))),
    };
    let smtp = SmtpConfig {
      host: get_env("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
      port: parse_env("SMTP_PORT", 587u16)?,
      username: get_env("SMTP_USERNAME"),
      password: get_env("SMTP_PASSWORD"),
    };
    let mail_from = get_env("MAIL_FROM")
      .or_else(|| smtp.username.clone())
      .unwrap_or_else(|| "printflow@localhost".to_string());

    let offset_minutes = parse_env("LEDGER_UTC_OFFSET_MINUTES", 330i32)?;
    let ledger_offset = FixedOffset::east_opt(offset_minutes * 60)
      .ok_or_else(|| AppError::Config(format!("LEDGER_UTC_OFFSET_MINUTES out of range: {}", offset_minutes)))?;

    let config = Self {
      server_host,
      server_port,
      database_url: get_env("DATABASE_URL"),
      upload_dir: PathBuf::from(get_env("UPLOAD_DIR").unwrap_or_else(|| "./uploads".to_string())),
      uploads_base_url: get_env("UPLOADS_BASE_URL").unwrap_or_else(|| "/uploads/".to_string()),
      max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 25 * 1024 * 1024usize)?,
      gateway,
      razorpay_key_id,
      razorpay_key_secret,
      razorpay_webhook_secret: get_env("RAZORPAY_WEBHOOK_SECRET"),
      razorpay_api_base: get_env("RAZORPAY_API_BASE").unwrap_or_else(|| "https://api.razorpay.com/v1".to_string()),
      currency: get_env("CURRENCY").unwrap_or_else(|| "INR".to_string()),
      mailer,
      smtp,
      mail_from,
      printers_file: get_env("PRINTERS_FILE").map(PathBuf::from),
      default_printer_id: get_env("DEFAULT_PRINTER_ID").unwrap_or_else(|| "1".to_string()),
      default_printer_email: get_env("DEFAULT_PRINTER_EMAIL"),
      ledger_offset,
      ghostscript_bin: PathBuf::from(get_env("GHOSTSCRIPT_BIN").unwrap_or_else(|| "gs".to_string())),
      imagemagick_bin: PathBuf::from(get_env("IMAGEMAGICK_BIN").unwrap_or_else(|| "convert".to_string())),
      pdf_conversion_timeout: Duration::from_secs(parse_env("PDF_CONVERSION_TIMEOUT_SECS", 60u64)?),
      image_conversion_timeout: Duration::from_secs(parse_env("IMAGE_CONVERSION_TIMEOUT_SECS", 30u64)?),
    };

    if config.razorpay_webhook_secret.is_none() {
      tracing::warn!("RAZORPAY_WEBHOOK_SECRET is not set; webhook deliveries will be refused.");
    }
    tracing::info!(config = ?config, "Application configuration loaded successfully.");
    Ok(config)
  }

  /// Public URL of a stored artifact.
  pub fn upload_url(&self, file_name: &str) -> String {
    format!("{}/{}", self.uploads_base_url.trim_end_matches('/'), file_name)
  }
}
