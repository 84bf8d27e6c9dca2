// printflow_server/src/state.rs

use crate::config::{AppConfig, GatewayKind, MailerKind};
use crate::services::{LogMailer, MockGateway, RazorpayGateway, SmtpMailer};
use printflow::{
  ConversionTools, DocumentPreparer, FulfillmentExecutor, Mailer, OrderIntake, PaymentGateway, PaymentLedger,
  PrinterDirectory, StorageRoot, WebhookProcessor, WebhookSettings,
};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
  pub config: Arc<AppConfig>,
  pub preparer: Arc<DocumentPreparer>,
  pub intake: Arc<OrderIntake>,
  pub webhook: Arc<WebhookProcessor>,
  pub ledger: Arc<dyn PaymentLedger>,
  pub printers: Arc<PrinterDirectory>,
}

impl AppState {
  /// Wires the pipelines over the given adapters.
  pub fn assemble(
    config: Arc<AppConfig>,
    gateway: Arc<dyn PaymentGateway>,
    mailer: Arc<dyn Mailer>,
    ledger: Arc<dyn PaymentLedger>,
    printers: Arc<PrinterDirectory>,
  ) -> anyhow::Result<Self> {
    let storage = StorageRoot::open(&config.upload_dir)?;
    let tools = ConversionTools {
      ghostscript: config.ghostscript_bin.clone(),
      imagemagick: config.imagemagick_bin.clone(),
      pdf_timeout: config.pdf_conversion_timeout,
      image_timeout: config.image_conversion_timeout,
    };
    let preparer = Arc::new(DocumentPreparer::new(storage.clone(), tools));
    let fulfillment = Arc::new(FulfillmentExecutor::new(mailer, storage, config.mail_from.clone()));

    let intake = Arc::new(OrderIntake::new(
      gateway.clone(),
      printers.clone(),
      fulfillment.clone(),
      config.currency.clone(),
    ));
    let webhook = Arc::new(WebhookProcessor::new(
      gateway,
      ledger.clone(),
      printers.clone(),
      fulfillment,
      WebhookSettings {
        webhook_secret: config.razorpay_webhook_secret.clone(),
        ledger_offset: config.ledger_offset,
      },
    ));

    Ok(Self {
      config,
      preparer,
      intake,
      webhook,
      ledger,
      printers,
    })
  }

  /// Picks the gateway and mailer named by the configuration.
  pub fn from_config(config: Arc<AppConfig>, ledger: Arc<dyn PaymentLedger>) -> anyhow::Result<Self> {
    let gateway: Arc<dyn PaymentGateway> = match config.gateway {
      GatewayKind::Razorpay => Arc::new(RazorpayGateway::new(
        config.razorpay_api_base.clone(),
        config.razorpay_key_id.clone(),
        config.razorpay_key_secret.clone(),
      )?),
      GatewayKind::Mock => Arc::new(MockGateway::default()),
    };
    let mailer: Arc<dyn Mailer> = match config.mailer {
      MailerKind::Smtp => Arc::new(SmtpMailer::new(&config.smtp)?),
      MailerKind::Log => Arc::new(LogMailer::new()),
    };
    let printers = Arc::new(load_printers(&config)?);
    info!(
      gateway = ?config.gateway,
      mailer = ?config.mailer,
      printers = printers.iter().count(),
      "Adapters selected."
    );
    Self::assemble(config, gateway, mailer, ledger, printers)
  }
}

fn load_printers(config: &AppConfig) -> anyhow::Result<PrinterDirectory> {
  if let Some(path) = &config.printers_file {
    return Ok(PrinterDirectory::from_file(path)?);
  }
  let email = config
    .default_printer_email
    .clone()
    .ok_or_else(|| anyhow::anyhow!("Either PRINTERS_FILE or DEFAULT_PRINTER_EMAIL must be set"))?;
  Ok(PrinterDirectory::single(config.default_printer_id.clone(), email)?)
}
