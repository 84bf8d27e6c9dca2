// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::FixedOffset;
use lopdf::{dictionary, Document, Object, Stream};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use printflow::{
  ConversionTools, CreateOrderRequest, DocumentPreparer, FlowError, FulfillmentExecutor, GatewayOrder, InMemoryLedger,
  Mailer, OrderIntake, OutboundEmail, PaymentGateway, PrinterDirectory, StorageRoot, WebhookProcessor, WebhookSettings,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing::Level;

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

pub const WEBHOOK_SECRET: &str = "whsec_test";

// --- Fakes for the external seams ---

#[derive(Default)]
pub struct FakeGateway {
  pub orders: Mutex<Vec<CreateOrderRequest>>,
  pub fail: AtomicBool,
}

impl FakeGateway {
  /// The signature this fake accepts for `body`.
  pub fn sign(body: &[u8], secret: &str) -> String {
    format!("{}:{}", secret, body.len())
  }

  pub fn calls(&self) -> usize {
    self.orders.lock().len()
  }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
  async fn create_order(&self, request: CreateOrderRequest) -> Result<GatewayOrder, FlowError> {
    if self.fail.load(Ordering::SeqCst) {
      return Err(FlowError::Gateway("authentication failed".to_string()));
    }
    let mut orders = self.orders.lock();
    orders.push(request.clone());
    Ok(GatewayOrder {
      order_id: format!("order_test_{}", orders.len()),
      amount_minor: request.amount_minor,
    })
  }

  fn verify_signature(&self, raw_body: &[u8], signature: &str, secret: &str) -> bool {
    signature == Self::sign(raw_body, secret)
  }

  fn public_key_id(&self) -> &str {
    "rzp_test_key"
  }
}

#[derive(Default)]
pub struct RecordingMailer {
  pub sent: Mutex<Vec<OutboundEmail>>,
  pub fail: AtomicBool,
}

impl RecordingMailer {
  pub fn count(&self) -> usize {
    self.sent.lock().len()
  }

  pub fn last(&self) -> Option<OutboundEmail> {
    self.sent.lock().last().cloned()
  }
}

#[async_trait]
impl Mailer for RecordingMailer {
  async fn send(&self, email: OutboundEmail) -> Result<String, FlowError> {
    if self.fail.load(Ordering::SeqCst) {
      return Err(FlowError::mail(anyhow::anyhow!("relay refused the message")));
    }
    let mut sent = self.sent.lock();
    sent.push(email);
    Ok(format!("<msg-{}@test>", sent.len()))
  }
}

// --- Fixtures ---

pub const PRINTERS: &str = r#"[
  {"id":"1","email":"front@print.test","name":"Front desk","phone":"9999999999"},
  {"id":"2","email":"lab@print.test","name":"Lab","phone":"8888888888",
   "rates":{"bw":{"thresholdPages":3,"baseRate":15,"remainderRate":8},"color":{"thresholdPages":1,"baseRate":20,"remainderRate":5}}}
]"#;

pub fn ist() -> FixedOffset {
  FixedOffset::east_opt(330 * 60).expect("valid offset")
}

/// Everything wired together over a temporary storage root.
pub struct Harness {
  pub dir: TempDir,
  pub storage: StorageRoot,
  pub gateway: Arc<FakeGateway>,
  pub mailer: Arc<RecordingMailer>,
  pub ledger: Arc<InMemoryLedger>,
  pub printers: Arc<PrinterDirectory>,
  pub intake: OrderIntake,
  pub webhook: WebhookProcessor,
}

impl Harness {
  pub fn new() -> Self {
    Self::with_secret(Some(WEBHOOK_SECRET))
  }

  pub fn with_secret(secret: Option<&str>) -> Self {
    setup_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = StorageRoot::open(dir.path()).expect("storage root");
    let gateway = Arc::new(FakeGateway::default());
    let mailer = Arc::new(RecordingMailer::default());
    let ledger = Arc::new(InMemoryLedger::new());
    let printers = Arc::new(PrinterDirectory::from_json_str(PRINTERS).expect("printers"));
    let fulfillment = Arc::new(FulfillmentExecutor::new(mailer.clone(), storage.clone(), "shop@print.test"));

    let intake = OrderIntake::new(gateway.clone(), printers.clone(), fulfillment.clone(), "INR");
    let webhook = WebhookProcessor::new(
      gateway.clone(),
      ledger.clone(),
      printers.clone(),
      fulfillment,
      WebhookSettings {
        webhook_secret: secret.map(str::to_string),
        ledger_offset: ist(),
      },
    );

    Self {
      dir,
      storage,
      gateway,
      mailer,
      ledger,
      printers,
      intake,
      webhook,
    }
  }

  pub fn put_file(&self, name: &str, bytes: &[u8]) -> PathBuf {
    let path = self.dir.path().join(name);
    std::fs::write(&path, bytes).expect("write fixture");
    path
  }

  pub fn exists(&self, name: &str) -> bool {
    self.dir.path().join(name).exists()
  }

  pub fn file_names(&self) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(self.dir.path())
      .expect("read dir")
      .filter_map(|e| e.ok())
      .map(|e| e.file_name().to_string_lossy().into_owned())
      .collect();
    names.sort();
    names
  }

  /// Delivers `body` with a valid signature.
  pub async fn deliver(&self, body: &[u8]) -> Result<printflow::WebhookOutcome, FlowError> {
    let signature = FakeGateway::sign(body, WEBHOOK_SECRET);
    self.webhook.process(body, Some(&signature)).await
  }
}

pub fn preparer(storage: StorageRoot, tools: ConversionTools) -> DocumentPreparer {
  DocumentPreparer::new(storage, tools)
}

/// Tools that always fail fast, for tests that do not care about grayscale output.
pub fn failing_tools() -> ConversionTools {
  ConversionTools {
    ghostscript: PathBuf::from("false"),
    imagemagick: PathBuf::from("false"),
    pdf_timeout: Duration::from_secs(5),
    image_timeout: Duration::from_secs(5),
  }
}

/// A minimal PDF with `pages` blank pages.
pub fn make_pdf(pages: u32) -> Vec<u8> {
  let mut doc = Document::with_version("1.5");
  let pages_id = doc.new_object_id();
  let mut kids: Vec<Object> = Vec::new();
  for _ in 0..pages {
    let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
    let page_id = doc.add_object(dictionary! {
      "Type" => "Page",
      "Parent" => pages_id,
      "Contents" => content_id,
      "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    kids.push(page_id.into());
  }
  doc.objects.insert(
    pages_id,
    Object::Dictionary(dictionary! {
      "Type" => "Pages",
      "Kids" => kids,
      "Count" => pages as i64,
    }),
  );
  let catalog_id = doc.add_object(dictionary! {
    "Type" => "Catalog",
    "Pages" => pages_id,
  });
  doc.trailer.set("Root", catalog_id);

  let mut out = Vec::new();
  doc.save_to(&mut out).expect("save pdf");
  out
}

/// A `payment.captured` body carrying `notes`.
pub fn captured_body(payment_id: &str, order_id: &str, amount: i64, notes: serde_json::Value) -> Vec<u8> {
  serde_json::to_vec(&serde_json::json!({
    "entity": "event",
    "event": "payment.captured",
    "payload": {
      "payment": {
        "entity": {
          "id": payment_id,
          "order_id": order_id,
          "amount": amount,
          "currency": "INR",
          "status": "captured",
          "created_at": 1_700_000_000,
          "notes": notes
        }
      }
    }
  }))
  .expect("encode body")
}
