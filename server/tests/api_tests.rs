// tests/api_tests.rs

use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use chrono::FixedOffset;
use once_cell::sync::Lazy;
use printflow::order::build_order_notes;
use printflow::{InMemoryLedger, OrderItem, PaymentLedger, PrintType, PrinterDirectory};
use printflow_server::config::{AppConfig, GatewayKind, MailerKind, SmtpConfig};
use printflow_server::services::razorpay::sign_hmac_sha256;
use printflow_server::services::{LogMailer, MockGateway};
use printflow_server::state::AppState;
use printflow_server::web::configure_app_routes;
use serde_json::{json, Value};
use serial_test::serial;
use std::path::PathBuf;
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

const WEBHOOK_SECRET: &str = "whsec_api_test";
const PRINTER_PHONE: &str = "9999999999";
const PRINTERS: &str = r#"[{"id":"1","email":"front@print.test","name":"Front Desk","phone":"9999999999"}]"#;

struct TestEnv {
  _dir: TempDir,
  upload_dir: PathBuf,
  state: AppState,
  mailer: Arc<LogMailer>,
  ledger: Arc<InMemoryLedger>,
}

fn test_config(upload_dir: PathBuf) -> AppConfig {
  AppConfig {
    server_host: "127.0.0.1".to_string(),
    server_port: 0,
    database_url: None,
    upload_dir,
    uploads_base_url: "/uploads/".to_string(),
    max_upload_bytes: 1024 * 1024,
    gateway: GatewayKind::Mock,
    razorpay_key_id: String::new(),
    razorpay_key_secret: String::new(),
    razorpay_webhook_secret: Some(WEBHOOK_SECRET.to_string()),
    razorpay_api_base: "http://127.0.0.1:9".to_string(),
    currency: "INR".to_string(),
    mailer: MailerKind::Log,
    smtp: SmtpConfig {
      host: "localhost".to_string(),
      port: 2525,
      username: None,
      password: None,
    },
    mail_from: "shop@print.test".to_string(),
    printers_file: None,
    default_printer_id: "1".to_string(),
    default_printer_email: None,
    ledger_offset: FixedOffset::east_opt(330 * 60).unwrap(),
    // Missing tools: grayscale rendering fails softly.
    ghostscript_bin: PathBuf::from("printflow-missing-gs"),
    imagemagick_bin: PathBuf::from("printflow-missing-convert"),
    pdf_conversion_timeout: Duration::from_secs(5),
    image_conversion_timeout: Duration::from_secs(5),
  }
}

fn test_env() -> TestEnv {
  Lazy::force(&TRACING_INIT);
  let dir = tempfile::tempdir().unwrap();
  let upload_dir = dir.path().join("uploads");
  let config = Arc::new(test_config(upload_dir.clone()));
  let mailer = Arc::new(LogMailer::new());
  let ledger = Arc::new(InMemoryLedger::new());
  let printers = Arc::new(PrinterDirectory::from_json_str(PRINTERS).unwrap());
  let state = AppState::assemble(
    config,
    Arc::new(MockGateway::default()),
    mailer.clone(),
    ledger.clone(),
    printers,
  )
  .unwrap();
  TestEnv {
    _dir: dir,
    upload_dir,
    state,
    mailer,
    ledger,
  }
}

macro_rules! init_app {
  ($env:expr) => {
    test::init_service(
      App::new()
        .app_data(web::Data::new($env.state.clone()))
        .configure(configure_app_routes),
    )
    .await
  };
}

const BOUNDARY: &str = "printflow-test-boundary";

fn multipart_body(file_name: &str, content_type: &str, bytes: &[u8], fields: &[(&str, &str)]) -> Vec<u8> {
  let mut body = Vec::new();
  for (name, value) in fields {
    body.extend_from_slice(
      format!(
        "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
        BOUNDARY, name, value
      )
      .as_bytes(),
    );
  }
  body.extend_from_slice(
    format!(
      "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
      BOUNDARY, file_name, content_type
    )
    .as_bytes(),
  );
  body.extend_from_slice(bytes);
  body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
  body
}

fn upload_request(file_name: &str, fields: &[(&str, &str)]) -> test::TestRequest {
  test::TestRequest::post()
    .uri("/print/upload")
    .insert_header((
      header::CONTENT_TYPE,
      format!("multipart/form-data; boundary={}", BOUNDARY),
    ))
    .set_payload(multipart_body(file_name, "image/png", b"\x89PNG\r\n\x1a\nnot-really-pixels", fields))
}

fn captured_event(payment_id: &str, order_id: &str, amount: i64, notes: Value) -> Vec<u8> {
  serde_json::to_vec(&json!({
    "event": "payment.captured",
    "payload": {"payment": {"entity": {
      "id": payment_id,
      "order_id": order_id,
      "amount": amount,
      "currency": "INR",
      "created_at": 1_700_000_000i64,
      "notes": notes,
    }}}
  }))
  .unwrap()
}

fn webhook_request(body: Vec<u8>, signature: Option<String>) -> test::TestRequest {
  let mut req = test::TestRequest::post()
    .uri("/print/api/payments/webhook")
    .insert_header((header::CONTENT_TYPE, "application/json"));
  if let Some(signature) = signature {
    req = req.insert_header(("X-Razorpay-Signature", signature));
  }
  req.set_payload(body)
}

#[actix_web::test]
#[serial]
async fn health_reports_ok() {
  let env = test_env();
  let app = init_app!(env);
  let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body, json!({"status": "ok"}));
}

#[actix_web::test]
#[serial]
async fn upload_stores_sanitized_image_and_ignores_range() {
  let env = test_env();
  let app = init_app!(env);
  let req = upload_request(
    "../../My Photo-1.png",
    &[("pageRange", "custom"), ("startPage", "1"), ("endPage", "1")],
  )
  .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;

  let color = body["colorFileName"].as_str().unwrap();
  assert!(color.starts_with("orig_MyPhoto_1_"), "{}", color);
  assert!(color.ends_with(".png"));
  assert_eq!(body["originalFileName"], body["colorFileName"]);
  assert_eq!(body["colorUrl"], format!("/uploads/{}", color));
  assert_eq!(body["pageCount"], 1);
  assert!(body["bwFileName"].is_null());
  assert!(body["bwUrl"].is_null());
  assert!(env.upload_dir.join(color).exists());
}

#[actix_web::test]
#[serial]
async fn upload_rejects_bad_range_and_missing_file() {
  let env = test_env();
  let app = init_app!(env);

  let req = upload_request("a.png", &[("pageRange", "custom"), ("startPage", "one"), ("endPage", "2")]).to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

  let mut body = Vec::new();
  body.extend_from_slice(
    format!(
      "--{b}\r\nContent-Disposition: form-data; name=\"pageRange\"\r\n\r\nall\r\n--{b}--\r\n",
      b = BOUNDARY
    )
    .as_bytes(),
  );
  let req = test::TestRequest::post()
    .uri("/print/upload")
    .insert_header((
      header::CONTENT_TYPE,
      format!("multipart/form-data; boundary={}", BOUNDARY),
    ))
    .set_payload(body)
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
#[serial]
async fn initiate_prices_order_and_opens_gateway_order() {
  let env = test_env();
  let app = init_app!(env);
  let req = test::TestRequest::post()
    .uri("/print/api/payments/initiate")
    .set_json(json!({"items": [
      {"fileName": "orig_doc_12345678.pdf", "pageCount": 3, "printType": 0, "numberOfCopies": 1, "printerId": 1}
    ]}))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;

  assert!(body["orderId"].as_str().unwrap().starts_with("order_mock_"));
  assert_eq!(body["status"], "created");
  assert_eq!(body["currency"], "INR");
  assert_eq!(body["totalAmount"], 22);
  assert_eq!(body["amount"], 2200);
  assert_eq!(body["keyId"], "mock_key");
  assert_eq!(body["items"][0]["calculatedPrice"], 22);
}

#[actix_web::test]
#[serial]
async fn initiate_rejects_empty_and_invalid_orders() {
  let env = test_env();
  let app = init_app!(env);

  let req = test::TestRequest::post()
    .uri("/print/api/payments/initiate")
    .set_json(json!([]))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

  let req = test::TestRequest::post()
    .uri("/print/api/payments/initiate")
    .set_json(json!([{"fileName": "../secret.pdf", "pageCount": 1, "printType": 0, "numberOfCopies": 1}]))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
#[serial]
async fn webhook_requires_a_valid_signature() {
  let env = test_env();
  let app = init_app!(env);
  let body = captured_event("pay_sig", "order_sig", 1000, json!({}));

  let resp = test::call_service(&app, webhook_request(body.clone(), None).to_request()).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

  let forged = sign_hmac_sha256(&body, "wrong-secret");
  let resp = test::call_service(&app, webhook_request(body, Some(forged)).to_request()).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

  let garbage = b"not json".to_vec();
  let resp = test::call_service(&app, webhook_request(garbage, Some("00".to_string())).to_request()).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert!(env.ledger.is_empty());
}

#[actix_web::test]
#[serial]
async fn webhook_ignores_other_events_and_rejects_malformed_bodies() {
  let env = test_env();
  let app = init_app!(env);

  let body = serde_json::to_vec(&json!({"event": "payment.failed", "payload": {}})).unwrap();
  let signature = sign_hmac_sha256(&body, WEBHOOK_SECRET);
  let resp = test::call_service(&app, webhook_request(body, Some(signature)).to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let json: Value = test::read_body_json(resp).await;
  assert_eq!(json["status"], "ignored");

  let body = b"{\"event\":".to_vec();
  let signature = sign_hmac_sha256(&body, WEBHOOK_SECRET);
  let resp = test::call_service(&app, webhook_request(body, Some(signature)).to_request()).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
#[serial]
async fn webhook_without_manifest_is_acknowledged() {
  let env = test_env();
  let app = init_app!(env);
  let body = captured_event("pay_nomanifest", "order_x", 1000, json!({"item_count": "1"}));
  let signature = sign_hmac_sha256(&body, WEBHOOK_SECRET);
  let resp = test::call_service(&app, webhook_request(body, Some(signature)).to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let json: Value = test::read_body_json(resp).await;
  assert_eq!(json["status"], "acknowledged");
  assert!(env.mailer.sent().is_empty());
  assert!(env.ledger.is_empty());
}

#[actix_web::test]
#[serial]
async fn captured_payment_is_fulfilled_once_and_summarized() {
  let env = test_env();
  let app = init_app!(env);

  let resp = test::call_service(&app, upload_request("flyer.png", &[]).to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let upload: Value = test::read_body_json(resp).await;
  let stored = upload["colorFileName"].as_str().unwrap().to_string();

  let items = vec![OrderItem::new(stored.clone(), 1, PrintType::Color, 2).with_printer("1")];
  let notes = Value::Object(build_order_notes(&items, Some("1"), "receipt_api_test"));
  let body = captured_event("pay_api_1", "order_api_1", 2500, notes);
  let signature = sign_hmac_sha256(&body, WEBHOOK_SECRET);

  let resp = test::call_service(&app, webhook_request(body.clone(), Some(signature.clone())).to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let json: Value = test::read_body_json(resp).await;
  assert_eq!(json["status"], "processed");
  assert_eq!(json["paymentId"], "pay_api_1");
  assert_eq!(json["emailSent"], true);

  let sent = env.mailer.sent();
  assert_eq!(sent.len(), 1);
  assert_eq!(sent[0].1.len(), 2, "one attachment per copy");
  assert!(!env.upload_dir.join(&stored).exists());

  let records = env.ledger.records();
  assert_eq!(records.len(), 1);
  assert_eq!(records[0].phone_number, PRINTER_PHONE);
  assert_eq!(records[0].amount.to_string(), "25.00");

  // Redelivery of the same capture.
  let resp = test::call_service(&app, webhook_request(body, Some(signature)).to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let json: Value = test::read_body_json(resp).await;
  assert_eq!(json["status"], "duplicate");
  assert_eq!(env.mailer.sent().len(), 1);
  assert_eq!(env.ledger.len(), 1);
  assert!(env
    .ledger
    .find_by_payment_id("pay_api_1")
    .await
    .unwrap()
    .is_some());

  let req = test::TestRequest::get()
    .uri("/print/api/payments/summary?phone=9999999999&filter=CUSTOM&start=2023-11-15&end=2023-11-15")
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let summary: Value = test::read_body_json(resp).await;
  assert_eq!(summary["name"], "Front Desk");
  assert_eq!(summary["filterType"], "CUSTOM");
  assert_eq!(summary["payments"].as_array().unwrap().len(), 1);
  assert_eq!(summary["payments"][0]["paymentId"], "pay_api_1");
  assert_eq!(summary["totalPayment"], "25.00");
}

#[actix_web::test]
#[serial]
async fn summary_validates_phone_and_filter() {
  let env = test_env();
  let app = init_app!(env);

  let cases = [
    ("/print/api/payments/summary?phone=12345&filter=DAY", StatusCode::BAD_REQUEST),
    ("/print/api/payments/summary?phone=9999999999&filter=CUSTOM", StatusCode::BAD_REQUEST),
    (
      "/print/api/payments/summary?phone=9999999999&filter=CUSTOM&start=2024-02-10&end=2024-02-01",
      StatusCode::BAD_REQUEST,
    ),
    ("/print/api/payments/summary?phone=9999999999&filter=WEEK", StatusCode::BAD_REQUEST),
    ("/print/api/payments/summary?phone=1231231234&filter=DAY", StatusCode::NOT_FOUND),
    ("/print/api/payments/summary?phone=9999999999&filter=MONTH", StatusCode::OK),
  ];
  for (uri, status) in cases {
    let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
    assert_eq!(resp.status(), status, "{}", uri);
  }
}

fn photo_request(photo: &[u8], copies: &str) -> test::TestRequest {
  let mut body = format!(
    "--{b}\r\nContent-Disposition: form-data; name=\"copies\"\r\n\r\n{}\r\n--{b}\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"me.png\"\r\nContent-Type: image/png\r\n\r\n",
    copies,
    b = BOUNDARY
  )
  .into_bytes();
  body.extend_from_slice(photo);
  body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
  test::TestRequest::post()
    .uri("/generate-pdf")
    .insert_header((
      header::CONTENT_TYPE,
      format!("multipart/form-data; boundary={}", BOUNDARY),
    ))
    .set_payload(body)
}

fn tiny_png() -> Vec<u8> {
  let img = image::RgbImage::from_pixel(8, 10, image::Rgb([200, 180, 160]));
  let mut out = std::io::Cursor::new(Vec::new());
  image::DynamicImage::ImageRgb8(img)
    .write_to(&mut out, image::ImageFormat::Png)
    .unwrap();
  out.into_inner()
}

#[actix_web::test]
#[serial]
async fn photo_sheet_is_returned_as_a_pdf_attachment() {
  let env = test_env();
  let app = init_app!(env);
  let resp = test::call_service(&app, photo_request(&tiny_png(), "26").to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "application/pdf");
  assert_eq!(
    resp.headers().get(header::CONTENT_DISPOSITION).unwrap(),
    "attachment; filename=photos.pdf"
  );
  let body = test::read_body(resp).await;
  assert!(body.starts_with(b"%PDF-"));
  let doc = lopdf::Document::load_mem(&body).unwrap();
  assert_eq!(doc.get_pages().len(), 2);
}

#[actix_web::test]
#[serial]
async fn photo_sheet_rejects_bad_copies_and_bad_photos() {
  let env = test_env();
  let app = init_app!(env);
  for copies in ["0", "501", "-3", "many", ""] {
    let resp = test::call_service(&app, photo_request(&tiny_png(), copies).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "copies={:?}", copies);
  }
  let resp = test::call_service(&app, photo_request(b"definitely not an image", "2").to_request()).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body: Value = test::read_body_json(resp).await;
  assert!(body["error"].as_str().unwrap().contains("photo"), "{}", body);
}
