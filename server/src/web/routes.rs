// printflow_server/src/web/routes.rs

use actix_web::web;

use crate::web::handlers::{payment_handlers, photo_handlers, upload_handlers, webhook_handlers};

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg
    .route("/health", web::get().to(health_check_handler))
    .route("/generate-pdf", web::post().to(photo_handlers::generate_photo_sheet_handler))
    .service(
      web::scope("/print")
        .route("/upload", web::post().to(upload_handlers::upload_handler))
        .service(
          web::scope("/api/payments")
            .route("/initiate", web::post().to(payment_handlers::initiate_payment_handler))
            .route("/webhook", web::post().to(webhook_handlers::payment_webhook_handler))
            .route("/summary", web::get().to(payment_handlers::payment_summary_handler)),
        ),
    );
}
