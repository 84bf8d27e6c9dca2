// printflow/src/lib.rs

//! Printflow: the pay-then-print order pipeline.
//!
//! An upload is stored and made page-addressable, an order over the stored
//! files is priced and opened with a payment gateway, and once the gateway
//! confirms the capture by webhook the files are emailed to the printer,
//! deleted, and the payment recorded in an idempotent ledger.
//!
//! The HTTP surface, database, SMTP transport and gateway client live in the
//! server crate and plug in through the traits in [`ports`].

pub mod document;
pub mod error;
pub mod fulfillment;
pub mod intake;
pub mod ledger;
pub mod order;
pub mod pipeline;
pub mod ports;
pub mod printers;
pub mod storage;
pub mod webhook;

pub use crate::document::{
  ConversionTools, DocumentKind, DocumentPreparer, IncomingFile, PageRangeRequest, SheetLayout, StoredUpload,
  UploadedDocument,
};
pub use crate::error::{FlowError, FlowResult, PipelineError};
pub use crate::fulfillment::{FulfillmentExecutor, FulfillmentReport, FulfillmentRequest};
pub use crate::intake::{OrderIntake, OrderStatus, OrderSummary};
pub use crate::ledger::{InMemoryLedger, NewPayment, PaymentRecord, PaymentSummary, SummaryFilter};
pub use crate::order::{OrderItem, OrderItemRequest, PricingTable, PrintType, PrinterRef, TierRates};
pub use crate::pipeline::{ContextData, Pipeline, PipelineControl, PipelineResult};
pub use crate::ports::{
  CreateOrderRequest, EmailAttachment, GatewayOrder, Mailer, OutboundEmail, PaymentGateway, PaymentLedger,
};
pub use crate::printers::{Printer, PrinterDirectory};
pub use crate::storage::StorageRoot;
pub use crate::webhook::{WebhookOutcome, WebhookProcessor, WebhookSettings, WebhookState};
