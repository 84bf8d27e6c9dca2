// printflow/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

/// Failures raised by the step runner itself, independent of what the steps do.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Handler missing for non-optional step: {step_name}")]
    HandlerMissing { step_name: String },

    #[error("Pipeline '{pipeline}' finished without producing {field}")]
    MissingOutput { pipeline: &'static str, field: &'static str },
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid page range {start}-{end}: start must be >= 1, end >= start, and end <= {page_count}")]
    InvalidRange { start: u32, end: u32, page_count: u32 },

    #[error("Unsupported document: {0}")]
    UnsupportedDocument(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Webhook signature verification failed")]
    Signature,

    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),

    #[error("Grayscale conversion failed: {0}")]
    Conversion(String),

    #[error("Payment '{0}' is already recorded")]
    DuplicatePayment(String),

    #[error("Path escapes the storage root: {0}")]
    PathTraversal(String),

    #[error("Payment ledger error. Source: {source}")]
    Ledger {
        #[source]
        source: AnyhowError,
    },

    #[error("Mail delivery error. Source: {source}")]
    Mail {
        #[source]
        source: AnyhowError,
    },

    #[error("PDF processing error: {0}")]
    Pdf(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

impl FlowError {
    pub fn ledger(source: impl Into<AnyhowError>) -> Self {
        FlowError::Ledger { source: source.into() }
    }

    pub fn mail(source: impl Into<AnyhowError>) -> Self {
        FlowError::Mail { source: source.into() }
    }

    /// True for the failures a webhook sender should see as a client error.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            FlowError::Validation(_)
                | FlowError::InvalidRange { .. }
                | FlowError::UnsupportedDocument(_)
                | FlowError::MalformedPayload(_)
                | FlowError::PathTraversal(_)
        )
    }
}

pub type FlowResult<T, E = FlowError> = std::result::Result<T, E>;
