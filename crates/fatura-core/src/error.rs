//! Error types for the fatura-core library.

use std::time::Duration;

use thiserror::Error;

use crate::workflow::{Action, InvoiceStatus};

/// Main error type for the fatura library.
#[derive(Error, Debug)]
pub enum FaturaError {
    /// Text acquisition error.
    #[error("acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),

    /// Structured extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Lifecycle transition rejected.
    #[error("{0}")]
    Transition(#[from] TransitionError),

    /// Notification delivery error.
    #[error("notification error: {0}")]
    Notify(#[from] NotifyError),

    /// An external call did not finish in time.
    #[error("{stage} timed out after {}s", .after.as_secs())]
    Timeout { stage: Stage, after: Duration },

    /// No invoice with this id exists in the session.
    #[error("invoice #{0} not found")]
    UnknownInvoice(u64),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Acquisition,
    Extraction,
    Notification,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Acquisition => "text acquisition",
            Stage::Extraction => "structured extraction",
            Stage::Notification => "notification",
        };
        f.write_str(name)
    }
}

/// Errors raised while turning document bytes into text.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// OCR processing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// The blocking acquisition task panicked or was aborted.
    #[error("acquisition task failed: {0}")]
    Task(String),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// Failed to extract images from PDF.
    #[error("failed to extract images: {0}")]
    ImageExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Text recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// Invalid image format or dimensions.
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// Errors related to language-model extraction.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The request never produced a response (network, TLS, DNS).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The provider answered with a non-success status.
    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The provider answered without any completion.
    #[error("empty completion")]
    EmptyResponse,

    /// The completion is not syntactically valid JSON.
    #[error("response is not valid JSON: {0}")]
    Parse(String),

    /// The JSON does not match the record structure.
    #[error("response does not match the record schema: {0}")]
    Invalid(String),
}

impl ExtractionError {
    /// Whether the failure concerns the content of a completion rather than
    /// the call itself.
    pub fn is_parse_failure(&self) -> bool {
        matches!(self, ExtractionError::Parse(_) | ExtractionError::Invalid(_))
    }
}

impl From<reqwest::Error> for ExtractionError {
    fn from(err: reqwest::Error) -> Self {
        ExtractionError::Transport(err.to_string())
    }
}

/// A lifecycle action requested from a state that forbids it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("invoice #{id}: cannot {action} while {from}; {requirement}")]
    GuardViolation {
        id: u64,
        action: Action,
        from: InvoiceStatus,
        requirement: &'static str,
    },
}

/// Errors related to notification delivery.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// The request never produced a response.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The messaging API answered with a non-success status.
    #[error("messaging API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The messaging API accepted the request but refused the message.
    #[error("message rejected: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        NotifyError::Transport(err.to_string())
    }
}

/// Result type for the fatura library.
pub type Result<T> = std::result::Result<T, FaturaError>;
