//! Core library for invoice intake.
//!
//! This crate provides:
//! - Text acquisition from PDFs, images and plain text, with OCR fallback
//! - Structured extraction of Brazilian fiscal documents by a language model
//! - The compliance/payment approval workflow
//! - Reviewer notifications over Telegram

pub mod acquisition;
pub mod error;
pub mod extraction;
pub mod models;
pub mod notice;
pub mod notify;
pub mod workflow;

pub use acquisition::{Acquisition, DocumentKind, PdfExtractor, PdfProcessor, TextAcquirer, TextRecognizer};
#[cfg(feature = "native")]
pub use acquisition::PureOcrEngine;
pub use error::{FaturaError, Result};
pub use extraction::{CompletionClient, Extraction, OpenAiClient, StructuredExtractor};
pub use models::config::{Credentials, FaturaConfig};
pub use models::{ExtractedRecord, Invoice, LineItem, TextSource};
pub use notice::{Notice, NoticeLevel};
pub use notify::{Channel, Delivery, Dispatcher, Notifier, TelegramNotifier};
pub use workflow::{Action, IngestReport, InvoiceStatus, Session, TransitionReport};
