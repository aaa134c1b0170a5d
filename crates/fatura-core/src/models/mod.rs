//! Data models: invoices, extracted records, amounts and configuration.

pub mod amounts;
pub mod config;
pub mod invoice;
pub mod record;

pub use invoice::{Invoice, TextSource};
pub use record::{ExtractedRecord, LineItem};
