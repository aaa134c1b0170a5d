//! The workflow's unit of work: one uploaded document, its extraction, and
//! its lifecycle status.

use serde::{Deserialize, Serialize};

use super::record::ExtractedRecord;
use crate::error::TransitionError;
use crate::workflow::{Action, InvoiceStatus};

/// How the text handed to the language model was obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    /// Embedded PDF text layer.
    Embedded,
    /// OCR over page rasters or an uploaded image.
    Ocr,
    /// The upload was already plain text.
    PlainText,
    /// Nothing readable was found.
    #[default]
    Empty,
}

/// An invoice tracked by the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    id: u64,

    /// Unparsed model output, kept even when parsing failed.
    pub raw_extraction: String,

    /// Present only when the model output parsed into a valid record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<ExtractedRecord>,

    status: InvoiceStatus,

    /// Where the extracted text came from.
    pub source: TextSource,
}

impl Invoice {
    /// Create a pending invoice. Ids are handed out by the store.
    pub(crate) fn new(
        id: u64,
        raw_extraction: String,
        structured_data: Option<ExtractedRecord>,
        source: TextSource,
    ) -> Self {
        Self {
            id,
            raw_extraction,
            structured_data,
            status: InvoiceStatus::Pending,
            source,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    /// Apply a lifecycle action. On a guard violation the status is left
    /// untouched.
    pub fn apply(&mut self, action: Action) -> Result<InvoiceStatus, TransitionError> {
        let next = self.status.next(action).ok_or(TransitionError::GuardViolation {
            id: self.id,
            action,
            from: self.status,
            requirement: action.requirement(),
        })?;
        self.status = next;
        Ok(next)
    }

    /// The structured record as pretty JSON, or the raw model output when no
    /// record is available.
    pub fn payload(&self) -> String {
        self.structured_data
            .as_ref()
            .and_then(|record| serde_json::to_string_pretty(record).ok())
            .unwrap_or_else(|| self.raw_extraction.clone())
    }
}
