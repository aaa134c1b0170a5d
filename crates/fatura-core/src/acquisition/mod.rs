//! Text acquisition: PDF text layer first, OCR over page rasters when the
//! layer is empty.
//!
//! Acquisition never fails. Anything that goes wrong degrades to less (or
//! no) text plus an advisory for the operator.

#[cfg(feature = "native")]
mod ocr;
mod pdf;

#[cfg(feature = "native")]
pub use ocr::PureOcrEngine;
pub use pdf::{PdfExtractor, PdfProcessor};
#[cfg(test)]
pub(crate) use pdf::tests as pdf_fixtures;

use std::sync::Arc;
use std::time::Duration;

use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::error::{AcquisitionError, FaturaError, OcrError, Stage};
use crate::models::TextSource;
use crate::models::config::AcquisitionConfig;
use crate::notice::Notice;

/// Turns a page or photo into text.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError>;
}

/// Creates a fresh PDF processor per document.
pub type PdfFactory = Arc<dyn Fn() -> Box<dyn PdfProcessor> + Send + Sync>;

/// What an upload looks like, judged from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image(image::ImageFormat),
    PlainText,
}

impl DocumentKind {
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(b"%PDF-") {
            DocumentKind::Pdf
        } else if let Ok(format) = image::guess_format(bytes) {
            DocumentKind::Image(format)
        } else {
            DocumentKind::PlainText
        }
    }
}

/// Text obtained from an upload.
#[derive(Debug, Clone)]
pub struct Acquisition {
    /// Trimmed text; may be empty.
    pub text: String,
    pub source: TextSource,
    /// Degradations worth telling the operator about.
    pub advisories: Vec<Notice>,
}

impl Acquisition {
    fn new(text: String, source: TextSource, advisories: Vec<Notice>) -> Self {
        let text = text.trim().to_string();
        let source = if text.is_empty() { TextSource::Empty } else { source };
        Self { text, source, advisories }
    }
}

/// Acquires text from uploaded documents.
pub struct TextAcquirer {
    recognizer: Option<Arc<dyn TextRecognizer>>,
    pdf_factory: PdfFactory,
    max_pages: usize,
    render_dpi: u32,
}

impl TextAcquirer {
    /// Create an acquirer. Without a recognizer, scanned documents yield no
    /// text.
    pub fn new(recognizer: Option<Arc<dyn TextRecognizer>>, config: &AcquisitionConfig) -> Self {
        Self {
            recognizer,
            pdf_factory: Arc::new(|| -> Box<dyn PdfProcessor> { Box::new(PdfExtractor::new()) }),
            max_pages: config.max_pages,
            render_dpi: config.render_dpi,
        }
    }

    /// Replace the PDF backend.
    pub fn with_pdf_factory(mut self, factory: PdfFactory) -> Self {
        self.pdf_factory = factory;
        self
    }

    /// Acquire text from raw upload bytes. Blocking; run off the async
    /// executor.
    pub fn acquire(&self, bytes: &[u8]) -> Acquisition {
        let kind = DocumentKind::sniff(bytes);
        debug!(?kind, len = bytes.len(), "Acquiring text");

        match kind {
            DocumentKind::Pdf => self.acquire_pdf(bytes),
            DocumentKind::Image(_) => self.acquire_image(bytes),
            DocumentKind::PlainText => {
                let text = String::from_utf8_lossy(bytes).into_owned();
                Acquisition::new(text, TextSource::PlainText, Vec::new())
            }
        }
    }

    /// Run `acquire` on the blocking pool, giving up after `timeout`.
    pub async fn spawn_acquire(
        self: Arc<Self>,
        bytes: Vec<u8>,
        timeout: Duration,
    ) -> Result<Acquisition, FaturaError> {
        let task = tokio::task::spawn_blocking(move || self.acquire(&bytes));
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(acquisition)) => Ok(acquisition),
            Ok(Err(e)) => Err(AcquisitionError::Task(e.to_string()).into()),
            Err(_) => Err(FaturaError::Timeout { stage: Stage::Acquisition, after: timeout }),
        }
    }

    /// Text layer first; OCR over page rasters when it is blank.
    pub fn acquire_pdf(&self, bytes: &[u8]) -> Acquisition {
        let mut pdf = (self.pdf_factory)();

        let text = match pdf.load(bytes).and_then(|_| pdf.extract_text()) {
            Ok(text) => text,
            Err(e) => {
                warn!("PDF text layer unavailable: {}", e);
                String::new()
            }
        };

        if !text.trim().is_empty() {
            info!("Using embedded text layer ({} chars)", text.len());
            return Acquisition::new(text, TextSource::Embedded, Vec::new());
        }

        let Some(recognizer) = &self.recognizer else {
            return Acquisition::new(String::new(), TextSource::Empty, vec![ocr_unavailable()]);
        };

        let mut advisories = vec![Notice::warning(
            "PDF sem camada de texto; usando OCR nas páginas digitalizadas",
        )];

        let page_count = pdf.page_count();
        let limit = if self.max_pages == 0 {
            page_count
        } else {
            page_count.min(u32::try_from(self.max_pages).unwrap_or(u32::MAX))
        };
        if limit < page_count {
            advisories.push(Notice::warning(format!(
                "OCR limitado às primeiras {} de {} páginas",
                limit, page_count
            )));
        }

        let mut pages = Vec::new();
        for page in 1..=limit {
            let raster = match pdf.render_page(page, self.render_dpi) {
                Ok(raster) => raster,
                Err(e) => {
                    warn!(page, "Skipping page: {}", e);
                    continue;
                }
            };
            match recognizer.recognize(&raster) {
                Ok(text) => pages.push(text),
                Err(e) => warn!(page, "Skipping page: {}", e),
            }
        }

        info!("OCR read {} of {} pages", pages.len(), limit);
        Acquisition::new(pages.join("\n\n"), TextSource::Ocr, advisories)
    }

    fn acquire_image(&self, bytes: &[u8]) -> Acquisition {
        let Some(recognizer) = &self.recognizer else {
            return Acquisition::new(String::new(), TextSource::Empty, vec![ocr_unavailable()]);
        };

        let advisories = vec![Notice::warning("Imagem enviada; texto obtido por OCR")];
        let text = match image::load_from_memory(bytes) {
            Ok(img) => recognizer.recognize(&img).unwrap_or_else(|e| {
                warn!("OCR failed: {}", e);
                String::new()
            }),
            Err(e) => {
                warn!("Could not decode image: {}", e);
                String::new()
            }
        };

        Acquisition::new(text, TextSource::Ocr, advisories)
    }
}

fn ocr_unavailable() -> Notice {
    Notice::warning("Documento sem texto extraível e OCR indisponível")
}
