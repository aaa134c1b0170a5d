//! Structured extraction of financial fields by a language model.

mod client;
mod parser;
mod prompt;

pub use client::{CompletionClient, OpenAiClient};
pub use parser::{parse_record, strip_fences};
pub use prompt::{Prompt, build_prompt, build_retry_prompt, truncate_chars};

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{ExtractionError, FaturaError, Stage};
use crate::models::ExtractedRecord;
use crate::models::config::ExtractionConfig;

/// Outcome of an extraction that reached the model.
#[derive(Debug)]
pub struct Extraction {
    /// Model output the record came from, or the first output when nothing
    /// parsed.
    pub raw: String,
    pub record: Option<ExtractedRecord>,
    /// Why the last attempt did not produce a record.
    pub parse_error: Option<ExtractionError>,
    /// Model calls made, including retries.
    pub attempts: u32,
}

/// Prompts the model, parses its answer and retries with a repair prompt
/// when the answer does not parse.
pub struct StructuredExtractor {
    client: Arc<dyn CompletionClient>,
    max_input_chars: usize,
    max_retries: u32,
    timeout: Duration,
}

impl StructuredExtractor {
    pub fn new(client: Arc<dyn CompletionClient>, config: &ExtractionConfig) -> Self {
        Self {
            client,
            max_input_chars: config.max_input_chars,
            max_retries: config.max_retries,
            timeout: config.timeout(),
        }
    }

    /// Extract a record from document text.
    ///
    /// Fails only when the first model call fails or times out. Unparseable
    /// output is reported through `Extraction::parse_error`.
    pub async fn extract(&self, text: &str) -> Result<Extraction, FaturaError> {
        let input = truncate_chars(text, self.max_input_chars);
        if input.len() < text.len() {
            debug!(kept = self.max_input_chars, "Truncated document text for prompt");
        }

        let first = self.call(&build_prompt(input)).await?;
        let mut attempts = 1;

        let mut last_error = match parse_record(&first) {
            Ok(record) => {
                info!("Extracted record on first attempt");
                return Ok(Extraction { raw: first, record: Some(record), parse_error: None, attempts });
            }
            Err(e) => e,
        };

        let mut previous = first.clone();
        while attempts <= self.max_retries {
            warn!(attempt = attempts, "Model output did not parse: {}", last_error);
            attempts += 1;

            let answer = match self.call(&build_retry_prompt(&previous)).await {
                Ok(answer) => answer,
                Err(e) => {
                    warn!("Retry failed, keeping first answer: {}", e);
                    break;
                }
            };

            match parse_record(&answer) {
                Ok(record) => {
                    info!(attempts, "Extracted record after retry");
                    return Ok(Extraction { raw: answer, record: Some(record), parse_error: None, attempts });
                }
                Err(e) => {
                    last_error = e;
                    previous = answer;
                }
            }
        }

        warn!(attempts, "Giving up on structured output: {}", last_error);
        Ok(Extraction { raw: first, record: None, parse_error: Some(last_error), attempts })
    }

    async fn call(&self, prompt: &Prompt) -> Result<String, FaturaError> {
        match tokio::time::timeout(self.timeout, self.client.complete(prompt)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(FaturaError::Timeout { stage: Stage::Extraction, after: self.timeout }),
        }
    }
}
