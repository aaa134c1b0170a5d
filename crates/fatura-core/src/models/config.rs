//! Configuration structures for the intake pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::FaturaError;

/// Main configuration for the fatura pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FaturaConfig {
    /// Text acquisition configuration.
    pub acquisition: AcquisitionConfig,

    /// Language-model extraction configuration.
    pub extraction: ExtractionConfig,

    /// Notification configuration.
    pub notify: NotifyConfig,
}

/// Text acquisition (PDF text layer and OCR fallback).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Maximum pages to OCR (0 = unlimited).
    pub max_pages: usize,

    /// DPI hint for rendering PDF pages to images.
    pub render_dpi: u32,

    /// Upper bound for the whole acquisition step, in seconds.
    pub timeout_secs: u64,

    /// Directory containing the OCR model files.
    pub model_dir: PathBuf,

    /// OCR engine configuration.
    pub ocr: OcrConfig,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            max_pages: 10,
            render_dpi: 300,
            timeout_secs: 120,
            model_dir: PathBuf::from("models"),
            ocr: OcrConfig::default(),
        }
    }
}

impl AcquisitionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Detection model file name.
    pub detection_model: String,

    /// Recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,

    /// Keep `[UNK]` markers for characters outside the dictionary.
    pub keep_unk: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
            keep_unk: false,
        }
    }
}

/// Language-model extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Base URL of an OpenAI-compatible chat-completions API.
    pub base_url: String,

    /// Model name sent with every request.
    pub model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Input text is cut to this many characters before prompting.
    pub max_input_chars: usize,

    /// Extra attempts with a stricter prompt when the output does not parse.
    pub max_retries: u32,

    /// Per-call timeout in seconds.
    pub timeout_secs: u64,

    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4".to_string(),
            temperature: 0.0,
            max_input_chars: 3000,
            max_retries: 1,
            timeout_secs: 60,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl ExtractionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Base URL of the Telegram Bot API.
    pub api_base: String,

    /// Destination for compliance reviewers.
    pub compliance_channel: Option<String>,

    /// Destination for payment authorizers.
    pub payment_channel: Option<String>,

    /// Per-message timeout in seconds.
    pub timeout_secs: u64,

    /// Environment variable holding the bot token.
    pub token_env: String,

    /// Environment variable overriding `compliance_channel`.
    pub compliance_channel_env: String,

    /// Environment variable overriding `payment_channel`.
    pub payment_channel_env: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            compliance_channel: None,
            payment_channel: None,
            timeout_secs: 10,
            token_env: "TELEGRAM_BOT_TOKEN".to_string(),
            compliance_channel_env: "TELEGRAM_CHAT_APROVACAO".to_string(),
            payment_channel_env: "TELEGRAM_CHAT_PAGAMENTO".to_string(),
        }
    }
}

impl NotifyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Secrets and destinations resolved at startup.
#[derive(Clone)]
pub struct Credentials {
    pub llm_api_key: String,
    pub bot_token: String,
    pub compliance_channel: String,
    pub payment_channel: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("llm_api_key", &"***")
            .field("bot_token", &"***")
            .field("compliance_channel", &self.compliance_channel)
            .field("payment_channel", &self.payment_channel)
            .finish()
    }
}

impl Credentials {
    /// Resolve from the process environment.
    pub fn from_env(config: &FaturaConfig) -> Result<Self, FaturaError> {
        Self::resolve(config, |key| std::env::var(key).ok())
    }

    /// Only the language-model key, for commands that never notify.
    pub fn api_key_from_env(config: &FaturaConfig) -> Result<String, FaturaError> {
        required(&|key: &str| std::env::var(key).ok(), &config.extraction.api_key_env)
    }

    /// Resolve using `lookup` for environment values. Environment values
    /// win over channels set in the config file.
    pub fn resolve<F>(config: &FaturaConfig, lookup: F) -> Result<Self, FaturaError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| required(&lookup, key);
        let channel = |key: &str, fallback: &Option<String>| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| fallback.clone())
                .ok_or_else(|| {
                    FaturaError::Config(format!("{} is not set and no channel is configured", key))
                })
        };

        Ok(Self {
            llm_api_key: required(&config.extraction.api_key_env)?,
            bot_token: required(&config.notify.token_env)?,
            compliance_channel: channel(
                &config.notify.compliance_channel_env,
                &config.notify.compliance_channel,
            )?,
            payment_channel: channel(
                &config.notify.payment_channel_env,
                &config.notify.payment_channel,
            )?,
        })
    }
}

fn required(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<String, FaturaError> {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| FaturaError::Config(format!("{} is not set", key)))
}

impl FaturaConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: FaturaConfig =
            serde_json::from_str(r#"{"extraction": {"model": "gpt-4o-mini"}}"#).unwrap();
        assert_eq!(config.extraction.model, "gpt-4o-mini");
        assert_eq!(config.extraction.max_input_chars, 3000);
        assert_eq!(config.acquisition.max_pages, 10);
    }

    #[test]
    fn test_resolve_credentials() {
        let vars = env(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("TELEGRAM_CHAT_APROVACAO", "-100"),
        ]);
        let mut config = FaturaConfig::default();
        config.notify.payment_channel = Some("-200".to_string());

        let creds = Credentials::resolve(&config, |k| vars.get(k).cloned()).unwrap();
        assert_eq!(creds.compliance_channel, "-100");
        assert_eq!(creds.payment_channel, "-200");
        assert!(!format!("{:?}", creds).contains("sk-test"));
    }

    #[test]
    fn test_missing_credential_names_variable() {
        let vars = env(&[("OPENAI_API_KEY", "sk-test")]);
        let err = Credentials::resolve(&FaturaConfig::default(), |k| vars.get(k).cloned())
            .unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_BOT_TOKEN"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = FaturaConfig::default();
        config.notify.compliance_channel = Some("-42".to_string());
        config.save(&path).unwrap();

        let loaded = FaturaConfig::from_file(&path).unwrap();
        assert_eq!(loaded.notify.compliance_channel.as_deref(), Some("-42"));
    }
}
