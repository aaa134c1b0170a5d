//! Subcommands and the helpers they share.

pub mod config;
pub mod process;
pub mod session;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use console::style;
use tracing::{debug, warn};

use fatura_core::{FaturaConfig, Notice, NoticeLevel, PureOcrEngine, TextRecognizer};

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fatura")
        .join("config.json")
}

/// Config file in effect: `--config` if given, else the default location.
pub fn config_path(explicit: Option<&str>) -> PathBuf {
    explicit.map(PathBuf::from).unwrap_or_else(default_config_path)
}

/// Load the configuration. An explicit path must exist; the default one is
/// optional.
pub fn load_config(explicit: Option<&str>) -> anyhow::Result<FaturaConfig> {
    let path = config_path(explicit);
    if path.exists() {
        debug!("Loading config from {}", path.display());
        Ok(FaturaConfig::from_file(&path)?)
    } else if explicit.is_some() {
        anyhow::bail!("Config file not found: {}", path.display())
    } else {
        Ok(FaturaConfig::default())
    }
}

/// OCR engine from the configured model directory, if its models are present.
pub fn build_recognizer(config: &FaturaConfig) -> Option<Arc<dyn TextRecognizer>> {
    let model_dir: &Path = &config.acquisition.model_dir;
    match PureOcrEngine::from_dir(model_dir, config.acquisition.ocr.clone()) {
        Ok(engine) => Some(Arc::new(engine)),
        Err(e) => {
            warn!("OCR disabled: {}", e);
            None
        }
    }
}

pub fn print_notice(notice: &Notice) {
    let marker = match notice.level {
        NoticeLevel::Info => style("ℹ").blue(),
        NoticeLevel::Success => style("✓").green(),
        NoticeLevel::Warning => style("⚠").yellow(),
        NoticeLevel::Error => style("✗").red(),
    };
    println!("{} {}", marker, notice.message);
}

pub fn print_notices(notices: &[Notice]) {
    notices.iter().for_each(print_notice);
}
