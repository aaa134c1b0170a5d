//! Process command - extract data from a single document.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use fatura_core::{Credentials, Notice, OpenAiClient, StructuredExtractor, TextAcquirer};

use super::{build_recognizer, load_config, print_notice, print_notices};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF, image or text)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the text handed to the model
    #[arg(long)]
    show_text: bool,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let api_key = Credentials::api_key_from_env(&config)?;

    info!("Processing file: {}", args.input.display());
    let data = fs::read(&args.input)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));

    pb.set_message("Reading document...");
    let acquirer = Arc::new(TextAcquirer::new(build_recognizer(&config), &config.acquisition));
    let acquisition = acquirer
        .spawn_acquire(data, config.acquisition.timeout())
        .await?;
    debug!(source = ?acquisition.source, chars = acquisition.text.len(), "Text acquired");

    pb.set_message("Extracting fields...");
    let client = Arc::new(OpenAiClient::new(&config.extraction, api_key));
    let extractor = StructuredExtractor::new(client, &config.extraction);
    let extraction = extractor.extract(&acquisition.text).await;

    pb.finish_and_clear();
    let extraction = extraction?;

    print_notices(&acquisition.advisories);

    if args.show_text {
        println!("{}", style("Texto do documento:").bold());
        println!("{}", acquisition.text);
        println!();
    }

    let output = match &extraction.record {
        Some(record) => {
            record
                .review_issues()
                .into_iter()
                .for_each(|issue| print_notice(&Notice::warning(issue)));
            serde_json::to_string_pretty(record)?
        }
        None => {
            if let Some(err) = &extraction.parse_error {
                print_notice(&Notice::error(format!(
                    "Resposta do modelo não pôde ser estruturada: {}",
                    err
                )));
            }
            extraction.raw.clone()
        }
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    debug!(attempts = extraction.attempts, "Total processing time: {:?}", start.elapsed());
    Ok(())
}
