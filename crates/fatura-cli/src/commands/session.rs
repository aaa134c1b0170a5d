//! Session command - interactive intake and approval.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use fatura_core::models::amounts::format_brl;
use fatura_core::{
    Action, Credentials, Dispatcher, FaturaError, Invoice, Notice, OpenAiClient, Session,
    StructuredExtractor, TelegramNotifier, TextAcquirer,
};

use super::{build_recognizer, load_config, print_notice, print_notices};

/// Arguments for the session command.
#[derive(Args)]
pub struct SessionArgs {
    /// Documents to ingest before reading commands
    files: Vec<PathBuf>,
}

/// One line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Upload(PathBuf),
    Approve(Option<u64>),
    Reject(Option<u64>),
    Pay(Option<u64>),
    RejectPayment(Option<u64>),
    Show(Option<u64>),
    List,
    Help,
    Quit,
    Nothing,
}

const HELP: &str = "\
Comandos:
  upload <arquivo>        enviar um documento
  approve [id]            aprovar conformidade
  reject [id]             rejeitar na conferência
  pay [id]                registrar pagamento (simulado)
  reject-payment [id]     rejeitar no pagamento
  show [id]               mostrar uma fatura
  list                    listar faturas
  help                    mostrar esta ajuda
  quit                    encerrar a sessão
Sem id, o comando vale para a fatura atual.";

fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Command::Nothing);
    };
    let rest: Vec<&str> = words.collect();

    let id = |rest: &[&str]| -> Result<Option<u64>, String> {
        match rest {
            [] => Ok(None),
            [raw] => raw
                .trim_start_matches('#')
                .parse()
                .map(Some)
                .map_err(|_| format!("id inválido: {}", raw)),
            _ => Err("informe no máximo um id".to_string()),
        }
    };

    match verb.to_lowercase().as_str() {
        "upload" | "u" => {
            if rest.is_empty() {
                Err("uso: upload <arquivo>".to_string())
            } else {
                Ok(Command::Upload(PathBuf::from(rest.join(" "))))
            }
        }
        "approve" | "a" => id(&rest).map(Command::Approve),
        "reject" | "r" => id(&rest).map(Command::Reject),
        "pay" | "p" => id(&rest).map(Command::Pay),
        "reject-payment" | "rp" => id(&rest).map(Command::RejectPayment),
        "show" | "s" => id(&rest).map(Command::Show),
        "list" | "ls" => Ok(Command::List),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        other => Err(format!("comando desconhecido: {} (digite help)", other)),
    }
}

pub async fn run(args: SessionArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let credentials = Credentials::from_env(&config)?;
    info!(?credentials, "Starting session");

    let acquirer = TextAcquirer::new(build_recognizer(&config), &config.acquisition);
    let client = Arc::new(OpenAiClient::new(&config.extraction, credentials.llm_api_key.clone()));
    let extractor = StructuredExtractor::new(client, &config.extraction);
    let notifier = Arc::new(TelegramNotifier::new(&config.notify, &credentials.bot_token));
    let dispatcher = Dispatcher::from_credentials(notifier, &credentials, &config.notify);

    let mut session = Session::new(acquirer, extractor, dispatcher, &config);

    for file in &args.files {
        upload(&mut session, file).await;
    }

    println!("{}", style("Sessão iniciada. Digite help para ver os comandos.").bold());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::Write::flush(&mut std::io::stdout())?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                print_notice(&Notice::error(message));
                continue;
            }
        };

        match command {
            Command::Nothing => {}
            Command::Quit => break,
            Command::Help => println!("{}", HELP),
            Command::List => list(&session),
            Command::Show(id) => match target(&session, id).and_then(|id| Ok(session.invoice(id)?)) {
                Ok(invoice) => show(invoice),
                Err(e) => print_notice(&Notice::error(e.to_string())),
            },
            Command::Upload(path) => upload(&mut session, &path).await,
            Command::Approve(id) => act(&mut session, id, Action::ApproveCompliance).await,
            Command::Reject(id) => act(&mut session, id, Action::RejectCompliance).await,
            Command::Pay(id) => act(&mut session, id, Action::Pay).await,
            Command::RejectPayment(id) => act(&mut session, id, Action::RejectPayment).await,
        }
    }

    println!("{}", style("Sessão encerrada.").dim());
    Ok(())
}

/// Explicit id, or the current invoice.
fn target(session: &Session, id: Option<u64>) -> anyhow::Result<u64> {
    id.or_else(|| session.current().map(Invoice::id))
        .ok_or_else(|| anyhow::anyhow!("Nenhuma fatura enviada ainda"))
}

async fn upload(session: &mut Session, path: &Path) {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            print_notice(&Notice::error(format!("{}: {}", path.display(), e)));
            return;
        }
    };

    println!("{} {}", style("Processando").cyan(), path.display());
    match session.ingest(bytes).await {
        Ok(report) => {
            print_notices(&report.notices);
            if let Ok(invoice) = session.invoice(report.invoice_id) {
                show(invoice);
            }
        }
        Err(e) => print_notice(&Notice::error(e.to_string())),
    }
}

async fn act(session: &mut Session, id: Option<u64>, action: Action) {
    let id = match target(session, id) {
        Ok(id) => id,
        Err(e) => return print_notice(&Notice::error(e.to_string())),
    };

    match session.apply(id, action).await {
        Ok(report) => print_notices(&report.notices),
        Err(FaturaError::Transition(e)) => {
            print_notice(&Notice::warning(format!("Ação recusada: {}", e)));
        }
        Err(e) => print_notice(&Notice::error(e.to_string())),
    }
}

fn list(session: &Session) {
    let mut any = false;
    for invoice in session.invoices() {
        any = true;
        let record = invoice.structured_data.as_ref();
        let total = record
            .and_then(|r| r.total_value)
            .map(format_brl)
            .unwrap_or_else(|| "-".to_string());
        let issuer = record
            .and_then(|r| r.issuer_name.as_deref())
            .unwrap_or("-");
        println!(
            "#{:<4} {:<26} {:>16}  {}",
            invoice.id(),
            invoice.status().label(),
            total,
            issuer
        );
    }
    if !any {
        println!("{}", style("Nenhuma fatura.").dim());
    }
}

fn show(invoice: &Invoice) {
    println!(
        "{} {}",
        style(format!("Fatura #{}", invoice.id())).bold(),
        style(format!("[{}]", invoice.status().label())).cyan()
    );
    if invoice.structured_data.is_none() {
        println!("{}", style("(sem dados estruturados; conteúdo bruto)").yellow());
    }
    println!("{}", invoice.payload());
}
