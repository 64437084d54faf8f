//! TrustBridge - conversational issue reporting
//!
//! CLI entry point standing in for the messaging transport and the
//! operator surface.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result, eyre};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, info, warn};

use trustbridge::cli::{Cli, Command, OutputFormat, get_log_path};
use trustbridge::config::Config;
use trustbridge::dispatcher::Dispatcher;
use trustbridge::domain::{Report, ReportStatus, normalize_phone};
use trustbridge::engine::ConversationEngine;
use trustbridge::evidence;
use trustbridge::language::create_detector;
use trustbridge::llm::{Generator, create_client};
use trustbridge::prompts::PromptLoader;
use trustbridge::state::{MemoryGateway, ReportGateway, SessionGateway, StateManager};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(provider = %config.llm.provider, "TrustBridge loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Chat { phone, ephemeral } => {
            debug!(%phone, ephemeral, "main: matched Chat command");
            cmd_chat(&config, &phone, ephemeral).await
        }
        Command::Send { phone, text } => {
            debug!(%phone, "main: matched Send command");
            cmd_send(&config, &phone, &text).await
        }
        Command::Attach { phone, path } => {
            debug!(%phone, ?path, "main: matched Attach command");
            cmd_attach(&config, &phone, &path).await
        }
        Command::Reports { phone, format } => {
            debug!(?phone, %format, "main: matched Reports command");
            cmd_reports(&config, phone.as_deref(), format).await
        }
        Command::SetStatus { id, status } => {
            debug!(id, %status, "main: matched SetStatus command");
            cmd_set_status(&config, id, &status).await
        }
        Command::Stats { format } => {
            debug!(%format, "main: matched Stats command");
            cmd_stats(&config, format).await
        }
    }
}

/// Wire the conversation engine over the given gateways
fn build_engine(config: &Config, state: Gateways) -> ConversationEngine {
    debug!("build_engine: called");
    let client = match create_client(&config.llm) {
        Ok(client) => Some(client),
        Err(e) => {
            warn!(error = %e, "Generation capability unavailable, using deterministic replies");
            None
        }
    };

    let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let prompts = Arc::new(PromptLoader::new(root));
    let dispatcher = Dispatcher::spawn(config.dispatcher.clone());
    let generator = Generator::new(client, dispatcher, prompts);

    let (sessions, reports) = state.into_parts();
    ConversationEngine::new(sessions, reports, generator, config.conversation.clone())
        .with_detector(create_detector(&config.language))
}

/// Session and report storage backing the engine
enum Gateways {
    Persistent(StateManager),
    Ephemeral(Arc<MemoryGateway>),
}

impl Gateways {
    fn open(config: &Config, ephemeral: bool) -> Result<Self> {
        if ephemeral {
            info!("Using in-memory storage");
            return Ok(Self::Ephemeral(Arc::new(MemoryGateway::new())));
        }
        Ok(Self::Persistent(open_store(config)?))
    }

    fn into_parts(self) -> (Arc<dyn SessionGateway>, Arc<dyn ReportGateway>) {
        match self {
            Self::Persistent(manager) => {
                let sessions: Arc<dyn SessionGateway> = Arc::new(manager.clone());
                (sessions, Arc::new(manager))
            }
            Self::Ephemeral(memory) => {
                let sessions: Arc<dyn SessionGateway> = memory.clone();
                (sessions, memory)
            }
        }
    }
}

fn open_store(config: &Config) -> Result<StateManager> {
    let db_path = config.storage.db_path();
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).context("Failed to create data directory")?;
    }
    StateManager::spawn(&db_path).context(format!("Failed to open store at {}", db_path.display()))
}

async fn cmd_chat(config: &Config, phone: &str, ephemeral: bool) -> Result<()> {
    debug!(%phone, ephemeral, "cmd_chat: called");
    let engine = build_engine(config, Gateways::open(config, ephemeral)?);
    let media_dir = config.storage.media_dir();

    println!();
    println!("{}", "TrustBridge".bright_cyan().bold());
    println!("Chatting as {}", normalize_phone(phone).bright_white());
    println!(
        "Type {} to send a file, {} to quit",
        "/attach PATH".yellow(),
        "/quit".yellow()
    );
    println!();

    let mut rl = DefaultEditor::new().map_err(|e| eyre!("Failed to initialize readline: {}", e))?;
    loop {
        match rl.readline(&format!("{} ", ">".bright_green())) {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input);

                let reply = if let Some(rest) = input.strip_prefix("/attach") {
                    let path = rest.trim();
                    if path.is_empty() {
                        println!("{} Usage: /attach PATH", "?".yellow());
                        continue;
                    }
                    match evidence::store_media(&media_dir, &normalize_phone(phone), Path::new(path)).await {
                        Ok(file) => engine.attach_evidence(phone, file).await,
                        Err(e) => {
                            println!("{} {}", "✗".red(), e);
                            continue;
                        }
                    }
                } else if matches!(input, "/quit" | "/q" | "/exit") {
                    break;
                } else {
                    engine.handle(phone, input).await
                };
                println!("{}\n", reply.bright_blue());
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(err) => return Err(eyre!("Readline error: {}", err)),
        }
    }

    println!("Goodbye!");
    Ok(())
}

async fn cmd_send(config: &Config, phone: &str, text: &str) -> Result<()> {
    debug!(%phone, "cmd_send: called");
    let engine = build_engine(config, Gateways::open(config, false)?);
    println!("{}", engine.handle(phone, text).await);
    Ok(())
}

async fn cmd_attach(config: &Config, phone: &str, path: &Path) -> Result<()> {
    debug!(%phone, ?path, "cmd_attach: called");
    let engine = build_engine(config, Gateways::open(config, false)?);
    let file = evidence::store_media(&config.storage.media_dir(), &normalize_phone(phone), path).await?;
    println!("{}", engine.attach_evidence(phone, file).await);
    Ok(())
}

async fn cmd_reports(config: &Config, phone: Option<&str>, format: OutputFormat) -> Result<()> {
    debug!(?phone, %format, "cmd_reports: called");
    let manager = open_store(config)?;
    let reports = match phone {
        Some(phone) => manager.find_by_owner(&normalize_phone(phone)).await?,
        None => manager.list_reports().await?,
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Text => print_reports(&reports),
    }
    Ok(())
}

fn print_reports(reports: &[Report]) {
    if reports.is_empty() {
        println!("No reports.");
        return;
    }

    println!(
        "{:<6} {:<12} {:<16} {:<14} {:<13} {}",
        "ID", "PHONE", "CATEGORY", "SUBCATEGORY", "STATUS", "LOCATION"
    );
    for report in reports {
        println!(
            "{:<6} {:<12} {:<16} {:<14} {} {:<11} {}",
            report.id,
            report.phone_number,
            report.category,
            report.subcategory.as_deref().unwrap_or("-"),
            report.status.emoji(),
            report.status.as_str(),
            report.location
        );
    }
}

async fn cmd_set_status(config: &Config, id: i64, status: &str) -> Result<()> {
    debug!(id, %status, "cmd_set_status: called");
    let status: ReportStatus = status.parse().map_err(|e: String| eyre!(e))?;
    let manager = open_store(config)?;
    let updated = manager.update_status(id, status).await?;
    if updated == 0 {
        return Err(eyre!("Report {} not found", id));
    }
    info!(id, %status, "Report status updated");
    println!("{} Report {} is now {}", "✓".green(), id, status);
    Ok(())
}

async fn cmd_stats(config: &Config, format: OutputFormat) -> Result<()> {
    debug!(%format, "cmd_stats: called");
    let manager = open_store(config)?;
    let stats = manager.report_stats().await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Text => {
            println!("{} {}", "Total reports:".bright_cyan(), stats.total);
            println!();
            println!("{}", "By status:".bright_cyan());
            for (status, count) in &stats.by_status {
                println!("  {:<14} {}", status, count);
            }
            println!();
            println!("{}", "By category:".bright_cyan());
            for (category, count) in &stats.by_category {
                println!("  {:<16} {}", category, count);
            }
        }
    }
    Ok(())
}
