//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// TrustBridge - conversational issue reporting
#[derive(Parser)]
#[command(
    name = "tb",
    about = "Report issues with government services through a guided conversation",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive conversation; each line is one inbound message
    Chat {
        /// Sender identifier (phone number)
        #[arg(short, long)]
        phone: String,

        /// Keep sessions and reports in memory only
        #[arg(long)]
        ephemeral: bool,
    },

    /// Send a single message and print the reply
    Send {
        /// Sender identifier (phone number)
        #[arg(short, long)]
        phone: String,

        /// Message text
        text: String,
    },

    /// Upload a file as evidence for the sender's report in progress
    Attach {
        /// Sender identifier (phone number)
        #[arg(short, long)]
        phone: String,

        /// File to upload
        path: PathBuf,
    },

    /// List filed reports
    Reports {
        /// Only reports from this sender
        #[arg(short, long)]
        phone: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Change the review status of a report
    SetStatus {
        /// Report id
        id: i64,

        /// New status (pending, in_progress, resolved)
        status: String,
    },

    /// Report totals by status and category
    Stats {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("trustbridge")
        .join("logs")
        .join("trustbridge.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Output format for listing commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => {
                debug!(%s, "OutputFormat::from_str: unknown format");
                Err(format!("Unknown format: {}. Use: text or json", s))
            }
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_chat() {
        let cli = Cli::parse_from(["tb", "chat", "--phone", "254700000001"]);
        match cli.command {
            Command::Chat { phone, ephemeral } => {
                assert_eq!(phone, "254700000001");
                assert!(!ephemeral);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_chat_ephemeral() {
        let cli = Cli::parse_from(["tb", "chat", "-p", "1", "--ephemeral"]);
        assert!(matches!(cli.command, Command::Chat { ephemeral: true, .. }));
    }

    #[test]
    fn test_cli_parse_send() {
        let cli = Cli::parse_from(["tb", "send", "--phone", "1", "the road is broken"]);
        match cli.command {
            Command::Send { phone, text } => {
                assert_eq!(phone, "1");
                assert_eq!(text, "the road is broken");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_attach() {
        let cli = Cli::parse_from(["tb", "attach", "--phone", "1", "photo.jpg"]);
        assert!(matches!(cli.command, Command::Attach { ref path, .. } if path == &PathBuf::from("photo.jpg")));
    }

    #[test]
    fn test_cli_parse_reports() {
        let cli = Cli::parse_from(["tb", "reports"]);
        assert!(matches!(
            cli.command,
            Command::Reports {
                phone: None,
                format: OutputFormat::Text
            }
        ));

        let cli = Cli::parse_from(["tb", "reports", "--phone", "1", "--format", "json"]);
        assert!(matches!(cli.command, Command::Reports { phone: Some(_), format: OutputFormat::Json }));
    }

    #[test]
    fn test_cli_parse_set_status() {
        let cli = Cli::parse_from(["tb", "set-status", "7", "resolved"]);
        match cli.command {
            Command::SetStatus { id, status } => {
                assert_eq!(id, 7);
                assert_eq!(status, "resolved");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_global_flags() {
        let cli = Cli::parse_from(["tb", "stats", "-l", "debug", "-c", "/tmp/tb.yml"]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/tb.yml")));
        assert!(matches!(cli.command, Command::Stats { .. }));
    }

    #[test]
    fn test_cli_requires_phone_for_send() {
        assert!(Cli::try_parse_from(["tb", "send", "hello"]).is_err());
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("plain".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert!("table".parse::<OutputFormat>().is_err());
    }
}
