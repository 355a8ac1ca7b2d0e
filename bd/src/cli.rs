//! CLI command definitions and subcommands

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::debug;

use crate::domain::{GoalStatus, InteractionKind, MetricKind, PeriodType, Priority, ProspectStatus};
use crate::metrics::{BusinessMetric, MetricPeriod};

/// bizdesk - sales pipeline, goals and an AI manager
#[derive(Parser)]
#[command(
    name = "bd",
    about = "Sales pipeline, goal tracking and AI manager for small businesses",
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

    /// Act as this owner instead of the configured one
    #[arg(long, global = true)]
    pub owner: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the default pipeline stages if missing
    Init,

    /// Show the pipeline board with totals
    Board {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Manage pipeline stages
    Stage {
        #[command(subcommand)]
        command: StageCommand,
    },

    /// Manage prospects
    Prospect {
        #[command(subcommand)]
        command: ProspectCommand,
    },

    /// Manage goals
    Goal {
        #[command(subcommand)]
        command: GoalCommand,
    },

    /// Compute one business metric over a period
    Metric {
        /// Metric name (revenue, mrr, new_clients, tasks_completed, pending_tasks, pipeline_value)
        metric: BusinessMetric,

        /// Period (today, week, month, quarter, year)
        #[arg(short, long, default_value = "month")]
        period: MetricPeriod,
    },

    /// Talk to the AI manager; starts an interactive session without a message
    Chat {
        /// Message to send
        message: Vec<String>,

        /// Wait for the whole answer instead of streaming it
        #[arg(long)]
        no_stream: bool,
    },

    /// Ask the AI manager for today's briefing
    Briefing {
        /// Wait for the whole answer instead of streaming it
        #[arg(long)]
        no_stream: bool,
    },

    /// Export a metrics snapshot
    Export {
        /// Export format (json, csv)
        #[arg(short, long, default_value = "json")]
        format: ExportFormat,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Stage management subcommands
#[derive(Debug, Subcommand)]
pub enum StageCommand {
    /// List stages in board order
    List,

    /// Append a stage to the board
    Add {
        name: String,

        /// Hex color such as #3b82f6
        #[arg(long)]
        color: Option<String>,

        /// Win probability (0-100)
        #[arg(short, long, default_value = "0")]
        probability: u8,
    },

    /// Rename or recolor a stage
    Update {
        /// Stage ID (or partial match)
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        color: Option<String>,

        #[arg(short, long)]
        probability: Option<u8>,
    },

    /// Set the board order; every stage must be listed once
    Reorder {
        /// Stage IDs (or partial matches) in the new order
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Delete an empty stage
    Delete {
        /// Stage ID (or partial match)
        id: String,

        /// Confirm the deletion
        #[arg(short, long)]
        yes: bool,
    },
}

/// Prospect management subcommands
#[derive(Debug, Subcommand)]
pub enum ProspectCommand {
    /// List prospects
    List {
        /// Filter by status (open, won, lost)
        #[arg(short, long)]
        status: Option<ProspectStatus>,

        /// Filter by priority (low, medium, high)
        #[arg(long)]
        priority: Option<Priority>,

        /// Restrict to a stage (ID or partial match)
        #[arg(long)]
        stage: Option<String>,

        /// Match name, company or email
        #[arg(long)]
        search: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Add a prospect to a stage
    Add {
        name: String,

        /// Stage ID or partial match; defaults to the first stage
        #[arg(long)]
        stage: Option<String>,

        /// Expected deal value
        #[arg(short, long, default_value = "0")]
        value: f64,

        #[arg(long)]
        company: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long, default_value = "medium")]
        priority: Priority,

        /// Expected close date (YYYY-MM-DD)
        #[arg(long)]
        close_date: Option<NaiveDate>,

        #[arg(long)]
        source: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Tag, repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Edit prospect fields
    Update {
        /// Prospect ID (or partial match)
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(short, long)]
        value: Option<f64>,

        #[arg(long)]
        company: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        priority: Option<Priority>,

        #[arg(long)]
        close_date: Option<NaiveDate>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Move a prospect to a stage position
    Move {
        /// Prospect ID (or partial match)
        id: String,

        /// Target stage (ID or partial match)
        #[arg(long)]
        to: String,

        /// Position in the target stage; defaults to the end
        #[arg(short, long)]
        index: Option<usize>,
    },

    /// Delete a prospect and its history
    Delete {
        /// Prospect ID (or partial match)
        id: String,

        #[arg(short, long)]
        yes: bool,
    },

    /// Mark a prospect as won
    Won {
        /// Prospect ID (or partial match)
        id: String,
    },

    /// Mark a prospect as lost
    Lost {
        /// Prospect ID (or partial match)
        id: String,

        #[arg(short, long)]
        reason: Option<String>,

        #[arg(short, long)]
        yes: bool,
    },

    /// Turn a prospect into a client
    Convert {
        /// Prospect ID (or partial match)
        id: String,

        #[arg(short, long)]
        yes: bool,
    },

    /// Record an interaction with a prospect
    Log {
        /// Prospect ID (or partial match)
        id: String,

        /// Kind (call, email, meeting, message, proposal, note)
        #[arg(short, long, default_value = "note")]
        kind: InteractionKind,

        title: String,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// Show a prospect's interaction history, newest first
    History {
        /// Prospect ID (or partial match)
        id: String,
    },
}

/// Goal management subcommands
#[derive(Debug, Subcommand)]
pub enum GoalCommand {
    /// List goals
    List {
        /// Filter by status (draft, active, completed, expired)
        #[arg(short, long)]
        status: Option<GoalStatus>,
    },

    /// Draft a goal
    Create {
        /// Period (weekly, biweekly, monthly, quarterly, custom)
        #[arg(short, long, default_value = "monthly")]
        period: PeriodType,

        /// Start date (YYYY-MM-DD); required for custom periods
        #[arg(long)]
        start: Option<NaiveDate>,

        /// End date (YYYY-MM-DD); required for custom periods
        #[arg(long)]
        end: Option<NaiveDate>,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(long, default_value = "0")]
        mrr: f64,

        #[arg(long, default_value = "0")]
        new_clients: f64,

        #[arg(long, default_value = "0")]
        tasks: f64,

        #[arg(long, default_value = "0")]
        projects: f64,
    },

    /// Activate a draft goal
    Confirm {
        /// Goal ID (or partial match)
        id: String,
    },

    /// Set a metric's current value
    Record {
        /// Goal ID (or partial match)
        id: String,

        /// Metric (mrr, new_clients, tasks_completed, projects_delivered)
        metric: MetricKind,

        value: f64,
    },

    /// Complete an active goal
    Complete {
        /// Goal ID (or partial match)
        id: String,
    },

    /// Show progress; all active goals without an ID
    Progress {
        /// Goal ID (or partial match)
        id: Option<String>,

        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Expire goals whose end date has passed
    Expire,
}

/// Output format for listing commands
#[derive(Clone, Debug, Default, PartialEq)]
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
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
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

/// Serialization for `bd export`
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "ExportFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(format!("Unknown export format: {}. Use: json or csv", s)),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["bd"]);
        assert!(cli.command.is_none());
        assert!(cli.owner.is_none());
    }

    #[test]
    fn test_cli_parse_global_flags() {
        let cli = Cli::parse_from(["bd", "board", "-l", "debug", "--owner", "ana"]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.owner.as_deref(), Some("ana"));
        assert!(matches!(
            cli.command,
            Some(Command::Board {
                format: OutputFormat::Text
            })
        ));
    }

    #[test]
    fn test_cli_parse_prospect_add() {
        let cli = Cli::parse_from([
            "bd", "prospect", "add", "Acme", "--value", "1500", "--priority", "high", "--tag", "inbound", "--tag", "b2b",
        ]);
        match cli.command {
            Some(Command::Prospect {
                command:
                    ProspectCommand::Add {
                        name,
                        stage,
                        value,
                        priority,
                        tags,
                        ..
                    },
            }) => {
                assert_eq!(name, "Acme");
                assert!(stage.is_none());
                assert_eq!(value, 1500.0);
                assert_eq!(priority, Priority::High);
                assert_eq!(tags, vec!["inbound", "b2b"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_prospect_move() {
        let cli = Cli::parse_from(["bd", "prospect", "move", "abc", "--to", "proposta", "-i", "2"]);
        assert!(matches!(
            cli.command,
            Some(Command::Prospect {
                command: ProspectCommand::Move { index: Some(2), .. }
            })
        ));
    }

    #[test]
    fn test_cli_parse_lost_requires_nothing_but_id() {
        let cli = Cli::parse_from(["bd", "prospect", "lost", "abc", "-r", "sem verba"]);
        match cli.command {
            Some(Command::Prospect {
                command: ProspectCommand::Lost { id, reason, yes },
            }) => {
                assert_eq!(id, "abc");
                assert_eq!(reason.as_deref(), Some("sem verba"));
                assert!(!yes);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_goal_create() {
        let cli = Cli::parse_from([
            "bd",
            "goal",
            "create",
            "--period",
            "custom",
            "--start",
            "2024-01-01",
            "--end",
            "2024-01-15",
            "--mrr",
            "2000",
        ]);
        match cli.command {
            Some(Command::Goal {
                command:
                    GoalCommand::Create {
                        period,
                        start,
                        end,
                        mrr,
                        tasks,
                        ..
                    },
            }) => {
                assert_eq!(period, PeriodType::Custom);
                assert_eq!(start, NaiveDate::from_ymd_opt(2024, 1, 1));
                assert_eq!(end, NaiveDate::from_ymd_opt(2024, 1, 15));
                assert_eq!(mrr, 2000.0);
                assert_eq!(tasks, 0.0);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_goal_record() {
        let cli = Cli::parse_from(["bd", "goal", "record", "g1", "new_clients", "3"]);
        assert!(matches!(
            cli.command,
            Some(Command::Goal {
                command: GoalCommand::Record {
                    metric: MetricKind::NewClients,
                    ..
                }
            })
        ));
    }

    #[test]
    fn test_cli_parse_chat_message() {
        let cli = Cli::parse_from(["bd", "chat", "como", "estão", "as", "vendas?"]);
        match cli.command {
            Some(Command::Chat { message, no_stream }) => {
                assert_eq!(message.join(" "), "como estão as vendas?");
                assert!(!no_stream);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_export_csv() {
        let cli = Cli::parse_from(["bd", "export", "-f", "csv", "-o", "out.csv"]);
        match cli.command {
            Some(Command::Export { format, output }) => {
                assert_eq!(format, ExportFormat::Csv);
                assert_eq!(output, Some(PathBuf::from("out.csv")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["bd", "export", "-f", "xml"]).is_err());
        assert!(Cli::try_parse_from(["bd", "stage", "reorder"]).is_err());
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("plain".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("table".parse::<OutputFormat>().is_err());
        assert_eq!(ExportFormat::Csv.to_string(), "csv");
    }
}
