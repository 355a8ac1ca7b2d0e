//! bizdesk - sales pipeline, goals and AI manager
//!
//! CLI entry point. Every command opens the owner's store, does its work and
//! exits; the AI chat is the only long-running session.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result, bail};
use serde_json::json;
use tracing::{debug, info};

use bizdesk::assistant::{Assistant, AssistantAction};
use bizdesk::cli::{Cli, Command, ExportFormat, GoalCommand, OutputFormat, ProspectCommand, StageCommand};
use bizdesk::config::Config;
use bizdesk::domain::{
    IdResolver, MetricValues, NewInteraction, NewProspect, ProspectPatch, ProspectQuery, StagePatch, newest_first,
};
use bizdesk::export::MetricsSnapshot;
use bizdesk::goals::{GoalRemote, GoalTracker, NewGoal, period_bounds};
use bizdesk::llm::{Message, create_client};
use bizdesk::metrics::compute_metric;
use bizdesk::pipeline::PipelineBoard;
use bizdesk::progress::GoalProgress;
use bizdesk::prompts::PromptLoader;
use bizdesk::repl::{self, ChatSession};
use bizdesk::state::StateManager;

type Board = PipelineBoard<StateManager>;

fn setup_logging(log_dir: &Path, cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    fs::create_dir_all(log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
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

    let log_file = fs::File::create(log_dir.join("bizdesk.log")).context("Failed to create log file")?;

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

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    setup_logging(
        &config.storage.log_dir(),
        cli.log_level.as_deref(),
        config.log_level.as_deref(),
    )
    .context("Failed to setup logging")?;

    let owner = cli.owner.clone().unwrap_or_else(|| config.resolved_owner_id());
    let store_path = config.storage.data_dir.join("store");
    info!(%owner, store = %store_path.display(), "bizdesk starting");

    let Some(command) = cli.command else {
        println!("Nothing to do. Try {} for the available commands.", "bd --help".yellow());
        return Ok(());
    };

    let state = StateManager::spawn(&store_path, &owner).context("Failed to open store")?;
    let today = chrono::Local::now().date_naive();

    let result = dispatch(&config, &state, command, today).await;
    state.shutdown().await;
    result
}

async fn dispatch(config: &Config, state: &StateManager, command: Command, today: NaiveDate) -> Result<()> {
    debug!(?command, "dispatch: called");
    match command {
        Command::Init => cmd_init(config, state).await,
        Command::Board { format } => cmd_board(config, state, format).await,
        Command::Stage { command } => cmd_stage(config, state, command).await,
        Command::Prospect { command } => cmd_prospect(config, state, command).await,
        Command::Goal { command } => cmd_goal(state, command, today).await,
        Command::Metric { metric, period } => {
            let value = compute_metric(state, metric, period, today).await?;
            println!("{} ({}): {}", metric.to_string().bold(), period, format_number(value));
            Ok(())
        }
        Command::Chat { message, no_stream } => {
            let stream = config.assistant.stream && !no_stream;
            let assistant = build_assistant(config, state)?;
            if message.is_empty() {
                ChatSession::new(assistant, state.owner_id(), stream).run(None).await
            } else {
                let history = vec![Message::user(message.join(" "))];
                repl::ask(&assistant, history, AssistantAction::Chat, today, stream).await?;
                Ok(())
            }
        }
        Command::Briefing { no_stream } => {
            let stream = config.assistant.stream && !no_stream;
            let assistant = build_assistant(config, state)?;
            repl::ask(&assistant, Vec::new(), AssistantAction::DailyBriefing, today, stream).await?;
            Ok(())
        }
        Command::Export { format, output } => cmd_export(state, format, output.as_deref(), today).await,
    }
}

// === Helpers ===

fn build_assistant(config: &Config, state: &StateManager) -> Result<Assistant> {
    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    let prompts = PromptLoader::new(config.assistant.prompts_dir.as_deref());
    Ok(Assistant::new(llm, state.clone())
        .with_prompts(prompts)
        .with_max_tokens(config.assistant.max_tokens))
}

/// Load the owner's board, creating the default stages for an empty pipeline
async fn open_board(config: &Config, state: &StateManager, query: ProspectQuery) -> Result<Board> {
    let board = PipelineBoard::new(Arc::new(state.clone()), state.owner_id())
        .with_templates(config.pipeline.default_stages.clone());
    board.load(query).await?;
    if board.snapshot().await.stages.is_empty() {
        let created = board.ensure_default_stages().await?;
        info!(created, "Bootstrapped default stages");
    }
    Ok(board)
}

/// Resolve a partial ID typed by the user
fn resolve(what: &str, ids: &HashMap<String, String>, reference: &str) -> Result<String> {
    match IdResolver::new(ids).resolve(reference) {
        Ok(Some(id)) => Ok(id),
        Ok(None) => bail!("No {} matches '{}'", what, reference),
        Err(candidates) => bail!("'{}' matches several {}s: {}", reference, what, candidates.join(", ")),
    }
}

async fn resolve_stage(board: &Board, reference: &str) -> Result<String> {
    let ids = board
        .snapshot()
        .await
        .stages
        .into_iter()
        .map(|s| (s.id, s.name))
        .collect();
    resolve("stage", &ids, reference)
}

async fn resolve_prospect(board: &Board, reference: &str) -> Result<String> {
    let ids = board
        .snapshot()
        .await
        .prospects
        .into_iter()
        .map(|p| (p.id, p.name))
        .collect();
    resolve("prospect", &ids, reference)
}

fn require_yes(yes: bool, action: &str) -> Result<()> {
    if !yes {
        bail!("Refusing to {} without --yes", action);
    }
    Ok(())
}

fn format_money(value: f64) -> String {
    format!("R$ {:.2}", value)
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

// === Commands ===

async fn cmd_init(config: &Config, state: &StateManager) -> Result<()> {
    debug!("cmd_init: called");
    let board = PipelineBoard::new(Arc::new(state.clone()), state.owner_id())
        .with_templates(config.pipeline.default_stages.clone());
    let created = board.ensure_default_stages().await?;
    if created == 0 {
        println!("Pipeline already has the default stages");
    } else {
        println!("{} Created {} default stage(s)", "✓".green(), created);
    }
    Ok(())
}

async fn cmd_board(config: &Config, state: &StateManager, format: OutputFormat) -> Result<()> {
    debug!(%format, "cmd_board: called");
    let board = open_board(config, state, ProspectQuery::default()).await?;
    let snapshot = board.snapshot().await;
    let metrics = board.metrics().await;

    if format == OutputFormat::Json {
        let out = json!({
            "stages": snapshot.stages,
            "prospects": snapshot.prospects,
            "metrics": metrics,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    for stage in &snapshot.stages {
        println!(
            "{} {} {}",
            stage.name.bold(),
            format!("({}%)", stage.probability).dimmed(),
            format!("{} · {}", stage.prospect_count, format_money(stage.total_value)).dimmed()
        );
        for prospect in snapshot.bucket(&stage.id) {
            let company = prospect.company.as_deref().map(|c| format!(" - {}", c)).unwrap_or_default();
            println!(
                "  {:<24} {:<8} {}{}",
                prospect.name,
                prospect.priority.to_string(),
                format_money(prospect.expected_value),
                company.dimmed()
            );
        }
    }

    println!();
    println!(
        "Open: {} ({})  Weighted: {}  Won: {} ({})  Conversion: {:.1}%",
        metrics.open_prospects,
        format_money(metrics.open_value),
        format_money(metrics.weighted_value),
        metrics.won_prospects,
        format_money(metrics.won_value),
        metrics.conversion_rate
    );
    Ok(())
}

async fn cmd_stage(config: &Config, state: &StateManager, command: StageCommand) -> Result<()> {
    debug!(?command, "cmd_stage: called");
    let board = open_board(config, state, ProspectQuery::default()).await?;

    match command {
        StageCommand::List => {
            println!("{:<36} {:<20} {:>5} {:>6}", "ID", "NAME", "PROB", "COUNT");
            println!("{}", "-".repeat(70));
            for stage in board.snapshot().await.stages {
                let mut name = stage.name.clone();
                if stage.is_win_stage {
                    name.push_str(" (win)");
                } else if stage.is_loss_stage {
                    name.push_str(" (loss)");
                }
                println!(
                    "{:<36} {:<20} {:>4}% {:>6}",
                    stage.id, name, stage.probability, stage.prospect_count
                );
            }
        }
        StageCommand::Add {
            name,
            color,
            probability,
        } => {
            let stage = board.create_stage(&name, color.as_deref(), probability).await?;
            println!("{} Created stage '{}' ({})", "✓".green(), stage.name, stage.id);
        }
        StageCommand::Update {
            id,
            name,
            color,
            probability,
        } => {
            let id = resolve_stage(&board, &id).await?;
            board
                .update_stage(
                    &id,
                    StagePatch {
                        name,
                        color,
                        probability,
                    },
                )
                .await?;
            println!("{} Updated stage {}", "✓".green(), id);
        }
        StageCommand::Reorder { ids } => {
            let mut ordered = Vec::with_capacity(ids.len());
            for reference in &ids {
                ordered.push(resolve_stage(&board, reference).await?);
            }
            board.reorder_stages(ordered).await?;
            println!("{} Stages reordered", "✓".green());
        }
        StageCommand::Delete { id, yes } => {
            let id = resolve_stage(&board, &id).await?;
            require_yes(yes, "delete a stage")?;
            board.delete_stage(&id).await?;
            println!("{} Deleted stage {}", "✓".green(), id);
        }
    }
    Ok(())
}

async fn cmd_prospect(config: &Config, state: &StateManager, command: ProspectCommand) -> Result<()> {
    debug!(?command, "cmd_prospect: called");
    let board = open_board(config, state, ProspectQuery::default()).await?;

    match command {
        ProspectCommand::List {
            status,
            priority,
            stage,
            search,
            format,
        } => {
            let stage_ids = match stage {
                Some(reference) => vec![resolve_stage(&board, &reference).await?],
                None => Vec::new(),
            };
            board
                .load(ProspectQuery {
                    status,
                    priority,
                    search,
                    stage_ids,
                    ..Default::default()
                })
                .await?;
            let snapshot = board.snapshot().await;

            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&snapshot.prospects)?);
                return Ok(());
            }
            if snapshot.prospects.is_empty() {
                println!("No prospects found");
                return Ok(());
            }
            println!("{:<36} {:<24} {:<16} {:<6} {:>14}", "ID", "NAME", "STAGE", "STATUS", "VALUE");
            println!("{}", "-".repeat(100));
            for stage in &snapshot.stages {
                for p in snapshot.bucket(&stage.id) {
                    println!(
                        "{:<36} {:<24} {:<16} {:<6} {:>14}",
                        p.id,
                        p.name,
                        stage.name,
                        p.status.to_string(),
                        format_money(p.expected_value)
                    );
                }
            }
        }
        ProspectCommand::Add {
            name,
            stage,
            value,
            company,
            email,
            phone,
            priority,
            close_date,
            source,
            notes,
            tags,
        } => {
            let stage_id = match stage {
                Some(reference) => resolve_stage(&board, &reference).await?,
                None => match board.snapshot().await.stages.first() {
                    Some(first) => first.id.clone(),
                    None => bail!("The pipeline has no stages; run `bd init` first"),
                },
            };
            let mut input = NewProspect::new(stage_id, name, value);
            input.company = company;
            input.email = email;
            input.phone = phone;
            input.priority = priority;
            input.expected_close_date = close_date;
            input.source = source;
            input.notes = notes;
            input.tags = tags;

            let prospect = board.create_prospect(input).await?;
            println!("{} Created prospect '{}' ({})", "✓".green(), prospect.name, prospect.id);
        }
        ProspectCommand::Update {
            id,
            name,
            value,
            company,
            email,
            phone,
            priority,
            close_date,
            notes,
        } => {
            let id = resolve_prospect(&board, &id).await?;
            let patch = ProspectPatch {
                name,
                expected_value: value,
                company,
                email,
                phone,
                priority,
                expected_close_date: close_date,
                notes,
                ..Default::default()
            };
            let prospect = board.update_prospect(&id, patch).await?;
            println!("{} Updated prospect '{}'", "✓".green(), prospect.name);
        }
        ProspectCommand::Move { id, to, index } => {
            let id = resolve_prospect(&board, &id).await?;
            let to_stage = resolve_stage(&board, &to).await?;
            let Some(from_stage) = board.snapshot().await.prospect(&id).map(|p| p.stage_id.clone()) else {
                bail!("Prospect {} is not on the board", id);
            };
            // Positions past the end are clamped to it
            let moved = board
                .move_prospect(&id, &from_stage, &to_stage, index.unwrap_or(usize::MAX))
                .await?;
            if moved {
                println!("{} Moved prospect {}", "✓".green(), id);
            } else {
                println!("Prospect is already there");
            }
        }
        ProspectCommand::Delete { id, yes } => {
            let id = resolve_prospect(&board, &id).await?;
            require_yes(yes, "delete a prospect")?;
            board.delete_prospect(&id).await?;
            println!("{} Deleted prospect {}", "✓".green(), id);
        }
        ProspectCommand::Won { id } => {
            let id = resolve_prospect(&board, &id).await?;
            board.mark_won(&id).await?;
            println!("{} Prospect {} marked as won", "✓".green(), id);
        }
        ProspectCommand::Lost { id, reason, yes } => {
            let id = resolve_prospect(&board, &id).await?;
            require_yes(yes, "mark a prospect as lost")?;
            board.mark_lost(&id, reason.as_deref()).await?;
            println!("{} Prospect {} marked as lost", "✓".green(), id);
        }
        ProspectCommand::Convert { id, yes } => {
            let id = resolve_prospect(&board, &id).await?;
            require_yes(yes, "convert a prospect")?;
            let client = board.convert_to_client(&id).await?;
            println!(
                "{} Converted to client '{}' ({}, MRR {})",
                "✓".green(),
                client.name,
                client.id,
                format_money(client.mrr)
            );
        }
        ProspectCommand::Log {
            id,
            kind,
            title,
            description,
        } => {
            let id = resolve_prospect(&board, &id).await?;
            let mut input = NewInteraction::new(&id, kind, title);
            input.description = description;
            let interaction = board.log_interaction(input).await?;
            println!("{} Logged {} '{}'", "✓".green(), interaction.kind, interaction.title);
        }
        ProspectCommand::History { id } => {
            let id = resolve_prospect(&board, &id).await?;
            let mut interactions = board.interactions(&id).await?;
            newest_first(&mut interactions);
            if interactions.is_empty() {
                println!("No interactions recorded");
            }
            for i in interactions {
                let when = chrono::DateTime::from_timestamp_millis(i.created_at)
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!("{} {:<12} {}", when.dimmed(), i.kind.to_string(), i.title);
                if let Some(description) = i.description {
                    println!("{:>30}{}", "", description.dimmed());
                }
            }
        }
    }
    Ok(())
}

async fn cmd_goal(state: &StateManager, command: GoalCommand, today: NaiveDate) -> Result<()> {
    debug!(?command, "cmd_goal: called");
    let tracker = GoalTracker::new(Arc::new(state.clone()), state.owner_id());

    match command {
        GoalCommand::List { status } => {
            let goals = tracker.list(status).await?;
            if goals.is_empty() {
                println!("No goals found");
                return Ok(());
            }
            println!("{:<36} {:<28} {:<10} {:<23}", "ID", "TITLE", "STATUS", "PERIOD");
            println!("{}", "-".repeat(100));
            for goal in goals {
                println!(
                    "{:<36} {:<28} {:<10} {} → {}",
                    goal.id,
                    goal.title,
                    goal.status.to_string(),
                    goal.start_date, goal.end_date
                );
            }
        }
        GoalCommand::Create {
            period,
            start,
            end,
            title,
            mrr,
            new_clients,
            tasks,
            projects,
        } => {
            let (start_date, end_date) = match (start, end) {
                (Some(start), Some(end)) => (start, end),
                (start, end) => {
                    let Some((default_start, default_end)) = period_bounds(period, today) else {
                        bail!("A {} goal needs --start and --end", period);
                    };
                    (start.unwrap_or(default_start), end.unwrap_or(default_end))
                }
            };
            let goal = tracker
                .create_draft(NewGoal {
                    period_type: period,
                    start_date,
                    end_date,
                    title,
                    target: MetricValues {
                        mrr,
                        new_clients,
                        tasks_completed: tasks,
                        projects_delivered: projects,
                    },
                    ai_suggested: None,
                })
                .await?;
            println!("{} Drafted goal '{}' ({})", "✓".green(), goal.title, goal.id);
            println!("Run {} to activate it", format!("bd goal confirm {}", goal.id).yellow());
        }
        GoalCommand::Confirm { id } => {
            let goal = tracker.confirm(&resolve_goal(state, &id).await?).await?;
            println!("{} Goal '{}' is active", "✓".green(), goal.title);
        }
        GoalCommand::Record { id, metric, value } => {
            let goal = tracker.record_metric(&resolve_goal(state, &id).await?, metric, value).await?;
            println!("{} {} = {} on '{}' ({})", "✓".green(), metric, format_number(value), goal.title, goal.status);
        }
        GoalCommand::Complete { id } => {
            let goal = tracker.complete(&resolve_goal(state, &id).await?).await?;
            println!("{} Goal '{}' completed", "✓".green(), goal.title);
        }
        GoalCommand::Progress { id, format } => {
            let progress = match id {
                Some(reference) => vec![tracker.progress(&resolve_goal(state, &reference).await?, today).await?],
                None => tracker.active_progress(today).await?,
            };
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&progress)?);
            } else if progress.is_empty() {
                println!("No active goals");
            } else {
                progress.iter().for_each(print_progress);
            }
        }
        GoalCommand::Expire => {
            let expired = state.expire_overdue(today).await?;
            println!("{} Expired {} goal(s)", "✓".green(), expired);
        }
    }
    Ok(())
}

async fn resolve_goal(state: &StateManager, reference: &str) -> Result<String> {
    let ids = state
        .fetch_goals(None)
        .await?
        .into_iter()
        .map(|g| (g.id, g.title))
        .collect();
    resolve("goal", &ids, reference)
}

fn print_progress(progress: &GoalProgress) {
    println!(
        "{}  {}% {}",
        progress.title.bold(),
        progress.overall,
        format!(
            "(expected {}%, day {}/{}, {} left)",
            progress.expected, progress.days.current_day, progress.days.total_days, progress.days.days_remaining
        )
        .dimmed()
    );
    for metric in &progress.metrics {
        println!(
            "  {:<20} {:>10} / {:<10} {:>5.1}%  {}",
            metric.kind.to_string(),
            format_number(metric.current),
            format_number(metric.target),
            metric.progress,
            metric.status
        );
    }
}

async fn cmd_export(state: &StateManager, format: ExportFormat, output: Option<&Path>, today: NaiveDate) -> Result<()> {
    debug!(%format, ?output, "cmd_export: called");
    let snapshot = MetricsSnapshot::collect(state, today).await?;
    let body = match format {
        ExportFormat::Json => snapshot.to_json()?,
        ExportFormat::Csv => snapshot.to_csv(),
    };

    match output {
        Some(path) => {
            fs::write(path, &body).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} Exported {} snapshot to {}", "✓".green(), format, path.display());
        }
        None => println!("{}", body.trim_end()),
    }
    Ok(())
}
