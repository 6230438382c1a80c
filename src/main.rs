use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use std::fs;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use task_time_tracker::cli::{Cli, Commands, ConfigAction};
use task_time_tracker::config::{self, EffectiveConfig};
use task_time_tracker::db::Database;
use task_time_tracker::models::{SearchCriteria, SortOrder, TaskSession, TimeEntryWithTask};
use task_time_tracker::report::{self, ReportingService};
use task_time_tracker::search::{self, SearchService};
use task_time_tracker::tasks::TaskService;
use task_time_tracker::time;
use task_time_tracker::Error;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            exit_code(&err)
        }
    }
}

/// Validation and not-found failures get their own exit codes
fn exit_code(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<Error>() {
        Some(e) if e.is_validation() => ExitCode::from(2),
        Some(e) if e.is_not_found() => ExitCode::from(3),
        _ => ExitCode::FAILURE,
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Edit => cmd_config_edit(),
            ConfigAction::Show => cmd_config_show(),
        },
        command => {
            let config = EffectiveConfig::load()?;
            tracing::debug!(?config, "loaded configuration");
            let db = Database::open(&config.database_path).with_context(|| {
                format!("Failed to open database: {}", config.database_path.display())
            })?;
            run_with_db(command, &db, &config)
        }
    }
}

fn run_with_db(command: Commands, db: &Database, config: &EffectiveConfig) -> Result<()> {
    match command {
        Commands::Start { name } => cmd_start(db, config, &name),
        Commands::Stop => cmd_stop(db, config),
        Commands::Current => cmd_current(db, config),
        Commands::List { range } => cmd_list(db, config, range.as_deref()),
        Commands::Output {
            format,
            range,
            output,
        } => cmd_output(db, config, &format, range.as_deref(), output),
        Commands::Resume { id } => cmd_resume(db, config, id),
        Commands::Summary { id } => cmd_summary(db, config, id),
        Commands::Delete { id } => cmd_delete(db, config, id),
        Commands::Dashboard { range } => cmd_dashboard(db, config, range.as_deref()),
        Commands::Today { date } => cmd_today(db, config, date.as_deref()),
        Commands::Search {
            text,
            range,
            task,
            running,
            sort,
        } => cmd_search(db, config, text, range.as_deref(), task, running, &sort),
        Commands::Config { .. } => Ok(()),
    }
}

fn cmd_start(db: &Database, config: &EffectiveConfig, name: &str) -> Result<()> {
    let tasks = TaskService::new(db, config.validator()?);
    let session = tasks.start_new_task(name)?;
    println!("Started: {} (task #{})", session.task.name, session.task.id);
    Ok(())
}

fn cmd_stop(db: &Database, config: &EffectiveConfig) -> Result<()> {
    let tasks = TaskService::new(db, config.validator()?);
    let stopped = tasks.stop_current()?;

    if stopped.is_empty() {
        println!("No running session.");
        return Ok(());
    }

    for session in stopped {
        println!("Stopped: {} ({})", session.task.name, session.duration);
        if tasks.check_session(&session).is_err() {
            println!(
                "  note: longer than the {}h session limit",
                config.max_session_hours
            );
        }
    }
    Ok(())
}

fn cmd_current(db: &Database, config: &EffectiveConfig) -> Result<()> {
    let tasks = TaskService::new(db, config.validator()?);

    match tasks.get_current_session()? {
        Some(session) => print_session(&session),
        None => println!("No running session."),
    }
    Ok(())
}

fn cmd_list(db: &Database, config: &EffectiveConfig, range: Option<&str>) -> Result<()> {
    let entries = collect_entries(db, config, range)?;

    if entries.is_empty() {
        println!("No time entries.");
        return Ok(());
    }

    for item in entries {
        print_entry(&item);
    }
    Ok(())
}

fn cmd_output(
    db: &Database,
    config: &EffectiveConfig,
    format: &str,
    range: Option<&str>,
    output: Option<String>,
) -> Result<()> {
    let entries = collect_entries(db, config, range)?;

    let content = match format {
        "json" => report::json::generate(&entries)?,
        "csv" => report::csv::generate_string(&entries)?,
        "md" | "markdown" => report::markdown::generate(&entries),
        other => anyhow::bail!(Error::invalid_input(format!(
            "unknown format '{}', expected json, csv or md",
            other
        ))),
    };

    if let Some(path) = output {
        fs::write(&path, &content)
            .with_context(|| format!("Failed to write output to {}", path))?;
        eprintln!("Output written to: {}", path);
    } else {
        println!("{}", content);
    }
    Ok(())
}

fn cmd_resume(db: &Database, config: &EffectiveConfig, id: i64) -> Result<()> {
    let tasks = TaskService::new(db, config.validator()?);
    let session = tasks.resume_task(id)?;
    println!("Resumed: {} (task #{})", session.task.name, session.task.id);
    Ok(())
}

fn cmd_summary(db: &Database, config: &EffectiveConfig, id: i64) -> Result<()> {
    let reporting = ReportingService::new(db, config.validator()?);
    let summary = reporting.get_task_summary(id)?;
    let analysis = report::analyze_task_activity(&summary.entries);

    println!("Task #{}: {}\n", summary.task.id, summary.task.name);
    println!("  Total:     {}", summary.total_time);
    println!(
        "  Sessions:  {} ({} running)",
        summary.session_count, summary.running_count
    );
    if let (Some(first), Some(last)) = (summary.first_entry, summary.last_entry) {
        println!("  First:     {}", first.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
        println!("  Last:      {}", last.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
    }
    if analysis.session_count > 0 {
        println!("  Average:   {}", time::format_duration(analysis.average_duration));
        println!("  Longest:   {}", time::format_duration(analysis.longest_session));
        println!("  Shortest:  {}", time::format_duration(analysis.shortest_session));
        let hours: Vec<String> = analysis
            .productive_hours
            .iter()
            .map(|h| format!("{:02}h", h))
            .collect();
        println!("  Hours:     {}", hours.join(", "));
    }
    Ok(())
}

fn cmd_delete(db: &Database, config: &EffectiveConfig, id: i64) -> Result<()> {
    let tasks = TaskService::new(db, config.validator()?);
    let removed = tasks.delete_task_with_entries(id)?;
    println!("Deleted task #{} and {} entries.", id, removed);
    Ok(())
}

fn cmd_dashboard(db: &Database, config: &EffectiveConfig, range: Option<&str>) -> Result<()> {
    let reporting =
        ReportingService::new(db, config.validator()?).with_recent_limit(config.recent_limit);
    let range = range.unwrap_or(&config.default_range);
    let dashboard = reporting.get_dashboard_data(range)?;

    match dashboard.current_session {
        Some(ref session) => print_session(session),
        None => println!("No running session."),
    }

    println!("\nRecent tasks ({}):", range);
    if dashboard.recent_tasks.is_empty() {
        println!("  none");
    }
    for activity in &dashboard.recent_tasks {
        let marker = if activity.is_running { "*" } else { " " };
        println!(
            " {} #{:<4} {:<30} {:>10}  {} sessions",
            marker,
            activity.task.id,
            activity.task.name,
            activity.total_time,
            activity.session_count
        );
    }

    let today = &dashboard.today;
    println!(
        "\nToday: {} across {} tasks ({} sessions, {} completed)",
        today.total_time, today.task_count, today.session_count, today.completed_count
    );
    Ok(())
}

fn cmd_today(db: &Database, config: &EffectiveConfig, date: Option<&str>) -> Result<()> {
    let reporting = ReportingService::new(db, config.validator()?);

    let date = match date {
        Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d").map_err(|_| {
            Error::invalid_input(format!("Invalid date: {}. Expected YYYY-MM-DD", d))
        })?,
        None => Local::now().date_naive(),
    };
    let stats = reporting.get_day_statistics(date)?;

    println!("{}", date);
    println!("  Total:      {}", stats.total_time);
    println!("  Tasks:      {}", stats.task_count);
    println!("  Sessions:   {}", stats.session_count);
    println!("  Completed:  {}", stats.completed_count);
    Ok(())
}

fn cmd_search(
    db: &Database,
    config: &EffectiveConfig,
    text: Option<String>,
    range: Option<&str>,
    task: Option<i64>,
    running: bool,
    sort: &str,
) -> Result<()> {
    let order = SortOrder::from_str(sort).ok_or_else(|| {
        Error::invalid_input(format!(
            "unknown sort '{}', expected recent, oldest, name or duration",
            sort
        ))
    })?;

    let criteria = SearchCriteria {
        time_range: range.map(time::parse_time_range).transpose()?,
        text_filter: text,
        task_id: task,
        running_only: running,
    };

    let searcher = SearchService::new(db, config.validator()?);
    let mut found = searcher.search_tasks(&criteria)?;
    search::sort_tasks(&mut found, order);

    if found.is_empty() {
        println!("No matching tasks.");
        return Ok(());
    }

    for activity in found {
        let marker = if activity.is_running { "*" } else { " " };
        println!(
            " {} #{:<4} {:<30} {:>10}  {} sessions, last {}",
            marker,
            activity.task.id,
            activity.task.name,
            activity.total_time,
            activity.session_count,
            activity
                .last_worked
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

/// Entries in `range`, or every entry when no range is given
fn collect_entries(
    db: &Database,
    config: &EffectiveConfig,
    range: Option<&str>,
) -> Result<Vec<TimeEntryWithTask>> {
    let criteria = match range {
        Some(r) => SearchCriteria::in_range(time::parse_time_range(r)?),
        None => SearchCriteria::default(),
    };

    let searcher = SearchService::new(db, config.validator()?);
    Ok(searcher.search_time_entries(&criteria)?)
}

fn print_session(session: &TaskSession) {
    println!("Task:     {} (#{})", session.task.name, session.task.id);
    println!(
        "Started:  {}",
        session
            .entry
            .start_time
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
    );
    println!("Duration: {}", session.duration);
}

fn print_entry(item: &TimeEntryWithTask) {
    let end = item
        .entry
        .end_time
        .map(|t| t.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_else(|| "...".to_string());

    println!(
        "#{:<5} {} - {:<5}  {:<30} {}",
        item.entry.id,
        item.entry.start_time.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        end,
        item.task_name,
        item.duration
    );
}

fn cmd_config_init() -> Result<()> {
    let path = config::init_global_config()?;
    println!("Configuration initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_edit() -> Result<()> {
    let path = config::global_config_path()?;

    if !path.exists() {
        config::init_global_config()?;
    }

    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vim".to_string());

    std::process::Command::new(&editor)
        .arg(&path)
        .status()
        .with_context(|| format!("Failed to open editor: {}", editor))?;

    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = config::load_global_config()?;
    let toml = toml::to_string_pretty(&config)?;
    println!("{}", toml);
    Ok(())
}
