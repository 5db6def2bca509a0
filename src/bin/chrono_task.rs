//! Headless CLI for chrono-task.

use std::path::PathBuf;

use anyhow::Context;
use chrono::TimeDelta;
use chrono_task::{App, Backends, Settings, chrono_dirs, logging};
use clap::{Parser, Subcommand};
use tracing::info;

/// Personal task and time tracker.
#[derive(Parser)]
#[command(name = "chrono-task", version, about)]
struct Cli {
    /// Path to the TOML settings file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the tracker until Ctrl+C, timing a task if one is given.
    Run {
        /// Description of the task to time.
        #[arg(short, long)]
        task: Option<String>,
    },

    /// Add a task.
    Add {
        description: String,

        /// Issue tracker URL to link.
        #[arg(long)]
        url: Option<String>,
    },

    /// List tasks with today's and the last 30 days' time.
    List {
        /// Only tasks matching this text.
        #[arg(short, long)]
        filter: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .unwrap_or_else(Settings::default_config_path);

    match cli.command.unwrap_or(Command::Run { task: None }) {
        Command::Run { task } => run(config_path, task).await,
        Command::Add { description, url } => {
            logging::init_stderr();
            add(config_path, description, url)
        }
        Command::List { filter } => {
            logging::init_stderr();
            list(config_path, filter.as_deref())
        }
    }
}

async fn run(config_path: PathBuf, task: Option<String>) -> anyhow::Result<()> {
    let settings = Settings::load_or_default(&config_path)
        .with_context(|| format!("cannot load {}", config_path.display()))?;
    let _log_guard = logging::init(&chrono_dirs::logs_dir(&settings.data_root()));

    let backends = Backends::production(&settings);
    let app = App::with_backends(settings, config_path, backends)?;
    app.start().await;

    if let Some(description) = task {
        let task = match app.registry().find_by_description(&description) {
            Some(task) => task,
            None => app.registry().create(description)?,
        };
        info!("timing '{}'", task.description());
        app.timer().set_active(Some(task));
    }

    println!("chrono-task v{}. Press Ctrl+C to stop.", env!("CARGO_PKG_VERSION"));
    tokio::signal::ctrl_c()
        .await
        .context("cannot listen for Ctrl+C")?;
    info!("received Ctrl+C, shutting down");

    app.shutdown().await?;
    Ok(())
}

fn add(config_path: PathBuf, description: String, url: Option<String>) -> anyhow::Result<()> {
    let app = App::open(&config_path)?;
    let task = app.registry().create(description)?;
    if url.is_some() {
        app.registry().set_tracker_url(&task, url)?;
    }
    app.registry().persist()?;
    println!("{}", task.read().label());
    Ok(())
}

fn list(config_path: PathBuf, filter: Option<&str>) -> anyhow::Result<()> {
    let app = App::open(&config_path)?;
    let tasks = app.registry().filter(filter.unwrap_or_default());
    if tasks.is_empty() {
        println!("No tasks.");
        return Ok(());
    }

    for task in tasks {
        let task = task.read();
        println!(
            "{:<50} {:>12} {:>9} {:>9}",
            task.label(),
            task.status().to_string(),
            format_duration(task.duration_today()),
            format_duration(task.duration_recent()),
        );
    }
    Ok(())
}

/// `H:MM:SS`.
fn format_duration(duration: TimeDelta) -> String {
    let secs = duration.num_seconds().max(0);
    format!("{}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60)
}
