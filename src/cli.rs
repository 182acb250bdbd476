use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use serde::Serialize;

use crate::{db::SessionKey, settings::SettingsStore, AppState, Backend};

/// Track focused time, breaks and interruptions against tasks.
#[derive(Parser, Debug)]
#[command(name = "focuslog")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Party to track for. Falls back to the configured default party.
    #[arg(long, global = true, conflicts_with = "guest")]
    pub party: Option<String>,

    /// Guest mode: nothing is written to disk.
    #[arg(long, global = true)]
    pub guest: bool,

    /// SQLite database file (overrides FOCUSLOG_DB and settings).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a work session, closing any session still open for the task
    Start {
        #[arg(long)]
        task: String,
    },
    /// Bank focus time and open an interruption
    Pause {
        #[arg(long)]
        task: String,
        /// Focused seconds since the session started or last resumed
        #[arg(long, allow_hyphen_values = true)]
        focus: i64,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Bank break time and close the open interruption
    Resume {
        #[arg(long)]
        task: String,
        /// Seconds spent on the break
        #[arg(long = "break", allow_hyphen_values = true)]
        break_secs: i64,
    },
    /// Bank the final focus time and close the session
    End {
        #[arg(long)]
        task: String,
        #[arg(long, allow_hyphen_values = true)]
        focus: i64,
    },
    /// Totals and focus percentage for a task
    Stats {
        #[arg(long)]
        task: String,
    },
    /// Whether the task is idle, active or paused
    Status {
        #[arg(long)]
        task: String,
    },
    /// Dump every session and interruption for a task as JSON
    Export {
        #[arg(long)]
        task: String,
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show or change persisted settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    Show,
    SetParty { party: String },
    SetDb { path: PathBuf },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

impl Command {
    fn task(&self) -> Option<&str> {
        match self {
            Command::Start { task }
            | Command::Pause { task, .. }
            | Command::Resume { task, .. }
            | Command::End { task, .. }
            | Command::Stats { task }
            | Command::Status { task }
            | Command::Export { task, .. } => Some(task),
            Command::Config { .. } => None,
        }
    }
}

/// `--guest` wins over everything, then `--party`, then the configured default.
fn resolve_party(
    guest: bool,
    party: Option<String>,
    default_party: Option<String>,
) -> Option<String> {
    if guest {
        None
    } else {
        party.or(default_party)
    }
}

/// Parties get the SQLite file; guests get process memory.
fn select_backend(
    party: Option<&str>,
    settings: &SettingsStore,
    db_override: Option<PathBuf>,
) -> Result<Backend> {
    match party {
        Some(_) => Ok(Backend::Durable(settings.resolve_database_path(db_override)?)),
        None => Ok(Backend::Ephemeral),
    }
}

pub async fn execute(args: Args) -> Result<()> {
    let settings = SettingsStore::open_default()?;

    if let Command::Config { action } = &args.command {
        return configure(&settings, action);
    }

    let party = resolve_party(args.guest, args.party.clone(), settings.current().default_party);
    let backend = select_backend(party.as_deref(), &settings, args.db.clone())?;
    if backend == Backend::Ephemeral {
        warn!("Guest mode: sessions are kept in memory and discarded on exit");
    }
    let app = AppState::open(backend)?;

    let task = args.command.task().unwrap_or_default();
    let key = SessionKey::new(task, party)?;

    match args.command {
        Command::Start { .. } => print_json(&app.tracker.start(&key).await?),
        Command::Pause { focus, reason, .. } => {
            print_json(&app.tracker.pause(&key, focus, reason).await?)
        }
        Command::Resume { break_secs, .. } => {
            print_json(&app.tracker.resume(&key, break_secs).await?)
        }
        Command::End { focus, .. } => print_json(&app.tracker.end(&key, focus).await?),
        Command::Stats { .. } => print_json(&app.stats.compute_stats(&key).await?),
        Command::Status { .. } => print_json(&app.tracker.status(&key).await?),
        Command::Export { output, .. } => {
            let report = app.stats.export(&key, app.tracker.now()).await?;
            match output {
                Some(path) => {
                    let serialized = serde_json::to_string_pretty(&report)?;
                    fs::write(&path, serialized)
                        .with_context(|| format!("Failed to write export to {}", path.display()))
                }
                None => print_json(&report),
            }
        }
        Command::Config { .. } => Ok(()),
    }
}

fn configure(settings: &SettingsStore, action: &ConfigAction) -> Result<()> {
    let current = match action {
        ConfigAction::Show => settings.current(),
        ConfigAction::SetParty { party } => {
            let party = party.trim();
            if party.is_empty() {
                bail!("party must not be blank");
            }
            settings.update(|s| s.default_party = Some(party.to_string()))?
        }
        ConfigAction::SetDb { path } => {
            settings.update(|s| s.database_file = Some(path.clone()))?
        }
    };
    if !matches!(action, ConfigAction::Show) {
        info!("Saved settings to {}", settings.path().display());
    }
    print_json(&current)
}
