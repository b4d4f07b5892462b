mod chime;
mod controller;
mod history;
mod pacing;
mod theme;
mod time_provider;
mod timer;
mod ui;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::chime::{Chime, terminal_chime, window_chime};
use crate::controller::{TimerContext, TimerController};
use crate::history::model::{Goal, HistoryStore, load_history, save_history};
use crate::history::progress::goal_progress;
use crate::theme::ThemeColor;
use crate::time_provider::SystemTimeProvider;
use crate::timer::parse::{format_hms, parse_duration};

#[derive(Parser, Debug)]
#[command(
    name = "timeto",
    version,
    about = "Countdown timer with a native window, terminal mode and session history"
)]
struct Cli {
    /// History and settings file.
    #[arg(long, env = "TIMETO_STORE", default_value = "timeto.json", global = true)]
    store: PathBuf,

    /// Completed sessions are only logged when a user is known.
    #[arg(long, env = "TIMETO_USER", global = true)]
    user: Option<String>,

    /// Theme colour for this run, `#RRGGBB` or `#RRGGBBAA`.
    #[arg(long, global = true)]
    color: Option<String>,

    #[arg(long, default_value_t = 60, global = true)]
    fps: u16,

    #[arg(long, global = true)]
    no_chime: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Count down in the terminal.
    Run {
        time: String,
        #[arg(long, default_value = "")]
        title: String,
    },
    /// Print how a duration is understood.
    Parse { text: String },
    /// List recently completed sessions.
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    #[command(subcommand)]
    Goal(GoalCommand),
}

#[derive(Subcommand, Debug)]
enum GoalCommand {
    Set {
        title: String,
        #[arg(long)]
        sessions: Option<u32>,
        #[arg(long)]
        hours: Option<f64>,
    },
    Remove {
        title: String,
    },
    List,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    if cli.fps == 0 {
        bail!("--fps must be greater than zero");
    }
    let theme_override = cli
        .color
        .as_deref()
        .map(|hex| {
            hex.parse::<ThemeColor>()
                .with_context(|| format!("invalid --color '{hex}'"))
        })
        .transpose()?;

    match cli.command {
        None => {
            let chime = window_chime(!cli.no_chime);
            let controller = open_controller(&cli.store, cli.user, theme_override, chime);
            ui::app::run_gui(controller, cli.fps)
        }
        Some(Command::Run { time, title }) => {
            let chime = terminal_chime(!cli.no_chime);
            let mut controller = open_controller(&cli.store, cli.user, theme_override, chime);
            let provider = SystemTimeProvider::new();
            ui::terminal::run_terminal(&mut controller, &provider, &title, &time)
        }
        Some(Command::Parse { text }) => {
            let seconds = parse_duration(&text).map_err(|err| anyhow::anyhow!(err.user_message()))?;
            println!("{seconds} seconds ({})", format_hms(seconds));
            Ok(())
        }
        Some(Command::History { limit }) => {
            let store = load_or_empty(&cli.store);
            if store.logs.is_empty() {
                println!("No sessions logged.");
            }
            for entry in store.recent_logs(limit) {
                println!(
                    "{}  {}  {}",
                    entry.completed_at.format("%Y-%m-%d %H:%M"),
                    format_hms(entry.seconds),
                    entry.title
                );
            }
            Ok(())
        }
        Some(Command::Goal(command)) => run_goal(&cli.store, command),
    }
}

fn open_controller(
    store: &Path,
    user: Option<String>,
    theme_override: Option<ThemeColor>,
    chime: Box<dyn Chime>,
) -> TimerController {
    TimerController::open(
        TimerContext {
            user,
            store_path: Some(store.to_path_buf()),
        },
        theme_override,
        chime,
    )
}

/// Read-only views keep going on an unreadable store.
fn load_or_empty(path: &Path) -> HistoryStore {
    load_history(path).unwrap_or_else(|err| {
        let reason = format!("{err:#}");
        warn!(path = %path.display(), error = %reason, "history unreadable");
        eprintln!("warning: history unavailable ({reason})");
        HistoryStore::default()
    })
}

fn run_goal(path: &Path, command: GoalCommand) -> Result<()> {
    match command {
        GoalCommand::Set {
            title,
            sessions,
            hours,
        } => {
            let mut store = load_history(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            store.set_goal(
                &title,
                Goal {
                    target_sessions: sessions,
                    target_hours: hours,
                },
            )?;
            save_history(path, &store)?;
            println!("Goal set for '{}'.", title.trim());
        }
        GoalCommand::Remove { title } => {
            let mut store = load_history(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            if store.remove_goal(&title).is_none() {
                bail!("no goal named '{}'", title.trim());
            }
            save_history(path, &store)?;
            println!("Goal removed for '{}'.", title.trim());
        }
        GoalCommand::List => {
            let store = load_or_empty(path);
            let progress = goal_progress(&store);
            if progress.is_empty() {
                println!("No goals set.");
            }
            for goal in progress {
                let mut parts = Vec::new();
                if let Some(target) = goal.goal.target_sessions {
                    parts.push(format!("{}/{target} sessions", goal.totals.sessions));
                }
                if let Some(target) = goal.goal.target_hours {
                    parts.push(format!("{:.1}/{target:.1} h", goal.hours_done()));
                }
                let status = if goal.is_met() { "  met" } else { "" };
                println!("{}: {}{status}", goal.title, parts.join(", "));
            }
        }
    }
    Ok(())
}
