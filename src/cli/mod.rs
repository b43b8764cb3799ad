pub mod habits;
pub mod report;
pub mod tasks;

use std::{fmt::Display, path::PathBuf};

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, Utc};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use habits::{process_habit_command, HabitCommand};
use report::{print_award, process_analytics_command, AnalyticsCommand};
use tasks::{process_task_command, TaskCommand};
use tracing::level_filters::LevelFilter;

use crate::{
    analytics::store::AnalyticsStorageImpl,
    storage::{
        entities::{SessionKind, Theme},
        kv::FileKeyValueStore,
    },
    sync::{
        args::SyncArgs,
        default_journal,
        queue::{FlushPolicy, QueueState},
        remote::JournalRemote,
        start_sync,
    },
    utils::{
        dir::{create_application_default_path, ensure_dir},
        logging::{enable_logging, CLI_PREFIX, SYNC_PREFIX},
    },
    workspace::Workspace,
};

pub type FileWorkspace = Workspace<FileKeyValueStore, AnalyticsStorageImpl>;

#[derive(Parser, Debug)]
#[command(name = "clarity-hub", version, long_about = None)]
#[command(about = "Offline-first tasks, habits and focus tracking", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default $XDG_DATA_HOME/clarity-hub or $HOME/.local/share/clarity-hub"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = FlushPolicy::Outbox,
        help = "How queued actions are replayed once back online"
    )]
    policy: FlushPolicy,
    #[arg(
        long,
        global = true,
        help = "Journal replayed actions are appended to. By default remote/journal.jsonl in the application directory"
    )]
    journal: Option<PathBuf>,
    #[arg(long, global = true, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run the sync service in the current console")]
    Sync {
        #[command(flatten)]
        args: SyncArgs,
    },
    #[command(flatten)]
    Local(LocalCommand),
}

/// Commands working on the local workspace.
#[derive(Subcommand, Debug)]
enum LocalCommand {
    #[command(about = "Manage tasks")]
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },
    #[command(about = "Generate upcoming instances of recurring tasks")]
    Recur,
    #[command(about = "Manage habits")]
    Habit {
        #[command(subcommand)]
        command: HabitCommand,
    },
    #[command(about = "Record a finished pomodoro session")]
    Session {
        #[arg(long, value_enum, default_value_t = SessionKind::Work)]
        kind: SessionKind,
        #[arg(long, default_value_t = 25)]
        minutes: u32,
        #[arg(long, help = "Task the session was spent on")]
        task: Option<String>,
    },
    #[command(about = "Write a note")]
    Note {
        title: String,
        #[arg(long, default_value = "")]
        content: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long, default_value = "")]
        category: String,
    },
    #[command(about = "Create a project")]
    Project {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    #[command(about = "Daily rollups and reports")]
    Analytics {
        #[command(subcommand)]
        command: AnalyticsCommand,
    },
    #[command(about = "Show points, level and achievements")]
    Profile,
    #[command(about = "Show or change settings")]
    Settings {
        #[arg(long, value_enum)]
        theme: Option<Theme>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, help = "Turn points and achievements on or off")]
        gamification: Option<bool>,
    },
    #[command(about = "List actions waiting to be synced")]
    Pending,
    #[command(about = "Record mutations locally until going online again")]
    Offline,
    #[command(about = "Go online and replay everything recorded while offline")]
    Online,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

/// Parses dates like "tomorrow", "next friday" or "15/03/2026".
pub fn parse_time(input: &str, date_style: DateStyle) -> Result<DateTime<Utc>> {
    match parse_date_string(input, Local::now(), date_style.into()) {
        Ok(v) => Ok(v.with_timezone(&Utc)),
        Err(e) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate date \"{input}\" {e}"),
            )
            .into()),
    }
}

pub fn parse_day(input: &str, date_style: DateStyle) -> Result<NaiveDate> {
    Ok(parse_time(input, date_style)?.date_naive())
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let dir = match args.dir {
        Some(dir) => ensure_dir(dir)?,
        None => create_application_default_path()?,
    };

    let command = match args.commands {
        Commands::Sync { args: sync_args } => {
            enable_logging(
                SYNC_PREFIX,
                &dir.join("logs"),
                sync_args.log_filter,
                sync_args.log_console,
            )?;
            let sync_args = SyncArgs {
                journal: args.journal,
                ..sync_args
            };
            return start_sync(&dir, args.policy, sync_args).await;
        }
        Commands::Local(command) => command,
    };

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &dir.join("logs"), logging_level, args.log)?;

    let remote = JournalRemote::new(args.journal.unwrap_or_else(|| default_journal(&dir)))?;
    let workspace = Workspace::open(&dir, args.policy, Some(Box::new(remote.clone()))).await?;
    let date_style = args.date_style;

    match command {
        LocalCommand::Task { command } => process_task_command(&workspace, command, date_style).await,
        LocalCommand::Recur => {
            let run = workspace.run_recurrence().await?;
            println!(
                "Generated {} instances from {} recurring tasks",
                run.instances.len(),
                run.templates.len()
            );
            Ok(())
        }
        LocalCommand::Habit { command } => {
            process_habit_command(&workspace, command, date_style).await
        }
        LocalCommand::Session {
            kind,
            minutes,
            task,
        } => {
            let (session, award) = workspace.record_session(kind, minutes, task).await?;
            println!("Recorded {:?} session of {} minutes", session.kind, minutes);
            if let Some(award) = award {
                print_award(&award);
            }
            Ok(())
        }
        LocalCommand::Note {
            title,
            content,
            tags,
            category,
        } => {
            let note = workspace.add_note(title, content, tags, category).await?;
            println!("Created note {}", note.id);
            Ok(())
        }
        LocalCommand::Project { name, description } => {
            let project = workspace.add_project(name, description).await?;
            println!("Created project {}", project.id);
            Ok(())
        }
        LocalCommand::Analytics { command } => {
            process_analytics_command(&workspace, command, date_style).await
        }
        LocalCommand::Profile => report::print_profile(&workspace).await,
        LocalCommand::Settings {
            theme,
            name,
            gamification,
        } => {
            let settings = workspace
                .update_settings(|settings| {
                    if let Some(theme) = theme {
                        settings.theme = theme;
                    }
                    if let Some(name) = name {
                        settings.name = name;
                    }
                    if let Some(enabled) = gamification {
                        settings.gamification.enabled = enabled;
                    }
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
        LocalCommand::Pending => {
            let queue = workspace.data().queue();
            let pending = queue.pending().await?;
            let state = match queue.state() {
                QueueState::Recording => "offline",
                _ => "online",
            };
            println!("{} pending actions, {state}", pending.len());
            for action in pending {
                println!(
                    "{} {:?} {} {} attempts {}",
                    action.timestamp.with_timezone(&Local).format("%d/%m/%Y %H:%M"),
                    action.kind,
                    action.entity,
                    action.entity_id().unwrap_or("-"),
                    action.attempts,
                );
            }
            Ok(())
        }
        LocalCommand::Offline => {
            workspace.data().queue().go_offline().await?;
            println!("Offline, changes are recorded until going online");
            Ok(())
        }
        LocalCommand::Online => {
            let report = workspace
                .data()
                .queue()
                .go_online(&remote)
                .await?;
            println!(
                "Online. {} actions synced, {} retained, {} dropped",
                report.pushed, report.retained, report.dropped
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::Args;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(["clarity-hub"].iter().chain(args))
    }

    #[test]
    fn arguments_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn weekdays_must_be_between_sunday_and_saturday() {
        let weekly = ["task", "add", "gym", "--repeat", "weekly", "--weekday"];
        let with_days = |days: &'static str| {
            let mut args = weekly.to_vec();
            args.push(days);
            args
        };

        assert!(parse(&with_days("0,6")).is_ok());
        let error = parse(&with_days("1,7")).err().map(|e| e.kind());
        assert_eq!(error, Some(clap::error::ErrorKind::ValueValidation));
    }

    #[test]
    fn sync_takes_the_global_journal() -> Result<(), clap::Error> {
        let args = parse(&["sync", "--journal", "/tmp/journal.jsonl", "--log-filter", "debug"])?;
        assert_eq!(args.journal, Some("/tmp/journal.jsonl".into()));
        assert!(matches!(
            args.commands,
            super::Commands::Sync { args } if args.log_filter.is_some() && args.journal.is_none()
        ));
        Ok(())
    }
}
