use anyhow::Result;
use chrono::Local;
use clap::Subcommand;

use crate::{
    recurrence::{Frequency, RecurrenceRule},
    storage::entities::{Priority, Task},
    workspace::NewTask,
};

use super::{parse_day, parse_time, report::print_award, DateStyle, FileWorkspace};

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    #[command(about = "Create a task")]
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
        #[arg(long, help = "Due date. Examples are \"tomorrow\", \"friday 17:00\", \"15/03/2026\"")]
        due: Option<String>,
        #[arg(long, default_value = "General")]
        category: String,
        #[arg(long)]
        project: Option<String>,
        #[arg(long, help = "Parent task, makes this a sub-task")]
        parent: Option<String>,
        #[arg(long, help = "Points awarded on completion. Defaults depend on priority")]
        points: Option<u32>,
        #[arg(long, help = "Estimated time in minutes")]
        estimate: Option<u32>,
        #[command(flatten)]
        recurrence: RecurrenceArgs,
    },
    #[command(about = "Mark a task as completed")]
    Done { id: String },
    #[command(about = "Mark a completed task as not completed")]
    Reopen { id: String },
    #[command(about = "Delete a task")]
    Delete { id: String },
    #[command(about = "List tasks")]
    List {
        #[arg(long, help = "Include completed tasks")]
        all: bool,
    },
}

#[derive(Debug, Clone, clap::Args)]
pub struct RecurrenceArgs {
    #[arg(long, value_enum, help = "Repeat the task")]
    repeat: Option<Frequency>,
    #[arg(long, default_value_t = 1, help = "Repeat every n days, weeks, months or years")]
    every: u32,
    #[arg(
        long = "weekday",
        value_delimiter = ',',
        value_parser = clap::value_parser!(u8).range(0..=6),
        help = "Weekdays of weekly tasks, 0 is Sunday. Example --weekday 1,3"
    )]
    weekdays: Vec<u8>,
    #[arg(long = "month-day")]
    month_day: Option<u32>,
    #[arg(long, help = "Last day an instance can be due on")]
    until: Option<String>,
}

impl RecurrenceArgs {
    fn into_rule(self, date_style: DateStyle) -> Result<Option<RecurrenceRule>> {
        let Some(frequency) = self.repeat else {
            return Ok(None);
        };
        let mut rule = RecurrenceRule::new(frequency, self.every);
        if !self.weekdays.is_empty() {
            rule = rule.with_days_of_week(self.weekdays);
        }
        if let Some(day) = self.month_day {
            rule = rule.with_day_of_month(day);
        }
        if let Some(until) = self.until {
            rule = rule.with_end_date(parse_day(&until, date_style)?);
        }
        Ok(Some(rule))
    }
}

pub async fn process_task_command(
    workspace: &FileWorkspace,
    command: TaskCommand,
    date_style: DateStyle,
) -> Result<()> {
    match command {
        TaskCommand::Add {
            title,
            description,
            priority,
            due,
            category,
            project,
            parent,
            points,
            estimate,
            recurrence,
        } => {
            let due_date = due.map(|v| parse_time(&v, date_style)).transpose()?;
            let created = workspace
                .add_task(NewTask {
                    title,
                    description,
                    priority,
                    due_date,
                    category,
                    project_id: project,
                    parent_id: parent,
                    points,
                    estimated_minutes: estimate,
                    recurring: recurrence.into_rule(date_style)?,
                })
                .await?;

            if let Some(task) = created.first() {
                println!("Created task {}", task.id);
            }
            if created.len() > 1 {
                println!("Generated {} upcoming instances", created.len() - 1);
            }
            Ok(())
        }
        TaskCommand::Done { id } => {
            let Some(completion) = workspace.complete_task(&id).await? else {
                println!("No task {id}");
                return Ok(());
            };
            println!("Completed \"{}\"", completion.task.title);
            if let Some(award) = completion.award {
                print_award(&award);
            }
            Ok(())
        }
        TaskCommand::Reopen { id } => {
            match workspace.reopen_task(&id).await? {
                Some(task) => println!("Reopened \"{}\"", task.title),
                None => println!("No task {id}"),
            }
            Ok(())
        }
        TaskCommand::Delete { id } => {
            if workspace.delete_task(&id).await? {
                println!("Deleted {id}");
            } else {
                println!("No task {id}");
            }
            Ok(())
        }
        TaskCommand::List { all } => {
            let mut tasks = workspace.data().list::<Task>().await?;
            tasks.retain(|t| all || !t.completed);
            tasks.sort_by_key(|t| (t.due_date, t.order));
            for task in tasks {
                print_task(&task);
            }
            Ok(())
        }
    }
}

fn print_task(task: &Task) {
    let mark = if task.completed { "x" } else { " " };
    let due = task
        .due_date
        .map(|v| v.with_timezone(&Local).format("%d/%m/%Y %H:%M").to_string())
        .unwrap_or_default();
    let repeat = if task.is_recurring_template() {
        " (repeats)"
    } else {
        ""
    };
    println!(
        "[{mark}] {:<36} {:<40} {:<16} {:?}{repeat}",
        task.id, task.title, due, task.priority
    );
}
