use anyhow::Result;
use clap::Subcommand;

use super::{parse_day, report::print_award, DateStyle, FileWorkspace};

#[derive(Subcommand, Debug)]
pub enum HabitCommand {
    #[command(about = "Create a habit")]
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value = "")]
        color: String,
    },
    #[command(about = "Mark a habit as done, or undo it")]
    Toggle {
        id: String,
        #[arg(long, help = "Day to toggle instead of today. Examples are \"yesterday\", \"15/03/2026\"")]
        on: Option<String>,
    },
    #[command(about = "Show habits with their current and longest streaks")]
    Streaks,
}

pub async fn process_habit_command(
    workspace: &FileWorkspace,
    command: HabitCommand,
    date_style: DateStyle,
) -> Result<()> {
    match command {
        HabitCommand::Add {
            name,
            description,
            color,
        } => {
            let habit = workspace.add_habit(name, description, color).await?;
            println!("Created habit {}", habit.id);
            Ok(())
        }
        HabitCommand::Toggle { id, on } => {
            let day = match on {
                Some(on) => parse_day(&on, date_style)?,
                None => workspace.data().today(),
            };
            let Some(toggle) = workspace.toggle_habit(&id, day).await? else {
                println!("No habit {id}");
                return Ok(());
            };
            if toggle.completed {
                println!("\"{}\" done on {day}", toggle.habit.name);
            } else {
                println!("\"{}\" no longer done on {day}", toggle.habit.name);
            }
            if let Some(award) = toggle.award {
                print_award(&award);
            }
            Ok(())
        }
        HabitCommand::Streaks => {
            let (streaks, combined) = workspace.habit_streaks().await?;
            for streak in streaks {
                println!(
                    "{:<36} {:<30} current {:>3} longest {:>3}",
                    streak.habit.id, streak.habit.name, streak.current, streak.longest
                );
            }
            println!();
            println!("Days in a row with any habit done: {combined}");
            Ok(())
        }
    }
}
