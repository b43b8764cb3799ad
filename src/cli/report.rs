use anyhow::Result;
use clap::Subcommand;

use crate::analytics::{
    gamification::{Award, ACHIEVEMENTS},
    report::{best_day, insights, productivity_trend, weekly_reports},
};

use super::{parse_day, DateStyle, FileWorkspace};

#[derive(Subcommand, Debug)]
pub enum AnalyticsCommand {
    #[command(about = "Compute and store the rollup of a day")]
    Rollup {
        #[arg(long, help = "Day to roll up instead of today. Examples are \"yesterday\", \"15/03/2026\"")]
        on: Option<String>,
    },
    #[command(about = "Weekly reports, trend and insights from stored rollups")]
    Report {
        #[arg(long, default_value_t = 28, help = "Number of days to include")]
        days: u32,
    },
}

pub async fn process_analytics_command(
    workspace: &FileWorkspace,
    command: AnalyticsCommand,
    date_style: DateStyle,
) -> Result<()> {
    match command {
        AnalyticsCommand::Rollup { on } => {
            let day = match on {
                Some(on) => parse_day(&on, date_style)?,
                None => workspace.data().today(),
            };
            let rollup = workspace.rollup_day(day).await?;
            println!("{}", serde_json::to_string_pretty(&rollup)?);
            Ok(())
        }
        AnalyticsCommand::Report { days } => {
            let history = workspace.history(days).await?;
            if history.is_empty() {
                println!("No rollups stored for the last {days} days");
                return Ok(());
            }

            for week in weekly_reports(&history) {
                println!(
                    "Week of {}: {} tasks, {}% completed, {:.0} min focus, top {}, score {}",
                    week.week,
                    week.total_tasks,
                    week.completion_rate,
                    week.total_focus_time,
                    week.top_category,
                    week.average_productivity
                );
            }
            println!();
            println!("Trend over the last 7 days: {}%", productivity_trend(&history, 7));
            if let Some(best) = best_day(&history) {
                println!("Best day: {} with score {}", best.date, best.productivity_score);
            }
            for insight in insights(&history) {
                println!("- {insight}");
            }
            Ok(())
        }
    }
}

pub async fn print_profile(workspace: &FileWorkspace) -> Result<()> {
    let profile = workspace.profile().await?;
    println!(
        "Level {} with {} points ({:.0}% to the next level)",
        profile.level,
        profile.total_points,
        profile.next_level_progress()
    );
    for achievement in ACHIEVEMENTS {
        let mark = if profile.has(achievement.id) { "x" } else { " " };
        println!(
            "[{mark}] {:<20} {:<32} {:>4}",
            achievement.title, achievement.description, achievement.points
        );
    }
    Ok(())
}

pub fn print_award(award: &Award) {
    println!("{} points total", award.total_points);
    if award.leveled_up {
        println!("Level up! Now level {}", award.level);
    }
    for achievement in &award.unlocked {
        println!(
            "Achievement unlocked: {} (+{})",
            achievement.title, achievement.points
        );
    }
}
