//! Recurring tasks. A task carrying an enabled [RecurrenceRule] acts as a template: [expand]
//! turns the rule into due dates and [generator] turns those dates into task instances.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub mod expand;
pub mod generator;

pub use expand::expand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
    pub enabled: bool,
    pub frequency: Frequency,
    /// Every `interval` days, weeks, months or years. Zero behaves like one.
    #[serde(default = "default_interval")]
    pub interval: u32,
    /// Weekdays for weekly rules, 0 is Sunday.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<BTreeSet<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// Generation watermark. Instances are only produced strictly after it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_generated: Option<DateTime<Utc>>,
    /// Day the interval is counted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_on: Option<NaiveDate>,
}

fn default_interval() -> u32 {
    1
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency, interval: u32) -> Self {
        Self {
            enabled: true,
            frequency,
            interval,
            days_of_week: None,
            day_of_month: None,
            end_date: None,
            last_generated: None,
            starts_on: None,
        }
    }

    pub fn with_days_of_week(self, days: impl IntoIterator<Item = u8>) -> Self {
        Self {
            days_of_week: Some(days.into_iter().collect()),
            ..self
        }
    }

    pub fn with_day_of_month(self, day: u32) -> Self {
        Self {
            day_of_month: Some(day),
            ..self
        }
    }

    pub fn with_end_date(self, end_date: NaiveDate) -> Self {
        Self {
            end_date: Some(end_date),
            ..self
        }
    }

    pub fn with_starts_on(self, starts_on: NaiveDate) -> Self {
        Self {
            starts_on: Some(starts_on),
            ..self
        }
    }

    pub(crate) fn step(&self) -> i64 {
        self.interval.max(1) as i64
    }
}
