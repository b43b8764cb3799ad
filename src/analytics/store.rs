use std::{future, future::Future, ops::Deref, path::PathBuf, sync::Arc};

use anyhow::Result;
use chrono::NaiveDate;
use futures::{stream, Stream, StreamExt};
use tracing::{error, warn};

use crate::{
    fs::operations::{read_locked, write_locked},
    utils::time::date_key,
};

use super::report::DailyAnalytics;

/// Interface for abstracting storage of daily rollups. Every day is stored on its own, so
/// rolling up a day again replaces the previous rollup.
pub trait AnalyticsStore {
    fn save_day(&self, analytics: &DailyAnalytics) -> impl Future<Output = Result<()>>;

    fn get_day(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Option<DailyAnalytics>>> + Send;
}

impl<T: Deref> AnalyticsStore for T
where
    T::Target: AnalyticsStore,
{
    fn save_day(&self, analytics: &DailyAnalytics) -> impl Future<Output = Result<()>> {
        self.deref().save_day(analytics)
    }

    fn get_day(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Option<DailyAnalytics>>> + Send {
        self.deref().get_day(date)
    }
}

/// The main realization of [AnalyticsStore]: one `YYYY-MM-DD.json` file per day.
pub struct AnalyticsStorageImpl {
    analytics_dir: PathBuf,
}

impl AnalyticsStorageImpl {
    pub fn new(analytics_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&analytics_dir)?;

        Ok(Self { analytics_dir })
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.analytics_dir.join(format!("{}.json", date_key(date)))
    }
}

impl AnalyticsStore for AnalyticsStorageImpl {
    async fn save_day(&self, analytics: &DailyAnalytics) -> Result<()> {
        let data = serde_json::to_vec(analytics)?;
        write_locked(&self.path_for(analytics.date), &data).await?;
        Ok(())
    }

    async fn get_day(&self, date: NaiveDate) -> Result<Option<DailyAnalytics>> {
        let path = self.path_for(date);
        let Some(raw) = read_locked(&path).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<DailyAnalytics>(&raw) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                // A rollup can always be recomputed, so a broken one is just skipped.
                warn!("Ignoring corrupted analytics in {path:?}: {e}");
                Ok(None)
            }
        }
    }
}

/// Streams stored rollups between 2 dates (both inclusive) in date order. Days without a rollup
/// are skipped.
pub fn history_between(
    storage: impl AnalyticsStore,
    start: NaiveDate,
    end: NaiveDate,
) -> impl Stream<Item = Result<DailyAnalytics>> {
    let storage = Arc::new(storage);

    date_range(start, end)
        .map(move |day| {
            let storage = storage.clone();
            async move { (day, storage.get_day(day).await) }
        })
        .buffered(4)
        .filter_map(|(day, data)| {
            future::ready(match data {
                Ok(v) => v.map(Ok),
                Err(e) => {
                    error!("Failed to read analytics for {day} {e}");
                    Some(Err(e))
                }
            })
        })
}

/// Returns a stream of dates between start (inclusive) and end (inclusive).
fn date_range(start: NaiveDate, end: NaiveDate) -> impl Stream<Item = NaiveDate> {
    stream::unfold(Some(start), move |current| {
        future::ready(match current {
            Some(day) if day <= end => Some((day, day.succ_opt())),
            _ => None,
        })
    })
}
