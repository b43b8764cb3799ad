use std::{collections::HashMap, future::Future, sync::Arc};

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::{error, instrument, warn};

use crate::error::StorageError;

use super::kv::KeyValueStore;

/// Typed access to whole collections kept in a [KeyValueStore].
///
/// Reads are forgiving: malformed data is dropped and treated as empty so one bad write doesn't
/// break every later read. Writes always replace the full collection. In-process writers are
/// serialized per key through [LocalCache::update].
pub struct LocalCache<S: KeyValueStore> {
    store: S,
    writers: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: KeyValueStore> LocalCache<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            writers: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads a collection. Missing keys and malformed contents both produce an empty collection.
    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StorageError> {
        Ok(self.load_parsed(key).await?.unwrap_or_default())
    }

    /// Replaces the stored collection.
    pub async fn save<T: Serialize>(&self, key: &str, items: &[T]) -> Result<(), StorageError> {
        self.write(key, items).await
    }

    /// Loads a single stored value, falling back to `T::default()`.
    pub async fn load_value<T: DeserializeOwned + Default>(
        &self,
        key: &str,
    ) -> Result<T, StorageError> {
        Ok(self.load_parsed(key).await?.unwrap_or_default())
    }

    pub async fn save_value<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        self.write(key, value).await
    }

    /// Load-modify-save under the key's writer lock. The modification sees the latest stored
    /// collection, so concurrent updates are applied one after another instead of clobbering.
    #[instrument(skip(self, modify))]
    pub async fn update<T, R>(
        &self,
        key: &str,
        modify: impl FnOnce(&mut Vec<T>) -> R,
    ) -> Result<R, StorageError>
    where
        T: Serialize + DeserializeOwned,
    {
        self.update_then(key, modify, std::future::ready).await
    }

    /// [LocalCache::update] followed by `then`, which runs on the result before the writer lock
    /// is released. Follow-up work of writers to the same key happens in the order they saved.
    pub async fn update_then<T, R, O, F>(
        &self,
        key: &str,
        modify: impl FnOnce(&mut Vec<T>) -> R,
        then: impl FnOnce(R) -> F,
    ) -> Result<O, StorageError>
    where
        T: Serialize + DeserializeOwned,
        F: Future<Output = O>,
    {
        let lock = self.writer_lock(key);
        let _guard = lock.lock().await;

        let mut items = self.load::<T>(key).await?;
        let result = modify(&mut items);
        self.save(key, &items).await?;
        Ok(then(result).await)
    }

    /// Same as [LocalCache::update] for single value keys.
    pub async fn update_value<T, R>(
        &self,
        key: &str,
        modify: impl FnOnce(&mut T) -> R,
    ) -> Result<R, StorageError>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        let lock = self.writer_lock(key);
        let _guard = lock.lock().await;

        let mut value = self.load_value::<T>(key).await?;
        let result = modify(&mut value);
        self.save_value(key, &value).await?;
        Ok(result)
    }

    fn writer_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut writers = self
            .writers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writers.entry(key.to_string()).or_default().clone()
    }

    async fn load_parsed<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<T>(&raw) {
            Ok(v) => Ok(Some(v)),
            Err(source) => {
                let e = StorageError::Parse {
                    key: key.to_string(),
                    source,
                };
                warn!("Discarding stored value: {e}");
                // Clear the malformed data to prevent recurring errors
                if let Err(e) = self.store.remove(key).await {
                    error!("Failed to discard malformed key {key}: {e}");
                }
                Ok(None)
            }
        }
    }

    async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let serialized = serde_json::to_string(value).map_err(|source| StorageError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.store
            .set(key, serialized)
            .await
            .inspect_err(|e| error!("Failed to persist {key}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    use crate::{
        storage::{
            entities::{Record, Task, UserSettings, SETTINGS_KEY},
            kv::{FileKeyValueStore, KeyValueStore},
        },
        utils::logging::TEST_LOGGING,
    };

    use super::LocalCache;

    fn cache(dir: &std::path::Path) -> Result<LocalCache<FileKeyValueStore>> {
        Ok(LocalCache::new(FileKeyValueStore::new(dir.join("store"))?))
    }

    #[tokio::test]
    async fn test_save_then_load_is_identity() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let cache = cache(dir.path())?;
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap();
        let mut second = Task::new("second", now);
        second.completed = true;
        second.description = Some("with a description".into());
        let tasks = vec![Task::new("first", now), second];

        cache.save(Task::COLLECTION, &tasks).await?;
        let loaded: Vec<Task> = cache.load(Task::COLLECTION).await?;

        assert_eq!(loaded, tasks);
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_data_is_discarded() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let cache = cache(dir.path())?;

        for malformed in ["{not json", "{\"id\": 1}", "", "[{\"title\": 5}]"] {
            cache.store().set(Task::COLLECTION, malformed.into()).await?;
            let loaded: Vec<Task> = cache.load(Task::COLLECTION).await?;
            assert!(loaded.is_empty());
            assert_eq!(cache.store().get(Task::COLLECTION).await?, None);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_value_defaults() -> Result<()> {
        let dir = tempdir()?;
        let cache = cache(dir.path())?;
        let settings: UserSettings = cache.load_value(SETTINGS_KEY).await?;
        assert_eq!(settings, UserSettings::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_updates_do_not_clobber() -> Result<()> {
        let dir = tempdir()?;
        let cache = Arc::new(cache(dir.path())?);
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap();

        let handles = (0..10)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    cache
                        .update::<Task, _>(Task::COLLECTION, |tasks| {
                            tasks.push(Task::new(format!("task {i}"), now))
                        })
                        .await
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.await??;
        }

        let loaded: Vec<Task> = cache.load(Task::COLLECTION).await?;
        assert_eq!(loaded.len(), 10);
        Ok(())
    }
}
