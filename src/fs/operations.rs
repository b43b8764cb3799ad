use std::{io::ErrorKind, path::Path};

use fs4::tokio::AsyncFileExt;
use serde::{de::DeserializeOwned, Serialize};
use tokio::{
    fs::File,
    io::{self, AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, warn};

/// Reads the whole file under a shared lock. A missing file is not an error.
pub async fn read_locked(path: &Path) -> Result<Option<String>, io::Error> {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    file.lock_shared()?;
    let mut contents = String::new();
    let result = file.read_to_string(&mut contents).await;
    file.unlock_async().await?;
    result?;
    Ok(Some(contents))
}

/// Replaces the contents of a file under an exclusive lock.
pub async fn write_locked(path: &Path, contents: &[u8]) -> Result<(), io::Error> {
    let mut file = LockedFile::open_exclusive(path).await?;
    let result = file.overwrite(contents).await;
    file.unlock().await?;
    result
}

pub async fn remove_if_exists(path: &Path) -> Result<bool, io::Error> {
    match tokio::fs::remove_file(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Appends values to a JSON lines file, one value per line.
pub async fn append_json_lines<T: Serialize>(path: &Path, values: &[T]) -> anyhow::Result<()> {
    let mut buffer = Vec::<u8>::new();
    for value in values {
        serde_json::to_writer(&mut buffer, value)?;
        buffer.push(b'\n');
    }

    let mut file = LockedFile::open_exclusive(path).await?;
    let result = file.append(&buffer).await;
    file.unlock().await?;
    Ok(result?)
}

/// A file held under an exclusive advisory lock until [LockedFile::unlock] is called. Used for
/// read-modify-write cycles that other processes must not interleave with.
pub struct LockedFile {
    file: File,
}

impl LockedFile {
    pub async fn open_exclusive(path: &Path) -> Result<Self, io::Error> {
        let file = File::options()
            .write(true)
            .create(true)
            .read(true)
            .truncate(false)
            .open(path)
            .await?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }

    /// Reads every line that parses as `T`. Illegal lines are skipped; they might appear after a
    /// shutdown cut a write short.
    pub async fn read_json_lines<T: DeserializeOwned>(&mut self) -> Result<Vec<T>, io::Error> {
        self.file.rewind().await?;
        let mut lines = BufReader::new(&mut self.file).lines();
        let mut values = vec![];
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(&line) {
                Ok(v) => values.push(v),
                Err(e) => warn!("Skipping illegal json line {line}: {e}"),
            }
        }
        debug!("Read {} json lines", values.len());
        Ok(values)
    }

    pub async fn rewrite_json_lines<T: Serialize>(&mut self, values: &[T]) -> anyhow::Result<()> {
        let mut buffer = Vec::<u8>::new();
        for value in values {
            serde_json::to_writer(&mut buffer, value)?;
            buffer.push(b'\n');
        }
        self.overwrite(&buffer).await?;
        Ok(())
    }

    pub async fn overwrite(&mut self, contents: &[u8]) -> Result<(), io::Error> {
        self.file.set_len(0).await?;
        self.file.rewind().await?;
        self.file.write_all(contents).await?;
        self.file.flush().await?;
        self.file.sync_data().await
    }

    pub async fn append(&mut self, contents: &[u8]) -> Result<(), io::Error> {
        self.file.seek(std::io::SeekFrom::End(0)).await?;
        self.file.write_all(contents).await?;
        self.file.flush().await
    }

    pub async fn unlock(self) -> Result<(), io::Error> {
        self.file.unlock_async().await
    }
}
