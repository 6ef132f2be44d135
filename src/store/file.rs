//! File-backed durable store.
//!
//! One file per key under a directory. File names are the hex encoding of
//! the key, so any key maps to a portable name and listing can recover keys.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::DurableStore;
use crate::error::StoreError;

/// Longest key this backend can hold; its hex name must fit in 255 bytes.
pub const MAX_FILE_KEY_LENGTH: usize = 120;

// == File Store ==
/// Directory-backed store that survives process restarts.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    /// Suffix source for temp files so concurrent writers never share one
    write_seq: AtomicU64,
}

impl FileStore {
    // == Open ==
    /// Opens a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await.map_err(map_io)?;
        debug!("File store opened at {}", dir.display());

        Ok(Self {
            dir,
            write_seq: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`, `None` for keys too long to store.
    fn path_for(&self, key: &str) -> Option<PathBuf> {
        (key.len() <= MAX_FILE_KEY_LENGTH).then(|| self.dir.join(hex::encode(key)))
    }
}

/// Maps I/O failures onto the store error taxonomy.
fn map_io(err: std::io::Error) -> StoreError {
    match err.kind() {
        ErrorKind::StorageFull => StoreError::QuotaExceeded(err.to_string()),
        ErrorKind::PermissionDenied | ErrorKind::ReadOnlyFilesystem => {
            StoreError::WriteDenied(err.to_string())
        }
        _ => StoreError::Io(err),
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let Some(path) = self.path_for(key) else {
            return Ok(None);
        };

        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(map_io(err)),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(key).ok_or_else(|| {
            StoreError::WriteDenied(format!(
                "key exceeds {} bytes supported by the file store",
                MAX_FILE_KEY_LENGTH
            ))
        })?;

        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let temp_path = self
            .dir
            .join(format!("{}.{}.tmp", hex::encode(key), seq));

        let write = async {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&temp_path)
                .await?;
            file.write_all(&value).await?;
            file.sync_all().await?;
            fs::rename(&temp_path, &path).await
        };

        if let Err(err) = write.await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(map_io(err));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let Some(path) = self.path_for(key) else {
            return Ok(());
        };

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(map_io(err)),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut dir = fs::read_dir(&self.dir).await.map_err(map_io)?;

        while let Some(entry) = dir.next_entry().await.map_err(map_io)? {
            // Temp files and foreign files do not decode
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let Ok(raw) = hex::decode(&name) else {
                continue;
            };
            if let Ok(key) = String::from_utf8(raw) {
                keys.push(key);
            }
        }

        Ok(keys)
    }

    fn max_key_length(&self) -> Option<usize> {
        Some(MAX_FILE_KEY_LENGTH)
    }
}
