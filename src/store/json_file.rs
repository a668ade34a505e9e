use super::DeviceStore;
use crate::error::{RegistryError, Result};
use crate::types::DeviceRecord;
use async_trait::async_trait;
use log::{debug, info};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Stores the collection as a single pretty-printed JSON array.
///
/// Writes go to a sibling `*.tmp` file which is then renamed over the
/// target, so readers see either the old or the new document.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "devices.json".to_string());
        self.path.with_file_name(format!("{}.tmp", name))
    }

    async fn create_parent(&self) -> std::io::Result<()> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent).await,
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl DeviceStore for JsonFileStore {
    async fn ensure_exists(&self) -> Result<()> {
        let init_err = |source: std::io::Error| RegistryError::Init {
            path: self.path.clone(),
            source,
        };

        self.create_parent().await.map_err(init_err)?;

        // create_new keeps an existing document, valid or not.
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .await
        {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("Device store already present at {}", self.path.display());
                return Ok(());
            }
            Err(e) => return Err(init_err(e)),
        };

        file.write_all(b"[]").await.map_err(init_err)?;
        file.sync_all().await.map_err(init_err)?;
        info!("Created empty device store at {}", self.path.display());
        Ok(())
    }

    async fn read(&self) -> Result<Vec<DeviceRecord>> {
        let bytes = fs::read(&self.path)
            .await
            .map_err(|source| RegistryError::StorageRead {
                path: self.path.clone(),
                source,
            })?;
        serde_json::from_slice(&bytes).map_err(|source| RegistryError::Decode {
            path: self.path.clone(),
            source,
        })
    }

    async fn write(&self, records: &[DeviceRecord]) -> Result<()> {
        let encoded = serde_json::to_vec_pretty(records)?;
        let tmp = self.temp_path();
        let write_err = |source: std::io::Error| RegistryError::StorageWrite {
            path: self.path.clone(),
            source,
        };

        let mut file = fs::File::create(&tmp).await.map_err(write_err)?;
        file.write_all(&encoded).await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        drop(file);

        fs::rename(&tmp, &self.path).await.map_err(write_err)?;
        debug!(
            "Wrote {} device(s) to {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }
}
