use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read {path}: {source}")]
    StorageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {path}: {source}")]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode device list: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("cannot initialise device store at {path}: {source}")]
    Init {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Device already exists: {0}")]
    DuplicateId(String),

    #[error("Device not found: {0}")]
    NotFound(String),

    #[error("Registry unavailable")]
    Closed,
}

pub type Result<T> = std::result::Result<T, RegistryError>;
