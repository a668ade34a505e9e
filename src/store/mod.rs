use crate::error::Result;
use crate::types::DeviceRecord;
use async_trait::async_trait;

pub mod json_file;
pub use json_file::JsonFileStore;

/// Durable backing for the device collection.
///
/// Every call operates on the whole collection; there is no per-record
/// access.  Callers that read, modify and write back must serialise those
/// cycles themselves (see [`crate::actor`]).
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Create an empty collection if none is stored yet.  Must leave an
    /// existing collection untouched, whatever its contents.
    async fn ensure_exists(&self) -> Result<()>;

    /// Read the full collection in stored order.
    async fn read(&self) -> Result<Vec<DeviceRecord>>;

    /// Replace the full collection.
    async fn write(&self, records: &[DeviceRecord]) -> Result<()>;
}
