//! Device registry.
//!
//! Owns a [`DeviceStore`] and implements the add/remove/list operations on
//! top of whole-collection load and save.  Display reads fail open: a store
//! that cannot be read or decoded shows up as an empty list and an error
//! log, so the operator surface stays usable.  Mutations never fail open;
//! they refuse to write when the current collection could not be loaded.
//!
//! The registry itself performs no locking.  Concurrent callers must go
//! through [`crate::actor::RegistryHandle`].

use log::{error, info, warn};

use crate::error::{RegistryError, Result};
use crate::store::DeviceStore;
use crate::types::{DeviceRecord, DeviceStatus, Outcome, Timestamp};

pub const NO_DEVICES: &str = "No devices connected.";

pub struct DeviceRegistry<S> {
    store: S,
}

impl<S: DeviceStore> DeviceRegistry<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create the backing collection if it is missing.  Errors here are
    /// fatal to the caller.
    pub async fn ensure_initialized(&self) -> Result<()> {
        self.store.ensure_exists().await
    }

    pub async fn load_all(&self) -> Vec<DeviceRecord> {
        match self.store.read().await {
            Ok(records) => records,
            Err(e) => {
                error!("Failed to load device list: {}", e);
                Vec::new()
            }
        }
    }

    async fn load_for_update(&self) -> std::result::Result<Vec<DeviceRecord>, Outcome> {
        self.store.read().await.map_err(|e| {
            error!("Refusing to modify device list: {}", e);
            Outcome::fail("Failed to load devices")
        })
    }

    pub async fn save_all(&self, records: &[DeviceRecord]) -> bool {
        match self.store.write(records).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to save device list: {}", e);
                false
            }
        }
    }

    /// Append a new device, stamping its timestamps and marking it online.
    pub async fn add(&self, mut record: DeviceRecord) -> Outcome {
        let mut devices = match self.load_for_update().await {
            Ok(devices) => devices,
            Err(outcome) => return outcome,
        };

        if devices.iter().any(|d| d.id == record.id) {
            let rejection = RegistryError::DuplicateId(record.id);
            warn!("Rejected add: {}", rejection);
            return Outcome::fail(rejection.to_string());
        }

        let now = Timestamp::now();
        record.added_at = Some(now.clone());
        record.last_seen = Some(now);
        record.status = DeviceStatus::Online;
        let id = record.id.clone();
        devices.push(record);

        if self.save_all(&devices).await {
            info!("Added device {}", id);
            Outcome::ok("Device added successfully")
        } else {
            Outcome::fail("Failed to save device")
        }
    }

    pub async fn remove(&self, id: &str) -> Outcome {
        let mut devices = match self.load_for_update().await {
            Ok(devices) => devices,
            Err(outcome) => return outcome,
        };
        let before = devices.len();
        devices.retain(|d| d.id != id);

        if devices.len() == before {
            let rejection = RegistryError::NotFound(id.to_string());
            warn!("Rejected remove: {}", rejection);
            return Outcome::fail(rejection.to_string());
        }

        if self.save_all(&devices).await {
            info!("Removed device {}", id);
            Outcome::ok("Device removed successfully")
        } else {
            Outcome::fail("Failed to save changes")
        }
    }

    pub async fn render_summary(&self) -> String {
        render_summary(&self.load_all().await)
    }
}

/// Human-readable enumeration of `devices`, one block per record.
pub fn render_summary(devices: &[DeviceRecord]) -> String {
    if devices.is_empty() {
        return NO_DEVICES.to_string();
    }

    let mut text = String::from("📱 Connected devices:\n\n");
    for (i, device) in devices.iter().enumerate() {
        let last_seen = device
            .last_seen
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "unknown".to_string());
        text.push_str(&format!(
            "{}. {} {}\n   🆔 ID: {}\n   📍 IP: {}\n   ⏰ Last seen: {}\n\n",
            i + 1,
            device.status.glyph(),
            display_name(device),
            device.id,
            or_unknown(&device.ip),
            last_seen,
        ));
    }
    text
}

/// One line per device: glyph, name and id.  Used when the operator has to
/// pick a device.
pub fn render_selection(devices: &[DeviceRecord]) -> String {
    if devices.is_empty() {
        return NO_DEVICES.to_string();
    }
    devices
        .iter()
        .map(|d| format!("{} {} [{}]", d.status.glyph(), display_name(d), d.id))
        .collect::<Vec<_>>()
        .join("\n")
}

fn display_name(device: &DeviceRecord) -> &str {
    if device.name.is_empty() {
        "Unknown device"
    } else {
        &device.name
    }
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() {
        "unknown"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonFileStore;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tempfile::TempDir;

    async fn registry() -> (TempDir, DeviceRegistry<JsonFileStore>) {
        let dir = tempfile::tempdir().unwrap();
        let registry = DeviceRegistry::new(JsonFileStore::new(dir.path().join("devices.json")));
        registry.ensure_initialized().await.unwrap();
        (dir, registry)
    }

    fn ids(records: &[DeviceRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[tokio::test]
    async fn ensure_initialized_is_idempotent() {
        let (dir, registry) = registry().await;
        registry
            .add(DeviceRecord::new("dev-1", "Pixel", "10.0.0.5"))
            .await;
        let before = std::fs::read(dir.path().join("devices.json")).unwrap();

        for _ in 0..3 {
            registry.ensure_initialized().await.unwrap();
        }

        let after = std::fs::read(dir.path().join("devices.json")).unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn add_stamps_and_marks_online() {
        let (_dir, registry) = registry().await;
        let mut record = DeviceRecord::new("dev-1", "Pixel", "10.0.0.5");
        record.status = DeviceStatus::Offline;

        let outcome = registry.add(record).await;
        assert_eq!(outcome, Outcome::ok("Device added successfully"));

        let stored = &registry.load_all().await[0];
        assert_eq!(stored.status, DeviceStatus::Online);
        assert!(stored.added_at.is_some());
        assert_eq!(stored.added_at, stored.last_seen);
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected_and_original_kept() {
        let (_dir, registry) = registry().await;
        assert!(registry.add(DeviceRecord::new("dev-1", "A", "10.0.0.1")).await.success);
        let original = registry.load_all().await;

        let outcome = registry.add(DeviceRecord::new("dev-1", "B", "10.0.0.2")).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("already exists"));

        let after = registry.load_all().await;
        assert_eq!(after, original);
        assert_eq!(after.iter().filter(|d| d.id == "dev-1").count(), 1);
        assert_eq!(after[0].name, "A");
    }

    #[tokio::test]
    async fn add_then_remove_restores_previous_collection() {
        let (_dir, registry) = registry().await;
        registry.add(DeviceRecord::new("keep", "Old", "10.0.0.9")).await;
        let before = registry.load_all().await;

        assert!(registry.add(DeviceRecord::new("dev-1", "Pixel", "10.0.0.5")).await.success);
        let outcome = registry.remove("dev-1").await;
        assert_eq!(outcome, Outcome::ok("Device removed successfully"));

        assert_eq!(registry.load_all().await, before);
    }

    #[tokio::test]
    async fn removing_unknown_id_reports_not_found() {
        let (_dir, registry) = registry().await;
        let outcome = registry.remove("ghost-id").await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("not found"));
        assert!(registry.load_all().await.is_empty());
    }

    #[tokio::test]
    async fn insertion_order_is_preserved() {
        let (_dir, registry) = registry().await;
        for id in ["a", "b", "c"] {
            assert!(registry.add(DeviceRecord::new(id, id, "10.0.0.1")).await.success);
        }
        assert_eq!(ids(&registry.load_all().await), ["a", "b", "c"]);

        registry.remove("b").await;
        assert_eq!(ids(&registry.load_all().await), ["a", "c"]);
    }

    #[tokio::test]
    async fn corrupted_document_reads_as_empty() {
        let (dir, registry) = registry().await;
        registry.add(DeviceRecord::new("a", "A", "10.0.0.1")).await;
        std::fs::write(dir.path().join("devices.json"), "[{\"id\": \"a\", \"na").unwrap();

        assert!(registry.load_all().await.is_empty());
        assert_eq!(registry.render_summary().await, NO_DEVICES);
    }

    #[tokio::test]
    async fn mutations_leave_unreadable_document_untouched() {
        let (dir, registry) = registry().await;
        let path = dir.path().join("devices.json");
        let damaged = "[{\"id\": \"a\", \"na";
        std::fs::write(&path, damaged).unwrap();

        let outcome = registry.add(DeviceRecord::new("b", "B", "10.0.0.2")).await;
        assert_eq!(outcome, Outcome::fail("Failed to load devices"));
        let outcome = registry.remove("a").await;
        assert_eq!(outcome, Outcome::fail("Failed to load devices"));

        assert_eq!(std::fs::read_to_string(&path).unwrap(), damaged);
    }

    #[tokio::test]
    async fn document_written_by_older_tool_is_kept() {
        let (dir, registry) = registry().await;
        let path = dir.path().join("devices.json");
        std::fs::write(
            &path,
            json!([
                {
                    "id": "dev-1",
                    "name": "Pixel",
                    "ip": "10.0.0.5",
                    "status": "online",
                    "added_at": "2024-05-01T10:00:00.123456",
                    "last_seen": "2024-05-01T10:00:00.123456"
                },
                {"id": "dev-2", "name": null, "ip": null}
            ])
            .to_string(),
        )
        .unwrap();

        let loaded = registry.load_all().await;
        assert_eq!(ids(&loaded), ["dev-1", "dev-2"]);
        assert_eq!(loaded[1].status, DeviceStatus::Offline);

        let summary = registry.render_summary().await;
        assert!(summary.contains("1. 🟢 Pixel\n"));
        assert!(summary.contains("⏰ Last seen: 2024-05-01T10:00:00\n"));
        assert!(summary.contains("2. 🔴 Unknown device\n"));

        assert!(registry.add(DeviceRecord::new("dev-3", "Tab", "10.0.0.7")).await.success);
        assert!(registry.remove("dev-2").await.success);

        let stored: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored.as_array().unwrap().len(), 2);
        assert_eq!(stored[0]["id"], "dev-1");
        assert_eq!(stored[0]["added_at"], "2024-05-01T10:00:00.123456");
        assert_eq!(stored[0]["last_seen"], "2024-05-01T10:00:00.123456");
        assert_eq!(stored[1]["id"], "dev-3");
    }

    #[tokio::test]
    async fn failed_save_is_reported() {
        let (dir, registry) = registry().await;
        registry.add(DeviceRecord::new("a", "A", "10.0.0.1")).await;
        // A directory in the temp file's place makes every write fail.
        std::fs::create_dir(dir.path().join("devices.json.tmp")).unwrap();

        assert!(!registry.save_all(&[]).await);
        let outcome = registry.add(DeviceRecord::new("b", "B", "10.0.0.2")).await;
        assert_eq!(outcome, Outcome::fail("Failed to save device"));
        let outcome = registry.remove("a").await;
        assert_eq!(outcome, Outcome::fail("Failed to save changes"));
        assert_eq!(ids(&registry.load_all().await), ["a"]);
    }

    #[tokio::test]
    async fn out_of_band_fields_are_preserved() {
        let (dir, registry) = registry().await;
        let path = dir.path().join("devices.json");
        std::fs::write(
            &path,
            json!([{"id": "x", "name": "Lab", "ip": "10.1.1.1", "status": "offline", "owner": "ops"}])
                .to_string(),
        )
        .unwrap();

        registry.add(DeviceRecord::new("y", "New", "10.1.1.2")).await;

        let stored: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored[0]["owner"], "ops");
        assert_eq!(stored[1]["id"], "y");
    }

    #[test]
    fn summary_of_empty_list_is_fixed_message() {
        assert_eq!(render_summary(&[]), "No devices connected.");
        assert_eq!(render_selection(&[]), "No devices connected.");
    }

    #[test]
    fn summary_lists_each_device_with_status_glyph() {
        let mut online = DeviceRecord::new("dev-1", "Pixel", "10.0.0.5");
        online.status = DeviceStatus::Online;
        online.last_seen = Some(Utc.with_ymd_and_hms(2026, 10, 1, 12, 30, 0).unwrap().into());
        let offline = DeviceRecord::new("dev-2", "", "");

        let text = render_summary(&[online, offline]);
        assert_eq!(
            text,
            "📱 Connected devices:\n\n\
             1. 🟢 Pixel\n   🆔 ID: dev-1\n   📍 IP: 10.0.0.5\n   ⏰ Last seen: 2026-10-01T12:30:00Z\n\n\
             2. 🔴 Unknown device\n   🆔 ID: dev-2\n   📍 IP: unknown\n   ⏰ Last seen: unknown\n\n"
        );
    }

    #[test]
    fn selection_lists_one_line_per_device() {
        let devices = [
            DeviceRecord::new("a", "Alpha", "10.0.0.1"),
            DeviceRecord::new("b", "Beta", "10.0.0.2"),
        ];
        assert_eq!(render_selection(&devices), "🔴 Alpha [a]\n🔴 Beta [b]");
    }
}
