//! Data structures used throughout the registry.
//!
//! Device records are serialised with [`serde`](https://serde.rs/) into
//! the JSON document backing the registry.  Records are open mappings:
//! fields the registry does not know about are carried through loads and
//! saves untouched.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Reachability of a device as last recorded.
///
/// Anything other than `"online"` in the stored document reads back as
/// [`DeviceStatus::Offline`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    #[default]
    #[serde(other)]
    Offline,
}

impl DeviceStatus {
    pub fn glyph(self) -> &'static str {
        match self {
            DeviceStatus::Online => "🟢",
            DeviceStatus::Offline => "🔴",
        }
    }
}

/// A point in time as found in the stored document.
///
/// Documents written by other tools may carry offset-less ISO 8601 values
/// or free-form strings; those are kept as they are and written back
/// unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Timestamp {
    Utc(DateTime<Utc>),
    Naive(NaiveDateTime),
    Other(String),
}

const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

impl Timestamp {
    pub fn now() -> Self {
        Timestamp::Utc(Utc::now())
    }

    fn parse(raw: &str) -> Self {
        if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
            Timestamp::Utc(t.with_timezone(&Utc))
        } else if let Ok(t) = raw.parse::<NaiveDateTime>() {
            Timestamp::Naive(t)
        } else {
            Timestamp::Other(raw.to_string())
        }
    }

    fn stored_form(&self) -> String {
        match self {
            Timestamp::Utc(t) => t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Timestamp::Naive(t) => t.format(NAIVE_FORMAT).to_string(),
            Timestamp::Other(s) => s.clone(),
        }
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(t: DateTime<Utc>) -> Self {
        Timestamp::Utc(t)
    }
}

/// Second precision, for operator-facing text.
impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::Utc(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Timestamp::Naive(t) => write!(f, "{}", t.format("%Y-%m-%dT%H:%M:%S")),
            Timestamp::Other(s) => f.write_str(s),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.stored_form())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(raw) => Timestamp::parse(&raw),
            other => Timestamp::Other(other.to_string()),
        })
    }
}

/// Treats an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One remote endpoint the operator can act on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ip: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: DeviceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<Timestamp>,
    /// Caller-supplied fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ip: ip.into(),
            status: DeviceStatus::default(),
            added_at: None,
            last_seen: None,
            extra: Map::new(),
        }
    }
}

/// Result of a registry or dispatcher call as shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

impl Outcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// An operator action routed through the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Greeting with the current device count.
    Start,
    /// Full human-readable summary of every device.
    ViewDevices,
    /// Compact one-line-per-device listing used to pick a device by id.
    ListIds,
    /// Register a device.  `extra` holds any additional fields to store.
    AddDevice {
        id: String,
        name: String,
        ip: String,
        extra: Map<String, Value>,
    },
    /// Delete a device by id.
    RemoveDevice { id: String },
}
