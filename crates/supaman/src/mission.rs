//! Core mission types for supaman.
//!
//! A [`Mission`] is the single record type held by the backend. The client
//! never mutates one; it only reads them, creates new ones from a
//! [`NewMission`], and hears about inserts over the realtime feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Backend-assigned mission identifier.
///
/// The primary key may be a bigint or a uuid depending on how the table was
/// created, so the id is held as its canonical string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MissionId(String);

impl MissionId {
    /// Create an id from its string form.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for MissionId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for MissionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for MissionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(id) => Self::from(id),
            RawId::Text(id) => Self(id),
        })
    }
}

/// Lifecycle tag of a mission.
///
/// This client only ever creates [`MissionStatus::Pending`]; every other
/// value comes from the server. Unknown tags are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MissionStatus {
    /// Newly dispatched.
    #[default]
    Pending,
    /// A hero is on it.
    Active,
    /// Done.
    Completed,
    /// Abandoned or failed.
    Failed,
    /// Any tag this client does not know.
    Other(String),
}

impl MissionStatus {
    /// The wire form of this status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for MissionStatus {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "pending" => Self::Pending,
            "active" => Self::Active,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Other(tag),
        }
    }
}

impl From<MissionStatus> for String {
    fn from(status: MissionStatus) -> Self {
        match status {
            MissionStatus::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mission record as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mission {
    /// Unique identifier (assigned by the backend).
    pub id: MissionId,

    /// Display title.
    pub title: String,

    /// Free-text details; a SQL `NULL` reads as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,

    /// Lifecycle tag.
    #[serde(default)]
    pub status: MissionStatus,

    /// When the backend stored the record.
    pub created_at: DateTime<Utc>,
}

/// The fields submitted when dispatching a new mission.
///
/// `id` and `created_at` are assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMission {
    /// Display title; callers must ensure it is non-empty.
    pub title: String,
    /// Free-text details.
    pub description: String,
    /// Initial status.
    pub status: MissionStatus,
}

impl NewMission {
    /// Create a pending mission.
    #[must_use]
    pub fn pending(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            status: MissionStatus::Pending,
        }
    }

    /// Turn this payload into a stored record.
    #[must_use]
    pub fn into_mission(self, id: MissionId, created_at: DateTime<Utc>) -> Mission {
        Mission {
            id,
            title: self.title,
            description: self.description,
            status: self.status,
            created_at,
        }
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
