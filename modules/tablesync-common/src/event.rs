//! Events exchanged between rules.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::types::Version;

/// Identifies a logical table (`group`) and a record within it (`id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedId {
    pub group: String,
    pub id: String,
}

impl QualifiedId {
    pub fn new(group: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for QualifiedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.id)
    }
}

/// What an event carries.
#[derive(Debug, Clone)]
pub enum EventData {
    /// A parsed payload published by an event source.
    Payload(serde_json::Value),
    /// The table addressed by the event was committed.
    UpdateCompleted,
    /// Something failed while handling the originating event or version.
    ErrorOccurred(Arc<SyncError>),
}

impl EventData {
    pub fn kind(&self) -> &'static str {
        match self {
            EventData::Payload(_) => "payload",
            EventData::UpdateCompleted => "update_completed",
            EventData::ErrorOccurred(_) => "error_occurred",
        }
    }
}

/// Immutable fact flowing through the rule graph.
///
/// Cloning is cheap enough for fan-out: errors sit behind an `Arc` and
/// payloads are usually small JSON documents.
#[derive(Debug, Clone)]
pub struct Event {
    pub qualified_id: QualifiedId,
    pub timestamp: DateTime<Utc>,
    pub data: EventData,
}

impl Event {
    pub fn new(qualified_id: QualifiedId, timestamp: DateTime<Utc>, data: EventData) -> Self {
        Self {
            qualified_id,
            timestamp,
            data,
        }
    }

    /// Event source helper: a payload event stamped with `timestamp`.
    pub fn payload(
        qualified_id: QualifiedId,
        timestamp: DateTime<Utc>,
        payload: serde_json::Value,
    ) -> Self {
        Self::new(qualified_id, timestamp, EventData::Payload(payload))
    }

    /// The table behind `version` was committed.
    pub fn update_completed(version: &Version) -> Self {
        Self::new(version.id.clone(), version.date, EventData::UpdateCompleted)
    }

    /// Failure while handling `origin`. Keeps the origin's id and timestamp.
    pub fn error_occurred(origin: &impl Origin, err: SyncError) -> Self {
        Self::new(
            origin.qualified_id().clone(),
            origin.timestamp(),
            EventData::ErrorOccurred(Arc::new(err)),
        )
    }

    /// Trigger date used to derive versions from this event.
    pub fn date(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn is_error(&self) -> bool {
        matches!(self.data, EventData::ErrorOccurred(_))
    }

    pub fn error(&self) -> Option<&SyncError> {
        match &self.data {
            EventData::ErrorOccurred(err) => Some(err.as_ref()),
            _ => None,
        }
    }

    /// True for an `UpdateCompleted` event about `id`.
    pub fn completes(&self, id: &QualifiedId) -> bool {
        matches!(self.data, EventData::UpdateCompleted) && &self.qualified_id == id
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event({}, {}, {})",
            self.qualified_id,
            self.timestamp.format("%Y-%m-%d"),
            self.data.kind()
        )?;
        if let EventData::ErrorOccurred(err) = &self.data {
            write!(f, ": {err}")?;
        }
        Ok(())
    }
}

/// Anything an error event can be attributed to.
pub trait Origin {
    fn qualified_id(&self) -> &QualifiedId;
    fn timestamp(&self) -> DateTime<Utc>;
}

impl Origin for Event {
    fn qualified_id(&self) -> &QualifiedId {
        &self.qualified_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Origin for Version {
    fn qualified_id(&self) -> &QualifiedId {
        &self.id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.date
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 3, 14, 0, 0, 0).unwrap()
    }

    #[test]
    fn error_from_version_keeps_version_coordinates() {
        let version = Version::new(QualifiedId::new("reestry", "SBER"), ts());
        let event = Event::error_occurred(&version, SyncError::DeadlineExceeded);

        assert_eq!(event.qualified_id, version.id);
        assert_eq!(event.timestamp, ts());
        assert!(event.is_error());
        assert_eq!(event.error().map(SyncError::kind), Some("deadline"));
    }

    #[test]
    fn display_includes_error_message() {
        let trigger = Event::payload(QualifiedId::new("trading", "day"), ts(), serde_json::json!({}));
        let event = Event::error_occurred(&trigger, SyncError::Cancelled);

        assert_eq!(
            event.to_string(),
            "Event(trading/day, 2022-03-14, error_occurred): event context cancelled"
        );
    }

    #[test]
    fn completes_matches_only_completion_for_same_id() {
        let id = QualifiedId::new("status", "status");
        let done = Event::update_completed(&Version::new(id.clone(), ts()));
        let other = Event::payload(id.clone(), ts(), serde_json::Value::Null);

        assert!(done.completes(&id));
        assert!(!done.completes(&QualifiedId::new("status", "other")));
        assert!(!other.completes(&id));
    }
}
