//! Spoken announcement requests

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Announcement urgency, highest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Immediate,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Sort rank: lower is spoken first
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Immediate => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// `Immediate > High > Medium > Low`
impl Ord for Priority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.rank().cmp(&self.rank())
    }
}

/// Which producer created the announcement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Ai,
    Vip,
    System,
    Manual,
}

/// A request to speak a line of text
///
/// Consumed exactly once by the announcement processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnouncementRequest {
    pub id: Uuid,
    pub text: String,
    pub priority: Priority,
    pub origin: Origin,
    pub enqueued_at: DateTime<Utc>,
}

impl AnnouncementRequest {
    pub fn new(text: impl Into<String>, priority: Priority, origin: Origin) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            priority,
            origin,
            enqueued_at: Utc::now(),
        }
    }

    /// Override the enqueue timestamp (replayed or externally timed requests)
    pub fn with_enqueued_at(mut self, at: DateTime<Utc>) -> Self {
        self.enqueued_at = at;
        self
    }
}

/// How an announcement left the queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnnouncementOutcome {
    /// Played to completion by the named engine
    Spoken { engine: String },
    /// Stopped by `cancel_current`
    Cancelled,
    /// Never played (all engines failed, queue cleared, session stopped)
    Dropped { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Immediate > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);

        let mut all = vec![Priority::Low, Priority::Immediate, Priority::Medium, Priority::High];
        all.sort_by_key(|p| p.rank());
        assert_eq!(
            all,
            vec![Priority::Immediate, Priority::High, Priority::Medium, Priority::Low]
        );
    }

    #[test]
    fn test_new_request_has_unique_id() {
        let a = AnnouncementRequest::new("one", Priority::Low, Origin::Manual);
        let b = AnnouncementRequest::new("one", Priority::Low, Origin::Manual);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_string(&AnnouncementOutcome::Spoken {
            engine: "local".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"kind":"spoken","engine":"local"}"#);
    }
}
