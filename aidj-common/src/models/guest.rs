//! VIP guest roster entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Roster-assigned guest identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestId(pub String);

impl GuestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for GuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role of a VIP at the event, drives announcement phrasing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VipRole {
    Host,
    GuestOfHonor,
    Performer,
    Family,
    Sponsor,
    #[default]
    #[serde(other)]
    Guest,
}

/// A guest the DJ should recognize
///
/// `recognition_count` and `last_seen` are mutated only by the recognition
/// handler; the count never decreases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VipGuest {
    pub id: GuestId,
    pub name: String,
    #[serde(default)]
    pub role: VipRole,
    /// Reference image handed to the face-recognition collaborator
    #[serde(default)]
    pub reference_image: String,
    #[serde(default)]
    pub recognition_count: u32,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

impl VipGuest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: VipRole) -> Self {
        Self {
            id: GuestId::new(id),
            name: name.into(),
            role,
            reference_image: String::new(),
            recognition_count: 0,
            last_seen: None,
        }
    }
}

/// One face match produced by the recognition sampler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VipRecognitionEvent {
    pub guest_id: GuestId,
    pub confidence: u8,
    pub seen_at: DateTime<Utc>,
}
