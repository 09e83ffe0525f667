//! Track catalog entries

use serde::{Deserialize, Serialize};
use std::fmt;

/// Catalog-assigned track identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Usage license of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum License {
    RoyaltyFree,
    CreativeCommons,
    Commercial,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A playable track
///
/// Immutable once loaded into the catalog; shared as `Arc<Track>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub duration_sec: u32,
    pub bpm: u32,
    #[serde(default)]
    pub genre: String,
    /// Where the playback collaborator finds the audio (URL, path, vendor id)
    #[serde(default)]
    pub source_ref: String,
    #[serde(default)]
    pub license: License,
}

impl Track {
    /// "Title by Artist" label used in logs and announcements
    pub fn label(&self) -> String {
        if self.artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} by {}", self.title, self.artist)
        }
    }

    /// Case-insensitive substring match on title, artist or genre
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return false;
        }
        self.title.to_lowercase().contains(&query)
            || self.artist.to_lowercase().contains(&query)
            || self.genre.to_lowercase().contains(&query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> Track {
        Track {
            id: TrackId::new("t1"),
            title: "Midnight City".to_string(),
            artist: "M83".to_string(),
            duration_sec: 243,
            bpm: 105,
            genre: "synthpop".to_string(),
            source_ref: "library/m83.mp3".to_string(),
            license: License::Commercial,
        }
    }

    #[test]
    fn test_deserialize_camel_case_with_defaults() {
        let json = r#"{"id":"x","title":"T","artist":"A","durationSec":200,"bpm":128}"#;
        let t: Track = serde_json::from_str(json).unwrap();
        assert_eq!(t.id, TrackId::new("x"));
        assert_eq!(t.duration_sec, 200);
        assert_eq!(t.license, License::Unknown);
        assert!(t.genre.is_empty());
    }

    #[test]
    fn test_unknown_license_maps_to_unknown() {
        let json = r#"{"id":"x","title":"T","artist":"A","durationSec":1,"bpm":1,"license":"public_domain"}"#;
        let t: Track = serde_json::from_str(json).unwrap();
        assert_eq!(t.license, License::Unknown);
    }

    #[test]
    fn test_matches_query() {
        let t = track();
        assert!(t.matches_query("midnight"));
        assert!(t.matches_query("m83"));
        assert!(t.matches_query("SYNTH"));
        assert!(!t.matches_query("jazz"));
        assert!(!t.matches_query("  "));
    }

    #[test]
    fn test_label() {
        assert_eq!(track().label(), "Midnight City by M83");
    }
}
