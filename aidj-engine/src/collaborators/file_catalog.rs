//! JSON file track catalog
//!
//! Accepts either a bare array of tracks or an object with explicit mood
//! curation lists:
//!
//! ```json
//! {
//!   "tracks": [{"id": "t1", "title": "...", "artist": "...", "durationSec": 200, "bpm": 128}],
//!   "curated": {"excited": ["t1"]}
//! }
//! ```

use async_trait::async_trait;
use aidj_common::models::{Mood, Track, TrackId};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use super::TrackCatalogProvider;
use crate::error::CatalogError;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Plain(Vec<Track>),
    Curated {
        tracks: Vec<Track>,
        #[serde(default)]
        curated: HashMap<Mood, Vec<TrackId>>,
    },
}

/// Track catalog provider backed by an in-memory copy of a JSON file
#[derive(Debug, Clone, Default)]
pub struct FileCatalogProvider {
    tracks: Vec<Track>,
    /// `None` when the file carries no curation section
    curated: Option<HashMap<Mood, Vec<TrackId>>>,
}

impl FileCatalogProvider {
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let provider = match serde_json::from_str(json)? {
            CatalogFile::Plain(tracks) => Self {
                tracks,
                curated: None,
            },
            CatalogFile::Curated { tracks, curated } => Self {
                tracks,
                curated: Some(curated),
            },
        };
        Ok(provider)
    }

    pub async fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = tokio::fs::read_to_string(path).await?;
        let provider = Self::from_json(&json)?;
        info!(
            "Loaded {} tracks from {}",
            provider.tracks.len(),
            path.display()
        );
        Ok(provider)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[async_trait]
impl TrackCatalogProvider for FileCatalogProvider {
    async fn list(&self, genre: Option<&str>) -> Result<Vec<Track>, CatalogError> {
        Ok(match genre {
            Some(genre) => self
                .tracks
                .iter()
                .filter(|t| t.genre.eq_ignore_ascii_case(genre))
                .cloned()
                .collect(),
            None => self.tracks.clone(),
        })
    }

    async fn search(&self, query: &str) -> Result<Vec<Track>, CatalogError> {
        Ok(self
            .tracks
            .iter()
            .filter(|t| t.matches_query(query))
            .cloned()
            .collect())
    }

    async fn curated(&self, mood: Mood) -> Result<Vec<Track>, CatalogError> {
        let Some(curated) = &self.curated else {
            return self.search(mood.as_str()).await;
        };

        let ids = curated.get(&mood).map(Vec::as_slice).unwrap_or_default();
        let mut tracks = Vec::with_capacity(ids.len());
        for id in ids {
            match self.tracks.iter().find(|t| &t.id == id) {
                Some(track) => tracks.push(track.clone()),
                None => warn!("Curated track {} for mood {} is not in the catalog", id, mood),
            }
        }
        Ok(tracks)
    }
}
