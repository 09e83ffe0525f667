//! Track catalog
//!
//! The catalog is the sole owner of [`Track`]s. It only grows: tracks can be
//! added but existing entries are never replaced or mutated. Readers take an
//! immutable [`CatalogSnapshot`] (an `Arc` clone), so selection never holds a
//! lock while it runs.

use aidj_common::models::{Mood, Track, TrackId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use crate::collaborators::TrackCatalogProvider;
use crate::error::CatalogError;

/// Point-in-time view of the catalog
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    tracks: Vec<Arc<Track>>,
    by_id: HashMap<TrackId, usize>,
    curated: HashMap<Mood, Vec<usize>>,
}

impl CatalogSnapshot {
    pub fn tracks(&self) -> &[Arc<Track>] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, id: &TrackId) -> Option<&Arc<Track>> {
        self.by_id.get(id).map(|&i| &self.tracks[i])
    }

    /// Tracks explicitly curated for `mood` (empty if none)
    pub fn curated(&self, mood: Mood) -> Vec<Arc<Track>> {
        self.curated
            .get(&mood)
            .map(|idx| idx.iter().map(|&i| Arc::clone(&self.tracks[i])).collect())
            .unwrap_or_default()
    }

    /// Tracks whose genre equals `genre`, case-insensitively
    pub fn by_genre(&self, genre: &str) -> Vec<Arc<Track>> {
        let genre = genre.trim();
        self.tracks
            .iter()
            .filter(|t| !genre.is_empty() && t.genre.eq_ignore_ascii_case(genre))
            .cloned()
            .collect()
    }

    pub fn search(&self, query: &str) -> Vec<Arc<Track>> {
        self.tracks
            .iter()
            .filter(|t| t.matches_query(query))
            .cloned()
            .collect()
    }

    /// Number of tracks curated per mood
    pub fn curation_counts(&self) -> HashMap<Mood, usize> {
        self.curated.iter().map(|(m, idx)| (*m, idx.len())).collect()
    }
}

/// Grow-only track catalog shared by the selector loops
#[derive(Debug, Default)]
pub struct TrackCatalog {
    current: RwLock<Arc<CatalogSnapshot>>,
}

impl TrackCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tracks(tracks: impl IntoIterator<Item = Track>) -> Self {
        let catalog = Self::new();
        for track in tracks {
            catalog.add(track);
        }
        catalog
    }

    /// Current immutable view
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(|e| e.into_inner()))
    }

    fn update<R>(&self, f: impl FnOnce(&mut CatalogSnapshot) -> R) -> R {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let mut next = CatalogSnapshot::clone(&guard);
        let result = f(&mut next);
        *guard = Arc::new(next);
        result
    }

    /// Add a track; returns false (and keeps the existing entry) when the id is taken
    pub fn add(&self, track: Track) -> bool {
        self.update(|snapshot| {
            if snapshot.by_id.contains_key(&track.id) {
                debug!("Track {} already in catalog, keeping existing entry", track.id);
                return false;
            }
            snapshot.by_id.insert(track.id.clone(), snapshot.tracks.len());
            snapshot.tracks.push(Arc::new(track));
            true
        })
    }

    /// Curate known tracks for `mood`
    ///
    /// Unknown ids and ids already curated for the mood are skipped. Returns
    /// the number of tracks newly curated.
    pub fn curate<'a>(&self, mood: Mood, ids: impl IntoIterator<Item = &'a TrackId>) -> usize {
        let ids: Vec<&TrackId> = ids.into_iter().collect();
        self.update(|snapshot| {
            let mut added = 0;
            for id in ids {
                let Some(&index) = snapshot.by_id.get(id) else {
                    warn!("Cannot curate unknown track {} for mood {}", id, mood);
                    continue;
                };
                let list = snapshot.curated.entry(mood).or_default();
                if !list.contains(&index) {
                    list.push(index);
                    added += 1;
                }
            }
            added
        })
    }

    pub fn get(&self, id: &TrackId) -> Option<Arc<Track>> {
        self.snapshot().get(id).cloned()
    }

    pub fn search(&self, query: &str) -> Vec<Arc<Track>> {
        self.snapshot().search(query)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Load every track and every mood curation list from a provider
    ///
    /// Returns the number of tracks added. A failing curation lookup for one
    /// mood is logged and skipped.
    pub async fn populate(&self, provider: &dyn TrackCatalogProvider) -> Result<usize, CatalogError> {
        let mut added = 0;
        for track in provider.list(None).await? {
            if self.add(track) {
                added += 1;
            }
        }

        for mood in Mood::ALL {
            match provider.curated(mood).await {
                Ok(tracks) => {
                    for track in &tracks {
                        if self.add(track.clone()) {
                            added += 1;
                        }
                    }
                    let curated = self.curate(mood, tracks.iter().map(|t| &t.id));
                    debug!("Curated {} tracks for mood {}", curated, mood);
                }
                Err(e) => warn!("Curation lookup for mood {} failed: {}", mood, e),
            }
        }

        info!("Catalog populated: {} tracks added, {} total", added, self.len());
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::FileCatalogProvider;

    fn track(id: &str, bpm: u32) -> Track {
        Track {
            id: TrackId::new(id),
            title: format!("Track {}", id),
            artist: "Artist".to_string(),
            duration_sec: 180,
            bpm,
            genre: "pop".to_string(),
            source_ref: String::new(),
            license: Default::default(),
        }
    }

    #[test]
    fn test_catalog_is_grow_only() {
        let catalog = TrackCatalog::new();
        assert!(catalog.add(track("a", 120)));
        let mut replacement = track("a", 60);
        replacement.title = "Impostor".to_string();
        assert!(!catalog.add(replacement));

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(&TrackId::new("a")).unwrap().bpm, 120);
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_growth() {
        let catalog = TrackCatalog::from_tracks(vec![track("a", 120)]);
        let before = catalog.snapshot();
        catalog.add(track("b", 130));
        assert_eq!(before.len(), 1);
        assert_eq!(catalog.snapshot().len(), 2);
    }

    #[test]
    fn test_curate_skips_unknown_and_duplicates() {
        let catalog = TrackCatalog::from_tracks(vec![track("a", 120), track("b", 140)]);
        let ids = [TrackId::new("a"), TrackId::new("zzz"), TrackId::new("a")];
        assert_eq!(catalog.curate(Mood::Happy, ids.iter()), 1);
        let curated = catalog.snapshot().curated(Mood::Happy);
        assert_eq!(curated.len(), 1);
        assert!(catalog.snapshot().curated(Mood::Chill).is_empty());
    }

    #[tokio::test]
    async fn test_populate_from_provider() {
        let provider = FileCatalogProvider::from_json(
            r#"{
                "tracks": [
                    {"id":"a","title":"A","artist":"X","durationSec":1,"bpm":140},
                    {"id":"b","title":"B","artist":"X","durationSec":1,"bpm":90}
                ],
                "curated": {"excited": ["a"], "chill": ["b"]}
            }"#,
        )
        .unwrap();

        let catalog = TrackCatalog::new();
        assert_eq!(catalog.populate(&provider).await.unwrap(), 2);
        let snapshot = catalog.snapshot();
        assert_eq!(snapshot.curated(Mood::Excited)[0].id, TrackId::new("a"));
        assert_eq!(snapshot.curated(Mood::Chill)[0].id, TrackId::new("b"));
    }
}
