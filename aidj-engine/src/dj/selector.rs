//! Track selection
//!
//! Narrowing order for a mood change:
//!
//! 1. Tracks curated for the mood; the full catalog if none are curated
//! 2. Energy band: high energy keeps fast tracks, low energy keeps slow ones
//! 3. If the band emptied the set, go back to the step 1 set
//! 4. Drop the currently playing track when more than one candidate remains
//! 5. Uniform random pick
//!
//! Mood correctness outranks energy precision, which outranks novelty.
//! Phase and cue selection reuse steps 2-5 over a style-narrowed base set.

use aidj_common::config::SelectorConfig;
use aidj_common::models::{EventPhase, Mood, Track, TrackId};
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use tracing::debug;

use crate::catalog::CatalogSnapshot;

/// Pure track selection with configurable thresholds
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackSelector {
    config: SelectorConfig,
}

impl TrackSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Pick the next track for a crowd mood
    ///
    /// Returns `None` only when the catalog is empty.
    pub fn select_next<R: Rng + ?Sized>(
        &self,
        mood: Mood,
        energy: u8,
        catalog: &CatalogSnapshot,
        exclude: Option<&TrackId>,
        rng: &mut R,
    ) -> Option<Arc<Track>> {
        let mut base = catalog.curated(mood);
        if base.is_empty() {
            debug!("No tracks curated for {}, using full catalog", mood);
            base = catalog.tracks().to_vec();
        }
        self.narrow_and_pick(base, energy, exclude, rng)
    }

    /// Pick a track suited to an event phase
    ///
    /// The base set is tracks whose genre matches the phase's music style,
    /// else tracks curated for the mood the style suggests, else the full
    /// catalog. The energy band then uses the phase's energy target.
    pub fn select_for_phase<R: Rng + ?Sized>(
        &self,
        phase: &EventPhase,
        catalog: &CatalogSnapshot,
        exclude: Option<&TrackId>,
        rng: &mut R,
    ) -> Option<Arc<Track>> {
        let base = style_candidates(&phase.music_style, catalog);
        self.narrow_and_pick(base, phase.energy_target, exclude, rng)
    }

    /// Resolve a moment's music cue
    ///
    /// A cue names a track id, else a style or genre, else a title/artist
    /// search term.
    pub fn resolve_cue<R: Rng + ?Sized>(
        &self,
        cue: &str,
        catalog: &CatalogSnapshot,
        exclude: Option<&TrackId>,
        rng: &mut R,
    ) -> Option<Arc<Track>> {
        let cue = cue.trim();
        if cue.is_empty() {
            return None;
        }
        if let Some(track) = catalog.get(&TrackId::new(cue)) {
            return Some(Arc::clone(track));
        }

        let mut candidates = catalog.by_genre(cue);
        if candidates.is_empty() {
            if let Some(mood) = style_mood(cue) {
                candidates = catalog.curated(mood);
            }
        }
        if candidates.is_empty() {
            candidates = catalog.search(cue);
        }
        if candidates.is_empty() {
            debug!("Music cue '{}' matched nothing in the catalog", cue);
            return None;
        }
        pick(without_current(candidates, exclude), rng)
    }

    /// Steps 2-5 over an already narrowed base set (empty base = full catalog
    /// was empty)
    fn narrow_and_pick<R: Rng + ?Sized>(
        &self,
        base: Vec<Arc<Track>>,
        energy: u8,
        exclude: Option<&TrackId>,
        rng: &mut R,
    ) -> Option<Arc<Track>> {
        if base.is_empty() {
            return None;
        }

        let banded: Vec<Arc<Track>> = base
            .iter()
            .filter(|t| self.in_energy_band(t, energy))
            .cloned()
            .collect();
        let candidates = if banded.is_empty() {
            debug!("Energy band {} emptied the candidates, ignoring energy", energy);
            base
        } else {
            banded
        };

        pick(without_current(candidates, exclude), rng)
    }

    /// Whether a track fits the band implied by `energy`
    pub fn in_energy_band(&self, track: &Track, energy: u8) -> bool {
        let c = &self.config;
        if energy > c.high_energy_threshold {
            track.bpm >= c.bpm_split
        } else if energy < c.low_energy_threshold {
            track.bpm <= c.bpm_split
        } else {
            true
        }
    }
}

fn without_current(mut candidates: Vec<Arc<Track>>, exclude: Option<&TrackId>) -> Vec<Arc<Track>> {
    if let Some(current) = exclude {
        if candidates.len() > 1 {
            candidates.retain(|t| &t.id != current);
        }
    }
    candidates
}

fn pick<R: Rng + ?Sized>(candidates: Vec<Arc<Track>>, rng: &mut R) -> Option<Arc<Track>> {
    candidates.choose(rng).cloned()
}

fn style_candidates(style: &str, catalog: &CatalogSnapshot) -> Vec<Arc<Track>> {
    let by_genre = catalog.by_genre(style);
    if !by_genre.is_empty() {
        return by_genre;
    }
    if let Some(mood) = style_mood(style) {
        let curated = catalog.curated(mood);
        if !curated.is_empty() {
            return curated;
        }
    }
    catalog.tracks().to_vec()
}

/// Mood a music style suggests
///
/// Mood names are accepted as styles directly.
pub fn style_mood(style: &str) -> Option<Mood> {
    let style = style.trim().to_lowercase();
    if let Ok(mood) = style.parse::<Mood>() {
        return Some(mood);
    }
    let mood = match style.as_str() {
        "lounge" | "jazz" | "acoustic" | "ambient" | "bossa nova" | "classical" | "downtempo" => {
            Mood::Chill
        }
        "dance" | "edm" | "house" | "techno" | "party" | "disco" | "club" => Mood::Energetic,
        "ballad" | "slow" | "love songs" | "rnb" | "soul" => Mood::Romantic,
        "pop" | "upbeat" | "funk" | "motown" => Mood::Happy,
        "rock" | "anthem" | "anthems" | "hype" | "hip hop" | "hip-hop" => Mood::Excited,
        "blues" | "folk" | "indie" => Mood::Melancholic,
        _ => return None,
    };
    Some(mood)
}
