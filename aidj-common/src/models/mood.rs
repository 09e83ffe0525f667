//! Crowd mood categories and sampled mood snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Confidence assigned when the vision response could not be interpreted
pub const FALLBACK_CONFIDENCE: u8 = 20;

/// Categorical crowd mood
///
/// Parsing is case-insensitive, so comparing two `Mood` values is a
/// case-insensitive comparison of the labels they were read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Excited,
    Happy,
    Energetic,
    Chill,
    Romantic,
    Melancholic,
    #[default]
    Neutral,
}

impl Mood {
    pub const ALL: [Mood; 7] = [
        Mood::Excited,
        Mood::Happy,
        Mood::Energetic,
        Mood::Chill,
        Mood::Romantic,
        Mood::Melancholic,
        Mood::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Excited => "excited",
            Mood::Happy => "happy",
            Mood::Energetic => "energetic",
            Mood::Chill => "chill",
            Mood::Romantic => "romantic",
            Mood::Melancholic => "melancholic",
            Mood::Neutral => "neutral",
        }
    }

    /// Fixed emotion → mood lookup table for vision analysis labels
    ///
    /// Accepts both mood names and the emotion vocabulary vision models
    /// commonly return. Returns `None` for anything else.
    pub fn from_emotion(label: &str) -> Option<Mood> {
        let mood = match label.trim().to_lowercase().as_str() {
            "excited" | "surprise" | "surprised" | "thrilled" | "ecstatic" => Mood::Excited,
            "happy" | "joy" | "joyful" | "cheerful" | "smiling" | "laughing" => Mood::Happy,
            "energetic" | "dancing" | "hype" | "hyped" | "party" | "pumped" => Mood::Energetic,
            "chill" | "calm" | "relaxed" | "peaceful" | "content" => Mood::Chill,
            "romantic" | "love" | "loving" | "tender" | "intimate" => Mood::Romantic,
            "melancholic" | "sad" | "sadness" | "bored" | "tired" | "fear" => Mood::Melancholic,
            "neutral" | "mixed" => Mood::Neutral,
            _ => return None,
        };
        Some(mood)
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mood::ALL
            .iter()
            .copied()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown mood '{}'", s))
    }
}

/// One successful crowd analysis
///
/// Superseded (never merged) by the next sample. `energy` and `confidence`
/// are always within 0-100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodSample {
    pub mood: Mood,
    pub energy: u8,
    pub crowd_size: u32,
    pub confidence: u8,
    pub sampled_at: DateTime<Utc>,
}

impl MoodSample {
    /// Build a sample, clamping energy and confidence into 0-100
    pub fn new(
        mood: Mood,
        energy: f64,
        crowd_size: i64,
        confidence: f64,
        sampled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            mood,
            energy: clamp_percent(energy),
            crowd_size: crowd_size.max(0).min(u32::MAX as i64) as u32,
            confidence: clamp_percent(confidence),
            sampled_at,
        }
    }

    /// Build a sample from a raw vision label
    ///
    /// Unknown labels fall back to a neutral mood with low confidence
    /// rather than failing the cycle.
    pub fn from_analysis(
        label: &str,
        energy: f64,
        crowd_size: i64,
        confidence: f64,
        sampled_at: DateTime<Utc>,
    ) -> Self {
        match Mood::from_emotion(label) {
            Some(mood) => Self::new(mood, energy, crowd_size, confidence, sampled_at),
            None => Self::new(
                Mood::Neutral,
                energy,
                crowd_size,
                confidence.min(FALLBACK_CONFIDENCE as f64),
                sampled_at,
            ),
        }
    }
}

fn clamp_percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("EXCITED".parse::<Mood>().unwrap(), Mood::Excited);
        assert_eq!(" Chill ".parse::<Mood>().unwrap(), Mood::Chill);
        assert!("grumpy".parse::<Mood>().is_err());
    }

    #[test]
    fn test_emotion_lookup() {
        assert_eq!(Mood::from_emotion("Joy"), Some(Mood::Happy));
        assert_eq!(Mood::from_emotion("surprise"), Some(Mood::Excited));
        assert_eq!(Mood::from_emotion("calm"), Some(Mood::Chill));
        assert_eq!(Mood::from_emotion("sad"), Some(Mood::Melancholic));
        assert_eq!(Mood::from_emotion("{not json"), None);
    }

    #[test]
    fn test_sample_clamps_ranges() {
        let s = MoodSample::new(Mood::Happy, 140.0, -3, -5.0, Utc::now());
        assert_eq!(s.energy, 100);
        assert_eq!(s.confidence, 0);
        assert_eq!(s.crowd_size, 0);

        let s = MoodSample::new(Mood::Happy, f64::NAN, 12, 88.4, Utc::now());
        assert_eq!(s.energy, 0);
        assert_eq!(s.confidence, 88);
        assert_eq!(s.crowd_size, 12);
    }

    #[test]
    fn test_unknown_label_falls_back_to_neutral_low_confidence() {
        let s = MoodSample::from_analysis("confused-robot", 70.0, 40, 95.0, Utc::now());
        assert_eq!(s.mood, Mood::Neutral);
        assert_eq!(s.confidence, FALLBACK_CONFIDENCE);
        assert_eq!(s.energy, 70);
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Mood::Romantic).unwrap(), "\"romantic\"");
        let m: Mood = serde_json::from_str("\"energetic\"").unwrap();
        assert_eq!(m, Mood::Energetic);
    }
}
