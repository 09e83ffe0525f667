//! Authored event timeline: phases and special moments

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::time::{hhmm, minute_of};
use crate::{Error, Result};

const SECONDS_PER_DAY: u32 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Arrival,
    Cocktail,
    Dinner,
    Speeches,
    Dancing,
    Finale,
    #[default]
    #[serde(other)]
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MomentKind {
    Entrance,
    CakeCutting,
    FirstDance,
    Toast,
    Speech,
    Countdown,
    #[default]
    #[serde(other)]
    Custom,
}

/// A segment of the event with a target energy and music style
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPhase {
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub phase_kind: PhaseKind,
    pub energy_target: u8,
    pub music_style: String,
    pub duration_min: u32,
}

impl EventPhase {
    /// Whether `now` falls inside `[time, time + duration_min)`
    ///
    /// Windows that run past midnight wrap into the next day.
    pub fn contains(&self, now: NaiveTime) -> bool {
        let start = self.time.num_seconds_from_midnight();
        let len = self.duration_min.saturating_mul(60);
        if len == 0 {
            return false;
        }
        if len >= SECONDS_PER_DAY {
            return true;
        }
        let now = now.num_seconds_from_midnight();
        let end = start + len;
        if end <= SECONDS_PER_DAY {
            now >= start && now < end
        } else {
            now >= start || now < end - SECONDS_PER_DAY
        }
    }
}

/// A one-time scheduled cue
///
/// `triggered` is the only mutable field and is owned by the timeline
/// coordinator; it flips false → true exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialMoment {
    pub id: String,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub moment_kind: MomentKind,
    pub description: String,
    #[serde(default)]
    pub music_cue: Option<String>,
    #[serde(default)]
    pub announcement_template: Option<String>,
    #[serde(default)]
    pub triggered: bool,
}

impl SpecialMoment {
    /// Whether the moment is scheduled for the wall-clock minute of `now`
    pub fn is_due(&self, now: NaiveTime) -> bool {
        minute_of(self.time) == minute_of(now)
    }
}

/// The authored plan for one event, created once at configuration time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EventPlan {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phases: Vec<EventPhase>,
    #[serde(default)]
    pub moments: Vec<SpecialMoment>,
}

impl EventPlan {
    /// Build a validated plan with phases ordered by start time
    pub fn new(
        name: impl Into<String>,
        mut phases: Vec<EventPhase>,
        moments: Vec<SpecialMoment>,
    ) -> Result<Self> {
        phases.sort_by_key(|p| p.time);
        let plan = Self {
            name: name.into(),
            phases,
            moments,
        };
        plan.validate()?;
        Ok(plan)
    }

    /// Parse and validate a plan from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: EventPlan = serde_json::from_str(json)?;
        Self::new(raw.name, raw.phases, raw.moments)
    }

    pub fn validate(&self) -> Result<()> {
        for phase in &self.phases {
            if phase.energy_target > 100 {
                return Err(Error::InvalidInput(format!(
                    "phase at {} has energy target {} (max 100)",
                    phase.time.format("%H:%M"),
                    phase.energy_target
                )));
            }
            if phase.duration_min == 0 {
                return Err(Error::InvalidInput(format!(
                    "phase at {} has zero duration",
                    phase.time.format("%H:%M")
                )));
            }
        }

        let mut seen = HashSet::new();
        for moment in &self.moments {
            if !seen.insert(moment.id.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "duplicate special moment id '{}'",
                    moment.id
                )));
            }
        }
        Ok(())
    }

    /// Index of the phase whose window contains `now`
    ///
    /// When windows overlap the latest-starting one wins.
    pub fn phase_index_at(&self, now: NaiveTime) -> Option<usize> {
        self.phases.iter().rposition(|p| p.contains(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn phase(h: u32, m: u32, duration_min: u32) -> EventPhase {
        EventPhase {
            time: at(h, m),
            phase_kind: PhaseKind::Dinner,
            energy_target: 40,
            music_style: "jazz".to_string(),
            duration_min,
        }
    }

    #[test]
    fn test_phase_window_is_half_open() {
        let p = phase(19, 0, 60);
        assert!(p.contains(at(19, 0)));
        assert!(p.contains(NaiveTime::from_hms_opt(19, 59, 59).unwrap()));
        assert!(!p.contains(at(20, 0)));
        assert!(!p.contains(at(18, 59)));
    }

    #[test]
    fn test_phase_window_wraps_midnight() {
        let p = phase(23, 30, 90);
        assert!(p.contains(at(23, 45)));
        assert!(p.contains(at(0, 30)));
        assert!(!p.contains(at(1, 0)));
        assert!(!p.contains(at(12, 0)));
    }

    #[test]
    fn test_plan_sorts_phases_and_finds_active() {
        let plan = EventPlan::new("gala", vec![phase(21, 0, 120), phase(19, 0, 180)], vec![]).unwrap();
        assert_eq!(plan.phases[0].time, at(19, 0));
        assert_eq!(plan.phase_index_at(at(19, 30)), Some(0));
        // Overlap at 21:30: the later-starting phase wins
        assert_eq!(plan.phase_index_at(at(21, 30)), Some(1));
        assert_eq!(plan.phase_index_at(at(8, 0)), None);
    }

    #[test]
    fn test_duplicate_moment_ids_rejected() {
        let m = SpecialMoment {
            id: "cake".to_string(),
            time: at(22, 0),
            moment_kind: MomentKind::CakeCutting,
            description: "Cake cutting".to_string(),
            music_cue: None,
            announcement_template: None,
            triggered: false,
        };
        let result = EventPlan::new("x", vec![], vec![m.clone(), m]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "name": "Wedding",
            "phases": [{"time":"18:00","phaseKind":"cocktail","energyTarget":35,"musicStyle":"lounge","durationMin":60}],
            "moments": [{"id":"dance","time":"21:15","momentKind":"first_dance","description":"First dance","musicCue":"t-42"}]
        }"#;
        let plan = EventPlan::from_json(json).unwrap();
        assert_eq!(plan.phases[0].phase_kind, PhaseKind::Cocktail);
        assert_eq!(plan.moments[0].moment_kind, MomentKind::FirstDance);
        assert_eq!(plan.moments[0].music_cue.as_deref(), Some("t-42"));
        assert!(!plan.moments[0].triggered);
        assert!(plan.moments[0].is_due(NaiveTime::from_hms_opt(21, 15, 59).unwrap()));
        assert!(!plan.moments[0].is_due(at(21, 16)));
    }

    #[test]
    fn test_zero_duration_rejected() {
        assert!(EventPlan::new("x", vec![phase(10, 0, 0)], vec![]).is_err());
    }
}
