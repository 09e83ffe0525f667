//! Supporting types carried by DJ events

use serde::{Deserialize, Serialize};

/// Phase of the mood-triggered transition cycle
///
/// The only edges are `Idle → Announcing → Swapping → Settling → Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TransitionState {
    #[default]
    Idle,
    Announcing,
    Swapping,
    Settling,
}

impl TransitionState {
    /// The single state that may follow this one
    pub fn successor(&self) -> TransitionState {
        match self {
            TransitionState::Idle => TransitionState::Announcing,
            TransitionState::Announcing => TransitionState::Swapping,
            TransitionState::Swapping => TransitionState::Settling,
            TransitionState::Settling => TransitionState::Idle,
        }
    }

    pub fn can_advance_to(&self, next: TransitionState) -> bool {
        self.successor() == next
    }
}

impl std::fmt::Display for TransitionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionState::Idle => write!(f, "Idle"),
            TransitionState::Announcing => write!(f, "Announcing"),
            TransitionState::Swapping => write!(f, "Swapping"),
            TransitionState::Settling => write!(f, "Settling"),
        }
    }
}

/// Why the DJ asked the player to change track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TrackChangeReason {
    /// Operator started a specific track
    Manual,
    /// Crowd mood changed
    MoodTransition,
    /// Event timeline entered a new phase
    PhaseChange,
    /// A special moment declared a music cue
    MomentCue,
}

/// Component whose collaborator is failing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DegradedComponent {
    MoodAnalysis,
    FaceRecognition,
    Speech,
    Playback,
}

impl std::fmt::Display for DegradedComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegradedComponent::MoodAnalysis => write!(f, "mood analysis"),
            DegradedComponent::FaceRecognition => write!(f, "face recognition"),
            DegradedComponent::Speech => write!(f, "speech"),
            DegradedComponent::Playback => write!(f, "playback"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_edges() {
        use TransitionState::*;
        assert!(Idle.can_advance_to(Announcing));
        assert!(Announcing.can_advance_to(Swapping));
        assert!(Swapping.can_advance_to(Settling));
        assert!(Settling.can_advance_to(Idle));

        assert!(!Idle.can_advance_to(Swapping));
        assert!(!Announcing.can_advance_to(Idle));
        assert!(!Settling.can_advance_to(Announcing));
    }
}
