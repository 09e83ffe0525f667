//! Music ducking curves
//!
//! While an announcement is spoken the music volume is lowered ("ducked")
//! and restored afterwards. Rather than jumping between levels, the change is
//! applied as a short ramp of volume steps shaped by one of these curves.

use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI};

/// Shape of a volume ramp between two levels
///
/// - Linear: constant rate of change
/// - SCurve: smooth acceleration and deceleration
/// - EqualPower: perceptually even loudness change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuckCurve {
    /// v(t) = t
    Linear,

    /// v(t) = 0.5 × (1 - cos(π × t))
    #[default]
    SCurve,

    /// v(t) = sin(t × π/2)
    EqualPower,
}

impl DuckCurve {
    /// Normalized progress multiplier (0.0 at the start of a ramp, 1.0 at the end)
    pub fn progress(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            DuckCurve::Linear => t,
            DuckCurve::SCurve => 0.5 * (1.0 - (PI * t).cos()),
            DuckCurve::EqualPower => (t * FRAC_PI_2).sin(),
        }
    }

    /// Volume levels for a ramp from `from` to `to` in `steps` steps
    ///
    /// The returned sequence excludes the starting level and always ends
    /// exactly at `to`. Levels are clamped to 0.0-1.0. With `steps == 0`
    /// the ramp is a single jump.
    pub fn ramp(&self, from: f32, to: f32, steps: usize) -> Vec<f32> {
        let from = from.clamp(0.0, 1.0);
        let to = to.clamp(0.0, 1.0);
        if steps == 0 {
            return vec![to];
        }

        let mut levels: Vec<f32> = (1..=steps)
            .map(|i| {
                let t = i as f32 / steps as f32;
                from + (to - from) * self.progress(t)
            })
            .collect();

        if let Some(last) = levels.last_mut() {
            *last = to;
        }
        levels
    }

    /// Parse curve from a configuration string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Some(DuckCurve::Linear),
            "cosine" | "scurve" | "s-curve" | "s_curve" => Some(DuckCurve::SCurve),
            "equal_power" | "equalpower" => Some(DuckCurve::EqualPower),
            _ => None,
        }
    }
}

impl std::fmt::Display for DuckCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DuckCurve::Linear => "Linear",
            DuckCurve::SCurve => "S-Curve",
            DuckCurve::EqualPower => "Equal Power",
        };
        write!(f, "{}", name)
    }
}
