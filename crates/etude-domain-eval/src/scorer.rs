use crate::feedback::{build_feedback, TutorMood};
use etude_ports::types::NoteEvent;
use serde::{Deserialize, Serialize};

/// Inter-onset variance (ms²) that costs one timing point.
pub const TIMING_VARIANCE_DIVISOR: f64 = 100.0;
/// Velocity variance treated as ideal expressiveness.
pub const DYNAMICS_TARGET_VARIANCE: f64 = 200.0;
/// Distance from the target variance that costs one dynamics point.
pub const DYNAMICS_DEVIATION_DIVISOR: f64 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreWeights {
    pub accuracy: f64,
    pub timing: f64,
    pub dynamics: f64,
}

pub const DEFAULT_WEIGHTS: ScoreWeights = ScoreWeights {
    accuracy: 0.5,
    timing: 0.3,
    dynamics: 0.2,
};

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreError {
    #[error("cannot score an empty performance")]
    InsufficientData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceResult {
    /// `None` when no reference was available to compare against.
    pub accuracy: Option<u8>,
    pub timing: u8,
    pub dynamics: u8,
    pub overall_score: u8,
    pub feedback: Vec<String>,
    pub mood: TutorMood,
}

/// Scores a finished performance. `reference` is compared position by position;
/// an empty reference is treated the same as no reference.
pub fn score(
    performed: &[NoteEvent],
    reference: Option<&[NoteEvent]>,
) -> Result<PerformanceResult, ScoreError> {
    if performed.is_empty() {
        return Err(ScoreError::InsufficientData);
    }

    let timing = round_score(timing_score(performed));
    let dynamics = round_score(dynamics_score(performed));
    let accuracy = reference
        .filter(|notes| !notes.is_empty())
        .map(|notes| round_score(accuracy_score(performed, notes)));

    let overall_score = overall(accuracy, timing, dynamics, DEFAULT_WEIGHTS);
    let feedback = build_feedback(accuracy, timing, dynamics, overall_score);

    Ok(PerformanceResult {
        accuracy,
        timing,
        dynamics,
        overall_score,
        feedback,
        mood: TutorMood::from_overall(overall_score),
    })
}

pub fn timing_score(notes: &[NoteEvent]) -> f64 {
    let deltas: Vec<f64> = notes
        .windows(2)
        .map(|pair| pair[1].timestamp as f64 - pair[0].timestamp as f64)
        .collect();
    let variance = population_variance(&deltas);
    clamp_score(100.0 - variance / TIMING_VARIANCE_DIVISOR)
}

pub fn dynamics_score(notes: &[NoteEvent]) -> f64 {
    let velocities: Vec<f64> = notes.iter().map(|note| f64::from(note.velocity)).collect();
    let variance = population_variance(&velocities);
    clamp_score(100.0 - (variance - DYNAMICS_TARGET_VARIANCE).abs() / DYNAMICS_DEVIATION_DIVISOR)
}

/// Share of positions where performed and reference pitches agree. Positions
/// present in only one of the sequences count as misses.
pub fn accuracy_score(performed: &[NoteEvent], reference: &[NoteEvent]) -> f64 {
    let total = performed.len().max(reference.len());
    if total == 0 {
        return 0.0;
    }
    let matched = performed
        .iter()
        .zip(reference.iter())
        .filter(|(played, expected)| played.pitch == expected.pitch)
        .count();
    matched as f64 * 100.0 / total as f64
}

pub fn overall(accuracy: Option<u8>, timing: u8, dynamics: u8, weights: ScoreWeights) -> u8 {
    let weighted = match accuracy {
        Some(accuracy) => {
            f64::from(accuracy) * weights.accuracy
                + f64::from(timing) * weights.timing
                + f64::from(dynamics) * weights.dynamics
        }
        None => {
            let rest = weights.timing + weights.dynamics;
            f64::from(timing) * (weights.timing / rest) + f64::from(dynamics) * (weights.dynamics / rest)
        }
    };
    round_score(weighted)
}

fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

fn round_score(value: f64) -> u8 {
    clamp_score(value).round() as u8
}
