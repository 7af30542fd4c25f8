use serde::{Deserialize, Serialize};

/// Below this a sub-score earns a practice tip.
pub const TIP_BELOW: u8 = 70;
/// Above this a sub-score earns praise.
pub const PRAISE_ABOVE: u8 = 90;
/// Overall scores above this make the tutor happy.
pub const HAPPY_ABOVE: u8 = 85;
/// Overall scores below this make the tutor concerned.
pub const CONCERNED_BELOW: u8 = 70;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TutorMood {
    Happy,
    Neutral,
    Concerned,
}

impl TutorMood {
    pub fn from_overall(overall: u8) -> Self {
        if overall > HAPPY_ABOVE {
            TutorMood::Happy
        } else if overall < CONCERNED_BELOW {
            TutorMood::Concerned
        } else {
            TutorMood::Neutral
        }
    }
}

struct Band {
    tip: &'static str,
    praise: &'static str,
}

const TIMING: Band = Band {
    tip: "Try to maintain a more consistent rhythm between notes.",
    praise: "Excellent timing! Your rhythm is very consistent.",
};

const DYNAMICS: Band = Band {
    tip: "Work on controlling your key pressure for more consistent dynamics.",
    praise: "Great dynamic control! Your expression is natural and musical.",
};

const ACCURACY: Band = Band {
    tip: "Focus on playing the correct notes in the sequence.",
    praise: "Excellent note accuracy! You're playing the right notes.",
};

pub const OVERALL_LOW: &str = "Keep practicing this passage to improve your overall performance.";
pub const OVERALL_MID: &str = "Good progress! Continue practicing to refine your performance.";
pub const OVERALL_HIGH: &str = "Outstanding performance! You've mastered this passage.";

/// One line per sub-score outside the neutral band, then one overall line.
pub fn build_feedback(accuracy: Option<u8>, timing: u8, dynamics: u8, overall: u8) -> Vec<String> {
    let mut lines = Vec::with_capacity(4);
    push_band(&mut lines, &TIMING, timing);
    push_band(&mut lines, &DYNAMICS, dynamics);
    if let Some(accuracy) = accuracy {
        push_band(&mut lines, &ACCURACY, accuracy);
    }

    let summary = if overall < TIP_BELOW {
        OVERALL_LOW
    } else if overall > PRAISE_ABOVE {
        OVERALL_HIGH
    } else {
        OVERALL_MID
    };
    lines.push(summary.to_string());
    lines
}

fn push_band(lines: &mut Vec<String>, band: &Band, value: u8) {
    if value < TIP_BELOW {
        lines.push(band.tip.to_string());
    } else if value > PRAISE_ABOVE {
        lines.push(band.praise.to_string());
    }
}
