//! Difficulty policy: maps a request difficulty onto a category window and a
//! non-decreasing category progression.
//!
//! The difficulty axis is split into five equal-width bins, one per category.
//! A lesson's progression ends `stretch` bands above the nominal bin (capped at
//! Red) and starts at most `span` bands below that ceiling (capped at Green).

use crate::skills::SkillColor;
use serde::{Deserialize, Serialize};

const BUCKETS: usize = 5;
// Keeps products like 0.6 * 5 from falling just short of a bin edge.
const BIN_EPSILON: f64 = 1e-9;

/// Labels reported as `difficulty_level`, one per bucket.
const LEVEL_LABELS: [&str; BUCKETS] = [
    "Foundational",
    "Developing",
    "Proficient",
    "Advanced",
    "Mastery",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyPolicy {
    #[serde(default = "default_stretch")]
    pub stretch: usize,
    #[serde(default = "default_span")]
    pub span: usize,
}

fn default_stretch() -> usize {
    1
}

fn default_span() -> usize {
    3
}

impl Default for DifficultyPolicy {
    fn default() -> Self {
        Self {
            stretch: default_stretch(),
            span: default_span(),
        }
    }
}

impl DifficultyPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if self.span < 1 {
            return Err("selection.span must be at least 1".to_string());
        }
        if self.stretch > BUCKETS - 1 {
            return Err(format!(
                "selection.stretch must be at most {}, got {}",
                BUCKETS - 1,
                self.stretch
            ));
        }
        Ok(())
    }

    /// Equal-width bin for `difficulty`; 1.0 lands in the top bin.
    /// Callers validate the range first.
    pub fn bucket(&self, difficulty: f64) -> SkillColor {
        let raw = (difficulty.clamp(0.0, 1.0) * BUCKETS as f64 + BIN_EPSILON).floor() as usize;
        SkillColor::from_index(raw.min(BUCKETS - 1)).unwrap_or(SkillColor::Red)
    }

    /// Inclusive (floor, ceiling) category window for `difficulty`.
    pub fn window(&self, difficulty: f64) -> (SkillColor, SkillColor) {
        let bucket = self.bucket(difficulty).index();
        let ceiling = (bucket + self.stretch).min(BUCKETS - 1);
        let floor = ceiling.saturating_sub(self.span);
        (
            SkillColor::from_index(floor).unwrap_or(SkillColor::Green),
            SkillColor::from_index(ceiling).unwrap_or(SkillColor::Red),
        )
    }

    /// One category per step, non-decreasing, ending on the window ceiling.
    /// A single step takes the nominal bucket so it agrees with [`label`](Self::label).
    pub fn progression(&self, difficulty: f64, step_count: usize) -> Vec<SkillColor> {
        let (floor, ceiling) = self.window(difficulty);
        let floor = floor.index();
        let ceiling = ceiling.index();
        let n = ceiling - floor + 1;
        let k = step_count;

        let offsets: Vec<usize> = if k >= n {
            let base = k / n;
            let extra = k % n;
            (0..n)
                .flat_map(|slot| {
                    let count = base + usize::from(slot < extra);
                    std::iter::repeat(slot).take(count)
                })
                .collect()
        } else if k == 1 {
            vec![self.bucket(difficulty).index().clamp(floor, ceiling) - floor]
        } else {
            (0..k).map(|i| i * (n - 1) / (k - 1)).collect()
        };

        offsets
            .into_iter()
            .filter_map(|offset| SkillColor::from_index(floor + offset))
            .collect()
    }

    pub fn label(&self, difficulty: f64) -> &'static str {
        LEVEL_LABELS[self.bucket(difficulty).index()]
    }
}
