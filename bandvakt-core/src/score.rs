//! Device-count heuristic. The score is a coarse indicator of how crowded the
//! local segment looks, not a risk model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Discrete score, ordered from most to least crowded segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityScore {
    Low,
    Medium,
    High,
}

impl SecurityScore {
    /// Numeric form used in persisted records and dashboards.
    #[inline]
    pub fn value(self) -> f64 {
        match self {
            SecurityScore::Low => 1.0,
            SecurityScore::Medium => 2.0,
            SecurityScore::High => 3.0,
        }
    }
}

impl fmt::Display for SecurityScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SecurityScore::Low => "low",
            SecurityScore::Medium => "medium",
            SecurityScore::High => "high",
        };
        write!(f, "{label} ({:.1})", self.value())
    }
}

/// Device counts above which the score drops a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreThresholds {
    pub medium_above: usize,
    pub low_above: usize,
}

impl Default for ScoreThresholds {
    fn default() -> Self {
        Self {
            medium_above: 5,
            low_above: 10,
        }
    }
}

/// Stateless mapping from device count to [`SecurityScore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityScorer {
    thresholds: ScoreThresholds,
}

impl SecurityScorer {
    pub fn new(thresholds: ScoreThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> ScoreThresholds {
        self.thresholds
    }

    #[inline]
    pub fn score(&self, device_count: usize) -> SecurityScore {
        if device_count > self.thresholds.low_above {
            SecurityScore::Low
        } else if device_count > self.thresholds.medium_above {
            SecurityScore::Medium
        } else {
            SecurityScore::High
        }
    }
}
