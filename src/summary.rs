use statrs::statistics::{Data, OrderStatistics, Statistics};
use std::fmt;

/// Descriptive statistics of a sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Describe {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; `None` below two observations.
    pub std_dev: Option<f64>,
    pub min: f64,
    pub median: f64,
    pub max: f64,
}

impl Describe {
    /// `None` for an empty sample. NaN observations are ignored.
    pub fn of(values: &[f64]) -> Option<Self> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if finite.is_empty() {
            return None;
        }
        let std_dev = finite.iter().std_dev();
        Some(Self {
            count: finite.len(),
            mean: finite.iter().mean(),
            std_dev: (!std_dev.is_nan()).then_some(std_dev),
            min: finite.iter().copied().fold(f64::INFINITY, f64::min),
            max: finite.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            median: Data::new(finite).median(),
        })
    }
}

impl fmt::Display for Describe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "count={} mean={:.4} std={} min={:.4} median={:.4} max={:.4}",
            self.count,
            self.mean,
            self.std_dev
                .map(|s| format!("{s:.4}"))
                .unwrap_or_else(|| "-".to_string()),
            self.min,
            self.median,
            self.max
        )
    }
}

/// What one granularity pass produced.
#[derive(Clone, Debug, PartialEq)]
pub struct LevelSummary {
    pub segments: usize,
    pub groups: usize,
    pub trajectories: usize,
    pub transitions: usize,
    /// Transitions whose subject has no metadata record.
    pub unmatched_transitions: usize,
    pub length: Option<Describe>,
}

impl LevelSummary {
    pub fn null_trajectories(&self) -> usize {
        self.groups - self.trajectories
    }
}
