use crate::processing::reflection::Reflection;
use crate::sensor_interface::LayerAnalysis;
use serde::{Deserialize, Serialize};

/// Shared configuration for the radar processing stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StageConfig {
    /// Assumed sampling rate of the depth trace in Hz.
    pub sampling_rate: f64,
    /// Meters covered by one sample.
    pub depth_resolution: f64,
    /// Physical passband (low, high) in MHz.
    pub frequency_band: (f64, f64),
    pub filter_order: usize,
    pub signal_threshold: f64,
    /// Minimum distance between two reflections, in meters.
    pub min_anomaly_separation: f64,
    pub width_threshold_factor: f64,
    pub boundary_sigma: f64,
    pub min_layer_samples: usize,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 1000.0,
            depth_resolution: 0.1,
            frequency_band: (10.0, 1000.0),
            filter_order: 4,
            signal_threshold: 0.3,
            min_anomaly_separation: 0.5,
            width_threshold_factor: 0.5,
            boundary_sigma: 1.5,
            min_layer_samples: 5,
        }
    }
}

impl StageConfig {
    /// Minimum reflection separation expressed in samples.
    pub fn min_separation_samples(&self) -> usize {
        if self.depth_resolution <= 0.0 || !self.depth_resolution.is_finite() {
            return 1;
        }
        // 0.5 / 0.1 lands a hair under 5.0 in binary floating point.
        ((self.min_anomaly_separation / self.depth_resolution) + 1e-9)
            .floor()
            .max(1.0) as usize
    }
}

/// Input payload for a processing stage.
#[derive(Debug, Clone, Default)]
pub struct StageInput {
    pub samples: Vec<f64>,
    pub timestamp: Option<f64>,
}

impl StageInput {
    pub fn new(samples: Vec<f64>) -> Self {
        Self {
            samples,
            timestamp: None,
        }
    }
}

/// Output produced by each stage.
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub samples: Vec<f64>,
    pub metadata: StageMetadata,
}

/// Metadata used for chaining stages and telemetry.
#[derive(Debug, Clone, Default)]
pub struct StageMetadata {
    pub reflections: Option<Vec<Reflection>>,
    pub layer_analysis: Option<LayerAnalysis>,
    pub notes: Vec<String>,
}

/// Common error type for stage execution.
#[derive(thiserror::Error, Debug)]
pub enum StageError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("training failure: {0}")]
    Training(String),
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type StageResult<T> = Result<T, StageError>;

/// A value that is always usable, optionally produced by a fallback path.
///
/// Numerical failures (rejected filter designs, malformed spectra) never
/// abort the pipeline; they hand back a safe value together with the
/// reason the preferred computation was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovered<T> {
    pub value: T,
    pub diagnostic: Option<String>,
}

impl<T> Recovered<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            diagnostic: None,
        }
    }

    pub fn degraded(value: T, diagnostic: impl Into<String>) -> Self {
        Self {
            value,
            diagnostic: Some(diagnostic.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.diagnostic.is_some()
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Trait describing object-oriented signal-processing stages.
pub trait ProcessingStage {
    fn initialize(&mut self, config: &StageConfig) -> StageResult<()>;
    fn execute(&mut self, input: StageInput) -> StageResult<StageOutput>;
    fn cleanup(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_separation_is_five_samples() {
        assert_eq!(StageConfig::default().min_separation_samples(), 5);
    }

    #[test]
    fn degenerate_resolution_still_yields_positive_separation() {
        let config = StageConfig {
            depth_resolution: 0.0,
            ..Default::default()
        };
        assert_eq!(config.min_separation_samples(), 1);
    }

    #[test]
    fn recovered_tracks_diagnostic() {
        let clean = Recovered::clean(3);
        assert!(!clean.is_degraded());
        let degraded = Recovered::degraded(vec![1.0], "filter rejected");
        assert!(degraded.is_degraded());
        assert_eq!(degraded.into_inner(), vec![1.0]);
    }
}
