use crate::math::filter::{ButterworthBandpass, SavitzkyGolay};
use crate::prelude::{
    ProcessingStage, Recovered, StageConfig, StageError, StageInput, StageMetadata, StageOutput,
    StageResult,
};
use crate::telemetry::log::LogManager;

const MIN_FILTER_LEN: usize = 3;
const SMOOTHING_WINDOW: usize = 5;
const SMOOTHING_ORDER: usize = 3;

/// Bandpass filtering and smoothing of a raw depth trace.
pub struct SignalConditioner {
    config: Option<StageConfig>,
    logger: LogManager,
}

impl SignalConditioner {
    pub fn new() -> Self {
        Self {
            config: None,
            logger: LogManager::new("SignalConditioner"),
        }
    }

    /// Normalized (low, high) cutoffs clamped into the open unit interval.
    pub fn normalized_band(config: &StageConfig) -> (f64, f64) {
        let nyquist = config.sampling_rate / 2.0;
        let clamp = |freq: f64| {
            let normalized = freq / nyquist;
            if normalized.is_finite() {
                normalized.clamp(0.01, 0.99)
            } else {
                0.99
            }
        };
        let low = clamp(config.frequency_band.0);
        let high = clamp(config.frequency_band.1);
        if low >= high {
            (0.01, 0.99)
        } else {
            (low, high)
        }
    }

    /// Conditions `raw`, never failing: any numerical rejection falls back
    /// to the unfiltered samples and is reported as a diagnostic.
    pub fn condition(config: &StageConfig, raw: &[f64]) -> Recovered<Vec<f64>> {
        if raw.len() <= MIN_FILTER_LEN {
            return Recovered::clean(raw.to_vec());
        }

        let (low, high) = Self::normalized_band(config);
        let filtered = ButterworthBandpass::design(config.filter_order, low, high)
            .and_then(|filter| filter.filtfilt(raw));
        let (filtered, diagnostic) = match filtered {
            Ok(samples) => (samples, None),
            Err(reason) => (raw.to_vec(), Some(format!("bandpass skipped: {}", reason))),
        };

        let smoothed = if filtered.len() > SMOOTHING_WINDOW {
            Self::smooth(&filtered)
        } else {
            filtered
        };

        match diagnostic {
            Some(reason) => Recovered::degraded(smoothed, reason),
            None => Recovered::clean(smoothed),
        }
    }

    fn smooth(signal: &[f64]) -> Vec<f64> {
        let mut window = SMOOTHING_WINDOW.min(signal.len());
        if window % 2 == 0 {
            window -= 1;
        }
        let window = window.max(3);
        let order = SMOOTHING_ORDER.min(window - 1);
        match SavitzkyGolay::new(window, order) {
            Ok(smoother) if signal.len() >= smoother.window() => smoother.smooth(signal),
            _ => signal.to_vec(),
        }
    }
}

impl Default for SignalConditioner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStage for SignalConditioner {
    fn initialize(&mut self, config: &StageConfig) -> StageResult<()> {
        self.config = Some(config.clone());
        Ok(())
    }

    fn execute(&mut self, input: StageInput) -> StageResult<StageOutput> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| StageError::Internal("stage not initialized".into()))?;

        let conditioned = Self::condition(config, &input.samples);
        let mut notes = Vec::new();
        if let Some(reason) = &conditioned.diagnostic {
            self.logger.degraded(reason);
            notes.push(reason.clone());
        } else {
            self.logger
                .detail(&format!("conditioned {} samples", conditioned.value.len()));
        }

        Ok(StageOutput {
            samples: conditioned.value,
            metadata: StageMetadata {
                notes,
                ..Default::default()
            },
        })
    }

    fn cleanup(&mut self) {
        self.config = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_profiles_pass_through_unmodified() {
        let config = StageConfig::default();
        for raw in [vec![], vec![0.4], vec![0.1, -0.2], vec![0.3, 0.9, 0.2]] {
            let out = SignalConditioner::condition(&config, &raw);
            assert_eq!(out.value, raw);
            assert!(!out.is_degraded());
        }
    }

    #[test]
    fn default_band_normalizes_against_nyquist() {
        let (low, high) = SignalConditioner::normalized_band(&StageConfig::default());
        assert!((low - 0.02).abs() < 1e-12);
        assert!((high - 0.99).abs() < 1e-12);
    }

    #[test]
    fn inverted_band_falls_back_to_full_range() {
        let config = StageConfig {
            frequency_band: (900.0, 100.0),
            ..Default::default()
        };
        assert_eq!(SignalConditioner::normalized_band(&config), (0.01, 0.99));
    }

    #[test]
    fn filter_rejection_degrades_to_smoothed_raw_signal() {
        let config = StageConfig::default();
        let raw = vec![0.1, 0.2, 0.15, 0.3, 0.8, 0.9, 0.85, 0.3, 0.2, 0.15, 0.1];
        let out = SignalConditioner::condition(&config, &raw);
        assert!(out.is_degraded());
        assert_eq!(out.value.len(), raw.len());
        assert!(out.value.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn long_profiles_are_filtered() {
        let config = StageConfig::default();
        let raw: Vec<f64> = (0..200).map(|i| ((i as f64) * 0.3).sin()).collect();
        let out = SignalConditioner::condition(&config, &raw);
        assert!(!out.is_degraded());
        assert_eq!(out.value.len(), raw.len());
    }

    #[test]
    fn stage_requires_initialization() {
        let mut stage = SignalConditioner::new();
        assert!(stage.execute(StageInput::new(vec![0.0; 8])).is_err());
        stage.initialize(&StageConfig::default()).unwrap();
        let output = stage.execute(StageInput::new(vec![0.0; 8])).unwrap();
        assert_eq!(output.samples.len(), 8);
        stage.cleanup();
    }
}
