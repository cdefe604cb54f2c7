use crate::prelude::{
    ProcessingStage, StageConfig, StageError, StageInput, StageMetadata, StageOutput, StageResult,
};
use crate::telemetry::log::LogManager;
use serde::{Deserialize, Serialize};

/// Candidate subsurface reflection found in a conditioned trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    pub index: usize,
    /// Signed sample value at the peak.
    pub amplitude: f64,
    /// Width in samples at the half-magnitude threshold.
    pub width: usize,
}

/// Peak picking on the magnitude of a conditioned trace.
pub struct ReflectionDetector {
    config: Option<StageConfig>,
    logger: LogManager,
}

impl ReflectionDetector {
    pub fn new() -> Self {
        Self {
            config: None,
            logger: LogManager::new("ReflectionDetector"),
        }
    }

    /// Reflections whose magnitude reaches the configured threshold and that
    /// respect the minimum separation, in ascending sample order.
    pub fn detect(config: &StageConfig, signal: &[f64]) -> Vec<Reflection> {
        let magnitude: Vec<f64> = signal.iter().map(|v| v.abs()).collect();
        let candidates: Vec<usize> = local_maxima(&magnitude)
            .into_iter()
            .filter(|&idx| magnitude[idx] >= config.signal_threshold)
            .collect();
        let peaks = enforce_distance(&candidates, &magnitude, config.min_separation_samples());

        peaks
            .into_iter()
            .map(|index| Reflection {
                index,
                amplitude: signal[index],
                width: Self::estimate_signal_width(
                    signal,
                    index,
                    config.width_threshold_factor,
                ),
            })
            .collect()
    }

    /// Walks outward from `peak_idx` while the magnitude stays above
    /// `factor` times the peak magnitude; returns `right - left`.
    pub fn estimate_signal_width(signal: &[f64], peak_idx: usize, factor: f64) -> usize {
        if peak_idx >= signal.len() {
            return 0;
        }
        let threshold = signal[peak_idx].abs() * factor;

        let mut left = peak_idx;
        while left > 0 && signal[left].abs() > threshold {
            left -= 1;
        }
        let mut right = peak_idx;
        while right + 1 < signal.len() && signal[right].abs() > threshold {
            right += 1;
        }
        right - left
    }
}

impl Default for ReflectionDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Interior local maxima; a flat top reports its middle sample.
fn local_maxima(values: &[f64]) -> Vec<usize> {
    let n = values.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }
    let mut i = 1;
    while i < n - 1 {
        if values[i - 1] < values[i] {
            let mut ahead = i + 1;
            while ahead < n - 1 && values[ahead] == values[i] {
                ahead += 1;
            }
            if values[ahead] < values[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    peaks
}

/// Keeps the strongest peaks first, dropping any closer than `distance` to a kept one.
fn enforce_distance(peaks: &[usize], values: &[f64], distance: usize) -> Vec<usize> {
    if distance <= 1 || peaks.len() < 2 {
        return peaks.to_vec();
    }
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| values[peaks[b]].total_cmp(&values[peaks[a]]).then(a.cmp(&b)));

    let mut keep = vec![true; peaks.len()];
    for &pos in &order {
        if !keep[pos] {
            continue;
        }
        for other in 0..peaks.len() {
            if other != pos && keep[other] && peaks[other].abs_diff(peaks[pos]) < distance {
                keep[other] = false;
            }
        }
    }
    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&idx, kept)| kept.then_some(idx))
        .collect()
}

impl ProcessingStage for ReflectionDetector {
    fn initialize(&mut self, config: &StageConfig) -> StageResult<()> {
        self.config = Some(config.clone());
        Ok(())
    }

    fn execute(&mut self, input: StageInput) -> StageResult<StageOutput> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| StageError::Internal("stage not initialized".into()))?;

        let reflections = Self::detect(config, &input.samples);
        self.logger
            .detail(&format!("{} reflections detected", reflections.len()));

        let metadata = StageMetadata {
            notes: vec![format!("reflections {}", reflections.len())],
            reflections: Some(reflections),
            ..Default::default()
        };

        Ok(StageOutput {
            samples: input.samples,
            metadata,
        })
    }

    fn cleanup(&mut self) {
        self.config = None;
    }
}
