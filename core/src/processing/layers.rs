use crate::math::stats::StatsHelper;
use crate::prelude::{
    ProcessingStage, StageConfig, StageError, StageInput, StageMetadata, StageOutput, StageResult,
};
use crate::sensor_interface::{Layer, LayerAnalysis};
use crate::telemetry::log::LogManager;

/// Gradient-driven segmentation of a trace into depth layers.
pub struct LayerSegmenter {
    config: Option<StageConfig>,
    logger: LogManager,
}

impl LayerSegmenter {
    pub fn new() -> Self {
        Self {
            config: None,
            logger: LogManager::new("LayerSegmenter"),
        }
    }

    /// Boundary candidates are samples whose gradient magnitude exceeds
    /// `boundary_sigma` standard deviations of all gradient magnitudes.
    pub fn boundary_candidates(config: &StageConfig, trace: &[f64]) -> Vec<usize> {
        let magnitudes: Vec<f64> = StatsHelper::gradient(trace)
            .into_iter()
            .map(f64::abs)
            .collect();
        let threshold = StatsHelper::std_dev(&magnitudes) * config.boundary_sigma;
        magnitudes
            .iter()
            .enumerate()
            .filter_map(|(idx, &g)| (g > threshold).then_some(idx))
            .collect()
    }

    pub fn analyze_depth_profile(config: &StageConfig, trace: &[f64]) -> LayerAnalysis {
        let resolution = config.depth_resolution;
        let boundaries = Self::boundary_candidates(config, trace);

        let mut layers = Vec::new();
        let mut start = 0usize;
        for &boundary in &boundaries {
            if boundary.saturating_sub(start) > config.min_layer_samples {
                layers.push(Self::layer(&trace[start..boundary], start, boundary, resolution));
                start = boundary;
            }
        }
        if start < trace.len() {
            let mut last = Self::layer(&trace[start..], start, trace.len() - 1, resolution);
            last.thickness = (trace.len() - start) as f64 * resolution;
            layers.push(last);
        }

        LayerAnalysis {
            layers,
            boundaries: boundaries
                .iter()
                .map(|&idx| idx as f64 * resolution)
                .collect(),
            total_depth: trace.len() as f64 * resolution,
            position: None,
        }
    }

    fn layer(data: &[f64], start: usize, end: usize, resolution: f64) -> Layer {
        Layer {
            start_depth: start as f64 * resolution,
            end_depth: end as f64 * resolution,
            mean_amplitude: StatsHelper::mean(data),
            std_amplitude: StatsHelper::std_dev(data),
            thickness: (end - start) as f64 * resolution,
        }
    }
}

impl Default for LayerSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStage for LayerSegmenter {
    fn initialize(&mut self, config: &StageConfig) -> StageResult<()> {
        self.config = Some(config.clone());
        Ok(())
    }

    fn execute(&mut self, input: StageInput) -> StageResult<StageOutput> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| StageError::Internal("stage not initialized".into()))?;

        let analysis = Self::analyze_depth_profile(config, &input.samples);
        self.logger.detail(&format!(
            "{} layers over {:.2} m",
            analysis.layers.len(),
            analysis.total_depth
        ));

        let metadata = StageMetadata {
            notes: vec![format!("layers {}", analysis.layers.len())],
            layer_analysis: Some(analysis),
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
