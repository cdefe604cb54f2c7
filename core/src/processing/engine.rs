use crate::prelude::{ProcessingStage, Recovered, StageConfig, StageError, StageInput, StageResult};
use crate::processing::anomaly::AnomalyClassifier;
use crate::processing::conditioner::SignalConditioner;
use crate::processing::layers::LayerSegmenter;
use crate::processing::reflection::ReflectionDetector;
use crate::sensor_interface::{
    Anomaly, LayerAnalysis, Position, RadarReport, ScanArea, ScanReport,
};
use crate::telemetry::log::LogManager;

/// Spacing assumed between profiles of a scan without coordinates.
const DEFAULT_PROFILE_SPACING: f64 = 0.1;

/// Composes conditioning, reflection detection, classification and layer
/// segmentation into one depth-profile operation.
///
/// The engine holds no mutable state; stages are built per call so a single
/// instance can be shared across worker threads.
#[derive(Debug, Clone)]
pub struct RadarEngine {
    config: StageConfig,
    classifier: AnomalyClassifier,
    logger: LogManager,
}

impl RadarEngine {
    pub fn new(config: StageConfig) -> Self {
        Self {
            config,
            classifier: AnomalyClassifier::new(),
            logger: LogManager::new("RadarEngine"),
        }
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    pub fn condition(&self, profile: &[f64]) -> Recovered<Vec<f64>> {
        SignalConditioner::condition(&self.config, profile)
    }

    pub fn analyze_depth_profile(&self, trace: &[f64]) -> LayerAnalysis {
        LayerSegmenter::analyze_depth_profile(&self.config, trace)
    }

    /// Anomalies for one profile, in depth order.
    pub fn detect_anomalies(&self, profile: &[f64], x: f64, y: f64) -> StageResult<Vec<Anomaly>> {
        if profile.is_empty() {
            return Ok(Vec::new());
        }
        let (conditioned, _) = self.run_stage(SignalConditioner::new(), profile.to_vec())?;
        let (_, anomalies) = self.classify(conditioned, x, y)?;
        Ok(anomalies)
    }

    pub fn process_profile(
        &self,
        profile: &[f64],
        position: Option<Position>,
    ) -> StageResult<RadarReport> {
        let Position { x, y } = position.unwrap_or_default();
        let (conditioned, diagnostics) =
            self.run_stage(SignalConditioner::new(), profile.to_vec())?;
        let (conditioned, anomalies) = if conditioned.is_empty() {
            (conditioned, Vec::new())
        } else {
            self.classify(conditioned, x, y)?
        };

        let mut segmenter = LayerSegmenter::new();
        segmenter.initialize(&self.config)?;
        let layered = segmenter.execute(StageInput::new(conditioned))?;
        segmenter.cleanup();
        let mut layer_analysis = layered
            .metadata
            .layer_analysis
            .ok_or_else(|| StageError::Internal("layer stage produced no analysis".into()))?;
        layer_analysis.position = position;

        self.logger.record(&format!(
            "profile of {} samples -> {} anomalies, {} layers",
            profile.len(),
            anomalies.len(),
            layer_analysis.layers.len()
        ));

        Ok(RadarReport {
            total_detected: anomalies.len(),
            anomalies,
            layer_analysis,
            diagnostics,
        })
    }

    /// Processes several profiles and aggregates anomalies across them,
    /// strongest confidence first.
    pub fn process_scan(
        &self,
        profiles: &[Vec<f64>],
        coordinates: &[(f64, f64)],
    ) -> StageResult<ScanReport> {
        let mut anomalies = Vec::new();
        let mut layer_analysis = Vec::with_capacity(profiles.len());

        for (idx, profile) in profiles.iter().enumerate() {
            let (x, y) = coordinates
                .get(idx)
                .copied()
                .unwrap_or((idx as f64 * DEFAULT_PROFILE_SPACING, 0.0));
            let report = self.process_profile(profile, Some(Position { x, y }))?;
            anomalies.extend(report.anomalies);
            layer_analysis.push(report.layer_analysis);
        }

        anomalies.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        Ok(ScanReport {
            total_anomalies_detected: anomalies.len(),
            scan_area: ScanArea::covering(&anomalies),
            anomalies,
            layer_analysis,
        })
    }

    fn run_stage<S: ProcessingStage>(
        &self,
        mut stage: S,
        samples: Vec<f64>,
    ) -> StageResult<(Vec<f64>, Vec<String>)> {
        stage.initialize(&self.config)?;
        let output = stage.execute(StageInput::new(samples))?;
        stage.cleanup();
        Ok((output.samples, output.metadata.notes))
    }

    fn classify(&self, signal: Vec<f64>, x: f64, y: f64) -> StageResult<(Vec<f64>, Vec<Anomaly>)> {
        let mut detector = ReflectionDetector::new();
        detector.initialize(&self.config)?;
        let detected = detector.execute(StageInput::new(signal))?;
        detector.cleanup();

        let reflections = detected.metadata.reflections.unwrap_or_default();
        let anomalies = self.classifier.classify_reflections(
            &detected.samples,
            &reflections,
            self.config.depth_resolution,
            x,
            y,
        );
        Ok((detected.samples, anomalies))
    }
}

impl Default for RadarEngine {
    fn default() -> Self {
        Self::new(StageConfig::default())
    }
}
