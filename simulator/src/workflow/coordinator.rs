use crate::viewer_bridge::model::{
    FrameAnalytics, LiveSnapshot, MaterialAnalytics, PreservationAnalytics, RadarAnalytics,
    ScanAnalytics,
};
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use log::{debug, info, warn};
use scancore::broadcast::{BroadcastHub, BroadcastReport, DispatchOutcome};
use scancore::preservation::{
    calculate_multi_point_preservation, preservation_recommendations, PreservationScorer,
};
use scancore::processing::RadarEngine;
use scancore::sensor_interface::{
    EnvironmentalReading, Position, RadarFrame, SensorFrame, SpectrometerFrame,
};
use scancore::spectral::{material_properties, MaterialClassifier, TrainingSummary};
use scancore::telemetry::{Metrics, MetricsRecorder};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Routes raw frames through the analytics engines and publishes the
/// merged result to live viewers.
pub struct IngestionCoordinator {
    radar: RadarEngine,
    classifier: Arc<MaterialClassifier>,
    scorer: PreservationScorer,
    hub: BroadcastHub,
    metrics: Arc<MetricsRecorder>,
    snapshot: RwLock<LiveSnapshot>,
    history: Mutex<VecDeque<EnvironmentalReading>>,
    history_len: usize,
}

impl IngestionCoordinator {
    pub fn new(config: &WorkflowConfig) -> Self {
        let metrics = Arc::new(MetricsRecorder::new());
        Self {
            radar: RadarEngine::new(config.radar.clone()),
            classifier: Arc::new(MaterialClassifier::new(config.classifier.clone())),
            scorer: PreservationScorer::new(),
            hub: BroadcastHub::new(config.hub.clone(), Arc::clone(&metrics)),
            metrics,
            snapshot: RwLock::new(LiveSnapshot::default()),
            history: Mutex::new(VecDeque::with_capacity(config.environment_history.max(1))),
            history_len: config.environment_history.max(1),
        }
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics.snapshot()
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fits the material model up front so the first spectrum is not delayed.
    pub fn warm_up(&self) -> anyhow::Result<TrainingSummary> {
        if let Some(summary) = self.classifier.training_summary() {
            return Ok(summary);
        }
        self.classifier
            .train()
            .context("training material classifier")
    }

    /// Runs the analytics that apply to `frame` without publishing anything.
    pub fn analyze(&self, frame: &SensorFrame) -> anyhow::Result<FrameAnalytics> {
        match frame {
            SensorFrame::Radar(radar) if radar.is_scan() => self.analyze_scan(radar),
            SensorFrame::Radar(radar) => self.analyze_radar(radar),
            SensorFrame::Spectrometer(spectrum) => self.analyze_spectrum(spectrum),
            SensorFrame::Environmental(reading) => Ok(self.analyze_environment(reading)),
            SensorFrame::Camera(camera) => Ok(FrameAnalytics::Camera(camera.clone())),
        }
    }

    fn analyze_radar(&self, frame: &RadarFrame) -> anyhow::Result<FrameAnalytics> {
        let position = frame
            .coordinates
            .first()
            .map(|&(x, y)| Position { x, y });
        let report = self
            .radar
            .process_profile(&frame.depth_profile, position)
            .context("processing radar depth profile")?;
        for note in &report.diagnostics {
            warn!("radar frame from {:?}: {}", frame.device_id, note);
        }
        Ok(FrameAnalytics::RadarData(RadarAnalytics {
            timestamp: frame.timestamp,
            device_id: frame.device_id.clone(),
            location: frame.location,
            report,
            reported_anomalies: frame.anomalies.clone(),
        }))
    }

    fn analyze_scan(&self, frame: &RadarFrame) -> anyhow::Result<FrameAnalytics> {
        let scan = self
            .radar
            .process_scan(&frame.depth_profiles, &frame.coordinates)
            .context("processing radar scan")?;
        Ok(FrameAnalytics::ScanData(ScanAnalytics {
            timestamp: frame.timestamp,
            device_id: frame.device_id.clone(),
            scan,
        }))
    }

    fn analyze_spectrum(&self, frame: &SpectrometerFrame) -> anyhow::Result<FrameAnalytics> {
        let classification = self
            .classifier
            .predict(&frame.wavelengths, &frame.intensity, frame.environmental_context)
            .context("classifying spectrum")?;
        let properties = *material_properties(classification.material_type);
        Ok(FrameAnalytics::MaterialClassification(MaterialAnalytics {
            timestamp: frame.timestamp,
            classification,
            properties,
        }))
    }

    fn analyze_environment(&self, reading: &EnvironmentalReading) -> FrameAnalytics {
        let report = self.scorer.calculate_preservation_report(reading);
        let index = {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            while history.len() >= self.history_len {
                history.pop_front();
            }
            history.push_back(*reading);
            calculate_multi_point_preservation(history.make_contiguous())
        };
        FrameAnalytics::Preservation(PreservationAnalytics {
            timestamp: reading.timestamp,
            readings: *reading,
            recommendations: preservation_recommendations(index.preservation_percentage),
            report,
            index,
        })
    }

    fn record(&self, frame: &SensorFrame) -> anyhow::Result<FrameAnalytics> {
        match self.analyze(frame) {
            Ok(analytics) => {
                self.metrics.record_processed();
                Ok(analytics)
            }
            Err(err) => {
                self.metrics.record_error();
                Err(err)
            }
        }
    }

    /// Snapshot message; `seq` is the merge count, so viewers can drop stale
    /// messages that arrive late.
    fn snapshot_payload(frame: &SensorFrame, snapshot: &LiveSnapshot) -> Value {
        json!({
            "type": "live_snapshot",
            "seq": snapshot.frames_merged,
            "source": frame.kind(),
            "snapshot": snapshot,
        })
    }

    /// Ingests one frame from async code and broadcasts the updated snapshot.
    ///
    /// Delivery happens under the snapshot lock, so concurrent ingests reach
    /// viewers in merge order. While the hub is not broadcasting the snapshot
    /// is still updated but nothing is sent.
    pub fn ingest(&self, frame: &SensorFrame) -> anyhow::Result<(FrameAnalytics, BroadcastReport)> {
        let analytics = self.record(frame)?;
        let report = {
            let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
            snapshot.merge(&analytics);
            if self.hub.is_broadcasting() {
                self.hub.broadcast(&Self::snapshot_payload(frame, &snapshot))
            } else {
                BroadcastReport::default()
            }
        };
        debug!(
            "{} frame delivered to {}/{} viewers",
            frame.kind(),
            report.delivered,
            report.delivered + report.failed
        );
        Ok((analytics, report))
    }

    /// Ingests one frame from a non-async thread, handing delivery to the
    /// hub's dispatch worker.
    pub fn publish_from_thread(&self, frame: &SensorFrame) -> anyhow::Result<DispatchOutcome> {
        let analytics = self.record(frame)?;
        let payload = {
            let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
            snapshot.merge(&analytics);
            Self::snapshot_payload(frame, &snapshot)
        };
        Ok(self.hub.dispatch_from_external_context(payload))
    }

    pub fn log_summary(&self) {
        let metrics = self.metrics.snapshot();
        info!(
            "frames processed {}, failed {}, deliveries {}, delivery failures {}",
            metrics.frames_processed,
            metrics.frames_failed,
            metrics.deliveries,
            metrics.delivery_failures
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{reference_depth_profile, SyntheticSensor};
    use scancore::broadcast::ConnectionId;
    use scancore::sensor_interface::{AnomalyType, EnvironmentalContext, MaterialLabel};
    use tokio::sync::mpsc;

    fn small_config() -> WorkflowConfig {
        let mut config = WorkflowConfig::default();
        config.classifier.n_estimators = 20;
        config.classifier.samples_per_class = 25;
        config.environment_history = 3;
        config
    }

    #[test]
    fn radar_frame_yields_metal_anomaly() {
        let coordinator = IngestionCoordinator::new(&small_config());
        let frame = SensorFrame::Radar(RadarFrame {
            depth_profile: reference_depth_profile(),
            timestamp: 42,
            ..Default::default()
        });
        match coordinator.analyze(&frame).unwrap() {
            FrameAnalytics::RadarData(radar) => {
                assert_eq!(radar.timestamp, 42);
                assert_eq!(radar.report.total_detected, radar.report.anomalies.len());
                assert!(radar
                    .report
                    .anomalies
                    .iter()
                    .any(|a| a.kind == AnomalyType::Metal));
            }
            other => panic!("unexpected analytics {:?}", other),
        }
    }

    #[test]
    fn scan_frame_aggregates_profiles() {
        let coordinator = IngestionCoordinator::new(&small_config());
        let frame = SensorFrame::Radar(RadarFrame {
            depth_profiles: vec![reference_depth_profile(), reference_depth_profile()],
            coordinates: vec![(0.0, 0.0), (1.0, 2.0)],
            ..Default::default()
        });
        match coordinator.analyze(&frame).unwrap() {
            FrameAnalytics::ScanData(scan) => {
                assert_eq!(scan.scan.layer_analysis.len(), 2);
                assert_eq!(scan.scan.scan_area.max_x, 1.0);
            }
            other => panic!("unexpected analytics {:?}", other),
        }
    }

    #[test]
    fn environment_history_is_bounded() {
        let coordinator = IngestionCoordinator::new(&small_config());
        for ts in 1..=5 {
            let reading = EnvironmentalReading {
                temperature: 15.0,
                tds: 400.0,
                turbidity: 20.0,
                distance: 2.0,
                ph: Some(7.2),
                timestamp: ts,
                ..Default::default()
            };
            let analytics = coordinator.analyze(&SensorFrame::Environmental(reading)).unwrap();
            if let FrameAnalytics::Preservation(p) = analytics {
                assert!(p.index.readings_used <= 3);
                assert_eq!(p.report.materials.len(), 30);
                assert!(p.index.preservation_percentage > 0.0);
            }
        }
        assert_eq!(coordinator.history.lock().unwrap().len(), 3);
    }

    #[test]
    fn spectrum_classification_includes_properties() {
        let coordinator = IngestionCoordinator::new(&small_config());
        coordinator.warm_up().unwrap();
        let mut sensor = SyntheticSensor::new(5, 0.05);
        let mut frame = sensor.spectrometer_frame(MaterialLabel::Metal);
        frame.environmental_context = Some(EnvironmentalContext {
            temperature: Some(12.0),
            ..Default::default()
        });
        match coordinator.analyze(&SensorFrame::Spectrometer(frame)).unwrap() {
            FrameAnalytics::MaterialClassification(m) => {
                assert_eq!(m.classification.all_probabilities.len(), 4);
                let expected = material_properties(m.classification.material_type);
                assert_eq!(m.properties, *expected);
            }
            other => panic!("unexpected analytics {:?}", other),
        }
    }

    #[tokio::test]
    async fn ingest_broadcasts_merged_snapshot() {
        let coordinator = IngestionCoordinator::new(&small_config());
        let (tx, mut rx) = mpsc::channel::<Arc<str>>(4);
        coordinator.hub().register(ConnectionId::next(), Arc::new(tx));
        coordinator.hub().start_broadcasting().await;

        let frame = SensorFrame::Environmental(EnvironmentalReading {
            turbidity: 30.0,
            temperature: 22.5,
            tds: 420.0,
            timestamp: 7,
            ..Default::default()
        });
        let (_, report) = coordinator.ingest(&frame).unwrap();
        assert_eq!(report.delivered, 1);

        let message: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(message["type"], "live_snapshot");
        assert_eq!(message["source"], "environmental");
        assert_eq!(message["seq"], 1);
        assert_eq!(message["snapshot"]["updated_at"], 7);
        assert_eq!(coordinator.metrics().frames_processed, 1);
        assert_eq!(coordinator.snapshot().frames_merged, 1);

        coordinator.hub().stop_broadcasting().await;
        let (_, report) = coordinator.ingest(&frame).unwrap();
        assert_eq!(report, BroadcastReport::default());
        assert!(rx.try_recv().is_err());
        assert_eq!(coordinator.snapshot().frames_merged, 2);
        assert_eq!(coordinator.hub().recent_frames().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_ingests_reach_viewers_in_merge_order() {
        let coordinator = Arc::new(IngestionCoordinator::new(&small_config()));
        let (tx, mut rx) = mpsc::channel::<Arc<str>>(128);
        coordinator.hub().register(ConnectionId::next(), Arc::new(tx));
        coordinator.hub().start_broadcasting().await;

        let producers = Arc::clone(&coordinator);
        tokio::task::spawn_blocking(move || {
            std::thread::scope(|scope| {
                for worker in 0..4u64 {
                    let coordinator = &producers;
                    scope.spawn(move || {
                        for step in 0..25u64 {
                            let frame = SensorFrame::Environmental(EnvironmentalReading {
                                temperature: 18.0,
                                timestamp: (worker * 100 + step + 1) as i64,
                                ..Default::default()
                            });
                            coordinator.ingest(&frame).unwrap();
                        }
                    });
                }
            });
        })
        .await
        .unwrap();
        coordinator.hub().stop_broadcasting().await;

        let mut seqs = Vec::new();
        while let Ok(text) = rx.try_recv() {
            let message: Value = serde_json::from_str(&text).unwrap();
            seqs.push(message["seq"].as_u64().unwrap());
        }
        assert_eq!(seqs, (1..=100).collect::<Vec<u64>>());
    }

    #[test]
    fn publish_without_worker_reports_no_context() {
        let coordinator = IngestionCoordinator::new(&small_config());
        let frame = SensorFrame::Camera(Default::default());
        let outcome = coordinator.publish_from_thread(&frame).unwrap();
        assert_eq!(outcome, DispatchOutcome::NoContext);
        assert!(coordinator.snapshot().camera.is_some());
    }
}
