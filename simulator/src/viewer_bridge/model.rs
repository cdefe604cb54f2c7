use scancore::preservation::{MultiPointPreservation, PreservationReport};
use scancore::sensor_interface::{
    CameraFrame, Classification, EnvironmentalReading, GeoPoint, RadarReport, ScanReport,
};
use scancore::spectral::MaterialProperties;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct RadarAnalytics {
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    pub report: RadarReport,
    /// Anomalies flagged by the device itself.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reported_anomalies: Vec<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanAnalytics {
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub scan: ScanReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaterialAnalytics {
    pub timestamp: i64,
    pub classification: Classification,
    pub properties: MaterialProperties,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreservationAnalytics {
    pub timestamp: i64,
    pub readings: EnvironmentalReading,
    pub report: PreservationReport,
    pub index: MultiPointPreservation,
    pub recommendations: Vec<&'static str>,
}

/// Derived output for one ingested frame.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FrameAnalytics {
    RadarData(RadarAnalytics),
    ScanData(ScanAnalytics),
    MaterialClassification(MaterialAnalytics),
    Preservation(PreservationAnalytics),
    Camera(CameraFrame),
}

impl FrameAnalytics {
    pub fn timestamp(&self) -> i64 {
        match self {
            FrameAnalytics::RadarData(a) => a.timestamp,
            FrameAnalytics::ScanData(a) => a.timestamp,
            FrameAnalytics::MaterialClassification(a) => a.timestamp,
            FrameAnalytics::Preservation(a) => a.timestamp,
            FrameAnalytics::Camera(frame) => frame.timestamp,
        }
    }
}

/// Latest analytics of every kind, merged into what viewers render.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LiveSnapshot {
    pub updated_at: i64,
    pub frames_merged: u64,
    pub radar: Option<RadarAnalytics>,
    pub scan: Option<ScanAnalytics>,
    pub material: Option<MaterialAnalytics>,
    pub preservation: Option<PreservationAnalytics>,
    pub camera: Option<CameraFrame>,
}

impl LiveSnapshot {
    pub fn merge(&mut self, analytics: &FrameAnalytics) {
        self.updated_at = self.updated_at.max(analytics.timestamp());
        self.frames_merged += 1;
        match analytics {
            FrameAnalytics::RadarData(a) => self.radar = Some(a.clone()),
            FrameAnalytics::ScanData(a) => self.scan = Some(a.clone()),
            FrameAnalytics::MaterialClassification(a) => self.material = Some(a.clone()),
            FrameAnalytics::Preservation(a) => self.preservation = Some(a.clone()),
            FrameAnalytics::Camera(frame) => self.camera = Some(frame.clone()),
        }
    }
}
