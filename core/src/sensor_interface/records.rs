use super::frame::EnvironmentalContext;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Subsurface anomaly class assigned from reflection shape.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyType {
    Metal,
    Stone,
    Void,
    Organic,
    Unknown,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::Metal => "metal",
            AnomalyType::Stone => "stone",
            AnomalyType::Void => "void",
            AnomalyType::Organic => "organic",
            AnomalyType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified reflection, positioned on the survey grid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Anomaly {
    pub x: f64,
    pub y: f64,
    #[serde(rename = "type")]
    pub kind: AnomalyType,
    pub confidence: f64,
    pub amplitude: f64,
    pub depth: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Layer {
    pub start_depth: f64,
    pub end_depth: f64,
    pub mean_amplitude: f64,
    pub std_amplitude: f64,
    pub thickness: f64,
}

/// Layer segmentation of one trace.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LayerAnalysis {
    pub layers: Vec<Layer>,
    /// Depth of every boundary candidate, accepted or not.
    pub boundaries: Vec<f64>,
    pub total_depth: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

/// Single-profile radar result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RadarReport {
    pub anomalies: Vec<Anomaly>,
    pub total_detected: usize,
    pub layer_analysis: LayerAnalysis,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ScanArea {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl ScanArea {
    /// Bounding box of the anomalies, all zeros when there are none.
    pub fn covering(anomalies: &[Anomaly]) -> Self {
        if anomalies.is_empty() {
            return Self::default();
        }
        anomalies.iter().fold(
            Self {
                min_x: f64::INFINITY,
                max_x: f64::NEG_INFINITY,
                min_y: f64::INFINITY,
                max_y: f64::NEG_INFINITY,
            },
            |area, a| Self {
                min_x: area.min_x.min(a.x),
                max_x: area.max_x.max(a.x),
                min_y: area.min_y.min(a.y),
                max_y: area.max_y.max(a.y),
            },
        )
    }
}

/// Multi-profile radar result; anomalies sorted by descending confidence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    pub anomalies: Vec<Anomaly>,
    pub layer_analysis: Vec<LayerAnalysis>,
    pub total_anomalies_detected: usize,
    pub scan_area: ScanArea,
}

/// Material label reported by the spectral classifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MaterialLabel {
    Ceramic,
    Metal,
    Organic,
    Stone,
    Unknown,
}

impl MaterialLabel {
    /// Classes the model is trained on, in the model's column order.
    pub const TRAINED: [MaterialLabel; 4] = [
        MaterialLabel::Ceramic,
        MaterialLabel::Metal,
        MaterialLabel::Organic,
        MaterialLabel::Stone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialLabel::Ceramic => "ceramic",
            MaterialLabel::Metal => "metal",
            MaterialLabel::Organic => "organic",
            MaterialLabel::Stone => "stone",
            MaterialLabel::Unknown => "unknown",
        }
    }

    /// Case-insensitive lookup; anything unrecognized is `Unknown`.
    pub fn parse_lossy(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "ceramic" => MaterialLabel::Ceramic,
            "metal" => MaterialLabel::Metal,
            "organic" => MaterialLabel::Organic,
            "stone" => MaterialLabel::Stone,
            _ => MaterialLabel::Unknown,
        }
    }
}

impl fmt::Display for MaterialLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SpectralSignature {
    pub wavelengths: Vec<f64>,
    pub intensities: Vec<f64>,
}

/// Outcome of classifying one spectrum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub material_type: MaterialLabel,
    pub confidence: f64,
    pub all_probabilities: BTreeMap<MaterialLabel, f64>,
    pub is_reliable: bool,
    pub spectral_signature: SpectralSignature,
    pub environmental_context: EnvironmentalContext,
}
