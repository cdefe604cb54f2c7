use serde::{Deserialize, Serialize};

/// Geographic fix reported by the device.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

/// Ground-penetrating radar capture: one depth profile, or a scan of several.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RadarFrame {
    #[serde(default)]
    pub depth_profile: Vec<f64>,
    /// Additional profiles for a multi-profile scan.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depth_profiles: Vec<Vec<f64>>,
    /// Survey (x, y) positions, one per profile.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coordinates: Vec<(f64, f64)>,
    /// Anomalies already flagged on the device, passed through untouched.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anomalies: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl RadarFrame {
    pub fn is_scan(&self) -> bool {
        !self.depth_profiles.is_empty()
    }
}

/// Conditions under which a spectrum was captured.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct EnvironmentalContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpectrometerFrame {
    pub wavelengths: Vec<f64>,
    pub intensity: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environmental_context: Option<EnvironmentalContext>,
    #[serde(default)]
    pub timestamp: i64,
}

/// Environmental scalars from the water-quality probes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnvironmentalReading {
    /// NTU
    pub turbidity: f64,
    /// Celsius
    pub temperature: f64,
    /// ppm
    pub tds: f64,
    /// hPa
    pub pressure: f64,
    /// percent
    pub humidity: f64,
    /// cm to the seabed; used as the depth proxy
    pub distance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ph: Option<f64>,
    pub timestamp: i64,
}

/// Still image from the survey camera; distributed without analytics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CameraFrame {
    #[serde(default)]
    pub image_base64: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps: Option<GeoPoint>,
    #[serde(default)]
    pub timestamp: i64,
}

/// One raw frame as received from the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorFrame {
    Radar(RadarFrame),
    Spectrometer(SpectrometerFrame),
    Environmental(EnvironmentalReading),
    Camera(CameraFrame),
}

impl SensorFrame {
    pub fn kind(&self) -> &'static str {
        match self {
            SensorFrame::Radar(_) => "radar",
            SensorFrame::Spectrometer(_) => "spectrometer",
            SensorFrame::Environmental(_) => "environmental",
            SensorFrame::Camera(_) => "camera",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_deserialize_by_kind_tag() {
        let raw = r#"{"kind":"radar","depth_profile":[0.1,0.9,0.1],"timestamp":5,"device_id":"esp32-a"}"#;
        match serde_json::from_str::<SensorFrame>(raw).unwrap() {
            SensorFrame::Radar(frame) => {
                assert_eq!(frame.depth_profile.len(), 3);
                assert_eq!(frame.device_id.as_deref(), Some("esp32-a"));
                assert!(!frame.is_scan());
            }
            other => panic!("unexpected frame {}", other.kind()),
        }
    }

    #[test]
    fn environmental_fields_default_when_missing() {
        let raw = r#"{"kind":"environmental","turbidity":30.0,"tds":420.0}"#;
        match serde_json::from_str::<SensorFrame>(raw).unwrap() {
            SensorFrame::Environmental(reading) => {
                assert_eq!(reading.turbidity, 30.0);
                assert_eq!(reading.temperature, 0.0);
                assert!(reading.ph.is_none());
            }
            other => panic!("unexpected frame {}", other.kind()),
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(serde_json::from_str::<SensorFrame>(r#"{"kind":"sonar"}"#).is_err());
    }
}
