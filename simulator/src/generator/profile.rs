use rand::{rngs::StdRng, Rng, SeedableRng};
use scancore::sensor_interface::{
    CameraFrame, EnvironmentalReading, GeoPoint, MaterialLabel, RadarFrame, SensorFrame,
    SpectrometerFrame,
};
use scancore::spectral::training::{synthesize_spectrum, wavelength_grid};
use std::time::{SystemTime, UNIX_EPOCH};

const SURVEY_ORIGIN: GeoPoint = GeoPoint {
    lat: 55.7558,
    lng: 37.6176,
    accuracy: Some(2.5),
};

/// Single-reflector depth trace used for demos and smoke tests.
pub fn reference_depth_profile() -> Vec<f64> {
    vec![0.1, 0.2, 0.15, 0.3, 0.8, 0.9, 0.85, 0.3, 0.2, 0.15, 0.1]
}

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Seeded source of plausible sensor frames, cycling through every kind.
pub struct SyntheticSensor {
    rng: StdRng,
    jitter: f64,
    tick: u64,
}

impl SyntheticSensor {
    pub fn new(seed: u64, jitter: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            jitter: jitter.abs(),
            tick: 0,
        }
    }

    fn vary(&mut self, value: f64) -> f64 {
        if self.jitter == 0.0 {
            return value;
        }
        value * (1.0 + self.rng.gen_range(-self.jitter..self.jitter))
    }

    pub fn radar_frame(&mut self) -> RadarFrame {
        let depth_profile = reference_depth_profile()
            .into_iter()
            .map(|v| self.vary(v))
            .collect();
        let x = self.tick as f64 * 0.1;
        RadarFrame {
            depth_profile,
            coordinates: vec![(x, 0.0)],
            location: Some(SURVEY_ORIGIN),
            timestamp: now_millis(),
            device_id: Some("sim-gpr-01".to_string()),
            ..Default::default()
        }
    }

    pub fn spectrometer_frame(&mut self, label: MaterialLabel) -> SpectrometerFrame {
        SpectrometerFrame {
            wavelengths: wavelength_grid(),
            intensity: synthesize_spectrum(label, &mut self.rng),
            environmental_context: None,
            timestamp: now_millis(),
        }
    }

    pub fn environmental_reading(&mut self) -> EnvironmentalReading {
        EnvironmentalReading {
            turbidity: self.vary(30.0),
            temperature: self.vary(22.5),
            tds: self.vary(420.0),
            pressure: self.vary(1013.2),
            humidity: self.vary(45.2),
            distance: self.vary(3.2),
            ph: Some(self.vary(7.1)),
            timestamp: now_millis(),
        }
    }

    pub fn camera_frame(&self) -> CameraFrame {
        CameraFrame {
            image_base64: String::new(),
            gps: Some(SURVEY_ORIGIN),
            timestamp: now_millis(),
        }
    }

    /// Next frame in the radar, spectrometer, environmental, camera rotation.
    pub fn next_frame(&mut self) -> SensorFrame {
        let frame = match self.tick % 4 {
            0 => SensorFrame::Radar(self.radar_frame()),
            1 => {
                let pick = self.rng.gen_range(0..MaterialLabel::TRAINED.len());
                let label = MaterialLabel::TRAINED[pick];
                SensorFrame::Spectrometer(self.spectrometer_frame(label))
            }
            2 => SensorFrame::Environmental(self.environmental_reading()),
            _ => SensorFrame::Camera(self.camera_frame()),
        };
        self.tick += 1;
        frame
    }
}
