use crate::preservation::round2;
use crate::sensor_interface::EnvironmentalReading;
use crate::telemetry::log::LogManager;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

const DEFAULT_PRESERVATION: f64 = 100.0;
const DEFAULT_TEMPERATURE: f64 = 20.0;

/// Survival baseline and step penalties for one material.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PreservationFactor {
    pub key: &'static str,
    pub base_survival: f64,
    pub turbidity_threshold: f64,
    pub turbidity_penalty: f64,
    pub temperature_threshold: f64,
    pub temperature_penalty: f64,
    pub tds_threshold: f64,
    pub tds_penalty: f64,
}

const fn factor(
    key: &'static str,
    base_survival: f64,
    turbidity: (f64, f64),
    temperature: (f64, f64),
    tds: (f64, f64),
) -> PreservationFactor {
    PreservationFactor {
        key,
        base_survival,
        turbidity_threshold: turbidity.0,
        turbidity_penalty: turbidity.1,
        temperature_threshold: temperature.0,
        temperature_penalty: temperature.1,
        tds_threshold: tds.0,
        tds_penalty: tds.1,
    }
}

/// (threshold, penalty) pairs for turbidity (NTU), temperature (°C) and TDS (ppm).
pub static MATERIAL_TABLE: [PreservationFactor; 30] = [
    factor("wood", 20.0, (50.0, 10.0), (25.0, 5.0), (500.0, 5.0)),
    factor("paper", 15.0, (50.0, 15.0), (25.0, 5.0), (500.0, 5.0)),
    factor("fabric", 20.0, (50.0, 10.0), (25.0, 5.0), (500.0, 5.0)),
    factor("leather", 25.0, (50.0, 10.0), (25.0, 5.0), (500.0, 5.0)),
    factor("bone", 25.0, (50.0, 5.0), (25.0, 5.0), (500.0, 5.0)),
    factor("lead", 50.0, (80.0, 5.0), (30.0, 2.0), (1000.0, 2.0)),
    factor("copper", 45.0, (80.0, 5.0), (30.0, 2.0), (1000.0, 3.0)),
    factor("brass", 45.0, (80.0, 5.0), (30.0, 2.0), (1000.0, 3.0)),
    factor("tin", 40.0, (80.0, 5.0), (30.0, 2.0), (1000.0, 3.0)),
    factor("zinc", 35.0, (80.0, 5.0), (30.0, 2.0), (1000.0, 3.0)),
    factor("iron", 30.0, (50.0, 10.0), (30.0, 5.0), (800.0, 5.0)),
    factor("steel", 40.0, (50.0, 5.0), (30.0, 3.0), (800.0, 5.0)),
    factor("ceramic", 70.0, (100.0, 5.0), (1000.0, 0.0), (10000.0, 0.0)),
    factor("clay", 60.0, (100.0, 5.0), (1000.0, 0.0), (10000.0, 0.0)),
    factor("soft_stone", 60.0, (100.0, 5.0), (1000.0, 0.0), (10000.0, 0.0)),
    factor("hard_stone", 90.0, (150.0, 2.0), (1000.0, 0.0), (10000.0, 0.0)),
    factor("glass", 80.0, (100.0, 5.0), (1000.0, 0.0), (10000.0, 0.0)),
    factor("plastic", 75.0, (150.0, 2.0), (1000.0, 0.0), (10000.0, 0.0)),
    factor("rubber", 65.0, (150.0, 2.0), (1000.0, 0.0), (10000.0, 0.0)),
    factor("quartz", 95.0, (10000.0, 0.0), (10000.0, 0.0), (10000.0, 0.0)),
    factor("gold", 100.0, (10000.0, 0.0), (10000.0, 0.0), (10000.0, 0.0)),
    factor("silver", 95.0, (150.0, 2.0), (1000.0, 0.0), (1500.0, 2.0)),
    factor("platinum", 100.0, (10000.0, 0.0), (10000.0, 0.0), (10000.0, 0.0)),
    factor("porcelain", 90.0, (150.0, 2.0), (1000.0, 0.0), (10000.0, 0.0)),
    factor("marble", 85.0, (150.0, 2.0), (1000.0, 0.0), (10000.0, 0.0)),
    factor("bronze", 75.0, (80.0, 5.0), (30.0, 2.0), (1000.0, 3.0)),
    factor("asphalt", 65.0, (80.0, 5.0), (1000.0, 0.0), (1000.0, 2.0)),
    factor("ebonite", 65.0, (80.0, 5.0), (1000.0, 0.0), (1000.0, 2.0)),
    factor("fired_clay", 80.0, (150.0, 2.0), (1000.0, 0.0), (10000.0, 0.0)),
    factor("obsidian", 95.0, (10000.0, 0.0), (10000.0, 0.0), (10000.0, 0.0)),
];

/// Probe values after replacing non-finite readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SanitizedReadings {
    pub turbidity: f64,
    pub temperature: f64,
    pub tds: f64,
}

impl SanitizedReadings {
    pub fn from_reading(reading: &EnvironmentalReading) -> Self {
        let finite_or = |value: f64, fallback: f64| {
            if value.is_finite() {
                value
            } else {
                fallback
            }
        };
        Self {
            turbidity: finite_or(reading.turbidity, 0.0),
            temperature: finite_or(reading.temperature, DEFAULT_TEMPERATURE),
            tds: finite_or(reading.tds, 0.0),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PreservationReport {
    pub water_preservation: f64,
    /// Per-material percentages in table order.
    #[serde(serialize_with = "ordered_map")]
    pub materials: Vec<(&'static str, f64)>,
    pub final_preservation: f64,
    pub sensor_readings: SanitizedReadings,
}

impl PreservationReport {
    pub fn material(&self, key: &str) -> Option<f64> {
        self.materials
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| *value)
    }
}

fn ordered_map<S: Serializer>(
    entries: &[(&'static str, f64)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for (key, value) in entries {
        map.serialize_entry(key, value)?;
    }
    map.end()
}

fn finite_or_default(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        DEFAULT_PRESERVATION
    }
}

/// Step-penalty preservation model over the material table.
#[derive(Debug, Clone)]
pub struct PreservationScorer {
    table: &'static [PreservationFactor],
    logger: LogManager,
}

impl PreservationScorer {
    pub fn new() -> Self {
        Self {
            table: &MATERIAL_TABLE,
            logger: LogManager::new("PreservationScorer"),
        }
    }

    pub fn materials(&self) -> &'static [PreservationFactor] {
        self.table
    }

    /// Percentage in [0, 100]; materials outside the table score 100.
    pub fn calculate_material_preservation(
        &self,
        material: &str,
        reading: &EnvironmentalReading,
    ) -> f64 {
        match self.table.iter().find(|f| f.key == material) {
            Some(factor) => Self::score_factor(factor, &SanitizedReadings::from_reading(reading)),
            None => DEFAULT_PRESERVATION,
        }
    }

    fn score_factor(factor: &PreservationFactor, readings: &SanitizedReadings) -> f64 {
        let mut preservation = factor.base_survival;
        if readings.turbidity > factor.turbidity_threshold {
            preservation -= factor.turbidity_penalty;
        }
        if readings.temperature > factor.temperature_threshold {
            preservation -= factor.temperature_penalty;
        }
        if readings.tds > factor.tds_threshold {
            preservation -= factor.tds_penalty;
        }
        round2(finite_or_default(preservation).clamp(0.0, 100.0))
    }

    pub fn calculate_water_preservation(&self, reading: &EnvironmentalReading) -> f64 {
        let readings = SanitizedReadings::from_reading(reading);
        let impact = (readings.turbidity - 10.0).max(0.0) * 0.5
            + (readings.tds - 50.0).max(0.0) * 0.02
            + (readings.temperature - 20.0).max(0.0) * 0.3;
        round2(finite_or_default((100.0 - impact).max(0.0)))
    }

    pub fn calculate_preservation_report(
        &self,
        reading: &EnvironmentalReading,
    ) -> PreservationReport {
        let readings = SanitizedReadings::from_reading(reading);
        let materials: Vec<(&'static str, f64)> = self
            .table
            .iter()
            .map(|factor| (factor.key, Self::score_factor(factor, &readings)))
            .collect();

        let final_preservation = if materials.is_empty() {
            DEFAULT_PRESERVATION
        } else {
            let mean = materials.iter().map(|(_, v)| v).sum::<f64>() / materials.len() as f64;
            round2(finite_or_default(mean))
        };
        let water_preservation = self.calculate_water_preservation(reading);

        self.logger.detail(&format!(
            "water {:.2}%, final {:.2}% over {} materials",
            water_preservation,
            final_preservation,
            materials.len()
        ));

        PreservationReport {
            water_preservation,
            materials,
            final_preservation,
            sensor_readings: readings,
        }
    }
}

impl Default for PreservationScorer {
    fn default() -> Self {
        Self::new()
    }
}
