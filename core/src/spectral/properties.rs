use crate::sensor_interface::MaterialLabel;
use serde::Serialize;

/// Reference physical characteristics for a material class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MaterialProperties {
    /// g/cm³, `None` when the class is unknown.
    pub density_range: Option<(f64, f64)>,
    pub conductivity: &'static str,
    pub corrosion_susceptibility: &'static str,
    pub typical_age_range: &'static str,
    pub preservation_notes: &'static str,
}

const fn known(
    density: (f64, f64),
    conductivity: &'static str,
    corrosion: &'static str,
    notes: &'static str,
) -> MaterialProperties {
    MaterialProperties {
        density_range: Some(density),
        conductivity,
        corrosion_susceptibility: corrosion,
        typical_age_range: "ancient to modern",
        preservation_notes: notes,
    }
}

const METAL: MaterialProperties = known(
    (2.7, 22.6),
    "high",
    "high",
    "May corrode in wet environments",
);
const CERAMIC: MaterialProperties =
    known((2.0, 3.0), "low", "low", "Generally stable but may crack");
const ORGANIC: MaterialProperties =
    known((0.8, 1.5), "low", "high", "Requires careful preservation");
const STONE: MaterialProperties = known(
    (2.0, 3.3),
    "low",
    "medium",
    "Generally durable but may weather",
);
const UNKNOWN: MaterialProperties = MaterialProperties {
    density_range: None,
    conductivity: "unknown",
    corrosion_susceptibility: "unknown",
    typical_age_range: "unknown",
    preservation_notes: "Insufficient data for classification",
};

pub fn material_properties(label: MaterialLabel) -> &'static MaterialProperties {
    match label {
        MaterialLabel::Metal => &METAL,
        MaterialLabel::Ceramic => &CERAMIC,
        MaterialLabel::Organic => &ORGANIC,
        MaterialLabel::Stone => &STONE,
        MaterialLabel::Unknown => &UNKNOWN,
    }
}
