//! Environmental preservation scoring.

pub mod index;
pub mod scorer;

pub use index::{
    calculate_multi_point_preservation, calculate_preservation_index,
    preservation_recommendations, FactorScores, MultiPointPreservation,
};
pub use scorer::{PreservationFactor, PreservationReport, PreservationScorer, MATERIAL_TABLE};

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
