//! Weighted environmental preservation index over probe averages.

use crate::sensor_interface::EnvironmentalReading;
use serde::Serialize;

const TEMPERATURE_WEIGHT: f64 = 0.3;
const TDS_WEIGHT: f64 = 0.25;
const TURBIDITY_WEIGHT: f64 = 0.15;
const DEPTH_WEIGHT: f64 = 0.2;
const PH_WEIGHT: f64 = 0.1;

/// Normalized [0, 1] score per factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FactorScores {
    pub temperature: f64,
    pub tds: f64,
    pub turbidity: f64,
    pub depth: f64,
    pub ph: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FactorAverages {
    pub temperature: f64,
    pub tds: f64,
    pub turbidity: f64,
    pub depth: f64,
    pub ph: f64,
}

impl Default for FactorAverages {
    fn default() -> Self {
        Self {
            temperature: 20.0,
            tds: 500.0,
            turbidity: 10.0,
            depth: 2.0,
            ph: 7.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimestampRange {
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiPointPreservation {
    pub preservation_percentage: f64,
    pub factors: Option<FactorScores>,
    pub averages: Option<FactorAverages>,
    pub readings_used: usize,
    pub timestamp_range: Option<TimestampRange>,
}

/// Percentage in [0, 100] and the factor scores it was built from.
///
/// Temperature peaks at 10 °C, TDS and turbidity degrade linearly, depth
/// saturates at 40 m and pH is ideal at 7.
pub fn calculate_preservation_index(
    temperature: f64,
    tds: f64,
    turbidity: f64,
    depth: f64,
    ph: f64,
) -> (f64, FactorScores) {
    let unit = |v: f64| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
    let scores = FactorScores {
        temperature: unit((30.0 - (temperature - 10.0).abs()) / 20.0),
        tds: unit((2500.0 - tds) / 2000.0),
        turbidity: unit((100.0 - turbidity) / 95.0),
        depth: if depth.is_finite() {
            ((depth + 10.0) / 50.0).min(1.0)
        } else {
            0.0
        },
        ph: unit((1.5 - (ph - 7.0).abs()) / 1.5),
    };

    let weighted = scores.temperature * TEMPERATURE_WEIGHT
        + scores.tds * TDS_WEIGHT
        + scores.turbidity * TURBIDITY_WEIGHT
        + scores.depth * DEPTH_WEIGHT
        + scores.ph * PH_WEIGHT;
    let percentage = (weighted * 100.0).clamp(0.0, 100.0);
    (if percentage.is_finite() { percentage } else { 0.0 }, scores)
}

fn finite_mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Averages several probe readings (distance stands in for depth) and
/// scores the averages. Factors without usable samples fall back to
/// typical values.
pub fn calculate_multi_point_preservation(
    readings: &[EnvironmentalReading],
) -> MultiPointPreservation {
    if readings.is_empty() {
        return MultiPointPreservation {
            preservation_percentage: 0.0,
            factors: None,
            averages: None,
            readings_used: 0,
            timestamp_range: None,
        };
    }

    let fallback = FactorAverages::default();
    let averages = FactorAverages {
        temperature: finite_mean(readings.iter().map(|r| r.temperature))
            .unwrap_or(fallback.temperature),
        tds: finite_mean(readings.iter().map(|r| r.tds)).unwrap_or(fallback.tds),
        turbidity: finite_mean(readings.iter().map(|r| r.turbidity)).unwrap_or(fallback.turbidity),
        depth: finite_mean(readings.iter().map(|r| r.distance)).unwrap_or(fallback.depth),
        ph: finite_mean(readings.iter().filter_map(|r| r.ph)).unwrap_or(fallback.ph),
    };

    let (percentage, factors) = calculate_preservation_index(
        averages.temperature,
        averages.tds,
        averages.turbidity,
        averages.depth,
        averages.ph,
    );

    let stamps = readings.iter().map(|r| r.timestamp).filter(|t| *t > 0);
    let timestamp_range = stamps
        .clone()
        .min()
        .zip(stamps.max())
        .map(|(start, end)| TimestampRange { start, end });

    MultiPointPreservation {
        preservation_percentage: percentage,
        factors: Some(factors),
        averages: Some(averages),
        readings_used: readings.len(),
        timestamp_range,
    }
}

pub fn preservation_recommendations(percentage: f64) -> Vec<&'static str> {
    if percentage >= 80.0 {
        vec![
            "Excellent preservation conditions detected",
            "Objects likely to maintain structural integrity",
            "Standard monitoring protocols sufficient",
        ]
    } else if percentage >= 60.0 {
        vec![
            "Good preservation conditions",
            "Minor degradation possible over long periods",
            "Regular monitoring recommended",
        ]
    } else if percentage >= 40.0 {
        vec![
            "Moderate preservation risk",
            "Increased degradation rate possible",
            "Enhanced protective measures advised",
            "More frequent condition assessments needed",
        ]
    } else {
        vec![
            "Poor preservation conditions detected",
            "Significant degradation risk",
            "Immediate protective interventions required",
            "Consider relocation to controlled environment",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_scenario_is_strictly_inside_range() {
        let (pct, scores) = calculate_preservation_index(15.0, 400.0, 20.0, 2.0, 7.2);
        assert!(pct > 0.0 && pct < 100.0);
        assert_eq!(scores.temperature, 1.0);
        assert_eq!(scores.tds, 1.0);
        assert!((scores.depth - 0.24).abs() < 1e-12);
        assert!((pct - 81.1).abs() < 0.1);
    }

    #[test]
    fn hostile_conditions_bottom_out() {
        let (pct, _) = calculate_preservation_index(60.0, 5000.0, 200.0, -10.0, 2.0);
        assert_eq!(pct, 0.0);
        let (nan, _) =
            calculate_preservation_index(f64::NAN, f64::NAN, f64::NAN, f64::NAN, f64::NAN);
        assert_eq!(nan, 0.0);
    }

    #[test]
    fn multi_point_uses_defaults_and_timestamp_range() {
        let readings = [
            EnvironmentalReading {
                temperature: 14.0,
                tds: 300.0,
                turbidity: 12.0,
                distance: 4.0,
                timestamp: 200,
                ..Default::default()
            },
            EnvironmentalReading {
                temperature: 16.0,
                tds: 500.0,
                turbidity: 28.0,
                distance: 6.0,
                timestamp: 100,
                ..Default::default()
            },
        ];
        let result = calculate_multi_point_preservation(&readings);
        let averages = result.averages.unwrap();
        assert_eq!(averages.temperature, 15.0);
        assert_eq!(averages.ph, 7.0);
        assert_eq!(result.readings_used, 2);
        assert_eq!(result.timestamp_range, Some(TimestampRange { start: 100, end: 200 }));

        let empty = calculate_multi_point_preservation(&[]);
        assert_eq!(empty.preservation_percentage, 0.0);
        assert!(empty.factors.is_none());
    }

    #[test]
    fn recommendation_bands_switch_at_boundaries() {
        assert_eq!(
            preservation_recommendations(80.0)[0],
            "Excellent preservation conditions detected"
        );
        assert_eq!(preservation_recommendations(79.99)[0], "Good preservation conditions");
        assert_eq!(preservation_recommendations(60.0).len(), 3);
        assert_eq!(preservation_recommendations(40.0)[0], "Moderate preservation risk");
        assert_eq!(preservation_recommendations(39.9).len(), 4);
    }
}
