use crate::processing::reflection::Reflection;
use crate::sensor_interface::{Anomaly, AnomalyType};

/// Samples on each side of a reflection that form its neighborhood.
const NEIGHBORHOOD_RADIUS: usize = 10;
const QUIET_LEVEL: f64 = 0.1;

/// Shape descriptors a rule is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleInput {
    pub magnitude: f64,
    pub width: usize,
    /// Fraction of the neighborhood with magnitude below the quiet level.
    pub quiet_fraction: f64,
}

/// One row of the ordered classification table.
pub struct ClassificationRule {
    pub label: AnomalyType,
    pub matches: fn(&RuleInput) -> bool,
    pub confidence: fn(&RuleInput) -> f64,
}

fn is_metal(r: &RuleInput) -> bool {
    r.magnitude > 0.7 && r.width < 5
}

fn metal_confidence(r: &RuleInput) -> f64 {
    r.magnitude.min(0.95)
}

fn is_stone(r: &RuleInput) -> bool {
    r.magnitude > 0.3 && r.magnitude < 0.7 && r.width > 8
}

fn stone_confidence(r: &RuleInput) -> f64 {
    (r.magnitude * 1.1).min(0.85)
}

// Overlaps the stone band for 0.3 < |a| < 0.5; stone is listed first.
fn is_organic(r: &RuleInput) -> bool {
    r.magnitude > 0.2 && r.magnitude < 0.5 && r.width > 10
}

fn organic_confidence(r: &RuleInput) -> f64 {
    (r.magnitude * 1.2).min(0.75)
}

fn is_void(r: &RuleInput) -> bool {
    r.magnitude < 0.2 && r.quiet_fraction > 0.7
}

fn void_confidence(_: &RuleInput) -> f64 {
    0.7
}

/// Evaluated top to bottom; the first matching row wins.
pub const ANOMALY_RULES: [ClassificationRule; 4] = [
    ClassificationRule {
        label: AnomalyType::Metal,
        matches: is_metal,
        confidence: metal_confidence,
    },
    ClassificationRule {
        label: AnomalyType::Stone,
        matches: is_stone,
        confidence: stone_confidence,
    },
    ClassificationRule {
        label: AnomalyType::Organic,
        matches: is_organic,
        confidence: organic_confidence,
    },
    ClassificationRule {
        label: AnomalyType::Void,
        matches: is_void,
        confidence: void_confidence,
    },
];

/// Assigns a material/void label to reflections from amplitude and width.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnomalyClassifier;

impl AnomalyClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify_anomaly(
        &self,
        amplitude: f64,
        width: usize,
        neighborhood: &[f64],
    ) -> (AnomalyType, f64) {
        let quiet = neighborhood.iter().filter(|v| v.abs() < QUIET_LEVEL).count();
        let quiet_fraction = if neighborhood.is_empty() {
            0.0
        } else {
            quiet as f64 / neighborhood.len() as f64
        };
        let input = RuleInput {
            magnitude: amplitude.abs(),
            width,
            quiet_fraction,
        };

        ANOMALY_RULES
            .iter()
            .find(|rule| (rule.matches)(&input))
            .map(|rule| (rule.label, (rule.confidence)(&input)))
            .unwrap_or((AnomalyType::Unknown, (input.magnitude * 0.5).max(0.1)))
    }

    /// Builds positioned anomalies, in reflection order.
    pub fn classify_reflections(
        &self,
        signal: &[f64],
        reflections: &[Reflection],
        depth_resolution: f64,
        x: f64,
        y: f64,
    ) -> Vec<Anomaly> {
        reflections
            .iter()
            .map(|reflection| {
                let start = reflection.index.saturating_sub(NEIGHBORHOOD_RADIUS);
                let end = (reflection.index + NEIGHBORHOOD_RADIUS).min(signal.len());
                let (kind, confidence) = self.classify_anomaly(
                    reflection.amplitude,
                    reflection.width,
                    &signal[start..end],
                );
                Anomaly {
                    x,
                    y,
                    kind,
                    confidence,
                    amplitude: reflection.amplitude,
                    depth: reflection.index as f64 * depth_resolution,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_narrow_reflections_are_always_metal() {
        let classifier = AnomalyClassifier::new();
        let quiet = vec![0.0; 20];
        for amplitude in [0.71, 0.8, 0.95, 1.4, -0.75, -3.0] {
            for width in 0..5 {
                let (kind, confidence) = classifier.classify_anomaly(amplitude, width, &quiet);
                assert_eq!(kind, AnomalyType::Metal);
                assert!(confidence <= 0.95);
            }
        }
    }

    #[test]
    fn overlap_between_stone_and_organic_resolves_to_stone() {
        let classifier = AnomalyClassifier::new();
        let (kind, confidence) = classifier.classify_anomaly(0.4, 12, &[]);
        assert_eq!(kind, AnomalyType::Stone);
        assert!((confidence - 0.44).abs() < 1e-12);
    }

    #[test]
    fn weak_broad_reflection_is_organic() {
        let classifier = AnomalyClassifier::new();
        let (kind, confidence) = classifier.classify_anomaly(0.25, 11, &[]);
        assert_eq!(kind, AnomalyType::Organic);
        assert!((confidence - 0.3).abs() < 1e-12);
    }

    #[test]
    fn quiet_surroundings_make_a_void() {
        let classifier = AnomalyClassifier::new();
        let mut neighborhood = vec![0.05; 8];
        neighborhood.extend([0.5, 0.5]);
        assert_eq!(
            classifier.classify_anomaly(0.15, 3, &neighborhood),
            (AnomalyType::Void, 0.7)
        );
    }

    #[test]
    fn void_needs_strictly_more_than_seventy_percent_quiet() {
        let classifier = AnomalyClassifier::new();
        let mut neighborhood = vec![0.05; 7];
        neighborhood.extend([0.5, 0.5, 0.5]);
        assert_eq!(
            classifier.classify_anomaly(0.15, 3, &neighborhood).0,
            AnomalyType::Unknown
        );
    }

    #[test]
    fn unknown_confidence_has_a_floor() {
        let classifier = AnomalyClassifier::new();
        assert_eq!(
            classifier.classify_anomaly(0.1, 6, &[0.5; 4]),
            (AnomalyType::Unknown, 0.1)
        );
        let (kind, confidence) = classifier.classify_anomaly(0.9, 7, &[]);
        assert_eq!(kind, AnomalyType::Unknown);
        assert!((confidence - 0.45).abs() < 1e-12);
    }

    #[test]
    fn reflections_are_positioned_and_scaled_to_depth() {
        let classifier = AnomalyClassifier::new();
        let signal = [0.0, 0.0, 0.9, 0.0, 0.0];
        let reflections = [Reflection {
            index: 2,
            amplitude: 0.9,
            width: 2,
        }];
        let anomalies = classifier.classify_reflections(&signal, &reflections, 0.1, 1.5, -2.0);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyType::Metal);
        assert!((anomalies[0].depth - 0.2).abs() < 1e-12);
        assert_eq!((anomalies[0].x, anomalies[0].y), (1.5, -2.0));
    }
}
