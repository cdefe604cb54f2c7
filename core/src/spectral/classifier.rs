use crate::prelude::{StageError, StageResult};
use crate::sensor_interface::{
    Classification, EnvironmentalContext, MaterialLabel, SpectralSignature,
};
use crate::spectral::features::{SpectralFeatureExtractor, FEATURE_COUNT};
use crate::spectral::forest::{RandomForest, StandardScaler};
use crate::spectral::training::{synthesize_dataset, wavelength_grid};
use crate::math::stats::StatsHelper;
use crate::telemetry::log::LogManager;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

const UNRELIABLE_CONFIDENCE: f64 = 0.1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierConfig {
    pub n_estimators: usize,
    pub seed: u64,
    pub samples_per_class: usize,
    pub test_fraction: f64,
    /// Confidence must exceed this for the label to be reported.
    pub reliability_threshold: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            seed: 42,
            samples_per_class: 50,
            test_fraction: 0.2,
            reliability_threshold: 0.6,
        }
    }
}

/// Accuracy figures from the most recent training run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrainingSummary {
    pub train_accuracy: f64,
    pub test_accuracy: f64,
    pub train_samples: usize,
    pub test_samples: usize,
}

#[derive(Debug)]
struct TrainedModel {
    scaler: StandardScaler,
    forest: RandomForest,
    summary: TrainingSummary,
}

/// Random-forest material classifier over spectral features.
///
/// The model is fitted on synthetic reference spectra the first time it is
/// needed; [`MaterialClassifier::train`] refits it from scratch.
pub struct MaterialClassifier {
    config: ClassifierConfig,
    extractor: SpectralFeatureExtractor,
    model: RwLock<Option<Arc<TrainedModel>>>,
    logger: LogManager,
}

impl MaterialClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            extractor: SpectralFeatureExtractor::new(),
            model: RwLock::new(None),
            logger: LogManager::new("MaterialClassifier"),
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn is_trained(&self) -> bool {
        self.model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn training_summary(&self) -> Option<TrainingSummary> {
        self.model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|model| model.summary)
    }

    /// Fits a fresh model and replaces the current one.
    pub fn train(&self) -> StageResult<TrainingSummary> {
        let model = Arc::new(self.fit()?);
        let summary = model.summary;
        *self.model.write().unwrap_or_else(PoisonError::into_inner) = Some(model);
        Ok(summary)
    }

    fn trained_model(&self) -> StageResult<Arc<TrainedModel>> {
        if let Some(model) = self
            .model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(Arc::clone(model));
        }

        let mut slot = self.model.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(model) = slot.as_ref() {
            return Ok(Arc::clone(model));
        }
        let model = Arc::new(self.fit()?);
        *slot = Some(Arc::clone(&model));
        Ok(model)
    }

    fn fit(&self) -> StageResult<TrainedModel> {
        self.logger.record("training material classifier");
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let wavelengths = wavelength_grid();

        let dataset = synthesize_dataset(self.config.samples_per_class, &mut rng);
        if dataset.is_empty() {
            return Err(StageError::Training("no training spectra".into()));
        }

        let mut order: Vec<usize> = (0..dataset.len()).collect();
        order.shuffle(&mut rng);
        let test_len = ((dataset.len() as f64 * self.config.test_fraction).ceil() as usize)
            .min(dataset.len() - 1);
        let (test_idx, train_idx) = order.split_at(test_len);

        let to_matrix = |indices: &[usize]| -> StageResult<(Array2<f64>, Vec<usize>)> {
            let mut flat = Vec::with_capacity(indices.len() * FEATURE_COUNT);
            let mut labels = Vec::with_capacity(indices.len());
            for &idx in indices {
                let (label, spectrum) = &dataset[idx];
                flat.extend(self.extractor.extract(&wavelengths, spectrum).into_inner());
                labels.push(class_index(*label));
            }
            let rows = Array2::from_shape_vec((indices.len(), FEATURE_COUNT), flat)
                .map_err(|err| StageError::Training(err.to_string()))?;
            Ok((rows, labels))
        };
        let (train_rows, train_labels) = to_matrix(train_idx)?;
        let (test_rows, test_labels) = to_matrix(test_idx)?;

        let scaler = StandardScaler::fit(train_rows.view());
        let train_scaled = scaler.transform(train_rows.view());
        let test_scaled = scaler.transform(test_rows.view());

        let forest = RandomForest::fit(
            train_scaled.view(),
            &train_labels,
            MaterialLabel::TRAINED.len(),
            self.config.n_estimators,
            self.config.seed,
        )
        .map_err(StageError::Training)?;

        let summary = TrainingSummary {
            train_accuracy: forest.score(train_scaled.view(), &train_labels),
            test_accuracy: forest.score(test_scaled.view(), &test_labels),
            train_samples: train_labels.len(),
            test_samples: test_labels.len(),
        };
        self.logger.record(&format!(
            "training completed: train accuracy {:.2}, test accuracy {:.2}",
            summary.train_accuracy, summary.test_accuracy
        ));

        Ok(TrainedModel {
            scaler,
            forest,
            summary,
        })
    }

    /// Classifies one spectrum, training the model first if needed.
    pub fn predict(
        &self,
        wavelengths: &[f64],
        intensities: &[f64],
        context: Option<EnvironmentalContext>,
    ) -> StageResult<Classification> {
        let model = self.trained_model()?;

        let features = self.extractor.extract(wavelengths, intensities);
        if let Some(reason) = &features.diagnostic {
            self.logger.degraded(&format!("spectrum features zeroed: {}", reason));
        }
        let scaled = model.scaler.transform_row(Array1::from(features.value).view());
        let probabilities = model.forest.predict_proba(scaled.view());

        let best = StatsHelper::argmax(&probabilities)
            .ok_or_else(|| StageError::Internal("model produced no probabilities".into()))?;
        let predicted = MaterialLabel::TRAINED[best];
        let mut confidence = probabilities[best];
        if let Some(ctx) = &context {
            confidence = Self::adjust_confidence_with_context(confidence, ctx);
        }
        let is_reliable = confidence > self.config.reliability_threshold;

        self.logger.detail(&format!(
            "predicted {} at {:.3} (reliable: {})",
            predicted, confidence, is_reliable
        ));

        Ok(Classification {
            material_type: if is_reliable {
                predicted
            } else {
                MaterialLabel::Unknown
            },
            confidence: if is_reliable {
                confidence
            } else {
                UNRELIABLE_CONFIDENCE
            },
            all_probabilities: MaterialLabel::TRAINED
                .iter()
                .copied()
                .zip(probabilities)
                .collect::<BTreeMap<_, _>>(),
            is_reliable,
            spectral_signature: SpectralSignature {
                wavelengths: wavelengths.to_vec(),
                intensities: intensities.to_vec(),
            },
            environmental_context: context.unwrap_or_default(),
        })
    }

    /// Lowers confidence for capture conditions that degrade measurements.
    pub fn adjust_confidence_with_context(base: f64, context: &EnvironmentalContext) -> f64 {
        let mut adjusted = base;
        if context.temperature.is_some_and(|t| t > 50.0 || t < -10.0) {
            adjusted -= 0.1;
        }
        if context.humidity.is_some_and(|h| h > 90.0) {
            adjusted -= 0.05;
        }
        if context.depth.is_some_and(|d| d > 100.0) {
            adjusted -= 0.05;
        }
        adjusted.clamp(0.05, 1.0)
    }
}

impl Default for MaterialClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

fn class_index(label: MaterialLabel) -> usize {
    MaterialLabel::TRAINED
        .iter()
        .position(|l| *l == label)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral::training::synthesize_spectrum;

    fn small() -> MaterialClassifier {
        MaterialClassifier::new(ClassifierConfig {
            n_estimators: 25,
            samples_per_class: 30,
            ..Default::default()
        })
    }

    #[test]
    fn predict_trains_lazily_and_recognizes_metal() {
        let classifier = small();
        assert!(!classifier.is_trained());

        let mut rng = StdRng::seed_from_u64(1234);
        let spectrum = synthesize_spectrum(MaterialLabel::Metal, &mut rng);
        let result = classifier.predict(&wavelength_grid(), &spectrum, None).unwrap();

        assert!(classifier.is_trained());
        assert_eq!(result.material_type, MaterialLabel::Metal);
        assert!(result.is_reliable);
        assert_eq!(result.all_probabilities.len(), 4);
        let total: f64 = result.all_probabilities.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(result.spectral_signature.intensities, spectrum);
    }

    #[test]
    fn retraining_is_deterministic() {
        let classifier = small();
        let first = classifier.train().unwrap();
        let second = classifier.train().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.test_samples, 24);
        assert_eq!(first.train_samples, 96);
        assert!(first.train_accuracy > 0.9);
    }

    #[test]
    fn malformed_spectrum_still_classifies() {
        let classifier = small();
        let result = classifier.predict(&[400.0, 410.0], &[0.3], None).unwrap();
        assert!(result.confidence > 0.0 && result.confidence <= 1.0);
        if !result.is_reliable {
            assert_eq!(result.material_type, MaterialLabel::Unknown);
            assert_eq!(result.confidence, 0.1);
        }
    }

    #[test]
    fn harsh_context_lowers_confidence() {
        let harsh = EnvironmentalContext {
            temperature: Some(60.0),
            humidity: Some(95.0),
            depth: Some(150.0),
        };
        let adjusted = MaterialClassifier::adjust_confidence_with_context(0.9, &harsh);
        assert!((adjusted - 0.7).abs() < 1e-12);

        let mild = EnvironmentalContext {
            temperature: Some(20.0),
            ..Default::default()
        };
        assert_eq!(MaterialClassifier::adjust_confidence_with_context(0.9, &mild), 0.9);
        assert_eq!(MaterialClassifier::adjust_confidence_with_context(0.1, &harsh), 0.05);
    }
}
