//! Spectral feature extraction and material classification.

pub mod classifier;
pub mod features;
pub mod forest;
pub mod properties;
pub mod training;

pub use classifier::{ClassifierConfig, MaterialClassifier, TrainingSummary};
pub use features::{SpectralFeatureExtractor, FEATURE_COUNT};
pub use properties::{material_properties, MaterialProperties};
