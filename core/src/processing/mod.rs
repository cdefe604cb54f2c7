pub mod anomaly;
pub mod conditioner;
pub mod engine;
pub mod layers;
pub mod reflection;

pub use anomaly::{AnomalyClassifier, ClassificationRule, ANOMALY_RULES};
pub use conditioner::SignalConditioner;
pub use engine::RadarEngine;
pub use layers::LayerSegmenter;
pub use reflection::{Reflection, ReflectionDetector};
