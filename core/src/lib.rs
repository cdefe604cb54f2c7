//! Analytics and live-distribution core for the underwater survey platform.
//!
//! The modules turn raw sensor frames (radar depth profiles, spectrometer
//! spectra, environmental scalars) into derived analytics and fan the
//! results out to live subscribers through the [`broadcast::BroadcastHub`].

pub mod broadcast;
pub mod math;
pub mod preservation;
pub mod prelude;
pub mod processing;
pub mod sensor_interface;
pub mod spectral;
pub mod telemetry;

pub use prelude::{ProcessingStage, Recovered, StageConfig, StageInput, StageOutput};
