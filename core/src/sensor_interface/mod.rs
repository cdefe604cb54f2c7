pub mod frame;
pub mod records;

pub use frame::{
    CameraFrame, EnvironmentalContext, EnvironmentalReading, GeoPoint, RadarFrame, SensorFrame,
    SpectrometerFrame,
};
pub use records::{
    Anomaly, AnomalyType, Classification, Layer, LayerAnalysis, MaterialLabel, Position,
    RadarReport, ScanArea, ScanReport, SpectralSignature,
};
