use crate::math::stats::StatsHelper;
use crate::prelude::Recovered;

/// 5 statistics + 3 peak descriptors + slope + 9 signature bands.
pub const FEATURE_COUNT: usize = 18;
const PEAK_THRESHOLD: f64 = 0.3;

/// Wavelength band (nm) tied to a material signature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignatureBand {
    pub name: &'static str,
    pub start: f64,
    pub end: f64,
}

pub const IRON_BAND: SignatureBand = SignatureBand {
    name: "fe_peak",
    start: 290.0,
    end: 310.0,
};
pub const SILICA_BAND: SignatureBand = SignatureBand {
    name: "si_peak",
    start: 900.0,
    end: 1000.0,
};
pub const CARBON_HYDROGEN_BAND: SignatureBand = SignatureBand {
    name: "ch_peak",
    start: 1600.0,
    end: 1700.0,
};

/// Per reference material: which of the (fe, si, ch) slots it carries.
const SIGNATURE_LAYOUT: [[Option<SignatureBand>; 3]; 3] = [
    // metal
    [Some(IRON_BAND), None, None],
    // ceramic
    [None, Some(SILICA_BAND), None],
    // organic
    [None, None, Some(CARBON_HYDROGEN_BAND)],
];

/// Derives the fixed-length feature vector from a raw spectrum.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpectralFeatureExtractor;

impl SpectralFeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Rescales to [0, 1]; a constant spectrum maps to all zeros.
    pub fn normalize(intensities: &[f64]) -> Vec<f64> {
        let (min, max) = intensities
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let span = max - min;
        if intensities.is_empty() || span == 0.0 || !span.is_finite() {
            return vec![0.0; intensities.len()];
        }
        intensities.iter().map(|v| (v - min) / span).collect()
    }

    /// Strict interior local maxima above `threshold`.
    pub fn find_peaks(intensities: &[f64], threshold: f64) -> Vec<usize> {
        if intensities.len() < 3 {
            return Vec::new();
        }
        (1..intensities.len() - 1)
            .filter(|&i| {
                intensities[i] > intensities[i - 1]
                    && intensities[i] > intensities[i + 1]
                    && intensities[i] > threshold
            })
            .collect()
    }

    /// Highest intensity among samples whose wavelength falls in `band`.
    pub fn band_intensity(wavelengths: &[f64], intensities: &[f64], band: SignatureBand) -> f64 {
        wavelengths
            .iter()
            .zip(intensities)
            .filter(|(wl, _)| **wl >= band.start && **wl <= band.end)
            .map(|(_, &value)| value)
            .fold(None, |best: Option<f64>, v| Some(best.map_or(v, |b| b.max(v))))
            .unwrap_or(0.0)
    }

    pub fn extract(&self, wavelengths: &[f64], intensities: &[f64]) -> Recovered<Vec<f64>> {
        if intensities.is_empty() {
            return Recovered::degraded(vec![0.0; FEATURE_COUNT], "empty spectrum");
        }
        if wavelengths.len() != intensities.len() {
            return Recovered::degraded(
                vec![0.0; FEATURE_COUNT],
                format!(
                    "wavelength/intensity length mismatch ({} vs {})",
                    wavelengths.len(),
                    intensities.len()
                ),
            );
        }
        if wavelengths.iter().chain(intensities).any(|v| !v.is_finite()) {
            return Recovered::degraded(vec![0.0; FEATURE_COUNT], "non-finite spectrum sample");
        }

        let normalized = Self::normalize(intensities);
        let mut features = Vec::with_capacity(FEATURE_COUNT);

        features.push(StatsHelper::mean(&normalized));
        features.push(StatsHelper::std_dev(&normalized));
        features.push(normalized.iter().copied().fold(f64::NEG_INFINITY, f64::max));
        features.push(normalized.iter().copied().fold(f64::INFINITY, f64::min));
        features.push(StatsHelper::median(&normalized));

        let peaks: Vec<f64> = Self::find_peaks(&normalized, PEAK_THRESHOLD)
            .into_iter()
            .map(|idx| idx as f64)
            .collect();
        features.push(peaks.len() as f64);
        features.push(StatsHelper::mean(&peaks));
        features.push(StatsHelper::std_dev(&peaks));

        let last = normalized.len() - 1;
        let span = wavelengths[last] - wavelengths[0];
        let slope = if last > 0 && span != 0.0 {
            (normalized[last] - normalized[0]) / span
        } else {
            0.0
        };
        features.push(slope);

        for slots in SIGNATURE_LAYOUT {
            for slot in slots {
                features.push(
                    slot.map_or(0.0, |band| Self::band_intensity(wavelengths, &normalized, band)),
                );
            }
        }

        Recovered::clean(features)
    }
}
