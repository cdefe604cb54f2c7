//! Synthetic reference spectra used to fit the material model.

use crate::sensor_interface::MaterialLabel;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};

pub const SPECTRUM_POINTS: usize = 100;
pub const SPECTRUM_START_NM: f64 = 400.0;
pub const SPECTRUM_END_NM: f64 = 1000.0;

const BASE_NOISE: f64 = 0.1;
const JITTER_SIGMA: f64 = 0.05;

/// Peak injected into a synthetic spectrum: sample index drawn from
/// `low..high`, intensity raised by `boost`.
#[derive(Debug, Clone, Copy)]
struct InjectedPeak {
    low: usize,
    high: usize,
    boost: f64,
}

const fn peak(low: usize, high: usize, boost: f64) -> InjectedPeak {
    InjectedPeak { low, high, boost }
}

// iron, copper
const METAL_PEAKS: [InjectedPeak; 2] = [peak(29, 31, 0.8), peak(65, 67, 0.6)];
// silica, aluminum
const CERAMIC_PEAKS: [InjectedPeak; 2] = [peak(90, 100, 0.7), peak(45, 47, 0.5)];
// C-H, hydroxyl
const ORGANIC_PEAKS: [InjectedPeak; 2] = [peak(60, 70, 0.6), peak(90, 95, 0.7)];
// carbonate, Si-O
const STONE_PEAKS: [InjectedPeak; 2] = [peak(40, 50, 0.6), peak(67, 80, 0.7)];

fn reference_peaks(label: MaterialLabel) -> &'static [InjectedPeak] {
    match label {
        MaterialLabel::Metal => &METAL_PEAKS,
        MaterialLabel::Ceramic => &CERAMIC_PEAKS,
        MaterialLabel::Organic => &ORGANIC_PEAKS,
        MaterialLabel::Stone => &STONE_PEAKS,
        MaterialLabel::Unknown => &[],
    }
}

/// Evenly spaced wavelength grid shared by every synthetic spectrum.
pub fn wavelength_grid() -> Vec<f64> {
    let step = (SPECTRUM_END_NM - SPECTRUM_START_NM) / (SPECTRUM_POINTS - 1) as f64;
    (0..SPECTRUM_POINTS)
        .map(|i| SPECTRUM_START_NM + step * i as f64)
        .collect()
}

/// One noisy spectrum carrying the reference peaks of `label`.
pub fn synthesize_spectrum(label: MaterialLabel, rng: &mut StdRng) -> Vec<f64> {
    let mut intensities: Vec<f64> = (0..SPECTRUM_POINTS)
        .map(|_| rng.gen::<f64>() * BASE_NOISE)
        .collect();

    for injected in reference_peaks(label) {
        let idx = rng.gen_range(injected.low..injected.high);
        intensities[idx] += injected.boost;
    }

    // sigma is a positive constant
    if let Ok(jitter) = Normal::new(0.0, JITTER_SIGMA) {
        for value in intensities.iter_mut() {
            *value += jitter.sample(rng);
        }
    }

    intensities.iter_mut().for_each(|v| *v = v.clamp(0.0, 1.0));
    intensities
}

/// `per_class` spectra for every trained label, in [`MaterialLabel::TRAINED`] order.
pub fn synthesize_dataset(per_class: usize, rng: &mut StdRng) -> Vec<(MaterialLabel, Vec<f64>)> {
    MaterialLabel::TRAINED
        .iter()
        .flat_map(|&label| std::iter::repeat(label).take(per_class))
        .map(|label| (label, synthesize_spectrum(label, rng)))
        .collect()
}
