//! Digital filters used to condition radar depth traces.
//!
//! The Butterworth bandpass is realized as a cascade of second-order
//! sections (a lowpass at the upper edge followed by a highpass at the
//! lower edge). Zero-phase filtering runs the cascade forward and
//! backward over an odd-reflected extension of the trace.

use crate::math::matrix::MatrixHelper;
use ndarray::{Array1, Array2};
use num_complex::Complex64;
use std::f64::consts::PI;

/// Second-order section `H(z) = (b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a: [f64; 2],
}

impl Biquad {
    pub fn new(b: [f64; 3], a: [f64; 2]) -> Self {
        Self { b, a }
    }

    /// Poles inside the unit circle.
    pub fn is_stable(&self) -> bool {
        self.a[1].abs() < 1.0 && self.a[0].abs() < 1.0 + self.a[1]
    }

    pub fn is_finite(&self) -> bool {
        self.b.iter().chain(self.a.iter()).all(|c| c.is_finite())
    }

    /// Gain at DC.
    fn dc_gain(&self) -> f64 {
        (self.b[0] + self.b[1] + self.b[2]) / (1.0 + self.a[0] + self.a[1])
    }

    /// Runs the section over `input` (Direct Form II Transposed), starting
    /// from the steady state of a constant signal equal to the first sample.
    fn run_steady(&self, input: &[f64]) -> Vec<f64> {
        let Some(&x0) = input.first() else {
            return Vec::new();
        };
        let gain = self.dc_gain();
        let mut s1 = ((self.b[1] + self.b[2]) - gain * (self.a[0] + self.a[1])) * x0;
        let mut s2 = (self.b[2] - self.a[1] * gain) * x0;

        input
            .iter()
            .map(|&x| {
                let y = self.b[0] * x + s1;
                s1 = self.b[1] * x - self.a[0] * y + s2;
                s2 = self.b[2] * x - self.a[1] * y;
                y
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Lowpass,
    Highpass,
}

/// Butterworth bandpass designed from cutoffs normalized to Nyquist.
#[derive(Debug, Clone)]
pub struct ButterworthBandpass {
    sections: Vec<Biquad>,
    order: usize,
}

impl ButterworthBandpass {
    /// Designs the cascade. `low` and `high` are fractions of Nyquist.
    pub fn design(order: usize, low: f64, high: f64) -> Result<Self, String> {
        if order == 0 || order > 10 {
            return Err(format!("unsupported filter order {}", order));
        }
        if !(low.is_finite() && high.is_finite()) || low <= 0.0 || high >= 1.0 || low >= high {
            return Err(format!("degenerate band ({:.4}, {:.4})", low, high));
        }

        let mut sections = edge_sections(order, high, Edge::Lowpass);
        sections.extend(edge_sections(order, low, Edge::Highpass));

        if let Some(bad) = sections.iter().find(|s| !s.is_finite() || !s.is_stable()) {
            return Err(format!("unstable section {:?}", bad));
        }

        Ok(Self { sections, order })
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Extension length used on each side by [`Self::filtfilt`].
    pub fn pad_len(&self) -> usize {
        3 * (2 * self.order + 1)
    }

    /// Causal single pass through the whole cascade.
    pub fn filter(&self, input: &[f64]) -> Vec<f64> {
        self.sections
            .iter()
            .fold(input.to_vec(), |signal, section| section.run_steady(&signal))
    }

    /// Zero-phase forward-backward filtering.
    ///
    /// Fails when the trace is not longer than the padding, or when the
    /// filtered output stops being finite.
    pub fn filtfilt(&self, input: &[f64]) -> Result<Vec<f64>, String> {
        let pad = self.pad_len();
        let n = input.len();
        if n <= pad {
            return Err(format!(
                "trace of {} samples is too short for padding of {}",
                n, pad
            ));
        }

        let extended = odd_extend(input, pad);
        let mut forward = self.filter(&extended);
        forward.reverse();
        let mut backward = self.filter(&forward);
        backward.reverse();

        let output = backward[pad..pad + n].to_vec();
        if output.iter().any(|v| !v.is_finite()) {
            return Err("filter produced non-finite samples".to_string());
        }
        Ok(output)
    }
}

/// Odd reflection about both endpoints, `pad` samples per side.
fn odd_extend(input: &[f64], pad: usize) -> Vec<f64> {
    let n = input.len();
    let first = input[0];
    let last = input[n - 1];
    let mut out = Vec::with_capacity(n + 2 * pad);
    out.extend((1..=pad).rev().map(|i| 2.0 * first - input[i]));
    out.extend_from_slice(input);
    out.extend((1..=pad).map(|i| 2.0 * last - input[n - 1 - i]));
    out
}

/// Sections of a Butterworth lowpass or highpass edge via the bilinear transform.
fn edge_sections(order: usize, cutoff: f64, edge: Edge) -> Vec<Biquad> {
    // Bilinear constant with the sample period normalized so Nyquist = 1.
    let k = 2.0;
    let wc = k * (PI * cutoff / 2.0).tan();
    let mut sections = Vec::with_capacity(order.div_ceil(2));

    for idx in 0..order / 2 {
        let theta = PI * (2 * idx + 1) as f64 / (2 * order) as f64;
        let pole = Complex64::new(-theta.sin(), theta.cos()) * wc;
        sections.push(bilinear_pair(pole, k, edge));
    }
    if order % 2 == 1 {
        sections.push(bilinear_real(-wc, k, edge));
    }
    sections
}

fn bilinear_pair(pole: Complex64, k: f64, edge: Edge) -> Biquad {
    let mag_sq = pole.norm_sqr();
    let k2 = k * k;
    let d = k2 - 2.0 * k * pole.re + mag_sq;
    let a = [2.0 * (mag_sq - k2) / d, (k2 + 2.0 * k * pole.re + mag_sq) / d];
    let b = match edge {
        Edge::Lowpass => [mag_sq / d, 2.0 * mag_sq / d, mag_sq / d],
        Edge::Highpass => [k2 / d, -2.0 * k2 / d, k2 / d],
    };
    Biquad::new(b, a)
}

fn bilinear_real(pole: f64, k: f64, edge: Edge) -> Biquad {
    let wc = -pole;
    let d = k + wc;
    let a = [(wc - k) / d, 0.0];
    let b = match edge {
        Edge::Lowpass => [wc / d, wc / d, 0.0],
        Edge::Highpass => [k / d, -k / d, 0.0],
    };
    Biquad::new(b, a)
}

/// Savitzky–Golay smoother with polynomial-fit edge handling.
#[derive(Debug, Clone)]
pub struct SavitzkyGolay {
    window: usize,
    /// `weights[t]` evaluates the window fit at offset `t - half`.
    weights: Vec<Vec<f64>>,
}

impl SavitzkyGolay {
    pub fn new(window: usize, poly_order: usize) -> Result<Self, String> {
        if window % 2 == 0 || window < 3 {
            return Err(format!("window {} must be odd and at least 3", window));
        }
        if poly_order >= window {
            return Err(format!(
                "polynomial order {} must be below window {}",
                poly_order, window
            ));
        }

        let half = (window / 2) as i64;
        let terms = poly_order + 1;
        let design = Array2::from_shape_fn((window, terms), |(row, col)| {
            ((row as i64 - half) as f64).powi(col as i32)
        });
        let normal = MatrixHelper::multiply(design.t(), design.view());

        let mut weights = Vec::with_capacity(window);
        for offset in -half..=half {
            let basis = Array1::from_shape_fn(terms, |col| (offset as f64).powi(col as i32));
            let solved = MatrixHelper::solve(normal.view(), basis.view())
                .ok_or_else(|| "singular Savitzky-Golay normal matrix".to_string())?;
            weights.push(design.dot(&solved).to_vec());
        }

        Ok(Self { window, weights })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn smooth(&self, input: &[f64]) -> Vec<f64> {
        let n = input.len();
        let w = self.window;
        if n < w {
            return input.to_vec();
        }
        let half = w / 2;
        let apply = |weights: &[f64], window: &[f64]| -> f64 {
            weights.iter().zip(window).map(|(c, v)| c * v).sum()
        };

        let mut out = vec![0.0; n];
        for i in half..n - half {
            out[i] = apply(&self.weights[half], &input[i - half..=i + half]);
        }
        let head = &input[..w];
        let tail = &input[n - w..];
        for i in 0..half {
            out[i] = apply(&self.weights[i], head);
            out[n - half + i] = apply(&self.weights[half + 1 + i], tail);
        }
        out
    }
}
