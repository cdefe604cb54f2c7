pub mod filter;
pub mod matrix;
pub mod stats;

pub use filter::{Biquad, ButterworthBandpass, SavitzkyGolay};
pub use matrix::MatrixHelper;
pub use stats::StatsHelper;
