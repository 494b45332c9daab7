pub mod estimators;
pub mod frontier;

pub use estimators::Estimates;
pub use frontier::{clean_weights, EfficientFrontier, Performance, WeightBounds};

/// Weights smaller than this are solver noise.
pub const CLEAN_CUTOFF: f64 = 1e-4;
pub const CLEAN_ROUNDING: u32 = 5;
