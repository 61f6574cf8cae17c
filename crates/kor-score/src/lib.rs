//! Dimension calculators and the two-fidelity opportunity scorer.

pub mod dimensions;
pub mod scorer;

pub use dimensions::{composite, linreg_slope, COMPOSITE_WEIGHTS, NEUTRAL};
pub use scorer::{compose, OpportunityScorer, SignalSet};

pub const CRATE_NAME: &str = "kor-score";
