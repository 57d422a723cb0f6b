//! Error taxonomy for plant generation.

use thiserror::Error;

/// Errors raised by the topology generators, the spline evaluator and the
/// growth/mesh stage.
///
/// Configuration errors abort the run. Structural errors are reported where
/// the broken invariant is detected; recoverable conditions (an over-popped
/// branch stack, a zero-length growth direction) are logged instead of
/// being returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlantError {
    #[error("spline needs at least 3 control points, got {0}")]
    NotEnoughControlPoints(usize),

    #[error("spline resolution must be at least 2, got {0}")]
    ResolutionTooSmall(usize),

    #[error("L-system asks for {iterations} iterations but has no rewrite rules")]
    EmptyRuleSet { iterations: u32 },

    #[error("shape size range is inverted: min {min} > max {max}")]
    InvertedSizeRange { min: f32, max: f32 },

    #[error("taper profile needs at least one key")]
    EmptyTaperProfile,

    #[error("taper profile keys must be sorted by position (key {index} is out of order)")]
    UnsortedTaperProfile { index: usize },

    #[error("{what} must be positive and finite, got {value}")]
    NonPositiveDuration { what: &'static str, value: f32 },

    #[error("invalid {what}: {reason}")]
    InvalidRange { what: &'static str, reason: String },

    #[error("segment {0} has no visual grouping assigned")]
    MissingStrand(usize),

    #[error("branch graph is empty")]
    EmptyGraph,
}

impl PlantError {
    /// Whether this error comes from bad input parameters (as opposed to a
    /// broken topology invariant).
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Self::MissingStrand(_) | Self::EmptyGraph)
    }
}

/// Result alias used throughout the plant crates.
pub type PlantResult<T> = Result<T, PlantError>;
