use thiserror::Error;

/// Failure kinds surfaced by the numeric core.
///
/// All of these are precondition violations detected at function entry,
/// before any transform work starts; none are retried internally.
#[derive(Debug, Error)]
pub enum DiffractionError {
    #[error("parameter error: {0}")]
    Parameter(String),
    #[error("sampling too low: {required} cells needed at the requested pitch, grid ceiling is {ceiling}")]
    SamplingTooLow { required: usize, ceiling: usize },
    #[error("shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },
    #[error("regime violation: |z| = {z} is below the far-field limit {z_limit}")]
    RegimeViolation { z: f64, z_limit: f64 },
}

pub type Result<T> = std::result::Result<T, DiffractionError>;

pub(crate) fn parameter<S: Into<String>>(msg: S) -> DiffractionError {
    DiffractionError::Parameter(msg.into())
}
