use thiserror::Error;

/// Errors raised by the collision engine itself, as opposed to the
/// ordinary boolean outcomes (`addBall` rejection, invariant-probe
/// diagnostics) the facade reports through its own return values.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum SimulationError {
    #[error("box dimension at axis {axis} must be positive, got {value}")]
    NonPositiveBoxDimension { axis: usize, value: f64 },

    #[error("ball mass must be positive, got {value}")]
    NonPositiveMass { value: f64 },

    #[error("ball radius must be positive, got {value}")]
    NonPositiveRadius { value: f64 },

    #[error("advance() was called re-entrantly on a Simulation already advancing")]
    Reentrant,

    #[error("ball position/velocity has {got} components, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}
