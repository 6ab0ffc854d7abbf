//! Event-driven elastic collision engine for rigid balls bouncing
//! inside an n-dimensional box under uniform gravity.
//!
//! The simulation never advances in fixed time steps. Instead,
//! [`Simulation::advance`] jumps directly from one collision event
//! (ball-wall or ball-ball) to the next, computed in closed form, so a
//! ball travels for an arbitrarily long stretch of simulated time in a
//! single step as long as nothing touches it.
//!
//! ```
//! use balls::{Gravity, Simulation};
//! use nalgebra::DVector;
//!
//! let mut sim = Simulation::new(DVector::from_vec(vec![10.0, 10.0]), Gravity::Zero).unwrap();
//! sim.add_ball(1.0, 0.5, DVector::from_vec(vec![5.0, 5.0]), DVector::from_vec(vec![3.0, 1.0]), true).unwrap();
//! sim.advance(1.0, false).unwrap();
//! ```

pub mod ball;
pub mod collision;
pub mod error;
pub mod simulation;

pub use ball::Ball;
pub use error::SimulationError;
pub use simulation::{AdvanceReport, ContainmentViolation, Gravity, OverlapViolation, Simulation};
