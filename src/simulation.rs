use std::cell::Cell;

use log::{info, warn};
use nalgebra::DVector;

use crate::ball::Ball;
use crate::collision::dispatcher::{GlobalPairQueue, GlobalWallQueue, PairHeap};
use crate::error::SimulationError;

/// Uniform acceleration applied to every ball every instant.
///
/// `Scalar` is a convenience constructor for the common "gravity along
/// the last axis" case; `Vector` allows an arbitrary per-axis
/// acceleration (including zero, for a gravity-free box).
#[derive(Clone, Debug)]
pub enum Gravity {
    Zero,
    /// Magnitude applied along the box's last axis, pointing toward the
    /// lower bound (the conventional "down").
    Scalar(f64),
    Vector(DVector<f64>),
}

impl Gravity {
    fn into_vector(self, n_dims: usize) -> DVector<f64> {
        match self {
            Gravity::Zero => DVector::zeros(n_dims),
            Gravity::Scalar(g) => {
                let mut v = DVector::zeros(n_dims);
                v[n_dims - 1] = -g;
                v
            }
            Gravity::Vector(v) => v,
        }
    }
}

/// A box wall that one or more balls is currently overlapping, found by
/// [`Simulation::find_containment_violations`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContainmentViolation {
    pub ball_index: usize,
    pub axis: usize,
    pub penetration: f64,
}

/// Two balls found overlapping by [`Simulation::find_overlap_violations`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlapViolation {
    pub i: usize,
    pub j: usize,
    pub penetration: f64,
}

/// Outcome of a single [`Simulation::advance`] call.
///
/// `containment_violations` and `overlap_violations` are only populated
/// when `advance` was called with `check_overlap: true`; otherwise they
/// are always empty (the probes are not run).
#[derive(Clone, Debug, PartialEq)]
pub struct AdvanceReport {
    pub events_processed: usize,
    pub time: f64,
    pub containment_violations: Vec<ContainmentViolation>,
    pub overlap_violations: Vec<OverlapViolation>,
}

/// An event-driven n-dimensional elastic-collision simulation of rigid
/// balls bouncing inside an axis-aligned box under uniform gravity.
///
/// All public mutation goes through [`Simulation::add_ball`] and
/// [`Simulation::advance`]; everything else is a read-only query over
/// the current state.
pub struct Simulation {
    pub(crate) box_dims: DVector<f64>,
    pub(crate) gravity: DVector<f64>,
    pub(crate) balls: Vec<Ball>,
    pub(crate) pair_heaps: Vec<PairHeap>,
    pub(crate) gw: GlobalWallQueue,
    pub(crate) gp: GlobalPairQueue,
    time: f64,
    advancing: Cell<bool>,
}

impl Simulation {
    /// Create an empty simulation in an n-dimensional box, where `n` is
    /// `box_dims.len()`. `gravity` may be [`Gravity::Zero`] for a
    /// free-flight box.
    pub fn new(box_dims: DVector<f64>, gravity: Gravity) -> Result<Self, SimulationError> {
        for (axis, &dim) in box_dims.iter().enumerate() {
            if dim <= 0.0 {
                return Err(SimulationError::NonPositiveBoxDimension { axis, value: dim });
            }
        }
        let n_dims = box_dims.len();
        let gravity = gravity.into_vector(n_dims);
        Ok(Simulation {
            box_dims,
            gravity,
            balls: Vec::new(),
            pair_heaps: Vec::new(),
            gw: GlobalWallQueue::new(),
            gp: GlobalPairQueue::new(),
            time: 0.0,
            advancing: Cell::new(false),
        })
    }

    pub fn n_dims(&self) -> usize {
        self.box_dims.len()
    }

    pub fn box_dims(&self) -> &DVector<f64> {
        &self.box_dims
    }

    pub fn gravity(&self) -> &DVector<f64> {
        &self.gravity
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn balls(&self) -> &[Ball] {
        &self.balls
    }

    pub fn n_balls(&self) -> usize {
        self.balls.len()
    }

    /// Add a ball at the simulation's current time.
    ///
    /// When `check_overlap` is `true`, the ball is rejected (returning
    /// `false`, adding nothing) if it would overlap an existing ball or
    /// extend outside the box; when `false`, those checks are skipped
    /// and the ball is always accepted, matching §4.6/§6's opt-in
    /// `checkOverlap` flag.
    pub fn add_ball(
        &mut self,
        mass: f64,
        radius: f64,
        position: DVector<f64>,
        velocity: DVector<f64>,
        check_overlap: bool,
    ) -> Result<bool, SimulationError> {
        if position.len() != self.n_dims() {
            return Err(SimulationError::DimensionMismatch {
                expected: self.n_dims(),
                got: position.len(),
            });
        }
        if velocity.len() != self.n_dims() {
            return Err(SimulationError::DimensionMismatch {
                expected: self.n_dims(),
                got: velocity.len(),
            });
        }
        if check_overlap {
            for axis in 0..self.n_dims() {
                let (lo, hi) = (radius, self.box_dims[axis] - radius);
                if position[axis] < lo || position[axis] > hi {
                    return Ok(false);
                }
            }
            for existing in &self.balls {
                let dist = (existing.position() - &position).norm();
                if dist < existing.radius() + radius {
                    return Ok(false);
                }
            }
        }

        let ball = Ball::new(
            mass,
            radius,
            self.time,
            position,
            velocity,
            &self.box_dims,
            &self.gravity,
        )?;
        self.balls.push(ball);
        info!("added ball {} (total {})", self.balls.len() - 1, self.balls.len());
        self.initialize_heaps();
        Ok(true)
    }

    /// Advance the simulation to `self.time() + dt`, resolving every
    /// wall and pair collision along the way in strict time order.
    ///
    /// When `check_overlap` is `true`, containment and overlap probes
    /// run once the horizon is reached and any violations found are
    /// logged and returned in the report's diagnostic fields (§4.6,
    /// §7); when `false` those fields are always empty and no probe
    /// runs.
    ///
    /// Returns an error rather than re-entering if called from within
    /// an in-progress `advance` (e.g. via a callback); the engine has
    /// no such callbacks today, but the guard is cheap and matches how
    /// the facade is meant to be driven.
    pub fn advance(&mut self, dt: f64, check_overlap: bool) -> Result<AdvanceReport, SimulationError> {
        if self.advancing.get() {
            return Err(SimulationError::Reentrant);
        }
        self.advancing.set(true);
        let horizon = self.time + dt;
        let events_processed = self.run_dispatcher(horizon);
        for ball in &mut self.balls {
            ball.rebase(horizon, &self.gravity);
        }
        self.time = horizon;
        self.advancing.set(false);

        let (containment_violations, overlap_violations) = if check_overlap {
            let containment = self.find_containment_violations();
            let overlap = self.find_overlap_violations();
            for v in &containment {
                warn!(
                    "ball {} penetrates axis {} wall by {}",
                    v.ball_index, v.axis, v.penetration
                );
            }
            for v in &overlap {
                warn!("balls {} and {} overlap by {}", v.i, v.j, v.penetration);
            }
            (containment, overlap)
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(AdvanceReport {
            events_processed,
            time: self.time,
            containment_violations,
            overlap_violations,
        })
    }

    pub fn kinetic_energy(&self) -> f64 {
        self.balls.iter().map(Ball::kinetic_energy).sum()
    }

    pub fn potential_energy(&self) -> f64 {
        self.balls.iter().map(|b| b.potential_energy(&self.gravity)).sum()
    }

    pub fn mechanical_energy(&self) -> f64 {
        self.kinetic_energy() + self.potential_energy()
    }

    /// Balls whose centre currently lies outside its permitted range on
    /// some axis. Intended as a diagnostic, not something `advance`
    /// should ever produce.
    pub fn find_containment_violations(&self) -> Vec<ContainmentViolation> {
        let mut out = Vec::new();
        for (idx, ball) in self.balls.iter().enumerate() {
            if let Some((axis, far)) = ball.outside_box() {
                let (lo, hi) = ball.center_range(axis);
                let penetration = if far {
                    ball.position()[axis] - hi
                } else {
                    lo - ball.position()[axis]
                };
                out.push(ContainmentViolation {
                    ball_index: idx,
                    axis,
                    penetration,
                });
            }
        }
        out
    }

    /// Pairs of balls whose centres are currently closer than the sum
    /// of their radii.
    pub fn find_overlap_violations(&self) -> Vec<OverlapViolation> {
        let mut out = Vec::new();
        for i in 0..self.balls.len() {
            for j in (i + 1)..self.balls.len() {
                let dist = (self.balls[i].position() - self.balls[j].position()).norm();
                let radius_sum = self.balls[i].radius() + self.balls[j].radius();
                if dist < radius_sum {
                    out.push(OverlapViolation {
                        i,
                        j,
                        penetration: radius_sum - dist,
                    });
                }
            }
        }
        out
    }

    /// Human-readable summary of any current overlap, or `None` if the
    /// state is clean. Mirrors the diagnostic message the reference
    /// simulator prints when an invariant probe trips.
    pub fn any_overlap_message(&self) -> Option<String> {
        let violations = self.find_overlap_violations();
        if violations.is_empty() {
            return None;
        }
        let mut message = String::new();
        for v in &violations {
            warn!(
                "balls {} and {} overlap by {}",
                v.i, v.j, v.penetration
            );
            message.push_str(&format!(
                "balls {} and {} overlap by {:.6}\n",
                v.i, v.j, v.penetration
            ));
        }
        Some(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(xs: &[f64]) -> DVector<f64> {
        DVector::from_vec(xs.to_vec())
    }

    #[test]
    fn rejects_nonpositive_box_dims() {
        assert!(Simulation::new(v(&[10.0, -1.0]), Gravity::Zero).is_err());
    }

    #[test]
    fn add_ball_rejects_wall_overlap() {
        let mut sim = Simulation::new(v(&[10.0, 10.0]), Gravity::Zero).unwrap();
        let ok = sim.add_ball(1.0, 1.0, v(&[0.1, 5.0]), v(&[0.0, 0.0]), true).unwrap();
        assert!(!ok);
        assert_eq!(sim.n_balls(), 0);
    }

    #[test]
    fn add_ball_rejects_ball_overlap() {
        let mut sim = Simulation::new(v(&[10.0, 10.0]), Gravity::Zero).unwrap();
        assert!(sim.add_ball(1.0, 1.0, v(&[5.0, 5.0]), v(&[0.0, 0.0]), true).unwrap());
        let ok = sim.add_ball(1.0, 1.0, v(&[5.5, 5.0]), v(&[0.0, 0.0]), true).unwrap();
        assert!(!ok);
        assert_eq!(sim.n_balls(), 1);
    }

    #[test]
    fn add_ball_skips_checks_when_check_overlap_false() {
        let mut sim = Simulation::new(v(&[10.0, 10.0]), Gravity::Zero).unwrap();
        assert!(sim.add_ball(1.0, 1.0, v(&[5.0, 5.0]), v(&[0.0, 0.0]), true).unwrap());
        let ok = sim.add_ball(1.0, 1.0, v(&[5.5, 5.0]), v(&[0.0, 0.0]), false).unwrap();
        assert!(ok);
        assert_eq!(sim.n_balls(), 2);
    }

    #[test]
    fn single_ball_free_flight_advances_position() {
        let mut sim = Simulation::new(v(&[100.0, 100.0]), Gravity::Zero).unwrap();
        sim.add_ball(1.0, 1.0, v(&[50.0, 50.0]), v(&[1.0, 0.0]), true).unwrap();
        sim.advance(2.0, false).unwrap();
        let p = sim.balls()[0].position();
        assert!((p[0] - 52.0).abs() < 1e-6);
    }

    #[test]
    fn wall_bounce_conserves_energy() {
        let mut sim = Simulation::new(v(&[10.0, 10.0]), Gravity::Zero).unwrap();
        sim.add_ball(1.0, 1.0, v(&[5.0, 5.0]), v(&[5.0, 0.0]), true).unwrap();
        let e0 = sim.mechanical_energy();
        sim.advance(3.0, false).unwrap();
        let e1 = sim.mechanical_energy();
        assert!((e0 - e1).abs() < 1e-6);
        assert!(sim.find_containment_violations().is_empty());
    }

    #[test]
    fn advance_check_overlap_reports_no_violations_for_clean_state() {
        let mut sim = Simulation::new(v(&[10.0, 10.0]), Gravity::Zero).unwrap();
        sim.add_ball(1.0, 1.0, v(&[5.0, 5.0]), v(&[5.0, 0.0]), true).unwrap();
        let report = sim.advance(3.0, true).unwrap();
        assert!(report.containment_violations.is_empty());
        assert!(report.overlap_violations.is_empty());
    }
}
