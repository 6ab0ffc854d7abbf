use std::cmp::Reverse;
use std::collections::BinaryHeap;

use nalgebra::DVector;
use ordered_float::OrderedFloat;

use crate::collision::geometry;
use crate::error::SimulationError;

/// A single rigid, frictionless body in the simulation.
///
/// Position and velocity are only ever stored relative to a reference
/// time `t0`; callers that need the state at some other time go
/// through [`Ball::position_at`] / [`Ball::velocity_at`] rather than
/// mutating `t0` directly. The only operations that change `t0` are
/// [`Ball::rebase`] and wall-event application, both of which happen
/// exactly at a collision.
#[derive(Clone, Debug)]
pub struct Ball {
    mass: f64,
    radius: f64,
    t0: f64,
    p0: DVector<f64>,
    v0: DVector<f64>,
    /// `(lo, hi)` per axis: the closed interval this ball's centre must
    /// stay within. Cached at construction since `radius` is immutable.
    center_ranges: Vec<(f64, f64)>,
    /// Min-heap of (absolute hit time, axis) for this ball's own future
    /// wall contacts, one entry per axis with nonzero relative motion.
    wall_heap: BinaryHeap<Reverse<(OrderedFloat<f64>, usize)>>,
    /// Bumped on every event (wall bounce or pair collision) this ball
    /// participates in. Lets stale pair-heap entries be recognised
    /// without rescanning the heap.
    generation: u64,
}

impl Ball {
    pub fn new(
        mass: f64,
        radius: f64,
        t0: f64,
        p0: DVector<f64>,
        v0: DVector<f64>,
        box_dims: &DVector<f64>,
        g: &DVector<f64>,
    ) -> Result<Self, SimulationError> {
        if mass <= 0.0 {
            return Err(SimulationError::NonPositiveMass { value: mass });
        }
        if radius <= 0.0 {
            return Err(SimulationError::NonPositiveRadius { value: radius });
        }
        let center_ranges = box_dims.iter().map(|&dim| (radius, dim - radius)).collect();
        let mut ball = Ball {
            mass,
            radius,
            t0,
            p0,
            v0,
            center_ranges,
            wall_heap: BinaryHeap::new(),
            generation: 0,
        };
        ball.initialize_wall_heap(g);
        Ok(ball)
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn t0(&self) -> f64 {
        self.t0
    }

    pub fn n_dims(&self) -> usize {
        self.center_ranges.len()
    }

    pub fn center_range(&self, axis: usize) -> (f64, f64) {
        self.center_ranges[axis]
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Position at `t`, assuming free flight (no intervening collision)
    /// from the reference state.
    pub fn position_at(&self, t: f64, g: &DVector<f64>) -> DVector<f64> {
        let dt = t - self.t0;
        &self.p0 + &self.v0 * dt + g * (0.5 * dt * dt)
    }

    /// Velocity at `t`, assuming free flight from the reference state.
    pub fn velocity_at(&self, t: f64, g: &DVector<f64>) -> DVector<f64> {
        &self.v0 + g * (t - self.t0)
    }

    pub fn position_and_velocity_at(&self, t: f64, g: &DVector<f64>) -> (DVector<f64>, DVector<f64>) {
        (self.position_at(t, g), self.velocity_at(t, g))
    }

    /// Current reference position.
    pub fn position(&self) -> &DVector<f64> {
        &self.p0
    }

    /// Current reference velocity.
    pub fn velocity(&self) -> &DVector<f64> {
        &self.v0
    }

    /// Replace the reference state with the state at `t`, assuming free
    /// flight up to `t`. Existing wall-heap entries stay valid because
    /// they are expressed as absolute times, not times relative to
    /// `t0`.
    pub fn rebase(&mut self, t: f64, g: &DVector<f64>) {
        if t == self.t0 {
            return;
        }
        let (p, v) = self.position_and_velocity_at(t, g);
        self.p0 = p;
        self.v0 = v;
        self.t0 = t;
    }

    fn time_to_wall(&self, axis: usize, g: &DVector<f64>) -> Option<f64> {
        let (lo, hi) = self.center_ranges[axis];
        geometry::time_to_wall(self.p0[axis], self.v0[axis], g[axis], lo, hi)
    }

    /// Clear and fully recompute the wall-collision heap from the
    /// current reference state. Called whenever this ball's trajectory
    /// changes (construction, after a wall bounce, after a pair
    /// collision).
    pub fn initialize_wall_heap(&mut self, g: &DVector<f64>) {
        self.wall_heap.clear();
        for axis in 0..self.n_dims() {
            self.push_wall_candidate(axis, g);
        }
    }

    /// Push a fresh candidate for a single axis without disturbing the
    /// other axes' entries, used right after a wall bounce on that
    /// axis.
    pub fn update_wall_heap_for_axis(&mut self, axis: usize, g: &DVector<f64>) {
        self.push_wall_candidate(axis, g);
    }

    fn push_wall_candidate(&mut self, axis: usize, g: &DVector<f64>) {
        if self.v0[axis] == 0.0 && g[axis] == 0.0 {
            return;
        }
        if let Some(dt) = self.time_to_wall(axis, g) {
            self.wall_heap.push(Reverse((OrderedFloat(self.t0 + dt), axis)));
        }
    }

    pub fn next_wall_time(&self) -> Option<f64> {
        self.wall_heap.peek().map(|Reverse((t, _))| t.into_inner())
    }

    /// Pop the soonest wall contact, rebase to it, negate that axis'
    /// velocity component, re-seed just that axis, and bump the
    /// generation counter. Returns the axis that was hit, or `None` if
    /// the wall heap was empty.
    pub fn apply_next_wall_event(&mut self, g: &DVector<f64>) -> Option<usize> {
        let Reverse((t, axis)) = self.wall_heap.pop()?;
        self.rebase(t.into_inner(), g);
        self.v0[axis] = -self.v0[axis];
        self.generation += 1;
        self.update_wall_heap_for_axis(axis, g);
        Some(axis)
    }

    /// Apply an instantaneous velocity change from a pair collision and
    /// bump the generation counter.
    pub(crate) fn apply_pair_delta(&mut self, delta: &DVector<f64>) {
        self.v0 += delta;
        self.generation += 1;
    }

    /// `Some((axis, far))` if the current reference position has left
    /// its centre range on some axis, `far` indicating which of the two
    /// walls normal to that axis was crossed.
    pub fn outside_box(&self) -> Option<(usize, bool)> {
        for axis in 0..self.n_dims() {
            let (lo, hi) = self.center_ranges[axis];
            if self.p0[axis] < lo {
                return Some((axis, false));
            }
            if self.p0[axis] > hi {
                return Some((axis, true));
            }
        }
        None
    }

    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * self.v0.norm_squared()
    }

    pub fn potential_energy(&self, g: &DVector<f64>) -> f64 {
        -self.mass * g.dot(&self.p0)
    }

    pub fn mechanical_energy(&self, g: &DVector<f64>) -> f64 {
        self.kinetic_energy() + self.potential_energy(g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec_of(xs: &[f64]) -> DVector<f64> {
        DVector::from_vec(xs.to_vec())
    }

    #[test]
    fn free_flight_no_gravity_keeps_straight_line() {
        let g = vec_of(&[0.0, 0.0]);
        let dims = vec_of(&[10.0, 10.0]);
        let ball = Ball::new(1.0, 0.5, 0.0, vec_of(&[5.0, 5.0]), vec_of(&[1.0, 0.0]), &dims, &g).unwrap();
        let p = ball.position_at(2.0, &g);
        assert!((p[0] - 7.0).abs() < 1e-12);
        assert!((p[1] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn wall_heap_predicts_correct_bounce_time() {
        let g = vec_of(&[0.0, 0.0]);
        let dims = vec_of(&[10.0, 10.0]);
        let ball = Ball::new(1.0, 0.5, 0.0, vec_of(&[5.0, 5.0]), vec_of(&[3.0, 0.0]), &dims, &g).unwrap();
        // Centre range on axis 0 is [0.5, 9.5]; starting at 5.0 moving
        // at 3.0, reaches 9.5 at dt = 1.5.
        let t = ball.next_wall_time().unwrap();
        assert!((t - 1.5).abs() < 1e-9);
    }

    #[test]
    fn construction_rejects_non_positive_mass_or_radius() {
        let g = vec_of(&[0.0]);
        let dims = vec_of(&[10.0]);
        assert!(Ball::new(0.0, 1.0, 0.0, vec_of(&[5.0]), vec_of(&[0.0]), &dims, &g).is_err());
        assert!(Ball::new(1.0, 0.0, 0.0, vec_of(&[5.0]), vec_of(&[0.0]), &dims, &g).is_err());
    }

    #[test]
    fn rebase_preserves_wall_heap_absolute_times() {
        let g = vec_of(&[0.0, 0.0]);
        let dims = vec_of(&[10.0, 10.0]);
        let mut ball = Ball::new(1.0, 0.5, 0.0, vec_of(&[5.0, 5.0]), vec_of(&[3.0, 0.0]), &dims, &g).unwrap();
        let before = ball.next_wall_time().unwrap();
        ball.rebase(1.0, &g);
        let after = ball.next_wall_time().unwrap();
        assert!((before - after).abs() < 1e-12);
    }

    #[test]
    fn apply_next_wall_event_bumps_generation() {
        let g = vec_of(&[0.0, 0.0]);
        let dims = vec_of(&[10.0, 10.0]);
        let mut ball = Ball::new(1.0, 0.5, 0.0, vec_of(&[5.0, 5.0]), vec_of(&[3.0, 0.0]), &dims, &g).unwrap();
        let before_gen = ball.generation();
        let axis = ball.apply_next_wall_event(&g).unwrap();
        assert_eq!(axis, 0);
        assert_eq!(ball.generation(), before_gen + 1);
        assert!(ball.velocity()[0] < 0.0);
    }
}
