//! Pure, stateless collision-time prediction.
//!
//! Nothing here touches a [`crate::ball::Ball`] directly: these
//! functions take plain scalars and vectors so they can be unit-tested
//! in isolation from the heap bookkeeping that consumes their results.

use nalgebra::DVector;

/// Below this magnitude, a quantity that should mathematically be
/// exactly zero (a discriminant at grazing incidence, a separating
/// velocity) is treated as zero.
pub const EPSILON: f64 = 1e-9;

/// Smallest positive root `dt` of the one-axis equation of motion
/// `p + v*dt + 0.5*a*dt^2` hitting `lo` or `hi`, or `None` if this axis
/// never reaches either wall moving forward in time.
///
/// `p` must already lie in `[lo, hi]`. Ties and grazing contacts
/// (`disc` within [`EPSILON`] of zero) are treated as a hit.
pub fn time_to_wall(p: f64, v: f64, a: f64, lo: f64, hi: f64) -> Option<f64> {
    if a == 0.0 {
        if v == 0.0 {
            return None;
        }
        let target = if v > 0.0 { hi } else { lo };
        return Some((target - p) / v);
    }

    // Try the wall the current velocity already heads toward first
    // (independent of gravity's sign), then the opposite one, reachable
    // only once gravity reverses the motion.
    let order = if v < 0.0 { [lo, hi] } else { [hi, lo] };
    // Whether gravity is accelerating the ball further along its
    // current direction of travel, rather than decelerating it.
    let aligned = (a > 0.0) == (v >= 0.0);

    for (j, &wall) in order.iter().enumerate() {
        let d = wall - p;
        let disc = v * v + 2.0 * a * d;
        if disc < -EPSILON {
            continue;
        }
        let sqrt_disc = disc.max(0.0).sqrt();
        let ra = (sqrt_disc - v) / a;
        let rb = (-v - sqrt_disc) / a;
        let (small, large) = if ra <= rb { (ra, rb) } else { (rb, ra) };

        // Aligned motion, or the far wall (tried second, only reachable
        // after gravity has turned the ball around): the later root is
        // the physically meaningful one. Otherwise the ball reaches the
        // near wall on its first pass, before gravity can turn it back.
        let chosen = if aligned || j == 1 { large } else { small };
        return Some(chosen.max(0.0));
    }
    None
}

/// Geometric outcome of a predicted ball-ball collision, cached
/// alongside the predicted time so the eventual response computation
/// doesn't need to re-derive it.
#[derive(Clone, Debug)]
pub struct PairContact {
    pub dt: f64,
    /// Displacement from ball `i`'s centre to ball `j`'s centre at
    /// contact, i.e. the outward normal (unnormalised) at ball `i`.
    pub displacement: DVector<f64>,
}

/// Predict the next contact between two balls in free flight (no
/// intervening wall bounce), given their reference-time positions and
/// velocities and the sum of their radii. Returns `None` if they never
/// touch going forward, are already separating, or have identical
/// velocities (so their separation never changes).
pub fn pair_contact(
    p_i: &DVector<f64>,
    v_i: &DVector<f64>,
    p_j: &DVector<f64>,
    v_j: &DVector<f64>,
    radius_sum: f64,
) -> Option<PairContact> {
    let d0 = p_j - p_i;
    let u = v_j - v_i;
    let s = u.dot(&u);
    if s < EPSILON {
        // Relative velocity is ~zero: separation is constant, so
        // either they're already touching (handled by the caller not
        // re-predicting a just-resolved pair) or they never will.
        return None;
    }

    let closing = d0.dot(&u);
    if closing >= -EPSILON {
        // Separating or momentarily stationary relative to each other.
        return None;
    }

    let tau_star = -closing / s;
    let c = &d0 + &u * tau_star;
    let rad_sum_sq = radius_sum * radius_sum;
    let miss = c.dot(&c);
    if miss >= rad_sum_sq {
        return None;
    }

    let dt = tau_star - ((rad_sum_sq - miss) / s).sqrt();
    if dt < -EPSILON {
        return None;
    }
    let dt = dt.max(0.0);
    let displacement = &d0 + &u * dt;
    Some(PairContact { dt, displacement })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(xs: &[f64]) -> DVector<f64> {
        DVector::from_vec(xs.to_vec())
    }

    #[test]
    fn no_gravity_hits_forward_wall() {
        let t = time_to_wall(5.0, 2.0, 0.0, 0.0, 10.0).unwrap();
        assert!((t - 2.5).abs() < 1e-12);
    }

    #[test]
    fn no_gravity_no_motion_never_hits() {
        assert!(time_to_wall(5.0, 0.0, 0.0, 0.0, 10.0).is_none());
    }

    #[test]
    fn gravity_reverses_and_eventually_hits_floor() {
        // Ball thrown up at p=5 with v=1 under gravity a=-9.8 within
        // [0, 10] must come back down and hit the floor.
        let t = time_to_wall(5.0, 1.0, -9.8, 0.0, 10.0).unwrap();
        let p_at_t = 5.0 + 1.0 * t - 0.5 * 9.8 * t * t;
        assert!((p_at_t - 0.0).abs() < 1e-6);
    }

    #[test]
    fn approaching_balls_produce_contact() {
        let contact = pair_contact(&v(&[0.0, 0.0]), &v(&[1.0, 0.0]), &v(&[5.0, 0.0]), &v(&[-1.0, 0.0]), 1.0).unwrap();
        assert!(contact.dt > 0.0 && contact.dt < 5.0);
    }

    #[test]
    fn separating_balls_never_collide() {
        assert!(pair_contact(&v(&[0.0, 0.0]), &v(&[-1.0, 0.0]), &v(&[5.0, 0.0]), &v(&[1.0, 0.0]), 1.0).is_none());
    }

    #[test]
    fn equal_velocity_balls_never_collide() {
        assert!(pair_contact(&v(&[0.0, 0.0]), &v(&[1.0, 0.0]), &v(&[5.0, 0.0]), &v(&[1.0, 0.0]), 1.0).is_none());
    }
}
