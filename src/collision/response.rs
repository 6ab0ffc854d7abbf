//! Elastic collision response in the zero-momentum frame.

use nalgebra::DVector;

use super::geometry::PairContact;
use crate::ball::Ball;

/// Apply the velocity change from an elastic collision between `ball_i`
/// and `ball_j`, whose contact geometry was predicted relative to
/// `ball_i` (i.e. `contact.displacement` points from `i`'s centre to
/// `j`'s centre at the moment of contact).
///
/// Both balls are assumed already rebased to the contact time; this
/// only changes velocity, not position.
pub fn apply_pair_response(ball_i: &mut Ball, ball_j: &mut Ball, contact: &PairContact) {
    let m_i = ball_i.mass();
    let m_j = ball_j.mass();
    let total_mass = m_i + m_j;

    let v_i = ball_i.velocity().clone();
    let v_j = ball_j.velocity().clone();
    let v_cm = (&v_i * m_i + &v_j * m_j) / total_mass;

    let v_i_zmf = &v_i - &v_cm;
    let v_j_zmf = &v_i_zmf * (-(m_i / m_j));

    let n = &contact.displacement;
    let rad_sum_sq = n.dot(n);

    let delta_i: DVector<f64> = n * (-2.0 * n.dot(&v_i_zmf) / rad_sum_sq);
    let delta_j: DVector<f64> = n * (-2.0 * n.dot(&v_j_zmf) / rad_sum_sq);

    ball_i.apply_pair_delta(&delta_i);
    ball_j.apply_pair_delta(&delta_j);
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;

    fn make_ball(mass: f64, p: &[f64], v: &[f64]) -> Ball {
        let dims = DVector::from_vec(vec![100.0; p.len()]);
        let g = DVector::from_vec(vec![0.0; p.len()]);
        Ball::new(
            mass,
            0.5,
            0.0,
            DVector::from_vec(p.to_vec()),
            DVector::from_vec(v.to_vec()),
            &dims,
            &g,
        )
        .unwrap()
    }

    #[test]
    fn equal_mass_head_on_swaps_velocities() {
        let mut a = make_ball(1.0, &[0.0, 0.0], &[1.0, 0.0]);
        let mut b = make_ball(1.0, &[1.0, 0.0], &[-1.0, 0.0]);
        let contact = PairContact {
            dt: 0.0,
            displacement: DVector::from_vec(vec![1.0, 0.0]),
        };
        apply_pair_response(&mut a, &mut b, &contact);
        assert!((a.velocity()[0] - -1.0).abs() < 1e-9);
        assert!((b.velocity()[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn conserves_momentum_and_energy() {
        let mut a = make_ball(2.0, &[0.0, 0.0], &[3.0, 0.5]);
        let mut b = make_ball(5.0, &[1.0, 0.0], &[-1.0, -0.2]);
        let p_before = a.mass() * a.velocity() + b.mass() * b.velocity();
        let e_before = a.kinetic_energy() + b.kinetic_energy();
        let contact = PairContact {
            dt: 0.0,
            displacement: DVector::from_vec(vec![1.0, 0.0]),
        };
        apply_pair_response(&mut a, &mut b, &contact);
        let p_after = a.mass() * a.velocity() + b.mass() * b.velocity();
        let e_after = a.kinetic_energy() + b.kinetic_energy();
        assert!((p_before - p_after).norm() < 1e-9);
        assert!((e_before - e_after).abs() < 1e-9);
    }
}
