/*
    Orbital Maneuvers, mission-event scheduling and maneuver computation
    Copyright (C) 2026 Orbital Maneuvers Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use crate::errors::LambertError;
use crate::linalg::Vector3;
use std::f64::consts::{PI, TAU};

/// Time-of-flight convergence, in seconds.
const TOF_TOLERANCE_S: f64 = 1e-4;
/// Below this magnitude the Stumpff functions switch to their series limit.
const STUMPFF_SERIES_BOUND: f64 = 1e-4;
/// Angular separation under which two position vectors are degenerate, in radians.
const SEPARATION_TOLERANCE_RAD: f64 = (5e-5 / 180.0) * PI;
/// Bisection cap so a degenerate geometry cannot loop forever.
const MAX_ITERATIONS: usize = 1000;
/// Step and cap for walking the universal variable out of the unphysical region.
const PSI_WALK_STEP: f64 = 0.1;
const PSI_WALK_CAP: usize = 500;

/// Stumpff C2 and C3 evaluated at the universal variable `psi`.
fn stumpff(psi: f64) -> (f64, f64) {
    if psi > STUMPFF_SERIES_BOUND {
        let sqrt_psi = psi.sqrt();
        let (sin_s, cos_s) = sqrt_psi.sin_cos();
        ((1.0 - cos_s) / psi, (sqrt_psi - sin_s) / (psi * sqrt_psi))
    } else if psi < -STUMPFF_SERIES_BOUND {
        let sqrt_neg = (-psi).sqrt();
        (
            (1.0 - sqrt_neg.cosh()) / psi,
            (sqrt_neg.sinh() - sqrt_neg) / (-psi * sqrt_neg),
        )
    } else {
        (0.5, 1.0 / 6.0)
    }
}

/// Which way around the central body the transfer goes.
#[derive(Copy, Clone, Debug, Default)]
pub enum TransferKind {
    /// Pick the direction from the geometry of the two radius vectors
    #[default]
    Auto,
    ShortWay,
    LongWay,
}

impl TransferKind {
    fn direction_of_motion(self, r_init: &Vector3<f64>, r_final: &Vector3<f64>) -> f64 {
        match self {
            TransferKind::Auto => {
                let sweep = (r_final[1].atan2(r_final[0]) - r_init[1].atan2(r_init[0]))
                    .rem_euclid(TAU);
                if sweep > PI {
                    -1.0
                } else {
                    1.0
                }
            }
            TransferKind::ShortWay => 1.0,
            TransferKind::LongWay => -1.0,
        }
    }
}

/// A solved two-point transfer: the velocities needed at departure and arrival.
#[derive(Copy, Clone, Debug)]
pub struct TransferSolution {
    pub v_init_km_s: Vector3<f64>,
    pub v_final_km_s: Vector3<f64>,
    pub tof_s: f64,
}

/// The external two-point boundary-value collaborator consumed by targeting maneuvers.
///
/// Implementations answer: to coast from `r_init` to `r_final` in `tof_s`
/// seconds around a body of gravitational parameter `gm`, which departure and
/// arrival velocities are required?
pub trait BoundaryValueSolver {
    fn solve(
        &self,
        r_init_km: Vector3<f64>,
        r_final_km: Vector3<f64>,
        tof_s: f64,
        gm_km3_s2: f64,
    ) -> Result<TransferSolution, LambertError>;
}

/// Default boundary-value solver: universal-variable bisection in the manner
/// of Gooding's procedure for Lambert's problem. Single revolution only.
#[derive(Copy, Clone, Debug, Default)]
pub struct GoodingSolver {
    pub kind: TransferKind,
}

impl GoodingSolver {
    pub fn short_way() -> Self {
        Self {
            kind: TransferKind::ShortWay,
        }
    }
}

impl BoundaryValueSolver for GoodingSolver {
    fn solve(
        &self,
        r_init_km: Vector3<f64>,
        r_final_km: Vector3<f64>,
        tof_s: f64,
        gm_km3_s2: f64,
    ) -> Result<TransferSolution, LambertError> {
        if tof_s <= 0.0 {
            return Err(LambertError::NonPositiveTof { tof_s });
        }
        let r_init_norm = r_init_km.norm();
        let r_final_norm = r_final_km.norm();
        let cos_sweep = r_init_km.dot(&r_final_km) / (r_init_norm * r_final_norm);
        let dm = self.kind.direction_of_motion(&r_init_km, &r_final_km);

        // Vallado's A, carrying the direction of motion
        let transfer_a = dm * (r_init_norm * r_final_norm * (1.0 + cos_sweep)).sqrt();

        let separation_rad =
            (r_final_km[1].atan2(r_final_km[0]) - r_init_km[1].atan2(r_init_km[0])).abs();
        if separation_rad < SEPARATION_TOLERANCE_RAD && transfer_a.abs() < STUMPFF_SERIES_BOUND {
            return Err(LambertError::TargetsTooClose);
        }

        // Bisect the universal variable until the time of flight matches
        let mut psi_low = -4.0 * PI * PI;
        let mut psi_high = 4.0 * PI * PI;
        let mut psi: f64 = 0.0;
        let (mut c2, mut c3) = stumpff(psi);

        for iteration in 0..MAX_ITERATIONS {
            let mut y_km = r_init_norm + r_final_norm + transfer_a * (psi * c3 - 1.0) / c2.sqrt();
            if transfer_a > 0.0 && y_km < 0.0 {
                // Walk psi up until the auxiliary variable turns physical
                let mut walked = 0;
                while y_km < 0.0 {
                    if walked == PSI_WALK_CAP {
                        return Err(LambertError::UnreasonablePsi);
                    }
                    walked += 1;
                    psi += PSI_WALK_STEP;
                    y_km = r_init_norm + r_final_norm + transfer_a * (psi * c3 - 1.0) / c2.sqrt();
                }
            }

            let chi = (y_km / c2).sqrt();
            let tof_est_s = (chi.powi(3) * c3 + transfer_a * y_km.sqrt()) / gm_km3_s2.sqrt();

            if (tof_est_s - tof_s).abs() <= TOF_TOLERANCE_S {
                debug!("transfer time matched after {iteration} bisections (psi = {psi:.6})");
                // Lagrange coefficients from the converged auxiliary variable
                let f = 1.0 - y_km / r_init_norm;
                let g = transfer_a * (y_km / gm_km3_s2).sqrt();
                let g_dot = 1.0 - y_km / r_final_norm;
                return Ok(TransferSolution {
                    v_init_km_s: (r_final_km - f * r_init_km) / g,
                    v_final_km_s: (g_dot * r_final_km - r_init_km) / g,
                    tof_s,
                });
            }

            if tof_est_s < tof_s {
                psi_low = psi;
            } else {
                psi_high = psi;
            }
            psi = 0.5 * (psi_low + psi_high);
            (c2, c3) = stumpff(psi);
        }
        Err(LambertError::MaxIterReached {
            iters: MAX_ITERATIONS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astro::{CentralBody, Orbit};
    use crate::propagation::KeplerianPropagator;
    use crate::time::{Duration, Epoch};

    /// The departure velocity must actually coast onto the requested arrival.
    #[test]
    fn solution_coasts_onto_the_arrival_position() {
        let body = CentralBody::earth();
        let epoch = Epoch::from_gregorian_utc_at_midnight(2026, 3, 1);
        let ri = Vector3::new(7_200.0, 1_000.0, 200.0);
        let rf = Vector3::new(-4_000.0, 6_500.0, 300.0);
        let tof_s = 2_400.0;

        let sol = GoodingSolver::default()
            .solve(ri, rf, tof_s, body.gm_km3_s2)
            .unwrap();

        let departure = Orbit::from_vectors(ri, sol.v_init_km_s, epoch, body);
        assert!(!departure.is_hyperbolic());
        let arrival = KeplerianPropagator::propagate(
            &departure,
            epoch + Duration::from_seconds(tof_s),
        )
        .unwrap();
        assert!((arrival.radius_km() - rf).norm() < 5e-3);
        assert!((arrival.velocity_km_s() - sol.v_final_km_s).norm() < 5e-6);
    }

    #[test]
    fn long_way_sweeps_the_far_side() {
        let body = CentralBody::earth();
        let ri = Vector3::new(7_000.0, 0.0, 0.0);
        let rf = Vector3::new(0.0, 7_000.0, 0.0);
        let tof_s = 3_000.0;

        let short = GoodingSolver::short_way()
            .solve(ri, rf, tof_s, body.gm_km3_s2)
            .unwrap();
        let long = GoodingSolver {
            kind: TransferKind::LongWay,
        }
        .solve(ri, rf, tof_s, body.gm_km3_s2)
        .unwrap();

        // Same endpoints, opposite angular momentum about the pole
        let h_short = ri.cross(&short.v_init_km_s);
        let h_long = ri.cross(&long.v_init_km_s);
        assert!(h_short[2] > 0.0);
        assert!(h_long[2] < 0.0);
    }

    #[test]
    fn degenerate_geometry_is_rejected() {
        let ri = Vector3::new(7_000.0, 0.0, 0.0);
        let gm = CentralBody::earth().gm_km3_s2;
        assert!(matches!(
            GoodingSolver::default().solve(ri, ri, -10.0, gm),
            Err(LambertError::NonPositiveTof { .. })
        ));
    }
}
