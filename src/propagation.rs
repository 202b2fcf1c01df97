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

use crate::astro::orbit::{eccentric_to_true, solve_kepler};
use crate::astro::Orbit;
use crate::errors::AstroError;
use crate::linalg::Vector3;
use crate::time::Epoch;
use std::f64::consts::TAU;

/// The orbital propagator collaborator.
///
/// Mission events query the live state, ask for speculative "what-if" states
/// at future epochs (a pure call that must not mutate the live trajectory),
/// and command velocity changes once a maneuver actually executes.
pub trait OrbitalPropagator {
    /// The live orbital state.
    fn orbital_state(&self) -> Orbit;

    /// The state this trajectory reaches at `epoch`, without mutating the live state.
    fn state_at(&self, epoch: Epoch) -> Result<Orbit, AstroError>;

    /// Advances the live state to `epoch`.
    fn update(&mut self, epoch: Epoch) -> Result<(), AstroError>;

    /// Advances to `epoch` and applies the delta-v to the live state.
    fn apply_delta_v(&mut self, epoch: Epoch, dv_km_s: Vector3<f64>) -> Result<(), AstroError>;

    /// Whether this propagator accepts trajectories that leave the elliptical regime.
    fn hyperbolic_allowed(&self) -> bool {
        false
    }
}

/// Analytic two-body propagation of an elliptical orbit.
///
/// This is the reference collaborator used by the verification harness and
/// the standalone context; a surrounding simulation will typically supply a
/// higher-fidelity implementation of [`OrbitalPropagator`] instead.
#[derive(Copy, Clone, Debug)]
pub struct KeplerianPropagator {
    state: Orbit,
}

impl KeplerianPropagator {
    pub fn new(state: Orbit) -> Self {
        Self { state }
    }

    /// Kepler-propagates any elliptical state to the requested epoch.
    pub fn propagate(state: &Orbit, epoch: Epoch) -> Result<Orbit, AstroError> {
        if state.is_hyperbolic() {
            return Err(AstroError::HyperbolicOrbit { ecc: state.ecc() });
        }
        let dt_s = (epoch - state.epoch).to_seconds();
        let ecc = state.ecc();
        let ma = state.ma_rad() + state.mean_motion_rad_s() * dt_s;
        let ea = solve_kepler(ma % TAU, ecc)?;
        let ta = eccentric_to_true(ea, ecc);
        Ok(Orbit::keplerian(
            state.sma_km(),
            ecc,
            state.inc_rad(),
            state.raan_rad(),
            state.aop_rad(),
            ta,
            epoch,
            state.body,
        ))
    }
}

impl OrbitalPropagator for KeplerianPropagator {
    fn orbital_state(&self) -> Orbit {
        self.state
    }

    fn state_at(&self, epoch: Epoch) -> Result<Orbit, AstroError> {
        Self::propagate(&self.state, epoch)
    }

    fn update(&mut self, epoch: Epoch) -> Result<(), AstroError> {
        self.state = Self::propagate(&self.state, epoch)?;
        Ok(())
    }

    fn apply_delta_v(&mut self, epoch: Epoch, dv_km_s: Vector3<f64>) -> Result<(), AstroError> {
        self.update(epoch)?;
        let next = self.state.with_delta_v(dv_km_s);
        if next.is_hyperbolic() && !self.hyperbolic_allowed() {
            return Err(AstroError::HyperbolicOrbit { ecc: next.ecc() });
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astro::CentralBody;
    use crate::time::Duration;
    use approx::assert_abs_diff_eq;

    #[test]
    fn circular_orbit_returns_after_one_period() {
        let epoch = Epoch::from_gregorian_utc_at_midnight(2026, 3, 1);
        let body = CentralBody::earth();
        let r = 7_000.0;
        let v = body.circular_velocity_km_s(r);
        let orbit = Orbit::cartesian(r, 0.0, 0.0, 0.0, v, 0.0, epoch, body);
        let prop = KeplerianPropagator::new(orbit);
        let period = orbit.period().unwrap();

        let back = prop.state_at(epoch + period).unwrap();
        assert_abs_diff_eq!(back.x_km, orbit.x_km, epsilon = 1e-6);
        assert_abs_diff_eq!(back.y_km, orbit.y_km, epsilon = 1e-6);
        assert_abs_diff_eq!(back.vy_km_s, orbit.vy_km_s, epsilon = 1e-9);

        let half = prop.state_at(epoch + period * 0.5).unwrap();
        assert_abs_diff_eq!(half.x_km, -r, epsilon = 1e-3);
    }

    #[test]
    fn speculative_state_does_not_mutate_live_trajectory() {
        let epoch = Epoch::from_gregorian_utc_at_midnight(2026, 3, 1);
        let body = CentralBody::earth();
        let orbit = Orbit::keplerian(
            8_000.0,
            0.1,
            10.0_f64.to_radians(),
            0.0,
            0.0,
            0.0,
            epoch,
            body,
        );
        let prop = KeplerianPropagator::new(orbit);
        let _ = prop.state_at(epoch + orbit.period().unwrap()).unwrap();
        assert_eq!(prop.orbital_state().epoch, epoch);
    }

    #[test]
    fn energy_is_conserved_through_propagation() {
        let epoch = Epoch::from_gregorian_utc_at_midnight(2026, 3, 1);
        let orbit = Orbit::keplerian(
            26_560.0,
            0.02,
            55.0_f64.to_radians(),
            120.0_f64.to_radians(),
            30.0_f64.to_radians(),
            75.0_f64.to_radians(),
            epoch,
            CentralBody::earth(),
        );
        let prop = KeplerianPropagator::new(orbit);
        for hours in [1, 7, 13, 50] {
            let later = prop
                .state_at(epoch + Duration::from_seconds(3600.0 * f64::from(hours)))
                .unwrap();
            assert_abs_diff_eq!(
                later.energy_km2_s2(),
                orbit.energy_km2_s2(),
                epsilon = 1e-9
            );
        }
    }
}
