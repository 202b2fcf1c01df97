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

//! Closed-form delta-v computations for the analytic maneuver laws.

use crate::astro::{Orbit, ECC_EPSILON, INC_EPSILON};
use crate::errors::{ConfigError, MissionError, TargetingError};
use crate::event::TriggerCondition;
use crate::linalg::Vector3;

/// Rodrigues rotation of `v` about the unit vector `axis` by `angle_rad`.
pub(crate) fn rotate_about(
    v: Vector3<f64>,
    axis: Vector3<f64>,
    angle_rad: f64,
) -> Vector3<f64> {
    let (sin, cos) = angle_rad.sin_cos();
    v * cos + axis.cross(&v) * sin + axis * (axis.dot(&v)) * (1.0 - cos)
}

pub(super) fn validate_circularize(condition: &TriggerCondition) -> Result<(), MissionError> {
    match condition {
        TriggerCondition::Periapsis { .. }
        | TriggerCondition::Apoapsis { .. }
        | TriggerCondition::AscendingRadius { .. }
        | TriggerCondition::DescendingRadius { .. } => Ok(()),
        other => Err(ConfigError::DisallowedCondition {
            condition: other.name(),
            maneuver: "circularize",
            reason: "the burn radius must be pinned by an apsis or radius condition",
        }
        .into()),
    }
}

/// Circular velocity at the current radius, along the local horizontal.
pub(super) fn circularize(state: &Orbit) -> Vector3<f64> {
    let r_hat = state.radius_km().normalize();
    let t_hat = state.hvec().normalize().cross(&r_hat);
    let v_circular = state.body.circular_velocity_km_s(state.rmag_km());
    v_circular * t_hat - state.velocity_km_s()
}

pub(super) fn validate_change_eccentricity(
    condition: &TriggerCondition,
    state: &Orbit,
) -> Result<(), MissionError> {
    if !state.is_circular() && !condition.is_apsis() {
        return Err(ConfigError::DisallowedCondition {
            condition: condition.name(),
            maneuver: "change eccentricity",
            reason: "on a non-circular orbit the burn must occur at an apsis",
        }
        .into());
    }
    Ok(())
}

/// Reshapes to `target_ecc`, holding the apsis the burn occurs at.
///
/// At periapsis the current radius becomes the new periapsis (a circular
/// starting orbit is treated the same way), at apoapsis the new apoapsis.
/// The burn is along the current velocity, which at an apsis leaves the
/// burn point an apsis of the new orbit.
pub(super) fn change_eccentricity(
    state: &Orbit,
    condition: &TriggerCondition,
    target_ecc: f64,
) -> Result<Vector3<f64>, MissionError> {
    let r = state.rmag_km();
    let at_periapsis = if state.is_circular() {
        true
    } else {
        match condition {
            TriggerCondition::Apoapsis { .. } => false,
            TriggerCondition::Periapsis { .. } => true,
            // Condition changed after validation: infer from the orbit half
            _ => r < state.sma_km(),
        }
    };
    let sma = if at_periapsis {
        r / (1.0 - target_ecc)
    } else {
        r / (1.0 + target_ecc)
    };

    let new_periapsis_km = sma * (1.0 - target_ecc);
    let surface_km = state.body.mean_radius_km;
    if new_periapsis_km < surface_km {
        return Err(TargetingError::SurfaceIntersection {
            periapsis_km: new_periapsis_km,
            surface_km,
        }
        .into());
    }

    let gm = state.body.gm_km3_s2;
    let new_speed = (gm * (2.0 / r - 1.0 / sma)).sqrt();
    let v = state.velocity_km_s();
    Ok(v.normalize() * new_speed - v)
}

pub(super) fn validate_change_inclination(
    condition: &TriggerCondition,
    state: &Orbit,
) -> Result<(), MissionError> {
    if state.is_equatorial() {
        // No node exists: the burn point itself is treated as the node
        return Ok(());
    }
    match condition {
        TriggerCondition::AscendingNode { .. } | TriggerCondition::DescendingNode { .. } => Ok(()),
        other => Err(ConfigError::DisallowedCondition {
            condition: other.name(),
            maneuver: "change inclination",
            reason: "plane changes must occur at a node crossing",
        }
        .into()),
    }
}

/// Rotates the velocity about the radial direction to reach `target_inc_rad`.
///
/// The rotation sense flips between the ascending and the descending node.
/// When the target orbit is equatorial, the radial velocity component has its
/// sign flipped as well; this reshapes an elliptical orbit slightly but keeps
/// the de-inclination exact, and is retained deliberately for continuity with
/// long-standing planner behavior.
pub(super) fn change_inclination(
    state: &Orbit,
    condition: &TriggerCondition,
    target_inc_rad: f64,
) -> Vector3<f64> {
    let delta = target_inc_rad - state.inc_rad();
    let ascending = !matches!(condition, TriggerCondition::DescendingNode { .. });
    let angle = if ascending { delta } else { -delta };

    let r_hat = state.radius_km().normalize();
    let v = state.velocity_km_s();
    let mut v_new = rotate_about(v, r_hat, angle);

    let target_equatorial =
        target_inc_rad < INC_EPSILON || (std::f64::consts::PI - target_inc_rad) < INC_EPSILON;
    if target_equatorial {
        v_new -= 2.0 * v_new.dot(&r_hat) * r_hat;
    }
    v_new - v
}

/// Signed burn along the velocity axis of the local VNC frame.
pub(super) fn tangent(state: &Orbit, magnitude_km_s: f64) -> Vector3<f64> {
    state.dcm_from_vnc_to_inertial() * Vector3::new(magnitude_km_s, 0.0, 0.0)
}

/// Signed burn along the normal axis of the local VNC frame.
pub(super) fn normal(state: &Orbit, magnitude_km_s: f64) -> Vector3<f64> {
    state.dcm_from_vnc_to_inertial() * Vector3::new(0.0, magnitude_km_s, 0.0)
}

/// Shared circularity guard for laws that synthesize a circular target orbit.
pub(super) fn require_circular(state: &Orbit, maneuver: &'static str) -> Result<(), MissionError> {
    if state.ecc() >= ECC_EPSILON {
        return Err(ConfigError::OutOfRange {
            param: maneuver,
            value: state.ecc(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astro::CentralBody;
    use crate::time::Epoch;
    use approx::assert_abs_diff_eq;

    fn epoch() -> Epoch {
        Epoch::from_gregorian_utc_at_midnight(2026, 3, 1)
    }

    /// A body with the round gravitational parameter used in planning
    /// documentation: 3.986e5 km^3/s^2.
    fn round_earth() -> CentralBody {
        CentralBody {
            name: "Earth",
            gm_km3_s2: 3.986e5,
            mean_radius_km: 6_378.136_3,
        }
    }

    #[test]
    fn circularize_at_radius_yields_circular_speed() {
        // Elliptical orbit crossing 7500 km on the way out
        let body = round_earth();
        let orbit = Orbit::keplerian(8_000.0, 0.15, 0.3, 0.0, 0.0, 0.0, epoch(), body);
        let crossing = orbit.time_to_radius(7_500.0, true, 0).unwrap();
        let state = crate::propagation::KeplerianPropagator::propagate(
            &orbit,
            orbit.epoch + crossing,
        )
        .unwrap();
        assert_abs_diff_eq!(state.rmag_km(), 7_500.0, epsilon = 1e-3);

        let after = state.with_delta_v(circularize(&state));
        assert!(after.is_circular());
        // sqrt(3.986e5 / 7500) = 7.29065 km/s
        assert_abs_diff_eq!(after.vmag_km_s(), 7.290_651, epsilon = 1e-5);
        assert_abs_diff_eq!(after.sma_km(), 7_500.0, epsilon = 1e-3);
    }

    #[test]
    fn change_eccentricity_holds_periapsis() {
        // At periapsis 7000 km, reshaping to e = 0.2 gives a = 7000 / 0.8 = 8750 km
        let orbit = Orbit::keplerian(
            7_777.0,
            0.1,
            0.5,
            0.1,
            0.2,
            0.0,
            epoch(),
            CentralBody::earth(),
        );
        let rp = orbit.periapsis_km();
        let dv = change_eccentricity(&orbit, &TriggerCondition::Periapsis { orbit: 0 }, 0.2)
            .unwrap();
        let after = orbit.with_delta_v(dv);
        assert_abs_diff_eq!(after.ecc(), 0.2, epsilon = 1e-9);
        assert_abs_diff_eq!(after.sma_km(), rp / 0.8, epsilon = 1e-6);
        assert_abs_diff_eq!(after.periapsis_km(), rp, epsilon = 1e-6);
    }

    #[test]
    fn change_eccentricity_from_circular_treats_radius_as_periapsis() {
        let orbit = Orbit::keplerian(
            7_000.0,
            0.0,
            0.3,
            0.0,
            0.0,
            1.0,
            epoch(),
            CentralBody::earth(),
        );
        let dv = change_eccentricity(&orbit, &TriggerCondition::None, 0.1).unwrap();
        let after = orbit.with_delta_v(dv);
        assert_abs_diff_eq!(after.ecc(), 0.1, epsilon = 1e-9);
        assert_abs_diff_eq!(after.periapsis_km(), 7_000.0, epsilon = 1e-6);
    }

    #[test]
    fn change_eccentricity_rejects_subsurface_periapsis() {
        // At apoapsis 6900 km, e = 0.5 would put periapsis at 2300 km
        let orbit = Orbit::keplerian(
            6_700.0,
            0.03,
            0.3,
            0.0,
            0.0,
            std::f64::consts::PI,
            epoch(),
            CentralBody::earth(),
        );
        assert!(matches!(
            change_eccentricity(&orbit, &TriggerCondition::Apoapsis { orbit: 0 }, 0.5),
            Err(MissionError::Targeting {
                source: TargetingError::SurfaceIntersection { .. }
            })
        ));
    }

    #[test]
    fn change_inclination_at_ascending_node() {
        let target = 40.0_f64.to_radians();
        let orbit = Orbit::keplerian(
            7_000.0,
            0.01,
            28.5_f64.to_radians(),
            30.0_f64.to_radians(),
            40.0_f64.to_radians(),
            // Ascending node is at an argument of latitude of zero
            (-40.0_f64).to_radians(),
            epoch(),
            CentralBody::earth(),
        );
        let cond = TriggerCondition::AscendingNode { orbit: 0 };
        let after = orbit.with_delta_v(change_inclination(&orbit, &cond, target));
        assert_abs_diff_eq!(after.inc_rad(), target, epsilon = 1e-9);
        assert_abs_diff_eq!(after.sma_km(), orbit.sma_km(), epsilon = 1e-6);
        assert_abs_diff_eq!(after.ecc(), orbit.ecc(), epsilon = 1e-9);
    }

    #[test]
    fn change_inclination_to_equatorial_flips_radial_velocity() {
        let orbit = Orbit::keplerian(
            7_200.0,
            0.05,
            10.0_f64.to_radians(),
            0.0,
            75.0_f64.to_radians(),
            (-75.0_f64).to_radians(),
            epoch(),
            CentralBody::earth(),
        );
        let r_hat = orbit.radius_km().normalize();
        let radial_before = orbit.velocity_km_s().dot(&r_hat);
        assert!(radial_before.abs() > 1e-3);

        let cond = TriggerCondition::AscendingNode { orbit: 0 };
        let after = orbit.with_delta_v(change_inclination(&orbit, &cond, 0.0));
        assert_abs_diff_eq!(after.inc_rad(), 0.0, epsilon = 1e-9);
        let radial_after = after.velocity_km_s().dot(&r_hat);
        assert_abs_diff_eq!(radial_after, -radial_before, epsilon = 1e-9);
    }

    #[test]
    fn tangent_and_normal_directions() {
        let orbit = Orbit::keplerian(
            7_000.0,
            0.02,
            0.4,
            0.0,
            0.0,
            0.7,
            epoch(),
            CentralBody::earth(),
        );
        let dv_t = tangent(&orbit, -0.05);
        assert_abs_diff_eq!(dv_t.norm(), 0.05, epsilon = 1e-12);
        assert_abs_diff_eq!(
            dv_t.dot(&orbit.velocity_km_s().normalize()),
            -0.05,
            epsilon = 1e-12
        );

        let dv_n = normal(&orbit, 0.02);
        assert_abs_diff_eq!(dv_n.dot(&orbit.velocity_km_s()), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(dv_n.dot(&orbit.radius_km()), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(
            dv_n.dot(&orbit.hvec().normalize()),
            0.02,
            epsilon = 1e-12
        );
    }
}
