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

//! Targeting: flying to (or matching velocity with) a target point by
//! searching transfer times over the boundary-value solver.

use crate::astro::Orbit;
use crate::context::ExecutionContext;
use crate::errors::{ConfigError, MissionError, TargetingError};
use crate::linalg::Vector3;
use crate::time::{Duration, Epoch};
use enum_iterator::Sequence;
use serde_derive::{Deserialize, Serialize};
use std::sync::Arc;

/// Transfer-time refinement stops at this resolution, in seconds.
pub(crate) const TIME_TOLERANCE_S: f64 = 0.01;
/// Delta-v refinement resolution, in km/s.
pub(crate) const DELTA_V_TOLERANCE_KM_S: f64 = 1e-4;
/// Coarse samples across the optimization window before refinement.
const COARSE_STEPS: usize = 200;

/// Collinear and triangular libration points a target may sit at. Resolving
/// them requires a full simulation ephemeris.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Sequence)]
pub enum LibrationPoint {
    EarthMoonL1,
    EarthMoonL2,
    EarthMoonL3,
    EarthMoonL4,
    EarthMoonL5,
    SunEarthL1,
    SunEarthL2,
}

/// What a targeting maneuver aims at.
#[derive(Clone, Debug)]
pub enum TargetSpec {
    /// A perceived track, resolved by the execution context.
    Track(String),
    /// A platform known to the simulation by name.
    Platform(String),
    LibrationPoint(LibrationPoint),
    /// A free-standing orbital state, Kepler-propagated to the epoch of interest.
    Kinematic(Orbit),
}

/// A target specification decorated with offsets in the target's RIC frame.
///
/// The composites use the offsets to aim ahead of, behind, above, or out of
/// plane of the target itself.
#[derive(Clone, Debug)]
pub struct TargetPoint {
    pub spec: TargetSpec,
    pub position_offset_ric_km: Vector3<f64>,
    pub velocity_offset_ric_km_s: Vector3<f64>,
}

impl TargetPoint {
    pub fn new(spec: TargetSpec) -> Self {
        Self {
            spec,
            position_offset_ric_km: Vector3::zeros(),
            velocity_offset_ric_km_s: Vector3::zeros(),
        }
    }

    pub fn track(id: impl Into<String>) -> Self {
        Self::new(TargetSpec::Track(id.into()))
    }

    pub fn with_position_offset(mut self, offset_ric_km: Vector3<f64>) -> Self {
        self.position_offset_ric_km = offset_ric_km;
        self
    }

    pub fn with_velocity_offset(mut self, offset_ric_km_s: Vector3<f64>) -> Self {
        self.velocity_offset_ric_km_s = offset_ric_km_s;
        self
    }

    pub fn has_offsets(&self) -> bool {
        self.position_offset_ric_km != Vector3::zeros()
            || self.velocity_offset_ric_km_s != Vector3::zeros()
    }

    /// The offset point's state at `epoch`: the target's state shifted by the
    /// RIC offsets expressed in the target's frame at that epoch.
    pub fn resolve(
        &self,
        ctx: &dyn ExecutionContext,
        epoch: Epoch,
    ) -> Result<Orbit, TargetingError> {
        let target = ctx.resolve_target(&self.spec, epoch)?;
        if !self.has_offsets() {
            return Ok(target);
        }
        let dcm = target.dcm_from_ric_to_inertial();
        Ok(Orbit::from_vectors(
            target.radius_km() + dcm * self.position_offset_ric_km,
            target.velocity_km_s() + dcm * self.velocity_offset_ric_km_s,
            epoch,
            target.body,
        ))
    }
}

/// User-supplied objective for cost-optimal targeting. Lower is better.
pub trait TargetingCost: std::fmt::Debug + Send + Sync {
    fn cost(&self, tof_s: f64, delta_v_km_s: f64) -> f64;

    /// Rejects an ill-formed configuration before any search runs.
    fn validate(&self) -> Result<(), TargetingError>;
}

/// Linear blend of transfer time and delta-v.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct BlendedCost {
    pub time_weight_per_s: f64,
    pub delta_v_weight_per_km_s: f64,
}

impl TargetingCost for BlendedCost {
    fn cost(&self, tof_s: f64, delta_v_km_s: f64) -> f64 {
        self.time_weight_per_s * tof_s + self.delta_v_weight_per_km_s * delta_v_km_s
    }

    fn validate(&self) -> Result<(), TargetingError> {
        if !self.time_weight_per_s.is_finite()
            || !self.delta_v_weight_per_km_s.is_finite()
            || self.time_weight_per_s < 0.0
            || self.delta_v_weight_per_km_s < 0.0
        {
            return Err(TargetingError::InvalidCostFunction {
                reason: "weights must be finite and non-negative".to_string(),
            });
        }
        if self.time_weight_per_s == 0.0 && self.delta_v_weight_per_km_s == 0.0 {
            return Err(TargetingError::InvalidCostFunction {
                reason: "at least one weight must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// How the transfer time to the target point is chosen.
#[derive(Clone, Debug)]
pub enum TargetingScheme {
    /// Fly the transfer of exactly this duration.
    FixedDeltaTime { delta_time: Duration },
    /// Earliest arrival whose delta-v stays under the ceiling.
    OptimizeTime {
        maximum_delta_time: Duration,
        maximum_delta_v_km_s: f64,
    },
    /// Cheapest transfer within the window.
    OptimizeDeltaV {
        maximum_delta_time: Duration,
        maximum_delta_v_km_s: f64,
    },
    /// Transfer minimizing a user-supplied cost within the window.
    OptimizeCost {
        maximum_delta_time: Duration,
        maximum_delta_v_km_s: f64,
        cost: Arc<dyn TargetingCost>,
    },
}

impl TargetingScheme {
    pub(crate) fn check_construction(&self) -> Result<(), ConfigError> {
        match self {
            Self::FixedDeltaTime { delta_time } => {
                if delta_time.to_seconds() <= 0.0 {
                    return Err(ConfigError::OutOfRange {
                        param: "transfer delta-time (s)",
                        value: delta_time.to_seconds(),
                    });
                }
            }
            Self::OptimizeTime {
                maximum_delta_time,
                maximum_delta_v_km_s,
            }
            | Self::OptimizeDeltaV {
                maximum_delta_time,
                maximum_delta_v_km_s,
            }
            | Self::OptimizeCost {
                maximum_delta_time,
                maximum_delta_v_km_s,
                ..
            } => {
                if maximum_delta_time.to_seconds() <= 0.0 {
                    return Err(ConfigError::OutOfRange {
                        param: "maximum delta-time (s)",
                        value: maximum_delta_time.to_seconds(),
                    });
                }
                if *maximum_delta_v_km_s <= 0.0 {
                    return Err(ConfigError::OutOfRange {
                        param: "maximum delta-v (km/s)",
                        value: *maximum_delta_v_km_s,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Initialization-time feasibility checks for a targeting scheme.
pub(super) fn validate_scheme(
    scheme: &TargetingScheme,
    ctx: &dyn ExecutionContext,
) -> Result<(), MissionError> {
    match scheme {
        TargetingScheme::FixedDeltaTime { .. } => Ok(()),
        TargetingScheme::OptimizeTime {
            maximum_delta_v_km_s,
            ..
        }
        | TargetingScheme::OptimizeDeltaV {
            maximum_delta_v_km_s,
            ..
        } => check_ceiling(*maximum_delta_v_km_s, ctx),
        TargetingScheme::OptimizeCost {
            maximum_delta_v_km_s,
            cost,
            ..
        } => {
            cost.validate()?;
            check_ceiling(*maximum_delta_v_km_s, ctx)
        }
    }
}

fn check_ceiling(ceiling_km_s: f64, ctx: &dyn ExecutionContext) -> Result<(), MissionError> {
    let available = ctx.available_delta_v_km_s();
    if ceiling_km_s > available {
        return Err(TargetingError::BudgetCeiling {
            ceiling_km_s,
            available_km_s: available,
        }
        .into());
    }
    Ok(())
}

/// A transfer the search settled on.
#[derive(Copy, Clone, Debug)]
pub struct SolvedTransfer {
    pub departure: Epoch,
    pub arrival: Epoch,
    pub tof_s: f64,
    pub delta_v_km_s: Vector3<f64>,
}

/// Solves and vets one candidate transfer of duration `tof_s` from `origin`
/// to the target point (position offset applied at arrival).
///
/// A vetted transfer is elliptical (unless the propagator accepts hyperbolic
/// trajectories) and does not pass through periapsis below the central body
/// surface during the transfer.
fn assess_transfer(
    origin: &Orbit,
    point: &TargetPoint,
    tof_s: f64,
    ctx: &dyn ExecutionContext,
) -> Result<SolvedTransfer, MissionError> {
    let arrival = origin.epoch + Duration::from_seconds(tof_s);
    let target = ctx.resolve_target(&point.spec, arrival)?;
    let dcm = target.dcm_from_ric_to_inertial();
    let r_target = target.radius_km() + dcm * point.position_offset_ric_km;

    let solution = ctx
        .solver()
        .solve(origin.radius_km(), r_target, tof_s, origin.body.gm_km3_s2)?;
    let dv = solution.v_init_km_s - origin.velocity_km_s();

    let transfer = origin.with_delta_v(dv);
    if transfer.is_hyperbolic() {
        if !ctx.propagator().hyperbolic_allowed() {
            return Err(TargetingError::HyperbolicTransfer.into());
        }
    } else if !transfer.is_circular() {
        let periapsis_km = transfer.periapsis_km();
        let surface_km = origin.body.mean_radius_km;
        if periapsis_km < surface_km {
            // Only fatal if periapsis is actually passed before arrival
            let to_periapsis_s = transfer.time_to_periapsis(0)?.to_seconds();
            if to_periapsis_s < tof_s {
                return Err(TargetingError::SurfaceIntersection {
                    periapsis_km,
                    surface_km,
                }
                .into());
            }
        }
    }

    Ok(SolvedTransfer {
        departure: origin.epoch,
        arrival,
        tof_s,
        delta_v_km_s: dv,
    })
}

/// Runs the transfer-time search prescribed by `scheme` from `state`.
pub(super) fn search(
    state: &Orbit,
    point: &TargetPoint,
    scheme: &TargetingScheme,
    tolerance_km_s: f64,
    ctx: &dyn ExecutionContext,
) -> Result<SolvedTransfer, MissionError> {
    // Surface an unresolvable target as its own error, not "no solution"
    ctx.resolve_target(&point.spec, state.epoch)?;

    match scheme {
        TargetingScheme::FixedDeltaTime { delta_time } => {
            assess_transfer(state, point, delta_time.to_seconds(), ctx)
        }
        TargetingScheme::OptimizeTime {
            maximum_delta_time,
            maximum_delta_v_km_s,
        } => optimize_time(
            state,
            point,
            maximum_delta_time.to_seconds(),
            *maximum_delta_v_km_s,
            ctx,
        ),
        TargetingScheme::OptimizeDeltaV {
            maximum_delta_time,
            maximum_delta_v_km_s,
        } => optimize_metric(
            state,
            point,
            maximum_delta_time.to_seconds(),
            *maximum_delta_v_km_s,
            tolerance_km_s,
            ctx,
            |_, dv_km_s| dv_km_s,
        ),
        TargetingScheme::OptimizeCost {
            maximum_delta_time,
            maximum_delta_v_km_s,
            cost,
        } => {
            let cost = cost.clone();
            optimize_metric(
                state,
                point,
                maximum_delta_time.to_seconds(),
                *maximum_delta_v_km_s,
                tolerance_km_s,
                ctx,
                move |tof_s, dv_km_s| cost.cost(tof_s, dv_km_s),
            )
        }
    }
}

/// Earliest feasible arrival: coarse forward scan, then bisection on the
/// feasibility boundary down to [`TIME_TOLERANCE_S`].
fn optimize_time(
    state: &Orbit,
    point: &TargetPoint,
    window_s: f64,
    ceiling_km_s: f64,
    ctx: &dyn ExecutionContext,
) -> Result<SolvedTransfer, MissionError> {
    let step_s = window_s / COARSE_STEPS as f64;
    let feasible = |tof_s: f64| -> Option<SolvedTransfer> {
        assess_transfer(state, point, tof_s, ctx)
            .ok()
            .filter(|sol| sol.delta_v_km_s.norm() <= ceiling_km_s)
    };

    for i in 1..=COARSE_STEPS {
        let tof_s = i as f64 * step_s;
        if let Some(first) = feasible(tof_s) {
            let mut lo = tof_s - step_s;
            let mut hi = tof_s;
            let mut best = first;
            while hi - lo > TIME_TOLERANCE_S {
                let mid = 0.5 * (lo + hi);
                match feasible(mid) {
                    Some(sol) => {
                        best = sol;
                        hi = mid;
                    }
                    None => lo = mid,
                }
            }
            return Ok(best);
        }
    }
    Err(TargetingError::NoFeasibleSolution { window_s }.into())
}

/// Minimizes `metric` over transfer time: coarse scan for a bracket, then a
/// ternary refinement (infeasible candidates count as infinitely expensive).
fn optimize_metric<F>(
    state: &Orbit,
    point: &TargetPoint,
    window_s: f64,
    ceiling_km_s: f64,
    tolerance_km_s: f64,
    ctx: &dyn ExecutionContext,
    metric: F,
) -> Result<SolvedTransfer, MissionError>
where
    F: Fn(f64, f64) -> f64,
{
    let step_s = window_s / COARSE_STEPS as f64;
    let evaluate = |tof_s: f64| -> Option<(f64, SolvedTransfer)> {
        assess_transfer(state, point, tof_s, ctx)
            .ok()
            .filter(|sol| sol.delta_v_km_s.norm() <= ceiling_km_s)
            .map(|sol| (metric(tof_s, sol.delta_v_km_s.norm()), sol))
    };

    let mut best: Option<(f64, SolvedTransfer)> = None;
    for i in 1..=COARSE_STEPS {
        let tof_s = i as f64 * step_s;
        if let Some(candidate) = evaluate(tof_s) {
            if best.as_ref().map_or(true, |(m, _)| candidate.0 < *m) {
                best = Some(candidate);
            }
        }
    }
    let (mut best_metric, mut best_sol) =
        best.ok_or(TargetingError::NoFeasibleSolution { window_s })?;

    let mut lo = (best_sol.tof_s - step_s).max(TIME_TOLERANCE_S);
    let mut hi = (best_sol.tof_s + step_s).min(window_s);
    while hi - lo > TIME_TOLERANCE_S {
        let third = (hi - lo) / 3.0;
        let t1 = lo + third;
        let t2 = hi - third;
        let m1 = evaluate(t1);
        let m2 = evaluate(t2);
        for candidate in [&m1, &m2] {
            if let Some((metric_value, sol)) = candidate {
                if *metric_value < best_metric {
                    best_metric = *metric_value;
                    best_sol = *sol;
                }
            }
        }
        let f1 = m1.map_or(f64::INFINITY, |(value, _)| value);
        let f2 = m2.map_or(f64::INFINITY, |(value, _)| value);
        if (f1 - f2).abs() < tolerance_km_s * 1e-3 && f1.is_finite() {
            break;
        }
        if f1 <= f2 {
            hi = t2;
        } else {
            lo = t1;
        }
    }
    Ok(best_sol)
}

/// Delta-v that nulls the relative velocity with the (offset) target point.
pub(super) fn match_velocity(
    state: &Orbit,
    point: &TargetPoint,
    ctx: &dyn ExecutionContext,
) -> Result<Vector3<f64>, MissionError> {
    let target = point.resolve(ctx, state.epoch)?;
    Ok(target.velocity_km_s() - state.velocity_km_s())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astro::CentralBody;
    use approx::assert_abs_diff_eq;

    #[test]
    fn blended_cost_rejects_bad_weights() {
        assert!(BlendedCost {
            time_weight_per_s: -1.0,
            delta_v_weight_per_km_s: 1.0
        }
        .validate()
        .is_err());
        assert!(BlendedCost {
            time_weight_per_s: 0.0,
            delta_v_weight_per_km_s: 0.0
        }
        .validate()
        .is_err());
        assert!(BlendedCost {
            time_weight_per_s: 1e-4,
            delta_v_weight_per_km_s: 1.0
        }
        .validate()
        .is_ok());
    }

    #[test]
    fn scheme_construction_checks_ranges() {
        assert!(TargetingScheme::FixedDeltaTime {
            delta_time: Duration::ZERO
        }
        .check_construction()
        .is_err());
        assert!(TargetingScheme::OptimizeDeltaV {
            maximum_delta_time: Duration::from_seconds(3600.0),
            maximum_delta_v_km_s: -0.1
        }
        .check_construction()
        .is_err());
        assert!(TargetingScheme::OptimizeTime {
            maximum_delta_time: Duration::from_seconds(3600.0),
            maximum_delta_v_km_s: 0.5
        }
        .check_construction()
        .is_ok());
    }

    #[test]
    fn target_point_offsets_are_applied_in_the_target_ric_frame() {
        let epoch = Epoch::from_gregorian_utc_at_midnight(2026, 3, 1);
        let body = CentralBody::earth();
        let target = Orbit::keplerian(7_000.0, 0.0, 0.4, 0.2, 0.0, 1.3, epoch, body);

        let point = TargetPoint::new(TargetSpec::Kinematic(target))
            .with_position_offset(Vector3::new(1.0, 0.0, 0.0));

        // A plain standalone context resolves kinematic specs directly
        let ctx = crate::context::StandaloneContext::new(
            target,
            Box::new(crate::propulsion::ImpulsiveModel::new(1.0)),
        );
        let resolved = point.resolve(&ctx, epoch).unwrap();
        // A +1 km radial offset raises the radius by exactly 1 km
        assert_abs_diff_eq!(resolved.rmag_km(), target.rmag_km() + 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(
            (resolved.velocity_km_s() - target.velocity_km_s()).norm(),
            0.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn every_libration_point_needs_an_ephemeris_to_resolve() {
        let epoch = Epoch::from_gregorian_utc_at_midnight(2026, 3, 1);
        let body = CentralBody::earth();
        let chaser = Orbit::keplerian(7_000.0, 0.0, 0.4, 0.0, 0.0, 0.0, epoch, body);
        let ctx = crate::context::StandaloneContext::new(
            chaser,
            Box::new(crate::propulsion::ImpulsiveModel::new(1.0)),
        );
        for point in enum_iterator::all::<LibrationPoint>() {
            assert!(matches!(
                ctx.resolve_target(&TargetSpec::LibrationPoint(point), epoch),
                Err(TargetingError::UnresolvedTarget { .. })
            ));
        }
    }
}
