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

use crate::astro::Orbit;
use crate::errors::{AstroError, MissionError, TargetingError};
use crate::lambert::{BoundaryValueSolver, GoodingSolver};
use crate::linalg::Vector3;
use crate::maneuvers::TargetSpec;
use crate::propagation::{KeplerianPropagator, OrbitalPropagator};
use crate::propulsion::PropulsionModel;
use crate::time::{Duration, Epoch};
use std::collections::HashMap;

/// Everything a mission event needs from the surrounding simulation.
///
/// The simulation owns the loop: it calls `initialize` once on an event and
/// `execute` repeatedly as time advances. The four notification hooks exist
/// for external observability (telemetry, event logs) and default to no-ops;
/// this crate triggers them but never formats or persists anything.
pub trait ExecutionContext {
    /// Current simulation epoch.
    fn epoch(&self) -> Epoch;

    /// Advances the live trajectory to `epoch`.
    fn update(&mut self, epoch: Epoch) -> Result<(), MissionError>;

    fn propagator(&self) -> &dyn OrbitalPropagator;

    /// Remaining delta-v budget, in km/s.
    fn available_delta_v_km_s(&self) -> f64;

    /// Delta-v deliverable over `duration`, in km/s.
    fn required_delta_v_km_s(&self, duration: Duration) -> f64;

    /// Burn duration for `dv_km_s`, never shorter than `configured`.
    fn maneuver_duration(&self, dv_km_s: f64, configured: Duration) -> Duration;

    /// Applies a commanded delta-v against the budget and the live trajectory,
    /// returning the delta-v actually delivered.
    fn maneuver(
        &mut self,
        epoch: Epoch,
        commanded_km_s: Vector3<f64>,
        start: Epoch,
        duration: Duration,
    ) -> Result<Vector3<f64>, MissionError>;

    fn perform_staging(&mut self) -> Result<(), MissionError>;

    /// The two-point boundary-value solver collaborator.
    fn solver(&self) -> &dyn BoundaryValueSolver;

    /// Resolves a target specification into a kinematic state at `epoch`.
    fn resolve_target(&self, spec: &TargetSpec, epoch: Epoch) -> Result<Orbit, TargetingError>;

    /// Unit vector from the central body towards the sun, if an ephemeris is
    /// available. Required only by eclipse trigger conditions.
    fn sun_direction(&self, _epoch: Epoch) -> Option<Vector3<f64>> {
        None
    }

    fn on_event_initiated(&mut self, _name: &str, _epoch: Epoch) {}
    fn on_event_updated(&mut self, _name: &str, _epoch: Epoch) {}
    fn on_event_completed(&mut self, _name: &str, _epoch: Epoch) {}
    fn on_event_canceled(&mut self, _name: &str, _epoch: Epoch) {}
}

/// A self-contained execution context for verification and stand-alone planning.
///
/// Couples a two-body propagator, a propulsion model, the default
/// boundary-value solver, and a table of known target trajectories (tracks and
/// platforms resolve through the table; libration points are not available
/// outside a full simulation).
pub struct StandaloneContext {
    epoch: Epoch,
    propagator: KeplerianPropagator,
    propulsion: Box<dyn PropulsionModel>,
    solver: GoodingSolver,
    targets: HashMap<String, Orbit>,
    sun_direction: Option<Vector3<f64>>,
}

impl StandaloneContext {
    pub fn new(state: Orbit, propulsion: Box<dyn PropulsionModel>) -> Self {
        Self {
            epoch: state.epoch,
            propagator: KeplerianPropagator::new(state),
            propulsion,
            solver: GoodingSolver::default(),
            targets: HashMap::new(),
            sun_direction: None,
        }
    }

    /// Registers a trajectory under a track id or platform name.
    pub fn with_target(mut self, id: impl Into<String>, state: Orbit) -> Self {
        self.set_target(id, state);
        self
    }

    /// Registers or replaces a target trajectory, e.g. on a track update.
    pub fn set_target(&mut self, id: impl Into<String>, state: Orbit) {
        self.targets.insert(id.into(), state);
    }

    /// Fixes the sun direction (assumed constant over the planning horizon),
    /// enabling eclipse trigger conditions.
    pub fn with_sun_direction(mut self, direction: Vector3<f64>) -> Self {
        self.sun_direction = Some(direction.normalize());
        self
    }

    pub fn orbital_state(&self) -> Orbit {
        self.propagator.orbital_state()
    }
}

impl ExecutionContext for StandaloneContext {
    fn epoch(&self) -> Epoch {
        self.epoch
    }

    fn update(&mut self, epoch: Epoch) -> Result<(), MissionError> {
        self.propagator.update(epoch)?;
        self.epoch = epoch;
        Ok(())
    }

    fn propagator(&self) -> &dyn OrbitalPropagator {
        &self.propagator
    }

    fn available_delta_v_km_s(&self) -> f64 {
        self.propulsion.available_delta_v_km_s()
    }

    fn required_delta_v_km_s(&self, duration: Duration) -> f64 {
        self.propulsion.required_delta_v_km_s(duration)
    }

    fn maneuver_duration(&self, dv_km_s: f64, configured: Duration) -> Duration {
        self.propulsion.maneuver_duration(dv_km_s, configured)
    }

    fn maneuver(
        &mut self,
        epoch: Epoch,
        commanded_km_s: Vector3<f64>,
        start: Epoch,
        duration: Duration,
    ) -> Result<Vector3<f64>, MissionError> {
        // Vet the trajectory before the budget is touched. Orbital energy is
        // convex along the burn direction, so if the full commanded vector
        // stays elliptical every partial delivery does too.
        let preview = self
            .propagator
            .state_at(epoch)?
            .with_delta_v(commanded_km_s);
        if preview.is_hyperbolic() && !self.propagator.hyperbolic_allowed() {
            return Err(AstroError::HyperbolicOrbit { ecc: preview.ecc() }.into());
        }
        let achieved = self
            .propulsion
            .maneuver(epoch, commanded_km_s, start, duration)?;
        self.propagator.apply_delta_v(epoch, achieved)?;
        self.epoch = epoch;
        Ok(achieved)
    }

    fn perform_staging(&mut self) -> Result<(), MissionError> {
        self.propulsion.perform_staging()?;
        Ok(())
    }

    fn solver(&self) -> &dyn BoundaryValueSolver {
        &self.solver
    }

    fn resolve_target(&self, spec: &TargetSpec, epoch: Epoch) -> Result<Orbit, TargetingError> {
        match spec {
            TargetSpec::Kinematic(state) => KeplerianPropagator::propagate(state, epoch)
                .map_err(|_| TargetingError::UnresolvedTarget {
                    what: "kinematic state (not propagatable)".to_string(),
                }),
            TargetSpec::Track(id) | TargetSpec::Platform(id) => {
                let state = self
                    .targets
                    .get(id)
                    .ok_or_else(|| TargetingError::UnresolvedTarget { what: id.clone() })?;
                KeplerianPropagator::propagate(state, epoch).map_err(|_| {
                    TargetingError::UnresolvedTarget { what: id.clone() }
                })
            }
            TargetSpec::LibrationPoint(point) => Err(TargetingError::UnresolvedTarget {
                what: format!("libration point {point:?} (requires a full simulation)"),
            }),
        }
    }

    fn sun_direction(&self, _epoch: Epoch) -> Option<Vector3<f64>> {
        self.sun_direction
    }

    fn on_event_initiated(&mut self, name: &str, epoch: Epoch) {
        info!("mission event initiated: {name} @ {epoch}");
    }

    fn on_event_updated(&mut self, name: &str, epoch: Epoch) {
        debug!("mission event updated: {name} @ {epoch}");
    }

    fn on_event_completed(&mut self, name: &str, epoch: Epoch) {
        info!("mission event completed: {name} @ {epoch}");
    }

    fn on_event_canceled(&mut self, name: &str, epoch: Epoch) {
        warn!("mission event canceled: {name} @ {epoch}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astro::CentralBody;
    use crate::propulsion::ImpulsiveModel;

    #[test]
    fn rejected_burn_leaves_budget_and_trajectory_untouched() {
        let epoch = Epoch::from_gregorian_utc_at_midnight(2026, 3, 1);
        let orbit = Orbit::keplerian(
            7_000.0,
            0.0,
            0.4,
            0.0,
            0.0,
            0.0,
            epoch,
            CentralBody::earth(),
        );
        let mut ctx = StandaloneContext::new(orbit, Box::new(ImpulsiveModel::new(10.0)));

        // 5 km/s prograde from LEO escapes, which the propagator refuses
        let dv = orbit.velocity_km_s().normalize() * 5.0;
        assert!(ctx
            .maneuver(epoch, dv, epoch, Duration::from_seconds(0.0))
            .is_err());
        assert_eq!(ctx.available_delta_v_km_s(), 10.0);
        assert_eq!(
            ctx.orbital_state().velocity_km_s(),
            orbit.velocity_km_s()
        );
    }
}
