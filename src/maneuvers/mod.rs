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

//! The maneuver family: a single event type carrying one of the closed set of
//! delta-v laws, plus the composite sequences built out of them.

use crate::astro::ManeuverFrame;
use crate::context::ExecutionContext;
use crate::errors::{ConfigError, EventError, MissionError};
use crate::event::{EventCommand, EventCore, ExecuteStatus, TriggerCondition};
use crate::linalg::Vector3;
use crate::time::{Duration, Epoch};

mod analytic;
mod composite;
mod targeting;

pub use composite::{
    Compound, Drift, Intercept, NaturalMotionCircumnavigation, Rendezvous, Teardrop,
};
pub use targeting::{
    BlendedCost, LibrationPoint, SolvedTransfer, TargetPoint, TargetSpec, TargetingCost,
    TargetingScheme,
};

/// A maneuver is complete once its undelivered delta-v drops to 1 mm/s.
pub const COMPLETION_TOLERANCE_KM_S: f64 = 1e-6;

/// Execution-time sentinel: a targeting law that can no longer produce a
/// solution reports this magnitude instead of failing, leaving the decision
/// to retry, skip, or cancel with the caller.
pub const INFEASIBLE_DELTA_V_KM_S: f64 = f64::MAX;

pub(crate) fn infeasible_delta_v() -> Vector3<f64> {
    Vector3::repeat(INFEASIBLE_DELTA_V_KM_S)
}

pub(crate) fn is_infeasible(dv_km_s: &Vector3<f64>) -> bool {
    dv_km_s[0] >= INFEASIBLE_DELTA_V_KM_S
}

/// How the magnitude of a tangential or normal burn is specified.
#[derive(Copy, Clone, Debug)]
pub enum MagnitudeSpec {
    /// A signed delta-v, in km/s. Negative burns against the axis.
    DeltaV(f64),
    /// A signed fraction of the current speed.
    FractionOfSpeed(f64),
    /// Whatever the propulsion model delivers over this burn time.
    FromDuration(Duration),
}

impl MagnitudeSpec {
    pub(crate) fn resolve(&self, state: &crate::Orbit, ctx: &dyn ExecutionContext) -> f64 {
        match self {
            Self::DeltaV(dv_km_s) => *dv_km_s,
            Self::FractionOfSpeed(fraction) => fraction * state.vmag_km_s(),
            Self::FromDuration(duration) => ctx.required_delta_v_km_s(*duration),
        }
    }

    fn is_finite_value(&self) -> bool {
        match self {
            Self::DeltaV(value) | Self::FractionOfSpeed(value) => value.is_finite(),
            Self::FromDuration(_) => true,
        }
    }
}

/// The closed set of delta-v computations a maneuver can carry.
///
/// Dispatch is a `match`: the set of laws is part of this crate's contract,
/// not an extension point.
#[derive(Debug)]
pub enum DeltaVLaw {
    /// Put the orbit into a circle at the radius where the trigger fires.
    Circularize,
    /// Reshape to a target eccentricity, holding the apsis the burn occurs at.
    ChangeEccentricity { target_ecc: f64 },
    /// Rotate the orbital plane to a target inclination at a node crossing.
    ChangeInclination { target_inc_rad: f64 },
    /// Burn along (or against) the velocity vector.
    Tangent { magnitude: MagnitudeSpec },
    /// Burn along (or against) the orbit normal.
    Normal { magnitude: MagnitudeSpec },
    /// An operator-specified delta-v vector in a supported frame.
    DeltaV {
        vector_km_s: Vector3<f64>,
        frame: ManeuverFrame,
    },
    /// Fly to a target point by solving the two-point boundary-value problem.
    Target {
        point: TargetPoint,
        scheme: TargetingScheme,
        /// Intercept position tolerance used by the search refinement, in km/s
        /// of delta-v resolution.
        tolerance_km_s: f64,
        solved: Option<SolvedTransfer>,
    },
    /// Null the velocity difference with a target point.
    MatchVelocity { point: TargetPoint },
}

impl DeltaVLaw {
    pub fn target(point: TargetPoint, scheme: TargetingScheme) -> Self {
        Self::Target {
            point,
            scheme,
            tolerance_km_s: targeting::DELTA_V_TOLERANCE_KM_S,
            solved: None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Circularize => "circularize",
            Self::ChangeEccentricity { .. } => "change eccentricity",
            Self::ChangeInclination { .. } => "change inclination",
            Self::Tangent { .. } => "tangent",
            Self::Normal { .. } => "normal",
            Self::DeltaV { .. } => "delta-v",
            Self::Target { .. } => "target",
            Self::MatchVelocity { .. } => "match velocity",
        }
    }

    /// Cheap structural checks, run at construction.
    fn check_construction(&self) -> Result<(), ConfigError> {
        match self {
            Self::ChangeEccentricity { target_ecc } => {
                if !(0.0..1.0).contains(target_ecc) {
                    return Err(ConfigError::OutOfRange {
                        param: "target eccentricity",
                        value: *target_ecc,
                    });
                }
            }
            Self::ChangeInclination { target_inc_rad } => {
                if !(0.0..=std::f64::consts::PI).contains(target_inc_rad) {
                    return Err(ConfigError::OutOfRange {
                        param: "target inclination (rad)",
                        value: *target_inc_rad,
                    });
                }
            }
            Self::Tangent { magnitude } | Self::Normal { magnitude } => {
                if !magnitude.is_finite_value() {
                    return Err(ConfigError::MissingParameter {
                        param: "burn magnitude",
                    });
                }
            }
            Self::Target { scheme, .. } => scheme.check_construction()?,
            Self::Circularize | Self::DeltaV { .. } | Self::MatchVelocity { .. } => {}
        }
        Ok(())
    }

    /// Initialization-time precondition checks against the live state.
    fn validate(
        &self,
        condition: &TriggerCondition,
        state: &crate::Orbit,
        ctx: &dyn ExecutionContext,
    ) -> Result<(), MissionError> {
        match self {
            Self::Circularize => analytic::validate_circularize(condition),
            Self::ChangeEccentricity { .. } => {
                analytic::validate_change_eccentricity(condition, state)
            }
            Self::ChangeInclination { .. } => {
                analytic::validate_change_inclination(condition, state)
            }
            Self::Target { scheme, .. } => targeting::validate_scheme(scheme, ctx),
            Self::Tangent { .. }
            | Self::Normal { .. }
            | Self::DeltaV { .. }
            | Self::MatchVelocity { .. } => Ok(()),
        }
    }

    /// The full delta-v vector this law calls for when evaluated at `evaluation`.
    ///
    /// Strict: any infeasibility is an error. Used during initialization.
    fn solve(
        &mut self,
        condition: &TriggerCondition,
        evaluation: Epoch,
        ctx: &dyn ExecutionContext,
    ) -> Result<Vector3<f64>, MissionError> {
        let state = ctx.propagator().state_at(evaluation)?;
        let dv = match self {
            Self::Circularize => analytic::circularize(&state),
            Self::ChangeEccentricity { target_ecc } => {
                analytic::change_eccentricity(&state, condition, *target_ecc)?
            }
            Self::ChangeInclination { target_inc_rad } => {
                analytic::change_inclination(&state, condition, *target_inc_rad)
            }
            Self::Tangent { magnitude } => analytic::tangent(&state, magnitude.resolve(&state, ctx)),
            Self::Normal { magnitude } => analytic::normal(&state, magnitude.resolve(&state, ctx)),
            Self::DeltaV { vector_km_s, frame } => frame.dcm_to_inertial(&state) * *vector_km_s,
            Self::Target {
                point,
                scheme,
                tolerance_km_s,
                solved,
            } => {
                let solution = targeting::search(&state, point, scheme, *tolerance_km_s, ctx)?;
                let dv = solution.delta_v_km_s;
                *solved = Some(solution);
                dv
            }
            Self::MatchVelocity { point } => targeting::match_velocity(&state, point, ctx)?,
        };
        // Laws may not push the trajectory out of the regime the propagator accepts
        let post = state.with_delta_v(dv);
        if post.is_hyperbolic() && !ctx.propagator().hyperbolic_allowed() {
            return Err(crate::AstroError::HyperbolicOrbit { ecc: post.ecc() }.into());
        }
        Ok(dv)
    }

    /// Execution-time recomputation of the delta-v vector.
    ///
    /// The target may have moved since initialization, so targeting laws
    /// re-solve; a solve that no longer succeeds is reported through the
    /// infeasibility sentinel rather than an error.
    fn compute(
        &mut self,
        condition: &TriggerCondition,
        evaluation: Epoch,
        ctx: &dyn ExecutionContext,
    ) -> Vector3<f64> {
        match self.solve(condition, evaluation, ctx) {
            Ok(dv) => dv,
            Err(error) => {
                warn!("{} law infeasible at execution time: {error}", self.name());
                infeasible_delta_v()
            }
        }
    }
}

/// A scheduled burn: one delta-v law bound to a trigger condition, with
/// required/expended accounting against the propulsion budget.
#[derive(Debug)]
pub struct Maneuver {
    pub core: EventCore,
    law: DeltaVLaw,
    required_km_s: f64,
    expended_km_s: f64,
}

impl Maneuver {
    pub fn new(
        name: impl Into<String>,
        condition: TriggerCondition,
        law: DeltaVLaw,
    ) -> Result<Self, ConfigError> {
        law.check_construction()?;
        Ok(Self {
            core: EventCore::new(name, condition),
            law,
            required_km_s: 0.0,
            expended_km_s: 0.0,
        })
    }

    /// Spreads the burn over a window instead of applying it impulsively.
    /// A zero duration lets the propulsion model derive the window.
    pub fn finite(mut self, duration: Duration) -> Self {
        self.core.finite = true;
        self.core.duration = duration;
        self
    }

    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.core.update_interval = interval;
        self
    }

    pub fn law(&self) -> &DeltaVLaw {
        &self.law
    }

    /// Delta-v magnitude this maneuver calls for, fixed at initialization.
    pub fn required_delta_v_km_s(&self) -> f64 {
        self.required_km_s
    }

    pub fn expended_delta_v_km_s(&self) -> f64 {
        self.expended_km_s
    }

    pub fn remaining_delta_v_km_s(&self) -> f64 {
        (self.required_km_s - self.expended_km_s).max(0.0)
    }

    /// Arrival epoch of the solved transfer, for targeting maneuvers.
    pub fn intercept_epoch(&self) -> Option<Epoch> {
        match &self.law {
            DeltaVLaw::Target { solved, .. } => solved.map(|transfer| transfer.arrival),
            _ => None,
        }
    }

    /// Validates preconditions and resolves timing, duration, and the
    /// required delta-v. Idempotent for identical inputs.
    pub fn initialize(
        &mut self,
        epoch: Epoch,
        ctx: &mut dyn ExecutionContext,
    ) -> Result<(), MissionError> {
        let condition = self.core.condition.clone();
        let state = ctx.propagator().state_at(epoch)?;
        self.law.validate(&condition, &state, &*ctx)?;

        let law = &mut self.law;
        let mut solved = Vector3::zeros();
        self.core.resolve_timing(epoch, &*ctx, |inner_ctx, evaluation| {
            let dv = law.solve(&condition, evaluation, inner_ctx)?;
            solved = dv;
            Ok(dv.norm())
        })?;
        self.required_km_s = solved.norm();
        self.expended_km_s = 0.0;
        info!(
            "maneuver {} ({}): requires {:.6} km/s at {}",
            self.core.name,
            self.law.name(),
            self.required_km_s,
            // Set by resolve_timing just above
            self.core.evaluation.unwrap_or(epoch),
        );
        ctx.on_event_initiated(&self.core.name, epoch);
        Ok(())
    }

    /// Delivers delta-v at `epoch`. Safe to call repeatedly: a finite burn
    /// delivers its elapsed fraction each call, an impulsive burn completes
    /// on the first call at or after its start epoch.
    pub fn execute(
        &mut self,
        epoch: Epoch,
        ctx: &mut dyn ExecutionContext,
    ) -> Result<ExecuteStatus, MissionError> {
        if let Some(status) = self.core.execute_gate(epoch)? {
            return Ok(status);
        }
        let start = self.core.start.ok_or(EventError::NotInitialized)?;
        let evaluation = self.core.evaluation.ok_or(EventError::NotInitialized)?;
        let condition = self.core.condition.clone();

        let dv_full = self.law.compute(&condition, evaluation, &*ctx);
        if is_infeasible(&dv_full) {
            return Ok(ExecuteStatus::Infeasible);
        }
        let full_norm = dv_full.norm();
        let remaining = self.remaining_delta_v_km_s();
        if full_norm <= COMPLETION_TOLERANCE_KM_S || remaining <= COMPLETION_TOLERANCE_KM_S {
            self.core.mark_complete(epoch, ctx);
            return Ok(ExecuteStatus::Complete);
        }

        // Scale the law's direction to the delta-v still owed
        let commanded = dv_full * (remaining / full_norm);
        self.core.mark_executing(epoch, ctx);
        let achieved = ctx.maneuver(epoch, commanded, start, self.core.scheduled_duration)?;
        self.expended_km_s += achieved.norm();

        if self.remaining_delta_v_km_s() <= COMPLETION_TOLERANCE_KM_S {
            self.core.mark_complete(epoch, ctx);
            Ok(ExecuteStatus::Complete)
        } else {
            Ok(ExecuteStatus::InProgress)
        }
    }

    pub fn cancel(&mut self, epoch: Epoch, ctx: &mut dyn ExecutionContext) {
        self.core.mark_canceled(epoch, ctx);
    }

    /// Applies a runtime configuration command to this maneuver.
    pub fn process_input(&mut self, command: &EventCommand) -> Result<bool, ConfigError> {
        if let Some(handled) = self.core.apply_command(command) {
            return Ok(handled);
        }
        match (&mut self.law, command) {
            (
                DeltaVLaw::DeltaV { vector_km_s, frame },
                EventCommand::SetDeltaV {
                    vector_km_s: vector,
                    frame: new_frame,
                },
            ) => {
                *vector_km_s = *vector;
                *frame = *new_frame;
                Ok(true)
            }
            (DeltaVLaw::Target { point, .. }, EventCommand::SetTargetPoint(new_point))
            | (DeltaVLaw::MatchVelocity { point }, EventCommand::SetTargetPoint(new_point)) => {
                *point = new_point.clone();
                Ok(true)
            }
            (DeltaVLaw::Target { tolerance_km_s, .. }, EventCommand::SetTolerance(tolerance)) => {
                if *tolerance <= 0.0 {
                    return Err(ConfigError::OutOfRange {
                        param: "tolerance (km/s)",
                        value: *tolerance,
                    });
                }
                *tolerance_km_s = *tolerance;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
