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

//! Composite maneuvers: multi-stage relative-motion events whose later
//! stages are derived from the solved transfer of the first.
//!
//! Each composite owns typed stage slots rather than a generic child list,
//! and refuses runtime commands that would reconfigure a stage's target or
//! delta-v computation. Stage conditions that depend on the solved intercept
//! epoch are derived exactly once, when the transfer stage completes.

use super::{analytic, DeltaVLaw, Maneuver, TargetPoint, TargetSpec, TargetingScheme};
use crate::astro::Orbit;
use crate::context::ExecutionContext;
use crate::errors::{ConfigError, EventError, MissionError, TargetingError};
use crate::event::{EventCommand, EventCore, EventState, ExecuteStatus, Marker, TriggerCondition};
use crate::linalg::Vector3;
use crate::time::{Duration, Epoch};

/// Station-keeping corrections appended after a drift arrival.
const DRIFT_CORRECTIONS: usize = 2;

/// The teardrop closure relation degenerates near roots of 4 sin x = 3 x;
/// candidates with a denominator below this are rejected.
const TEARDROP_DENOM_TOL: f64 = 1e-6;

/// Shared execute-entry gating for composites: stages do their own
/// start-epoch gating, the composite only tracks terminal states.
fn gate(core: &EventCore) -> Result<Option<ExecuteStatus>, MissionError> {
    match core.state {
        EventState::Unconfigured => Err(EventError::NotInitialized.into()),
        EventState::Complete | EventState::Canceled => Ok(Some(ExecuteStatus::Complete)),
        EventState::Initialized | EventState::Executing => Ok(None),
    }
}

/// Pushes the composite's scheduling configuration down onto a stage.
fn configure_stage(stage: &mut Maneuver, core: &EventCore) {
    stage.core.condition = core.condition.clone();
    stage.core.finite = core.finite;
    stage.core.duration = core.duration;
    stage.core.minimum_duration = core.minimum_duration;
    stage.core.update_interval = core.update_interval;
}

/// Condition for a follow-on stage pinned to an absolute epoch.
fn at_epoch(target: Epoch, now: Epoch) -> TriggerCondition {
    TriggerCondition::RelativeTime {
        offset: target - now,
    }
}

/// Two maneuvers executed as one event, in start-epoch order.
///
/// Both stages resolve their timing against the same initializing epoch; if
/// the second resolves earlier than the first the execution order is swapped.
/// The swap is decided at initialization, never while executing.
#[derive(Debug)]
pub struct Compound {
    pub core: EventCore,
    first: Maneuver,
    second: Maneuver,
    swapped: bool,
    stage: usize,
}

impl Compound {
    pub fn new(name: impl Into<String>, first: Maneuver, second: Maneuver) -> Self {
        Self {
            core: EventCore::new(name, TriggerCondition::None),
            first,
            second,
            swapped: false,
            stage: 0,
        }
    }

    pub fn is_swapped(&self) -> bool {
        self.swapped
    }

    fn ordered_mut(&mut self) -> [&mut Maneuver; 2] {
        if self.swapped {
            [&mut self.second, &mut self.first]
        } else {
            [&mut self.first, &mut self.second]
        }
    }

    pub fn initialize(
        &mut self,
        epoch: Epoch,
        ctx: &mut dyn ExecutionContext,
    ) -> Result<(), MissionError> {
        self.first.initialize(epoch, ctx)?;
        self.second.initialize(epoch, ctx)?;
        self.swapped = self.second.core.start < self.first.core.start;
        if self.swapped {
            info!(
                "compound {}: {} resolves before {}, swapping execution order",
                self.core.name, self.second.core.name, self.first.core.name
            );
        }
        self.stage = 0;
        let [earlier, _] = self.ordered_mut();
        let (start, evaluation) = (earlier.core.start, earlier.core.evaluation);
        self.core.start = start;
        self.core.evaluation = evaluation;
        self.core.state = EventState::Initialized;
        ctx.on_event_initiated(&self.core.name, epoch);
        Ok(())
    }

    pub fn execute(
        &mut self,
        epoch: Epoch,
        ctx: &mut dyn ExecutionContext,
    ) -> Result<ExecuteStatus, MissionError> {
        if let Some(status) = gate(&self.core)? {
            return Ok(status);
        }
        let stage = self.stage;
        let [a, b] = self.ordered_mut();
        let current = if stage == 0 { a } else { b };
        let status = current.execute(epoch, ctx)?;
        if status != ExecuteStatus::Complete {
            self.core.state = EventState::Executing;
            return Ok(status);
        }
        if self.stage == 0 {
            self.stage = 1;
            self.core.state = EventState::Executing;
            return Ok(ExecuteStatus::InProgress);
        }
        self.core.mark_complete(epoch, ctx);
        Ok(ExecuteStatus::Complete)
    }

    pub fn process_input(&mut self, command: &EventCommand) -> Result<bool, ConfigError> {
        if command.targets_stage_internals() {
            return Err(ConfigError::LockedByComposite {
                command: command.name(),
            });
        }
        // Each stage keeps its own condition and burn shape
        Ok(self.core.apply_command(command).unwrap_or(false))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum TwoStagePhase {
    Transfer,
    Arrival,
}

/// Transfer to a target point, then match its velocity on arrival.
///
/// The velocity-match stage is scheduled exactly once, at the intercept
/// epoch of the solved transfer, when the transfer stage completes.
#[derive(Debug)]
pub struct Rendezvous {
    pub core: EventCore,
    transfer: Maneuver,
    matcher: Maneuver,
    phase: TwoStagePhase,
}

impl Rendezvous {
    pub fn new(
        name: impl Into<String>,
        condition: TriggerCondition,
        point: TargetPoint,
        scheme: TargetingScheme,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let transfer = Maneuver::new(
            format!("{name}.transfer"),
            condition.clone(),
            DeltaVLaw::target(point.clone(), scheme),
        )?;
        let matcher = Maneuver::new(
            format!("{name}.match"),
            TriggerCondition::None,
            DeltaVLaw::MatchVelocity { point },
        )?;
        Ok(Self {
            core: EventCore::new(name, condition),
            transfer,
            matcher,
            phase: TwoStagePhase::Transfer,
        })
    }

    pub fn initialize(
        &mut self,
        epoch: Epoch,
        ctx: &mut dyn ExecutionContext,
    ) -> Result<(), MissionError> {
        configure_stage(&mut self.transfer, &self.core);
        self.transfer.initialize(epoch, ctx)?;
        self.phase = TwoStagePhase::Transfer;
        self.core.start = self.transfer.core.start;
        self.core.evaluation = self.transfer.core.evaluation;
        self.core.state = EventState::Initialized;
        ctx.on_event_initiated(&self.core.name, epoch);
        Ok(())
    }

    pub fn execute(
        &mut self,
        epoch: Epoch,
        ctx: &mut dyn ExecutionContext,
    ) -> Result<ExecuteStatus, MissionError> {
        if let Some(status) = gate(&self.core)? {
            return Ok(status);
        }
        match self.phase {
            TwoStagePhase::Transfer => {
                let status = self.transfer.execute(epoch, ctx)?;
                if status != ExecuteStatus::Complete {
                    self.core.state = EventState::Executing;
                    return Ok(status);
                }
                let intercept = self
                    .transfer
                    .intercept_epoch()
                    .ok_or(EventError::NotInitialized)?;
                self.matcher.core.condition = at_epoch(intercept, epoch);
                self.matcher.initialize(epoch, ctx)?;
                self.phase = TwoStagePhase::Arrival;
                self.core.state = EventState::Executing;
                Ok(ExecuteStatus::InProgress)
            }
            TwoStagePhase::Arrival => {
                let status = self.matcher.execute(epoch, ctx)?;
                if status == ExecuteStatus::Complete {
                    self.core.mark_complete(epoch, ctx);
                }
                Ok(status)
            }
        }
    }

    pub fn process_input(&mut self, command: &EventCommand) -> Result<bool, ConfigError> {
        if let EventCommand::SetTolerance(_) = command {
            // The solution tolerance is the composite's own knob
            return self.transfer.process_input(command);
        }
        if command.targets_stage_internals() {
            return Err(ConfigError::LockedByComposite {
                command: command.name(),
            });
        }
        Ok(self.core.apply_command(command).unwrap_or(false))
    }
}

/// Transfer to a target point and coast through it: the arrival stage is a
/// bare marker at the solved intercept epoch, no braking burn.
#[derive(Debug)]
pub struct Intercept {
    pub core: EventCore,
    transfer: Maneuver,
    arrival: Marker,
    phase: TwoStagePhase,
}

impl Intercept {
    pub fn new(
        name: impl Into<String>,
        condition: TriggerCondition,
        point: TargetPoint,
        scheme: TargetingScheme,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let transfer = Maneuver::new(
            format!("{name}.transfer"),
            condition.clone(),
            DeltaVLaw::target(point, scheme),
        )?;
        let arrival = Marker::new(format!("{name}.arrival"), TriggerCondition::None);
        Ok(Self {
            core: EventCore::new(name, condition),
            transfer,
            arrival,
            phase: TwoStagePhase::Transfer,
        })
    }

    pub fn initialize(
        &mut self,
        epoch: Epoch,
        ctx: &mut dyn ExecutionContext,
    ) -> Result<(), MissionError> {
        configure_stage(&mut self.transfer, &self.core);
        self.transfer.initialize(epoch, ctx)?;
        self.phase = TwoStagePhase::Transfer;
        self.core.start = self.transfer.core.start;
        self.core.evaluation = self.transfer.core.evaluation;
        self.core.state = EventState::Initialized;
        ctx.on_event_initiated(&self.core.name, epoch);
        Ok(())
    }

    pub fn execute(
        &mut self,
        epoch: Epoch,
        ctx: &mut dyn ExecutionContext,
    ) -> Result<ExecuteStatus, MissionError> {
        if let Some(status) = gate(&self.core)? {
            return Ok(status);
        }
        match self.phase {
            TwoStagePhase::Transfer => {
                let status = self.transfer.execute(epoch, ctx)?;
                if status != ExecuteStatus::Complete {
                    self.core.state = EventState::Executing;
                    return Ok(status);
                }
                let intercept = self
                    .transfer
                    .intercept_epoch()
                    .ok_or(EventError::NotInitialized)?;
                self.arrival.core.condition = at_epoch(intercept, epoch);
                self.arrival.initialize(epoch, ctx)?;
                self.phase = TwoStagePhase::Arrival;
                self.core.state = EventState::Executing;
                Ok(ExecuteStatus::InProgress)
            }
            TwoStagePhase::Arrival => {
                let status = self.arrival.execute(epoch, ctx)?;
                if status == ExecuteStatus::Complete {
                    self.core.mark_complete(epoch, ctx);
                }
                Ok(status)
            }
        }
    }

    pub fn process_input(&mut self, command: &EventCommand) -> Result<bool, ConfigError> {
        if let EventCommand::SetTolerance(_) = command {
            return self.transfer.process_input(command);
        }
        if command.targets_stage_internals() {
            return Err(ConfigError::LockedByComposite {
                command: command.name(),
            });
        }
        Ok(self.core.apply_command(command).unwrap_or(false))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum DriftPhase {
    Transfer,
    Arrival,
    Correction(usize),
}

/// Moves to a nearby circular orbit whose period difference produces a
/// commanded along-track drift rate, then station-keeps onto it.
///
/// The synthetic target orbit is coplanar with the current (circular) orbit
/// at the radius giving mean motion `n0 + rate`. Two velocity-match
/// corrections, half a drift period apart, absorb arrival dispersion.
#[derive(Debug)]
pub struct Drift {
    pub core: EventCore,
    drift_rate_rad_s: f64,
    scheme: TargetingScheme,
    tolerance_km_s: Option<f64>,
    stages: Option<DriftStages>,
    phase: DriftPhase,
}

#[derive(Debug)]
struct DriftStages {
    transfer: Maneuver,
    matcher: Maneuver,
    correction_point: TargetPoint,
    drift_period: Duration,
    correction: Option<Maneuver>,
}

impl Drift {
    pub fn new(
        name: impl Into<String>,
        condition: TriggerCondition,
        drift_rate_rad_s: f64,
        scheme: TargetingScheme,
    ) -> Result<Self, ConfigError> {
        if !drift_rate_rad_s.is_finite() || drift_rate_rad_s == 0.0 {
            return Err(ConfigError::OutOfRange {
                param: "drift rate (rad/s)",
                value: drift_rate_rad_s,
            });
        }
        scheme.check_construction()?;
        Ok(Self {
            core: EventCore::new(name, condition),
            drift_rate_rad_s,
            scheme,
            tolerance_km_s: None,
            stages: None,
            phase: DriftPhase::Transfer,
        })
    }

    pub fn drift_rate_rad_s(&self) -> f64 {
        self.drift_rate_rad_s
    }

    /// Radius of the drift orbit for a circular start at `state`.
    pub fn drift_radius_km(&self, state: &Orbit) -> Result<f64, MissionError> {
        let n0 = state.mean_motion_rad_s();
        let ratio = 1.0 + self.drift_rate_rad_s / n0;
        if ratio <= 0.0 {
            return Err(ConfigError::OutOfRange {
                param: "drift rate (rad/s)",
                value: self.drift_rate_rad_s,
            }
            .into());
        }
        let alpha = ratio.cbrt();
        Ok(state.rmag_km() / (alpha * alpha))
    }

    pub fn initialize(
        &mut self,
        epoch: Epoch,
        ctx: &mut dyn ExecutionContext,
    ) -> Result<(), MissionError> {
        let state = ctx.propagator().state_at(epoch)?;
        analytic::require_circular(&state, "initial eccentricity (drift requires a circular orbit)")?;
        let radius_km = self.drift_radius_km(&state)?;
        let surface_km = state.body.mean_radius_km;
        if radius_km <= surface_km {
            // Rejected before any event state changes
            return Err(TargetingError::SurfaceIntersection {
                periapsis_km: radius_km,
                surface_km,
            }
            .into());
        }

        let r_hat = state.radius_km().normalize();
        let v_hat = state.velocity_km_s().normalize();
        let drift_orbit = Orbit::from_vectors(
            r_hat * radius_km,
            v_hat * state.body.circular_velocity_km_s(radius_km),
            epoch,
            state.body,
        );
        info!(
            "drift {}: target radius {radius_km:.3} km (from {:.3} km)",
            self.core.name,
            state.rmag_km()
        );

        let point = TargetPoint::new(TargetSpec::Kinematic(drift_orbit));
        let mut transfer = Maneuver::new(
            format!("{}.transfer", self.core.name),
            self.core.condition.clone(),
            DeltaVLaw::target(point.clone(), self.scheme.clone()),
        )?;
        if let Some(tolerance) = self.tolerance_km_s {
            transfer.process_input(&EventCommand::SetTolerance(tolerance))?;
        }
        configure_stage(&mut transfer, &self.core);
        let matcher = Maneuver::new(
            format!("{}.match", self.core.name),
            TriggerCondition::None,
            DeltaVLaw::MatchVelocity {
                point: point.clone(),
            },
        )?;

        transfer.initialize(epoch, ctx)?;
        self.core.start = transfer.core.start;
        self.core.evaluation = transfer.core.evaluation;
        self.stages = Some(DriftStages {
            transfer,
            matcher,
            correction_point: point,
            drift_period: drift_orbit.period()?,
            correction: None,
        });
        self.phase = DriftPhase::Transfer;
        self.core.state = EventState::Initialized;
        ctx.on_event_initiated(&self.core.name, epoch);
        Ok(())
    }

    pub fn execute(
        &mut self,
        epoch: Epoch,
        ctx: &mut dyn ExecutionContext,
    ) -> Result<ExecuteStatus, MissionError> {
        if let Some(status) = gate(&self.core)? {
            return Ok(status);
        }
        let stages = self.stages.as_mut().ok_or(EventError::NotInitialized)?;
        match self.phase {
            DriftPhase::Transfer => {
                let status = stages.transfer.execute(epoch, ctx)?;
                if status != ExecuteStatus::Complete {
                    self.core.state = EventState::Executing;
                    return Ok(status);
                }
                let intercept = stages
                    .transfer
                    .intercept_epoch()
                    .ok_or(EventError::NotInitialized)?;
                stages.matcher.core.condition = at_epoch(intercept, epoch);
                stages.matcher.initialize(epoch, ctx)?;
                self.phase = DriftPhase::Arrival;
                self.core.state = EventState::Executing;
                Ok(ExecuteStatus::InProgress)
            }
            DriftPhase::Arrival => {
                let status = stages.matcher.execute(epoch, ctx)?;
                if status != ExecuteStatus::Complete {
                    return Ok(status);
                }
                self.phase = DriftPhase::Correction(0);
                Self::schedule_correction(stages, 0, epoch, ctx)?;
                Ok(ExecuteStatus::InProgress)
            }
            DriftPhase::Correction(index) => {
                let correction = stages
                    .correction
                    .as_mut()
                    .ok_or(EventError::NotInitialized)?;
                let status = correction.execute(epoch, ctx)?;
                if status != ExecuteStatus::Complete {
                    return Ok(status);
                }
                let next = index + 1;
                if next >= DRIFT_CORRECTIONS {
                    self.core.mark_complete(epoch, ctx);
                    return Ok(ExecuteStatus::Complete);
                }
                self.phase = DriftPhase::Correction(next);
                Self::schedule_correction(stages, next, epoch, ctx)?;
                Ok(ExecuteStatus::InProgress)
            }
        }
    }

    fn schedule_correction(
        stages: &mut DriftStages,
        index: usize,
        epoch: Epoch,
        ctx: &mut dyn ExecutionContext,
    ) -> Result<(), MissionError> {
        // Half a drift period out for the first correction, a full period for
        // each one after that.
        let offset = if index == 0 {
            stages.drift_period * 0.5
        } else {
            stages.drift_period
        };
        let mut correction = Maneuver::new(
            format!("{}.correction-{index}", stages.transfer.core.name),
            TriggerCondition::RelativeTime { offset },
            DeltaVLaw::MatchVelocity {
                point: stages.correction_point.clone(),
            },
        )?;
        correction.initialize(epoch, ctx)?;
        stages.correction = Some(correction);
        Ok(())
    }

    pub fn process_input(&mut self, command: &EventCommand) -> Result<bool, ConfigError> {
        match command {
            EventCommand::SetDriftRate(rate) => {
                if !rate.is_finite() || *rate == 0.0 {
                    return Err(ConfigError::OutOfRange {
                        param: "drift rate (rad/s)",
                        value: *rate,
                    });
                }
                self.drift_rate_rad_s = *rate;
                return Ok(true);
            }
            EventCommand::SetTolerance(tolerance) => {
                if *tolerance <= 0.0 {
                    return Err(ConfigError::OutOfRange {
                        param: "tolerance (km/s)",
                        value: *tolerance,
                    });
                }
                self.tolerance_km_s = Some(*tolerance);
                return Ok(true);
            }
            _ => {}
        }
        if command.targets_stage_internals() {
            return Err(ConfigError::LockedByComposite {
                command: command.name(),
            });
        }
        Ok(self.core.apply_command(command).unwrap_or(false))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum RelativePhase {
    Transfer,
    Arrival,
    Coasting,
}

/// Flies a teardrop-shaped relative loop over a target.
///
/// Insertion conditions come from the Clohessy-Wiltshire relations: at the
/// point of closest approach (POCA) the vehicle sits at a pure radial offset
/// with a cross-track rate chosen so the relative loop closes with the
/// configured period. The insertion state is that POCA state back-propagated
/// by the configured lead time.
#[derive(Debug)]
pub struct Teardrop {
    pub core: EventCore,
    point: TargetPoint,
    scheme: TargetingScheme,
    radial_offset_at_poca_km: f64,
    period: Duration,
    time_to_poca: Duration,
    repetitions: u32,
    tolerance_km_s: Option<f64>,
    stages: Option<RelativeStages>,
    phase: RelativePhase,
}

#[derive(Debug)]
struct RelativeStages {
    transfer: Maneuver,
    matcher: Maneuver,
    /// Completion marker; `None` when the composite ends at velocity match.
    coast: Option<Marker>,
    coast_offset: Duration,
}

impl Teardrop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        condition: TriggerCondition,
        point: TargetPoint,
        scheme: TargetingScheme,
        radial_offset_at_poca_km: f64,
        period: Duration,
        time_to_poca: Duration,
        repetitions: u32,
    ) -> Result<Self, ConfigError> {
        if point.has_offsets() {
            return Err(ConfigError::InvalidTargetPoint {
                maneuver: "teardrop",
                reason: "offsets are derived from the teardrop geometry",
            });
        }
        if radial_offset_at_poca_km == 0.0 || !radial_offset_at_poca_km.is_finite() {
            return Err(ConfigError::OutOfRange {
                param: "radial offset at POCA (km)",
                value: radial_offset_at_poca_km,
            });
        }
        if period.to_seconds() <= 0.0 {
            return Err(ConfigError::OutOfRange {
                param: "teardrop period (s)",
                value: period.to_seconds(),
            });
        }
        if time_to_poca.to_seconds() <= 0.0 {
            return Err(ConfigError::OutOfRange {
                param: "time to POCA (s)",
                value: time_to_poca.to_seconds(),
            });
        }
        if repetitions == 0 {
            return Err(ConfigError::OutOfRange {
                param: "repetitions",
                value: 0.0,
            });
        }
        scheme.check_construction()?;
        Ok(Self {
            core: EventCore::new(name, condition),
            point,
            scheme,
            radial_offset_at_poca_km,
            period,
            time_to_poca,
            repetitions,
            tolerance_km_s: None,
            stages: None,
            phase: RelativePhase::Transfer,
        })
    }

    /// Insertion offsets in the target RIC frame: the POCA state
    /// back-propagated by the lead time under the CW relations.
    fn insertion_offsets(&self, n: f64) -> Result<(Vector3<f64>, Vector3<f64>), MissionError> {
        let np = n * self.period.to_seconds();
        let denominator = 4.0 * np.sin() - 3.0 * np;
        if denominator.abs() < TEARDROP_DENOM_TOL {
            return Err(ConfigError::OutOfRange {
                param: "teardrop period (the loop closure degenerates where 4 sin(np) = 3 np; keep n*p below about 1.27)",
                value: np,
            }
            .into());
        }
        let x0 = self.radial_offset_at_poca_km;
        let ydot0 = -6.0 * n * x0 * (np.sin() - np) / denominator;

        let t = -self.time_to_poca.to_seconds();
        let (sin_nt, cos_nt) = (n * t).sin_cos();
        let x = (4.0 - 3.0 * cos_nt) * x0 + 2.0 * ydot0 / n * (1.0 - cos_nt);
        let y = 6.0 * x0 * (sin_nt - n * t) + ydot0 / n * (4.0 * sin_nt - 3.0 * n * t);
        let xdot = 3.0 * n * x0 * sin_nt + 2.0 * ydot0 * sin_nt;
        let ydot = 6.0 * n * x0 * (cos_nt - 1.0) + ydot0 * (4.0 * cos_nt - 3.0);
        Ok((Vector3::new(x, y, 0.0), Vector3::new(xdot, ydot, 0.0)))
    }

    pub fn initialize(
        &mut self,
        epoch: Epoch,
        ctx: &mut dyn ExecutionContext,
    ) -> Result<(), MissionError> {
        let target = ctx.resolve_target(&self.point.spec, epoch)?;
        let n = target.mean_motion_rad_s();
        let (position_offset, velocity_offset) = self.insertion_offsets(n)?;
        let insertion = self
            .point
            .clone()
            .with_position_offset(position_offset)
            .with_velocity_offset(velocity_offset);

        let coast_offset = self.time_to_poca + self.period * f64::from(self.repetitions);
        let mut stages = build_relative_stages(
            &self.core,
            insertion,
            self.scheme.clone(),
            self.tolerance_km_s,
            Some(coast_offset),
        )?;
        stages.transfer.initialize(epoch, ctx)?;
        self.core.start = stages.transfer.core.start;
        self.core.evaluation = stages.transfer.core.evaluation;
        self.stages = Some(stages);
        self.phase = RelativePhase::Transfer;
        self.core.state = EventState::Initialized;
        ctx.on_event_initiated(&self.core.name, epoch);
        Ok(())
    }

    pub fn execute(
        &mut self,
        epoch: Epoch,
        ctx: &mut dyn ExecutionContext,
    ) -> Result<ExecuteStatus, MissionError> {
        if let Some(status) = gate(&self.core)? {
            return Ok(status);
        }
        let stages = self.stages.as_mut().ok_or(EventError::NotInitialized)?;
        match self.phase {
            RelativePhase::Transfer => {
                let status = stages.transfer.execute(epoch, ctx)?;
                if status != ExecuteStatus::Complete {
                    self.core.state = EventState::Executing;
                    return Ok(status);
                }
                let intercept = stages
                    .transfer
                    .intercept_epoch()
                    .ok_or(EventError::NotInitialized)?;
                stages.matcher.core.condition = at_epoch(intercept, epoch);
                stages.matcher.initialize(epoch, ctx)?;
                self.phase = RelativePhase::Arrival;
                self.core.state = EventState::Executing;
                Ok(ExecuteStatus::InProgress)
            }
            RelativePhase::Arrival => {
                let status = stages.matcher.execute(epoch, ctx)?;
                if status != ExecuteStatus::Complete {
                    return Ok(status);
                }
                match stages.coast.as_mut() {
                    Some(coast) => {
                        coast.core.condition = TriggerCondition::RelativeTime {
                            offset: stages.coast_offset,
                        };
                        coast.initialize(epoch, ctx)?;
                        self.phase = RelativePhase::Coasting;
                        Ok(ExecuteStatus::InProgress)
                    }
                    None => {
                        self.core.mark_complete(epoch, ctx);
                        Ok(ExecuteStatus::Complete)
                    }
                }
            }
            RelativePhase::Coasting => {
                let coast = stages.coast.as_mut().ok_or(EventError::NotInitialized)?;
                let status = coast.execute(epoch, ctx)?;
                if status == ExecuteStatus::Complete {
                    self.core.mark_complete(epoch, ctx);
                }
                Ok(status)
            }
        }
    }

    pub fn process_input(&mut self, command: &EventCommand) -> Result<bool, ConfigError> {
        if let EventCommand::SetTolerance(tolerance) = command {
            if *tolerance <= 0.0 {
                return Err(ConfigError::OutOfRange {
                    param: "tolerance (km/s)",
                    value: *tolerance,
                });
            }
            self.tolerance_km_s = Some(*tolerance);
            return Ok(true);
        }
        if command.targets_stage_internals() {
            return Err(ConfigError::LockedByComposite {
                command: command.name(),
            });
        }
        Ok(self.core.apply_command(command).unwrap_or(false))
    }
}

/// Inserts into a closed natural-motion relative ellipse around a target.
///
/// The relative orbit is the classic 2x1 CW ellipse: the along-track extent
/// is twice the radial, and the closure condition ydot = -2 n x makes it
/// drift-free. An optional out-of-plane oscillation tilts the loop.
#[derive(Debug)]
pub struct NaturalMotionCircumnavigation {
    pub core: EventCore,
    point: TargetPoint,
    scheme: TargetingScheme,
    /// Full along-track extent of the relative ellipse, in km.
    orbit_size_km: f64,
    /// Phase angle around the relative ellipse at insertion, in radians.
    orbit_phase_rad: f64,
    oop_amplitude_km: f64,
    oop_phase_rad: f64,
    tolerance_km_s: Option<f64>,
    stages: Option<RelativeStages>,
    phase: RelativePhase,
}

impl NaturalMotionCircumnavigation {
    pub fn new(
        name: impl Into<String>,
        condition: TriggerCondition,
        point: TargetPoint,
        scheme: TargetingScheme,
        orbit_size_km: f64,
        orbit_phase_rad: f64,
    ) -> Result<Self, ConfigError> {
        if !matches!(point.spec, TargetSpec::Track(_)) {
            return Err(ConfigError::InvalidTargetPoint {
                maneuver: "natural motion circumnavigation",
                reason: "only perceived tracks may be circumnavigated",
            });
        }
        if point.has_offsets() {
            return Err(ConfigError::InvalidTargetPoint {
                maneuver: "natural motion circumnavigation",
                reason: "offsets are derived from the orbit size and phase",
            });
        }
        if orbit_size_km <= 0.0 || !orbit_size_km.is_finite() {
            return Err(ConfigError::OutOfRange {
                param: "orbit size (km)",
                value: orbit_size_km,
            });
        }
        scheme.check_construction()?;
        Ok(Self {
            core: EventCore::new(name, condition),
            point,
            scheme,
            orbit_size_km,
            orbit_phase_rad,
            oop_amplitude_km: 0.0,
            oop_phase_rad: 0.0,
            tolerance_km_s: None,
            stages: None,
            phase: RelativePhase::Transfer,
        })
    }

    /// Adds an out-of-plane oscillation of the given amplitude and phase.
    pub fn with_out_of_plane(mut self, amplitude_km: f64, phase_rad: f64) -> Self {
        self.oop_amplitude_km = amplitude_km;
        self.oop_phase_rad = phase_rad;
        self
    }

    /// Insertion offsets on the closed CW ellipse at the configured phase.
    fn insertion_offsets(&self, n: f64) -> (Vector3<f64>, Vector3<f64>) {
        let rho = self.orbit_size_km / 4.0;
        let (sin_phase, cos_phase) = self.orbit_phase_rad.sin_cos();
        let (sin_oop, cos_oop) = (self.orbit_phase_rad + self.oop_phase_rad).sin_cos();
        let position = Vector3::new(
            rho * sin_phase,
            2.0 * rho * cos_phase,
            self.oop_amplitude_km * sin_oop,
        );
        let velocity = Vector3::new(
            rho * n * cos_phase,
            -2.0 * rho * n * sin_phase,
            self.oop_amplitude_km * n * cos_oop,
        );
        (position, velocity)
    }

    pub fn initialize(
        &mut self,
        epoch: Epoch,
        ctx: &mut dyn ExecutionContext,
    ) -> Result<(), MissionError> {
        let target = ctx.resolve_target(&self.point.spec, epoch)?;
        let n = target.mean_motion_rad_s();
        let (position_offset, velocity_offset) = self.insertion_offsets(n);
        let insertion = self
            .point
            .clone()
            .with_position_offset(position_offset)
            .with_velocity_offset(velocity_offset);

        let mut stages = build_relative_stages(
            &self.core,
            insertion,
            self.scheme.clone(),
            self.tolerance_km_s,
            None,
        )?;
        stages.transfer.initialize(epoch, ctx)?;
        self.core.start = stages.transfer.core.start;
        self.core.evaluation = stages.transfer.core.evaluation;
        self.stages = Some(stages);
        self.phase = RelativePhase::Transfer;
        self.core.state = EventState::Initialized;
        ctx.on_event_initiated(&self.core.name, epoch);
        Ok(())
    }

    pub fn execute(
        &mut self,
        epoch: Epoch,
        ctx: &mut dyn ExecutionContext,
    ) -> Result<ExecuteStatus, MissionError> {
        if let Some(status) = gate(&self.core)? {
            return Ok(status);
        }
        let stages = self.stages.as_mut().ok_or(EventError::NotInitialized)?;
        match self.phase {
            RelativePhase::Transfer => {
                let status = stages.transfer.execute(epoch, ctx)?;
                if status != ExecuteStatus::Complete {
                    self.core.state = EventState::Executing;
                    return Ok(status);
                }
                let intercept = stages
                    .transfer
                    .intercept_epoch()
                    .ok_or(EventError::NotInitialized)?;
                stages.matcher.core.condition = at_epoch(intercept, epoch);
                stages.matcher.initialize(epoch, ctx)?;
                self.phase = RelativePhase::Arrival;
                self.core.state = EventState::Executing;
                Ok(ExecuteStatus::InProgress)
            }
            RelativePhase::Arrival | RelativePhase::Coasting => {
                let status = stages.matcher.execute(epoch, ctx)?;
                if status == ExecuteStatus::Complete {
                    self.core.mark_complete(epoch, ctx);
                }
                Ok(status)
            }
        }
    }

    pub fn process_input(&mut self, command: &EventCommand) -> Result<bool, ConfigError> {
        if let EventCommand::SetTolerance(tolerance) = command {
            if *tolerance <= 0.0 {
                return Err(ConfigError::OutOfRange {
                    param: "tolerance (km/s)",
                    value: *tolerance,
                });
            }
            self.tolerance_km_s = Some(*tolerance);
            return Ok(true);
        }
        if command.targets_stage_internals() {
            return Err(ConfigError::LockedByComposite {
                command: command.name(),
            });
        }
        Ok(self.core.apply_command(command).unwrap_or(false))
    }
}

/// Builds the transfer/match (and optional coast) stages shared by the
/// relative-motion composites.
fn build_relative_stages(
    core: &EventCore,
    insertion: TargetPoint,
    scheme: TargetingScheme,
    tolerance_km_s: Option<f64>,
    coast_offset: Option<Duration>,
) -> Result<RelativeStages, ConfigError> {
    let mut transfer = Maneuver::new(
        format!("{}.transfer", core.name),
        core.condition.clone(),
        DeltaVLaw::target(insertion.clone(), scheme),
    )?;
    if let Some(tolerance) = tolerance_km_s {
        transfer.process_input(&EventCommand::SetTolerance(tolerance))?;
    }
    configure_stage(&mut transfer, core);
    let matcher = Maneuver::new(
        format!("{}.match", core.name),
        TriggerCondition::None,
        DeltaVLaw::MatchVelocity { point: insertion },
    )?;
    Ok(RelativeStages {
        transfer,
        matcher,
        coast: coast_offset
            .is_some()
            .then(|| Marker::new(format!("{}.coast", core.name), TriggerCondition::None)),
        coast_offset: coast_offset.unwrap_or(Duration::ZERO),
    })
}

impl From<Compound> for crate::event::MissionEvent {
    fn from(event: Compound) -> Self {
        Self::Compound(event)
    }
}

impl From<Rendezvous> for crate::event::MissionEvent {
    fn from(event: Rendezvous) -> Self {
        Self::Rendezvous(event)
    }
}

impl From<Intercept> for crate::event::MissionEvent {
    fn from(event: Intercept) -> Self {
        Self::Intercept(event)
    }
}

impl From<Drift> for crate::event::MissionEvent {
    fn from(event: Drift) -> Self {
        Self::Drift(event)
    }
}

impl From<Teardrop> for crate::event::MissionEvent {
    fn from(event: Teardrop) -> Self {
        Self::Teardrop(event)
    }
}

impl From<NaturalMotionCircumnavigation> for crate::event::MissionEvent {
    fn from(event: NaturalMotionCircumnavigation) -> Self {
        Self::Nmc(event)
    }
}
