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

//! Mission events: the scheduling layer between trigger conditions and maneuvers.

use crate::astro::ManeuverFrame;
use crate::context::ExecutionContext;
use crate::errors::{EventError, MissionError, PropulsionError};
use crate::linalg::Vector3;
use crate::maneuvers::{
    Compound, Drift, Intercept, Maneuver, NaturalMotionCircumnavigation, Rendezvous, TargetPoint,
    Teardrop,
};
use crate::time::{Duration, Epoch};
use serde_derive::{Deserialize, Serialize};

pub mod condition;
pub use condition::TriggerCondition;

mod sequence;
pub use sequence::MissionSequence;

/// Non-causal start times are resolved by postponing whole orbits, at most
/// this many times.
const DELAY_CAP: usize = 32;

/// Lifecycle of a mission event.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventState {
    /// Configured but not yet scheduled against a trajectory.
    Unconfigured,
    /// Timing and feasibility resolved; waiting for the start epoch.
    Initialized,
    Executing,
    Complete,
    Canceled,
}

/// What an `execute` call did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExecuteStatus {
    /// The scheduled start epoch has not been reached.
    Pending,
    /// Delta-v is being delivered (or, for a composite, a stage is running).
    InProgress,
    /// The solution became infeasible at execution time. Nothing was applied;
    /// the caller decides whether to retry, skip, or cancel.
    Infeasible,
    Complete,
}

/// Runtime configuration commands, mirroring the scripting surface of the
/// surrounding simulation. Commands that do not apply to an event are
/// reported as unhandled (`Ok(false)`); commands that would reconfigure the
/// internal stage of a composite are rejected outright.
#[derive(Clone, Debug)]
pub enum EventCommand {
    SetCondition(TriggerCondition),
    SetFinite(bool),
    SetDuration(Duration),
    SetMinimumDuration(Duration),
    SetUpdateInterval(Duration),
    SetDeltaV {
        vector_km_s: Vector3<f64>,
        frame: ManeuverFrame,
    },
    SetTargetPoint(TargetPoint),
    /// Drift rate in rad/s, positive meaning a faster (lower) orbit.
    SetDriftRate(f64),
    /// Targeting solution tolerance, in km/s.
    SetTolerance(f64),
}

impl EventCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetCondition(_) => "SetCondition",
            Self::SetFinite(_) => "SetFinite",
            Self::SetDuration(_) => "SetDuration",
            Self::SetMinimumDuration(_) => "SetMinimumDuration",
            Self::SetUpdateInterval(_) => "SetUpdateInterval",
            Self::SetDeltaV { .. } => "SetDeltaV",
            Self::SetTargetPoint(_) => "SetTargetPoint",
            Self::SetDriftRate(_) => "SetDriftRate",
            Self::SetTolerance(_) => "SetTolerance",
        }
    }

    /// Whether this command reaches into the maneuver computation itself,
    /// which composites keep under their own control.
    pub(crate) fn targets_stage_internals(&self) -> bool {
        matches!(
            self,
            Self::SetDeltaV { .. } | Self::SetTargetPoint(_) | Self::SetTolerance(_)
        )
    }
}

/// State and scheduling data shared by every mission event.
#[derive(Clone, Debug)]
pub struct EventCore {
    pub name: String,
    pub condition: TriggerCondition,
    /// Explicitly configured burn duration; zero means "derive from the
    /// propulsion model".
    pub duration: Duration,
    pub minimum_duration: Duration,
    /// Requested spacing of execute calls while the event runs.
    pub update_interval: Duration,
    /// Finite events spread delta-v over a burn window centered on the
    /// evaluation epoch; impulsive events apply it all at once.
    pub finite: bool,
    pub(crate) start: Option<Epoch>,
    pub(crate) evaluation: Option<Epoch>,
    pub(crate) scheduled_duration: Duration,
    pub(crate) state: EventState,
}

impl EventCore {
    pub fn new(name: impl Into<String>, condition: TriggerCondition) -> Self {
        Self {
            name: name.into(),
            condition,
            duration: Duration::ZERO,
            minimum_duration: Duration::ZERO,
            update_interval: Duration::ZERO,
            finite: false,
            start: None,
            evaluation: None,
            scheduled_duration: Duration::ZERO,
            state: EventState::Unconfigured,
        }
    }

    pub fn state(&self) -> EventState {
        self.state
    }

    /// Epoch at which delta-v delivery begins, once initialized.
    pub fn start_epoch(&self) -> Option<Epoch> {
        self.start
    }

    /// Epoch at which the trigger condition is met, once initialized.
    pub fn evaluation_epoch(&self) -> Option<Epoch> {
        self.evaluation
    }

    /// Burn window actually scheduled (zero for impulsive events).
    pub fn scheduled_duration(&self) -> Duration {
        self.scheduled_duration
    }

    /// When the event next wants an execute call, if it asked for a cadence.
    pub fn next_update_epoch(&self, epoch: Epoch) -> Option<Epoch> {
        if self.state == EventState::Executing && self.update_interval > Duration::ZERO {
            Some(epoch + self.update_interval)
        } else {
            None
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == EventState::Complete
    }

    /// Applies a shared configuration command. Returns None for commands this
    /// core does not understand.
    pub(crate) fn apply_command(&mut self, command: &EventCommand) -> Option<bool> {
        match command {
            EventCommand::SetCondition(condition) => {
                self.condition = condition.clone();
                Some(true)
            }
            EventCommand::SetFinite(finite) => {
                self.finite = *finite;
                Some(true)
            }
            EventCommand::SetDuration(duration) => {
                self.duration = *duration;
                self.finite = self.finite || *duration > Duration::ZERO;
                Some(true)
            }
            EventCommand::SetMinimumDuration(duration) => {
                self.minimum_duration = *duration;
                Some(true)
            }
            EventCommand::SetUpdateInterval(interval) => {
                self.update_interval = *interval;
                Some(true)
            }
            _ => None,
        }
    }

    /// Resolves when this event evaluates, starts, and how long it burns.
    ///
    /// The candidate evaluation epoch comes from the trigger condition;
    /// `required_delta_v` reports the delta-v magnitude the event needs if it
    /// evaluates at that epoch. A finite burn is centered on the evaluation
    /// epoch, so its start may land before `epoch`: periodic conditions are
    /// then postponed a whole orbit and re-resolved, bounded by [`DELAY_CAP`];
    /// non-periodic ones clamp the start to `epoch`.
    pub(crate) fn resolve_timing<F>(
        &mut self,
        epoch: Epoch,
        ctx: &dyn ExecutionContext,
        mut required_delta_v: F,
    ) -> Result<(), MissionError>
    where
        F: FnMut(&dyn ExecutionContext, Epoch) -> Result<f64, MissionError>,
    {
        let mut condition = self.condition.clone();
        for _ in 0..DELAY_CAP {
            let state = ctx.propagator().state_at(epoch)?;
            let delay = condition.time_until(&state, ctx.sun_direction(epoch))?;
            let evaluation = epoch + delay;

            let dv_km_s = required_delta_v(ctx, evaluation)?;
            let available = ctx.available_delta_v_km_s();
            if dv_km_s > available + 1e-9 {
                return Err(PropulsionError::InsufficientDeltaV {
                    requested_km_s: dv_km_s,
                    available_km_s: available,
                }
                .into());
            }

            let duration = if self.finite {
                let configured = if self.duration > self.minimum_duration {
                    self.duration
                } else {
                    self.minimum_duration
                };
                ctx.maneuver_duration(dv_km_s, configured)
            } else {
                Duration::ZERO
            };

            let mut start = if self.finite {
                evaluation - duration * 0.5
            } else {
                evaluation
            };
            if start < epoch {
                if condition.advance_one_orbit() {
                    warn!(
                        "event {}: start {start} precedes the initializing epoch {epoch}, postponing one orbit",
                        self.name
                    );
                    continue;
                }
                warn!(
                    "event {}: start {start} precedes the initializing epoch {epoch} and the condition cannot be postponed, starting immediately",
                    self.name
                );
                start = epoch;
            }

            self.start = Some(start);
            self.evaluation = Some(evaluation);
            self.scheduled_duration = duration;
            self.state = EventState::Initialized;
            debug!(
                "event {}: evaluation {evaluation}, start {start}, burn {duration}",
                self.name
            );
            return Ok(());
        }
        Err(EventError::DelayCapExceeded { cap: DELAY_CAP }.into())
    }

    /// Marks delivery underway and fires the update hook.
    pub(crate) fn mark_executing(&mut self, epoch: Epoch, ctx: &mut dyn ExecutionContext) {
        self.state = EventState::Executing;
        ctx.on_event_updated(&self.name, epoch);
    }

    pub(crate) fn mark_complete(&mut self, epoch: Epoch, ctx: &mut dyn ExecutionContext) {
        self.state = EventState::Complete;
        ctx.on_event_completed(&self.name, epoch);
    }

    pub(crate) fn mark_canceled(&mut self, epoch: Epoch, ctx: &mut dyn ExecutionContext) {
        self.state = EventState::Canceled;
        ctx.on_event_canceled(&self.name, epoch);
    }

    /// Guards an execute call: not-yet-started events report `Pending`,
    /// finished ones report their terminal status.
    pub(crate) fn execute_gate(&self, epoch: Epoch) -> Result<Option<ExecuteStatus>, MissionError> {
        match self.state {
            EventState::Unconfigured => Err(EventError::NotInitialized.into()),
            EventState::Complete | EventState::Canceled => Ok(Some(ExecuteStatus::Complete)),
            EventState::Initialized | EventState::Executing => {
                let start = self.start.ok_or(EventError::NotInitialized)?;
                if epoch < start {
                    Ok(Some(ExecuteStatus::Pending))
                } else {
                    Ok(None)
                }
            }
        }
    }
}

/// An event that does nothing but wait for its trigger condition.
///
/// Used as the terminal stage of intercepts and repetition-counting
/// composites, and handy on its own to mark a point of interest.
#[derive(Clone, Debug)]
pub struct Marker {
    pub core: EventCore,
}

impl Marker {
    pub fn new(name: impl Into<String>, condition: TriggerCondition) -> Self {
        Self {
            core: EventCore::new(name, condition),
        }
    }

    pub fn initialize(
        &mut self,
        epoch: Epoch,
        ctx: &mut dyn ExecutionContext,
    ) -> Result<(), MissionError> {
        self.core.resolve_timing(epoch, &*ctx, |_, _| Ok(0.0))?;
        ctx.on_event_initiated(&self.core.name, epoch);
        Ok(())
    }

    pub fn execute(
        &mut self,
        epoch: Epoch,
        ctx: &mut dyn ExecutionContext,
    ) -> Result<ExecuteStatus, MissionError> {
        if let Some(status) = self.core.execute_gate(epoch)? {
            return Ok(status);
        }
        self.core.mark_complete(epoch, ctx);
        Ok(ExecuteStatus::Complete)
    }
}

/// Every kind of mission event the scheduler can hold.
///
/// A closed set dispatched by `match`: adding an event kind is a change to
/// this crate, not an extension point.
#[derive(Debug)]
pub enum MissionEvent {
    Maneuver(Maneuver),
    Sequence(MissionSequence),
    Compound(Compound),
    Rendezvous(Rendezvous),
    Intercept(Intercept),
    Drift(Drift),
    Teardrop(Teardrop),
    Nmc(NaturalMotionCircumnavigation),
    Marker(Marker),
}

impl MissionEvent {
    pub fn core(&self) -> &EventCore {
        match self {
            Self::Maneuver(event) => &event.core,
            Self::Sequence(event) => &event.core,
            Self::Compound(event) => &event.core,
            Self::Rendezvous(event) => &event.core,
            Self::Intercept(event) => &event.core,
            Self::Drift(event) => &event.core,
            Self::Teardrop(event) => &event.core,
            Self::Nmc(event) => &event.core,
            Self::Marker(event) => &event.core,
        }
    }

    pub fn core_mut(&mut self) -> &mut EventCore {
        match self {
            Self::Maneuver(event) => &mut event.core,
            Self::Sequence(event) => &mut event.core,
            Self::Compound(event) => &mut event.core,
            Self::Rendezvous(event) => &mut event.core,
            Self::Intercept(event) => &mut event.core,
            Self::Drift(event) => &mut event.core,
            Self::Teardrop(event) => &mut event.core,
            Self::Nmc(event) => &mut event.core,
            Self::Marker(event) => &mut event.core,
        }
    }

    pub fn name(&self) -> &str {
        &self.core().name
    }

    pub fn is_complete(&self) -> bool {
        self.core().is_complete()
    }

    /// Resolves timing and feasibility against the live trajectory.
    /// Idempotent: re-initializing with the same inputs resolves identically.
    pub fn initialize(
        &mut self,
        epoch: Epoch,
        ctx: &mut dyn ExecutionContext,
    ) -> Result<(), MissionError> {
        match self {
            Self::Maneuver(event) => event.initialize(epoch, ctx),
            Self::Sequence(event) => event.initialize(epoch, ctx),
            Self::Compound(event) => event.initialize(epoch, ctx),
            Self::Rendezvous(event) => event.initialize(epoch, ctx),
            Self::Intercept(event) => event.initialize(epoch, ctx),
            Self::Drift(event) => event.initialize(epoch, ctx),
            Self::Teardrop(event) => event.initialize(epoch, ctx),
            Self::Nmc(event) => event.initialize(epoch, ctx),
            Self::Marker(event) => event.initialize(epoch, ctx),
        }
    }

    /// Runs the event at `epoch`. Safe to call repeatedly; an already
    /// complete event reports `Complete` without touching anything.
    pub fn execute(
        &mut self,
        epoch: Epoch,
        ctx: &mut dyn ExecutionContext,
    ) -> Result<ExecuteStatus, MissionError> {
        match self {
            Self::Maneuver(event) => event.execute(epoch, ctx),
            Self::Sequence(event) => event.execute(epoch, ctx),
            Self::Compound(event) => event.execute(epoch, ctx),
            Self::Rendezvous(event) => event.execute(epoch, ctx),
            Self::Intercept(event) => event.execute(epoch, ctx),
            Self::Drift(event) => event.execute(epoch, ctx),
            Self::Teardrop(event) => event.execute(epoch, ctx),
            Self::Nmc(event) => event.execute(epoch, ctx),
            Self::Marker(event) => event.execute(epoch, ctx),
        }
    }

    pub fn cancel(&mut self, epoch: Epoch, ctx: &mut dyn ExecutionContext) {
        self.core_mut().state = EventState::Canceled;
        let name = self.core().name.clone();
        ctx.on_event_canceled(&name, epoch);
    }

    /// Applies a runtime configuration command.
    ///
    /// Returns Ok(true) if handled, Ok(false) if the command does not apply
    /// to this event kind, and an error if a composite refuses to let its
    /// internal stages be reconfigured.
    pub fn process_input(&mut self, command: &EventCommand) -> Result<bool, crate::ConfigError> {
        match self {
            Self::Maneuver(event) => event.process_input(command),
            Self::Compound(event) => event.process_input(command),
            Self::Rendezvous(event) => event.process_input(command),
            Self::Intercept(event) => event.process_input(command),
            Self::Drift(event) => event.process_input(command),
            Self::Teardrop(event) => event.process_input(command),
            Self::Nmc(event) => event.process_input(command),
            Self::Sequence(event) => Ok(event.core.apply_command(command).unwrap_or(false)),
            Self::Marker(event) => Ok(event.core.apply_command(command).unwrap_or(false)),
        }
    }
}

impl From<Maneuver> for MissionEvent {
    fn from(event: Maneuver) -> Self {
        Self::Maneuver(event)
    }
}

impl From<MissionSequence> for MissionEvent {
    fn from(event: MissionSequence) -> Self {
        Self::Sequence(event)
    }
}

impl From<Marker> for MissionEvent {
    fn from(event: Marker) -> Self {
        Self::Marker(event)
    }
}
