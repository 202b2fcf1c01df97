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

use super::{EventCore, EventState, ExecuteStatus, MissionEvent, TriggerCondition};
use crate::context::ExecutionContext;
use crate::errors::{EventError, MissionError};
use crate::time::Epoch;

/// An ordered list of mission events executed one at a time.
///
/// Only the current event is initialized: each successor is scheduled against
/// the trajectory that actually resulted from its predecessors, at the epoch
/// the predecessor completed.
#[derive(Debug)]
pub struct MissionSequence {
    pub core: EventCore,
    events: Vec<MissionEvent>,
    current: usize,
}

impl MissionSequence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: EventCore::new(name, TriggerCondition::None),
            events: Vec::new(),
            current: 0,
        }
    }

    pub fn with_event(mut self, event: impl Into<MissionEvent>) -> Self {
        self.events.push(event.into());
        self
    }

    pub fn push(&mut self, event: impl Into<MissionEvent>) {
        self.events.push(event.into());
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Index of the event currently being executed.
    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn events(&self) -> &[MissionEvent] {
        &self.events
    }

    pub fn initialize(
        &mut self,
        epoch: Epoch,
        ctx: &mut dyn ExecutionContext,
    ) -> Result<(), MissionError> {
        if self.events.is_empty() {
            return Err(EventError::EmptySequence.into());
        }
        self.current = 0;
        self.events[0].initialize(epoch, ctx)?;
        // The sequence is scheduled wherever its first event is
        self.core.start = self.events[0].core().start;
        self.core.evaluation = self.events[0].core().evaluation;
        self.core.state = EventState::Initialized;
        ctx.on_event_initiated(&self.core.name, epoch);
        Ok(())
    }

    pub fn execute(
        &mut self,
        epoch: Epoch,
        ctx: &mut dyn ExecutionContext,
    ) -> Result<ExecuteStatus, MissionError> {
        match self.core.state {
            EventState::Unconfigured => return Err(EventError::NotInitialized.into()),
            EventState::Complete | EventState::Canceled => return Ok(ExecuteStatus::Complete),
            EventState::Initialized | EventState::Executing => {}
        }
        let status = self.events[self.current].execute(epoch, ctx)?;
        if status != ExecuteStatus::Complete {
            self.core.state = EventState::Executing;
            return Ok(status);
        }
        if self.current + 1 == self.events.len() {
            self.core.mark_complete(epoch, ctx);
            return Ok(ExecuteStatus::Complete);
        }
        // Schedule the successor against the post-maneuver trajectory
        self.current += 1;
        info!(
            "sequence {}: advancing to event {} ({})",
            self.core.name,
            self.current,
            self.events[self.current].name()
        );
        self.events[self.current].initialize(epoch, ctx)?;
        self.core.state = EventState::Executing;
        Ok(ExecuteStatus::InProgress)
    }

    pub fn cancel(&mut self, epoch: Epoch, ctx: &mut dyn ExecutionContext) {
        if let Some(event) = self.events.get_mut(self.current) {
            if !event.is_complete() {
                event.cancel(epoch, ctx);
            }
        }
        self.core.mark_canceled(epoch, ctx);
    }
}
