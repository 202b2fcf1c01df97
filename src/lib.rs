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

/*! # orbital-maneuvers

The maneuver planning and execution core of a discrete-event space simulation:
mission events with orbital-geometry trigger conditions, closed-form delta-v
laws, a delta-v budget model for impulsive and finite burns, and composite
targeting sequences (rendezvous, intercept, drift, teardrop, natural-motion
circumnavigation) built on a two-point boundary-value solver.

The surrounding simulation supplies an [`ExecutionContext`](context::ExecutionContext):
the live propagator, the propulsion budget, target resolution, and the
observability hooks. This crate never owns the simulation loop.
*/

/// Central body definitions and the `Orbit` state type.
pub mod astro;

/// The execution context interface between mission events and the surrounding simulation.
pub mod context;

mod errors;
pub use errors::{
    AstroError, ConfigError, EventError, LambertError, MissionError, PropulsionError,
    TargetingError,
};

/// Mission events, trigger conditions, and mission sequences.
pub mod event;

/// The two-point boundary-value (Lambert) solver interface and its default implementation.
pub mod lambert;

/// The maneuver family: analytic delta-v laws, targeting, and composite sequences.
pub mod maneuvers;

/// The orbital propagator collaborator interface and a two-body implementation.
pub mod propagation;

/// Delta-v budget tracking for impulsive and finite-thrust vehicles.
pub mod propulsion;

#[macro_use]
extern crate log;
extern crate nalgebra as na;

/// Re-export of hifitime
pub mod time {
    pub use hifitime::*;
}

/// Re-export nalgebra
pub mod linalg {
    pub use na::base::*;
}

/// Re-export some useful things
pub use self::astro::{CentralBody, Orbit};

pub mod prelude {
    pub use crate::astro::{CentralBody, ManeuverFrame, Orbit};
    pub use crate::context::{ExecutionContext, StandaloneContext};
    pub use crate::event::{
        EventCommand, EventCore, EventState, ExecuteStatus, Marker, MissionEvent, MissionSequence,
        TriggerCondition,
    };
    pub use crate::lambert::{BoundaryValueSolver, GoodingSolver, TransferSolution};
    pub use crate::maneuvers::{
        BlendedCost, Compound, DeltaVLaw, Drift, Intercept, LibrationPoint, MagnitudeSpec,
        Maneuver, NaturalMotionCircumnavigation, Rendezvous, TargetPoint, TargetSpec,
        TargetingCost, TargetingScheme, Teardrop, COMPLETION_TOLERANCE_KM_S,
        INFEASIBLE_DELTA_V_KM_S,
    };
    pub use crate::propagation::{KeplerianPropagator, OrbitalPropagator};
    pub use crate::propulsion::{
        ConstantRateModel, ImpulsiveModel, PropulsionModel, PropulsionStage,
    };
    pub use crate::MissionError;
}
