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

use snafu::Snafu;

/// Orbital state and element computation errors.
#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AstroError {
    #[snafu(display("orbit is hyperbolic (ecc = {ecc:.6}) and hyperbolic propagation is not allowed"))]
    HyperbolicOrbit { ecc: f64 },
    #[snafu(display("apsis timing is undefined on a circular orbit (ecc = {ecc:.2e})"))]
    UndefinedApsis { ecc: f64 },
    #[snafu(display("node timing is undefined on an equatorial orbit (inc = {inc_deg:.6} deg)"))]
    UndefinedNode { inc_deg: f64 },
    #[snafu(display(
        "radius {radius_km:.3} km is not crossed by this orbit (periapsis {periapsis_km:.3} km, apoapsis {apoapsis_km:.3} km)"
    ))]
    RadiusNotCrossed {
        radius_km: f64,
        periapsis_km: f64,
        apoapsis_km: f64,
    },
    #[snafu(display("Kepler solver did not converge after {iters} iterations"))]
    KeplerConvergence { iters: usize },
}

/// Errors from the delta-v budget model.
#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PropulsionError {
    #[snafu(display(
        "requested delta-v {requested_km_s:.6} km/s exceeds available budget {available_km_s:.6} km/s"
    ))]
    InsufficientDeltaV {
        requested_km_s: f64,
        available_km_s: f64,
    },
    #[snafu(display("this propulsion model does not support staging operations"))]
    StagingUnsupported,
    #[snafu(display("finite-thrust model requires a strictly positive delta-v rate"))]
    ZeroRate,
}

/// Errors from the boundary-value solver.
#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LambertError {
    #[snafu(display("boundary states are too close for the transfer geometry to be defined"))]
    TargetsTooClose,
    #[snafu(display("boundary-value solver failed after {iters} iterations"))]
    MaxIterReached { iters: usize },
    #[snafu(display("could not find a physical universal variable (psi)"))]
    UnreasonablePsi,
    #[snafu(display("non-positive time of flight: {tof_s} s"))]
    NonPositiveTof { tof_s: f64 },
}

/// Targeting maneuver errors, both at initialization and during the solution search.
#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TargetingError {
    #[snafu(display(
        "configured delta-v ceiling {ceiling_km_s:.6} km/s exceeds the available budget {available_km_s:.6} km/s"
    ))]
    BudgetCeiling {
        ceiling_km_s: f64,
        available_km_s: f64,
    },
    #[snafu(display("no feasible transfer found in the search window of {window_s:.3} s"))]
    NoFeasibleSolution { window_s: f64 },
    #[snafu(display("transfer orbit is hyperbolic and hyperbolic propagation is not allowed"))]
    HyperbolicTransfer,
    #[snafu(display(
        "transfer orbit intersects the central body (periapsis {periapsis_km:.3} km < surface {surface_km:.3} km)"
    ))]
    SurfaceIntersection { periapsis_km: f64, surface_km: f64 },
    #[snafu(display("invalid cost function: {reason}"))]
    InvalidCostFunction { reason: String },
    #[snafu(display("could not resolve target {what}"))]
    UnresolvedTarget { what: String },
}

/// Mission event lifecycle and trigger-condition resolution errors.
#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EventError {
    #[snafu(display("trigger condition could not be resolved: {source}"))]
    ConditionUnresolvable { source: AstroError },
    #[snafu(display("eclipse conditions require a sun ephemeris from the execution context"))]
    NoSunEphemeris,
    #[snafu(display("no eclipse {edge} found within one orbital period"))]
    EclipseNotFound { edge: &'static str },
    #[snafu(display(
        "resolution kept producing non-causal start times after {cap} delay insertions"
    ))]
    DelayCapExceeded { cap: usize },
    #[snafu(display("event was executed before being initialized"))]
    NotInitialized,
    #[snafu(display("mission sequence has no events"))]
    EmptySequence,
}

/// Configuration errors, rejected before any event state changes.
#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("required parameter {param} is not set"))]
    MissingParameter { param: &'static str },
    #[snafu(display("parameter {param} is out of range: {value}"))]
    OutOfRange { param: &'static str, value: f64 },
    #[snafu(display(
        "command {command} reconfigures an internal stage of a composite maneuver and is rejected"
    ))]
    LockedByComposite { command: &'static str },
    #[snafu(display("invalid target point for {maneuver}: {reason}"))]
    InvalidTargetPoint {
        maneuver: &'static str,
        reason: &'static str,
    },
    #[snafu(display(
        "condition {condition} is not allowed for maneuver {maneuver}: {reason}"
    ))]
    DisallowedCondition {
        condition: &'static str,
        maneuver: &'static str,
        reason: &'static str,
    },
}

/// Umbrella error for mission event initialization and execution.
#[derive(Debug, Snafu)]
pub enum MissionError {
    #[snafu(context(false), display("{source}"))]
    Astro { source: AstroError },
    #[snafu(context(false), display("{source}"))]
    Propulsion { source: PropulsionError },
    #[snafu(context(false), display("{source}"))]
    Lambert { source: LambertError },
    #[snafu(context(false), display("{source}"))]
    Targeting { source: TargetingError },
    #[snafu(context(false), display("{source}"))]
    Event { source: EventError },
    #[snafu(context(false), display("{source}"))]
    Config { source: ConfigError },
}
