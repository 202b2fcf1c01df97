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
use crate::errors::{ConditionUnresolvableSnafu, EventError};
use crate::linalg::Vector3;
use crate::propagation::KeplerianPropagator;
use crate::time::{Duration, Epoch};
use serde_derive::{Deserialize, Serialize};
use snafu::ResultExt;

/// Eclipse edge refinement tolerance, in seconds.
const ECLIPSE_TOL_S: f64 = 1e-3;
/// Samples over one period when hunting for an eclipse edge.
const ECLIPSE_SAMPLES: usize = 720;

/// When a mission event evaluates, phrased as an orbital geometry crossing.
///
/// Conditions carrying an orbit count fire on the n-th future crossing
/// (0 means the next one). A crossing the vehicle sits on right now counts
/// as a full revolution away, so a condition never fires immediately.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TriggerCondition {
    /// Evaluate at the initializing epoch.
    None,
    /// Evaluate a fixed offset after the initializing epoch.
    RelativeTime { offset: Duration },
    Periapsis { orbit: u32 },
    Apoapsis { orbit: u32 },
    AscendingNode { orbit: u32 },
    DescendingNode { orbit: u32 },
    /// Crossing a radius with positive radial velocity.
    AscendingRadius { radius_km: f64, orbit: u32 },
    /// Crossing a radius with negative radial velocity.
    DescendingRadius { radius_km: f64, orbit: u32 },
    EclipseEntry { orbit: u32 },
    EclipseExit { orbit: u32 },
}

impl TriggerCondition {
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::RelativeTime { .. } => "relative time",
            Self::Periapsis { .. } => "periapsis",
            Self::Apoapsis { .. } => "apoapsis",
            Self::AscendingNode { .. } => "ascending node",
            Self::DescendingNode { .. } => "descending node",
            Self::AscendingRadius { .. } => "ascending radius",
            Self::DescendingRadius { .. } => "descending radius",
            Self::EclipseEntry { .. } => "eclipse entry",
            Self::EclipseExit { .. } => "eclipse exit",
        }
    }

    /// Whether this condition repeats every revolution, i.e. whether a
    /// scheduler may postpone it by whole orbits.
    pub fn is_periodic(&self) -> bool {
        !matches!(self, Self::None | Self::RelativeTime { .. })
    }

    /// Whether this condition pins the burn to an apsis, which the
    /// eccentricity-change maneuver requires on non-circular orbits.
    pub fn is_apsis(&self) -> bool {
        matches!(self, Self::Periapsis { .. } | Self::Apoapsis { .. })
    }

    /// Postpones a periodic condition by one revolution. Returns false when
    /// the condition has no orbit count to advance.
    pub(crate) fn advance_one_orbit(&mut self) -> bool {
        match self {
            Self::None | Self::RelativeTime { .. } => false,
            Self::Periapsis { orbit }
            | Self::Apoapsis { orbit }
            | Self::AscendingNode { orbit }
            | Self::DescendingNode { orbit }
            | Self::AscendingRadius { orbit, .. }
            | Self::DescendingRadius { orbit, .. }
            | Self::EclipseEntry { orbit }
            | Self::EclipseExit { orbit } => {
                *orbit += 1;
                true
            }
        }
    }

    /// Time from `state.epoch` until this condition is met.
    ///
    /// `sun_direction` is the unit vector from the central body to the sun,
    /// needed only by the eclipse conditions.
    pub fn time_until(
        &self,
        state: &Orbit,
        sun_direction: Option<Vector3<f64>>,
    ) -> Result<Duration, EventError> {
        let delay = match self {
            Self::None => Duration::ZERO,
            Self::RelativeTime { offset } => *offset,
            Self::Periapsis { orbit } => state
                .time_to_periapsis(*orbit)
                .context(ConditionUnresolvableSnafu)?,
            Self::Apoapsis { orbit } => state
                .time_to_apoapsis(*orbit)
                .context(ConditionUnresolvableSnafu)?,
            Self::AscendingNode { orbit } => state
                .time_to_node(true, *orbit)
                .context(ConditionUnresolvableSnafu)?,
            Self::DescendingNode { orbit } => state
                .time_to_node(false, *orbit)
                .context(ConditionUnresolvableSnafu)?,
            Self::AscendingRadius { radius_km, orbit } => state
                .time_to_radius(*radius_km, true, *orbit)
                .context(ConditionUnresolvableSnafu)?,
            Self::DescendingRadius { radius_km, orbit } => state
                .time_to_radius(*radius_km, false, *orbit)
                .context(ConditionUnresolvableSnafu)?,
            Self::EclipseEntry { orbit } => {
                let sun = sun_direction.ok_or(EventError::NoSunEphemeris)?;
                Duration::from_seconds(eclipse_edge(state, sun, true, *orbit)?)
            }
            Self::EclipseExit { orbit } => {
                let sun = sun_direction.ok_or(EventError::NoSunEphemeris)?;
                Duration::from_seconds(eclipse_edge(state, sun, false, *orbit)?)
            }
        };
        Ok(delay)
    }
}

impl std::fmt::Display for TriggerCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::RelativeTime { offset } => write!(f, "relative time {offset}"),
            Self::AscendingRadius { radius_km, orbit } | Self::DescendingRadius { radius_km, orbit } => {
                write!(f, "{} {radius_km} km (orbit {orbit})", self.name())
            }
            Self::None => write!(f, "none"),
            Self::Periapsis { orbit }
            | Self::Apoapsis { orbit }
            | Self::AscendingNode { orbit }
            | Self::DescendingNode { orbit }
            | Self::EclipseEntry { orbit }
            | Self::EclipseExit { orbit } => write!(f, "{} (orbit {orbit})", self.name()),
        }
    }
}

/// Cylindrical shadow test: behind the body relative to the sun and within
/// one body radius of the anti-sun axis.
fn in_shadow(state: &Orbit, sun_direction: Vector3<f64>) -> bool {
    let r = state.radius_km();
    let along_sun = r.dot(&sun_direction);
    if along_sun >= 0.0 {
        return false;
    }
    let perp = r - along_sun * sun_direction;
    perp.norm() < state.body.mean_radius_km
}

/// Seconds until the next shadow entry (or exit), `orbit` revolutions out.
///
/// Samples one revolution for a bracketing transition, then bisects the edge.
/// The sun is treated as inertially fixed over the revolution.
fn eclipse_edge(
    state: &Orbit,
    sun_direction: Vector3<f64>,
    entry: bool,
    orbit: u32,
) -> Result<f64, EventError> {
    let period_s = state.period().context(ConditionUnresolvableSnafu)?.to_seconds();
    let step_s = period_s / ECLIPSE_SAMPLES as f64;

    let shadow_at = |t_s: f64| -> Result<bool, EventError> {
        let probe = KeplerianPropagator::propagate(state, state.epoch + Duration::from_seconds(t_s))
            .context(ConditionUnresolvableSnafu)?;
        Ok(in_shadow(&probe, sun_direction))
    };

    let mut prev = shadow_at(0.0)?;
    for i in 1..=ECLIPSE_SAMPLES {
        let t_s = i as f64 * step_s;
        let cur = shadow_at(t_s)?;
        if prev != cur && cur == entry {
            // Bisect the bracketing interval down to the edge
            let mut lo = t_s - step_s;
            let mut hi = t_s;
            while hi - lo > ECLIPSE_TOL_S {
                let mid = 0.5 * (lo + hi);
                if shadow_at(mid)? == prev {
                    lo = mid;
                } else {
                    hi = mid;
                }
            }
            return Ok(hi + f64::from(orbit) * period_s);
        }
        prev = cur;
    }
    Err(EventError::EclipseNotFound {
        edge: if entry { "entry" } else { "exit" },
    })
}
