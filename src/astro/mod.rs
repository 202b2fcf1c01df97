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

use crate::linalg::Matrix3;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

pub(crate) mod orbit;
pub use orbit::{Orbit, ECC_EPSILON, INC_EPSILON};

/// The gravitational center a trajectory is defined around.
///
/// Only the gravitational parameter and the mean radius matter to maneuver
/// planning: the former for all element computations, the latter for the
/// surface-intersection postconditions.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CentralBody {
    pub name: &'static str,
    /// Gravitational parameter in km^3/s^2
    pub gm_km3_s2: f64,
    /// Mean equatorial radius in km
    pub mean_radius_km: f64,
}

impl CentralBody {
    pub const fn earth() -> Self {
        Self {
            name: "Earth",
            gm_km3_s2: 398_600.435_436,
            mean_radius_km: 6_378.136_3,
        }
    }

    pub const fn moon() -> Self {
        Self {
            name: "Moon",
            gm_km3_s2: 4_902.800_066,
            mean_radius_km: 1_737.4,
        }
    }

    /// Circular orbit speed at the provided radius, in km/s
    pub fn circular_velocity_km_s(&self, radius_km: f64) -> f64 {
        (self.gm_km3_s2 / radius_km).sqrt()
    }
}

impl fmt::Display for CentralBody {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Local frame options for operator-specified delta-v vectors.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManeuverFrame {
    Inertial,
    /// Radial / in-track / cross-track relative to the instantaneous orbital frame
    Ric,
}

impl ManeuverFrame {
    /// Rotation taking a vector expressed in this frame into the inertial frame of `state`.
    pub fn dcm_to_inertial(&self, state: &Orbit) -> Matrix3<f64> {
        match self {
            ManeuverFrame::Inertial => Matrix3::identity(),
            ManeuverFrame::Ric => state.dcm_from_ric_to_inertial(),
        }
    }
}

impl fmt::Display for ManeuverFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ManeuverFrame::Inertial => write!(f, "inertial"),
            ManeuverFrame::Ric => write!(f, "RIC"),
        }
    }
}
