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

use crate::errors::PropulsionError;
use crate::linalg::Vector3;
use crate::time::{Duration, Epoch};
use serde_derive::{Deserialize, Serialize};

/// Numerical slack on budget comparisons, in km/s (1 micrometer per second).
const BUDGET_SLACK_KM_S: f64 = 1e-9;

/// Tracks the delta-v a vehicle can still deliver, and how delta-v maps to burn duration.
///
/// The budget is the only state shared between the stages of a composite
/// maneuver; every reduction is all-or-nothing so that a failed request
/// leaves the model untouched.
pub trait PropulsionModel {
    /// Remaining delta-v budget, in km/s.
    fn available_delta_v_km_s(&self) -> f64;

    /// The delta-v this model can deliver over `duration`, capped by the budget.
    fn required_delta_v_km_s(&self, duration: Duration) -> f64;

    /// Burn duration needed for `dv_km_s`, never shorter than the
    /// remaining explicitly-configured duration.
    fn maneuver_duration(&self, dv_km_s: f64, configured: Duration) -> Duration;

    /// Applies a commanded delta-v at `epoch` for a maneuver that began at
    /// `start` with total `duration`, and returns the delta-v actually
    /// delivered. `commanded` is the not-yet-delivered remainder of the
    /// maneuver: an impulsive model consumes it whole, a finite model
    /// delivers the time-fraction elapsed since its previous update (or the
    /// whole remainder once `start + duration` has passed).
    ///
    /// A request exceeding the available budget fails without side effects.
    fn maneuver(
        &mut self,
        epoch: Epoch,
        commanded_km_s: Vector3<f64>,
        start: Epoch,
        duration: Duration,
    ) -> Result<Vector3<f64>, PropulsionError>;

    /// Discrete staging operation. Models without staging report failure.
    fn perform_staging(&mut self) -> Result<(), PropulsionError> {
        Err(PropulsionError::StagingUnsupported)
    }
}

/// All-or-nothing budget reduction shared by the concrete models.
fn reduce_budget(available: &mut f64, dv_km_s: f64) -> Result<(), PropulsionError> {
    if dv_km_s > *available + BUDGET_SLACK_KM_S {
        return Err(PropulsionError::InsufficientDeltaV {
            requested_km_s: dv_km_s,
            available_km_s: *available,
        });
    }
    *available = (*available - dv_km_s).max(0.0);
    Ok(())
}

/// A vehicle whose burns are instantaneous.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct ImpulsiveModel {
    available_km_s: f64,
}

impl ImpulsiveModel {
    pub fn new(available_km_s: f64) -> Self {
        Self { available_km_s }
    }
}

impl PropulsionModel for ImpulsiveModel {
    fn available_delta_v_km_s(&self) -> f64 {
        self.available_km_s
    }

    fn required_delta_v_km_s(&self, _duration: Duration) -> f64 {
        // An impulsive burn of any duration can spend the whole budget
        self.available_km_s
    }

    fn maneuver_duration(&self, _dv_km_s: f64, configured: Duration) -> Duration {
        configured
    }

    fn maneuver(
        &mut self,
        _epoch: Epoch,
        commanded_km_s: Vector3<f64>,
        _start: Epoch,
        _duration: Duration,
    ) -> Result<Vector3<f64>, PropulsionError> {
        reduce_budget(&mut self.available_km_s, commanded_km_s.norm())?;
        Ok(commanded_km_s)
    }
}

/// One discrete propulsion stage: a fresh budget and delivery rate.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct PropulsionStage {
    pub delta_v_km_s: f64,
    pub rate_km_s2: f64,
}

/// A finite-thrust vehicle delivering delta-v at a constant rate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConstantRateModel {
    available_km_s: f64,
    rate_km_s2: f64,
    /// Epoch of the last delivery, the elapsed-time basis for the next fraction.
    last_update: Option<Epoch>,
    /// Remaining stages, consumed front to back by `perform_staging`.
    stages: Vec<PropulsionStage>,
}

impl ConstantRateModel {
    pub fn new(available_km_s: f64, rate_km_s2: f64) -> Result<Self, PropulsionError> {
        if rate_km_s2 <= 0.0 {
            return Err(PropulsionError::ZeroRate);
        }
        Ok(Self {
            available_km_s,
            rate_km_s2,
            last_update: None,
            stages: Vec::new(),
        })
    }

    pub fn with_stages(
        available_km_s: f64,
        rate_km_s2: f64,
        stages: Vec<PropulsionStage>,
    ) -> Result<Self, PropulsionError> {
        let mut model = Self::new(available_km_s, rate_km_s2)?;
        model.stages = stages;
        Ok(model)
    }

    pub fn rate_km_s2(&self) -> f64 {
        self.rate_km_s2
    }
}

impl PropulsionModel for ConstantRateModel {
    fn available_delta_v_km_s(&self) -> f64 {
        self.available_km_s
    }

    fn required_delta_v_km_s(&self, duration: Duration) -> f64 {
        (self.rate_km_s2 * duration.to_seconds()).min(self.available_km_s)
    }

    fn maneuver_duration(&self, dv_km_s: f64, configured: Duration) -> Duration {
        let computed = Duration::from_seconds(dv_km_s.abs() / self.rate_km_s2);
        if configured > computed {
            configured
        } else {
            computed
        }
    }

    fn maneuver(
        &mut self,
        epoch: Epoch,
        commanded_km_s: Vector3<f64>,
        start: Epoch,
        duration: Duration,
    ) -> Result<Vector3<f64>, PropulsionError> {
        let end = start + duration;
        let basis = match self.last_update {
            Some(prev) if prev > start => prev,
            _ => start,
        };
        let achieved = if epoch >= end || duration.to_seconds() <= 0.0 {
            // Past the burn window: deliver whatever remains
            commanded_km_s
        } else {
            let elapsed_s = (epoch - basis).to_seconds().max(0.0);
            let window_s = (end - basis).to_seconds();
            commanded_km_s * (elapsed_s / window_s).clamp(0.0, 1.0)
        };
        reduce_budget(&mut self.available_km_s, achieved.norm())?;
        self.last_update = Some(epoch);
        Ok(achieved)
    }

    fn perform_staging(&mut self) -> Result<(), PropulsionError> {
        if self.stages.is_empty() {
            return Err(PropulsionError::StagingUnsupported);
        }
        let stage = self.stages.remove(0);
        info!(
            "staging: budget {:.6} -> {:.6} km/s, rate {:.6} -> {:.6} km/s^2",
            self.available_km_s, stage.delta_v_km_s, self.rate_km_s2, stage.rate_km_s2
        );
        self.available_km_s = stage.delta_v_km_s;
        self.rate_km_s2 = stage.rate_km_s2;
        self.last_update = None;
        Ok(())
    }
}
