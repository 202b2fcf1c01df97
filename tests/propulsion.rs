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

//! Delta-v budget accounting across mission events.

use approx::assert_abs_diff_eq;
use orbital_maneuvers::prelude::*;
use orbital_maneuvers::time::{Duration, Epoch};
use orbital_maneuvers::{MissionError, PropulsionError};
use rstest::rstest;

fn epoch() -> Epoch {
    Epoch::from_gregorian_utc_at_midnight(2026, 3, 1)
}

fn leo() -> Orbit {
    Orbit::keplerian(
        7_000.0,
        0.0,
        0.4,
        0.0,
        0.0,
        0.0,
        epoch(),
        CentralBody::earth(),
    )
}

#[test]
fn insufficient_budget_fails_initialization_without_side_effects() {
    let mut ctx = StandaloneContext::new(leo(), Box::new(ImpulsiveModel::new(0.01)));
    let mut burn = Maneuver::new(
        "too-big",
        TriggerCondition::None,
        DeltaVLaw::Tangent {
            magnitude: MagnitudeSpec::DeltaV(0.05),
        },
    )
    .unwrap();
    let err = burn.initialize(epoch(), &mut ctx).unwrap_err();
    assert!(matches!(
        err,
        MissionError::Propulsion {
            source: PropulsionError::InsufficientDeltaV { .. }
        }
    ));
    assert_eq!(burn.core.state(), EventState::Unconfigured);
    assert_abs_diff_eq!(ctx.available_delta_v_km_s(), 0.01, epsilon = 0.0);
}

#[rstest]
#[case::impulsive(Box::new(ImpulsiveModel::new(0.5)) as Box<dyn PropulsionModel>)]
#[case::constant_rate(
    Box::new(ConstantRateModel::new(0.5, 1e-3).unwrap()) as Box<dyn PropulsionModel>
)]
fn budget_decrements_match_expended_delta_v(#[case] model: Box<dyn PropulsionModel>) {
    let mut ctx = StandaloneContext::new(leo(), model);
    let mut burn = Maneuver::new(
        "spend",
        TriggerCondition::None,
        DeltaVLaw::Tangent {
            magnitude: MagnitudeSpec::DeltaV(0.2),
        },
    )
    .unwrap();
    burn.initialize(epoch(), &mut ctx).unwrap();

    let start = burn.core.start_epoch().unwrap();
    let end = start + burn.core.scheduled_duration();
    let mut now = start;
    loop {
        ctx.update(now).unwrap();
        if burn.execute(now, &mut ctx).unwrap() == ExecuteStatus::Complete {
            break;
        }
        now = (now + Duration::from_seconds(20.0)).min(end);
    }
    assert_abs_diff_eq!(burn.expended_delta_v_km_s(), 0.2, epsilon = 1e-9);
    assert_abs_diff_eq!(ctx.available_delta_v_km_s(), 0.3, epsilon = 1e-9);
}

#[test]
fn from_duration_magnitude_uses_the_delivery_rate() {
    let model = ConstantRateModel::new(1.0, 1e-3).unwrap();
    let mut ctx = StandaloneContext::new(leo(), Box::new(model));
    let mut burn = Maneuver::new(
        "timed",
        TriggerCondition::None,
        DeltaVLaw::Tangent {
            magnitude: MagnitudeSpec::FromDuration(Duration::from_seconds(50.0)),
        },
    )
    .unwrap();
    burn.initialize(epoch(), &mut ctx).unwrap();
    // 50 s at 1e-3 km/s^2
    assert_abs_diff_eq!(burn.required_delta_v_km_s(), 0.05, epsilon = 1e-12);
}

#[test]
fn minimum_duration_stretches_the_burn_window() {
    let model = ConstantRateModel::new(1.0, 1e-3).unwrap();
    let mut ctx = StandaloneContext::new(leo(), Box::new(model));
    let mut burn = Maneuver::new(
        "stretched",
        TriggerCondition::RelativeTime {
            offset: Duration::from_seconds(600.0),
        },
        DeltaVLaw::Tangent {
            magnitude: MagnitudeSpec::DeltaV(0.05),
        },
    )
    .unwrap()
    .finite(Duration::ZERO);
    burn.process_input(&EventCommand::SetMinimumDuration(Duration::from_seconds(
        300.0,
    )))
    .unwrap();
    burn.initialize(epoch(), &mut ctx).unwrap();

    // The rate needs only 50 s; the configured floor wins
    assert_abs_diff_eq!(
        burn.core.scheduled_duration().to_seconds(),
        300.0,
        epsilon = 1e-9
    );
    let start = burn.core.start_epoch().unwrap();
    let evaluation = burn.core.evaluation_epoch().unwrap();
    assert_abs_diff_eq!((evaluation - start).to_seconds(), 150.0, epsilon = 1e-9);
}

#[test]
fn staging_swaps_in_a_fresh_budget_and_rate() {
    let model = ConstantRateModel::with_stages(
        0.05,
        1e-3,
        vec![PropulsionStage {
            delta_v_km_s: 0.4,
            rate_km_s2: 5e-4,
        }],
    )
    .unwrap();
    let mut ctx = StandaloneContext::new(leo(), Box::new(model));
    assert_abs_diff_eq!(ctx.available_delta_v_km_s(), 0.05, epsilon = 0.0);

    ctx.perform_staging().unwrap();
    assert_abs_diff_eq!(ctx.available_delta_v_km_s(), 0.4, epsilon = 0.0);

    // A burn too large for the first stage is now feasible
    let mut burn = Maneuver::new(
        "second-stage",
        TriggerCondition::None,
        DeltaVLaw::Tangent {
            magnitude: MagnitudeSpec::DeltaV(0.2),
        },
    )
    .unwrap();
    burn.initialize(epoch(), &mut ctx).unwrap();
    assert_abs_diff_eq!(burn.required_delta_v_km_s(), 0.2, epsilon = 1e-12);

    // And the empty stage list refuses further staging
    assert!(ctx.perform_staging().is_err());
}

#[test]
fn impulsive_staging_is_unsupported() {
    let mut ctx = StandaloneContext::new(leo(), Box::new(ImpulsiveModel::new(1.0)));
    assert!(matches!(
        ctx.perform_staging().unwrap_err(),
        MissionError::Propulsion {
            source: PropulsionError::StagingUnsupported
        }
    ));
}

#[test]
fn remaining_delta_v_decreases_monotonically_through_a_finite_burn() {
    let model = ConstantRateModel::new(1.0, 1e-3).unwrap();
    let mut ctx = StandaloneContext::new(leo(), Box::new(model));
    let mut burn = Maneuver::new(
        "monotonic",
        TriggerCondition::RelativeTime {
            offset: Duration::from_seconds(300.0),
        },
        DeltaVLaw::Tangent {
            magnitude: MagnitudeSpec::DeltaV(0.1),
        },
    )
    .unwrap()
    .finite(Duration::ZERO);
    burn.initialize(epoch(), &mut ctx).unwrap();

    let start = burn.core.start_epoch().unwrap();
    let mut previous = burn.remaining_delta_v_km_s();
    assert_abs_diff_eq!(previous, 0.1, epsilon = 1e-12);
    for offset_s in [10.0, 40.0, 70.0, 100.0] {
        let now = start + Duration::from_seconds(offset_s);
        ctx.update(now).unwrap();
        burn.execute(now, &mut ctx).unwrap();
        let remaining = burn.remaining_delta_v_km_s();
        assert!(remaining <= previous + 1e-12);
        previous = remaining;
    }
    assert!(burn.core.is_complete());
    assert_abs_diff_eq!(previous, 0.0, epsilon = 1e-9);
}
