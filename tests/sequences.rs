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

//! Scheduling behavior: mission sequences, compound ordering, burn-window
//! causality, and condition-driven markers.

use approx::assert_abs_diff_eq;
use orbital_maneuvers::linalg::Vector3;
use orbital_maneuvers::prelude::*;
use orbital_maneuvers::time::{Duration, Epoch};
use orbital_maneuvers::{ConfigError, EventError, MissionError};

fn epoch() -> Epoch {
    Epoch::from_gregorian_utc_at_midnight(2026, 3, 1)
}

fn impulsive_ctx(state: Orbit, budget_km_s: f64) -> StandaloneContext {
    StandaloneContext::new(state, Box::new(ImpulsiveModel::new(budget_km_s)))
}

fn tangent(name: &str, condition: TriggerCondition, dv_km_s: f64) -> Maneuver {
    Maneuver::new(
        name,
        condition,
        DeltaVLaw::Tangent {
            magnitude: MagnitudeSpec::DeltaV(dv_km_s),
        },
    )
    .unwrap()
}

#[test]
fn sequence_schedules_each_successor_on_the_post_burn_trajectory() {
    let _ = pretty_env_logger::try_init();
    let orbit = Orbit::keplerian(
        7_000.0,
        0.0,
        0.4,
        0.0,
        0.0,
        0.0,
        epoch(),
        CentralBody::earth(),
    );
    let mut ctx = impulsive_ctx(orbit, 1.0);

    let raise = tangent(
        "raise",
        TriggerCondition::RelativeTime {
            offset: Duration::from_seconds(60.0),
        },
        0.1,
    );
    let circ = Maneuver::new(
        "circ-at-apoapsis",
        TriggerCondition::Apoapsis { orbit: 0 },
        DeltaVLaw::Circularize,
    )
    .unwrap();
    let mut seq = MissionSequence::new("raise-and-circularize")
        .with_event(raise)
        .with_event(circ);
    assert_eq!(seq.len(), 2);

    seq.initialize(epoch(), &mut ctx).unwrap();
    let t_raise = seq.core.start_epoch().unwrap();
    assert_abs_diff_eq!((t_raise - epoch()).to_seconds(), 60.0, epsilon = 1e-9);

    // First burn completes and the circularization is scheduled against the
    // newly elliptical trajectory
    ctx.update(t_raise).unwrap();
    assert_eq!(
        seq.execute(t_raise, &mut ctx).unwrap(),
        ExecuteStatus::InProgress
    );
    assert_eq!(seq.current_index(), 1);
    let intermediate = ctx.orbital_state();
    assert!(intermediate.ecc() > 0.01);
    let ra = intermediate.apoapsis_km();

    let t_circ = seq.events()[1].core().start_epoch().unwrap();
    assert!(t_circ > t_raise);
    ctx.update(t_circ).unwrap();
    assert_eq!(
        seq.execute(t_circ, &mut ctx).unwrap(),
        ExecuteStatus::Complete
    );
    assert!(seq.core.is_complete());

    let after = ctx.orbital_state();
    assert!(after.is_circular());
    assert_abs_diff_eq!(after.rmag_km(), ra, epsilon = 1e-2);
}

#[test]
fn empty_sequence_refuses_to_initialize() {
    let orbit = Orbit::keplerian(
        7_000.0,
        0.0,
        0.4,
        0.0,
        0.0,
        0.0,
        epoch(),
        CentralBody::earth(),
    );
    let mut ctx = impulsive_ctx(orbit, 1.0);
    let mut seq = MissionSequence::new("empty");
    assert!(matches!(
        seq.initialize(epoch(), &mut ctx).unwrap_err(),
        MissionError::Event {
            source: EventError::EmptySequence
        }
    ));
}

#[test]
fn execute_before_initialize_is_an_error() {
    let orbit = Orbit::keplerian(
        7_000.0,
        0.0,
        0.4,
        0.0,
        0.0,
        0.0,
        epoch(),
        CentralBody::earth(),
    );
    let mut ctx = impulsive_ctx(orbit, 1.0);
    let mut burn = tangent("not-ready", TriggerCondition::None, 0.01);
    assert!(matches!(
        burn.execute(epoch(), &mut ctx).unwrap_err(),
        MissionError::Event {
            source: EventError::NotInitialized
        }
    ));
}

#[test]
fn canceled_sequence_reports_complete_and_spends_nothing() {
    let orbit = Orbit::keplerian(
        7_000.0,
        0.0,
        0.4,
        0.0,
        0.0,
        0.0,
        epoch(),
        CentralBody::earth(),
    );
    let mut ctx = impulsive_ctx(orbit, 1.0);
    let mut seq = MissionSequence::new("abort").with_event(tangent(
        "later",
        TriggerCondition::RelativeTime {
            offset: Duration::from_seconds(600.0),
        },
        0.1,
    ));
    seq.initialize(epoch(), &mut ctx).unwrap();
    seq.cancel(epoch(), &mut ctx);

    let later = epoch() + Duration::from_seconds(700.0);
    ctx.update(later).unwrap();
    assert_eq!(
        seq.execute(later, &mut ctx).unwrap(),
        ExecuteStatus::Complete
    );
    assert_abs_diff_eq!(ctx.available_delta_v_km_s(), 1.0, epsilon = 0.0);
}

#[test]
fn compound_swaps_to_whichever_stage_resolves_first() {
    // Past periapsis: the apoapsis-conditioned stage resolves sooner even
    // though it is configured second
    let orbit = Orbit::keplerian(
        8_000.0,
        0.1,
        0.4,
        0.0,
        0.0,
        100.0_f64.to_radians(),
        epoch(),
        CentralBody::earth(),
    );
    let mut ctx = impulsive_ctx(orbit, 1.0);

    let at_periapsis = tangent("m-peri", TriggerCondition::Periapsis { orbit: 0 }, 0.01);
    let at_apoapsis = tangent("m-apo", TriggerCondition::Apoapsis { orbit: 0 }, 0.01);
    let mut compound = Compound::new("pair", at_periapsis, at_apoapsis);
    compound.initialize(epoch(), &mut ctx).unwrap();
    assert!(compound.is_swapped());

    // Step through both stages
    let mut now = compound.core.start_epoch().unwrap();
    let mut status = ExecuteStatus::Pending;
    for _ in 0..400 {
        ctx.update(now).unwrap();
        status = compound.execute(now, &mut ctx).unwrap();
        if status == ExecuteStatus::Complete {
            break;
        }
        now += Duration::from_seconds(60.0);
    }
    assert_eq!(status, ExecuteStatus::Complete);
    assert_abs_diff_eq!(ctx.available_delta_v_km_s(), 1.0 - 0.02, epsilon = 1e-9);
}

#[test]
fn compound_refuses_stage_internal_commands() {
    let first = tangent("a", TriggerCondition::Periapsis { orbit: 0 }, 0.01);
    let second = tangent("b", TriggerCondition::Apoapsis { orbit: 0 }, 0.01);
    let mut compound = Compound::new("pair", first, second);

    let err = compound
        .process_input(&EventCommand::SetDeltaV {
            vector_km_s: Vector3::new(0.1, 0.0, 0.0),
            frame: ManeuverFrame::Ric,
        })
        .unwrap_err();
    assert!(matches!(err, ConfigError::LockedByComposite { .. }));

    // Shared scheduling knobs still pass through
    assert!(compound
        .process_input(&EventCommand::SetUpdateInterval(Duration::from_seconds(
            10.0
        )))
        .unwrap());
}

#[test]
fn non_causal_periodic_burn_is_postponed_a_whole_orbit() {
    // Just before periapsis: a 500 s burn window centered there would have to
    // begin in the past
    let orbit = Orbit::keplerian(
        8_000.0,
        0.1,
        0.4,
        0.0,
        0.0,
        355.0_f64.to_radians(),
        epoch(),
        CentralBody::earth(),
    );
    let model = ConstantRateModel::new(1.0, 1e-4).unwrap();
    let mut ctx = StandaloneContext::new(orbit, Box::new(model));

    let mut burn = Maneuver::new(
        "finite-at-periapsis",
        TriggerCondition::Periapsis { orbit: 0 },
        DeltaVLaw::Tangent {
            magnitude: MagnitudeSpec::DeltaV(0.05),
        },
    )
    .unwrap()
    .finite(Duration::ZERO);
    burn.initialize(epoch(), &mut ctx).unwrap();

    let start = burn.core.start_epoch().unwrap();
    let evaluation = burn.core.evaluation_epoch().unwrap();
    assert!(start >= epoch());
    let expected = orbit.time_to_periapsis(1).unwrap();
    assert_abs_diff_eq!(
        (evaluation - epoch()).to_seconds(),
        expected.to_seconds(),
        epsilon = 1e-3
    );
}

#[test]
fn non_causal_one_shot_burn_clamps_to_the_initializing_epoch() {
    let orbit = Orbit::keplerian(
        7_000.0,
        0.0,
        0.4,
        0.0,
        0.0,
        0.0,
        epoch(),
        CentralBody::earth(),
    );
    let model = ConstantRateModel::new(1.0, 1e-4).unwrap();
    let mut ctx = StandaloneContext::new(orbit, Box::new(model));

    let mut burn = Maneuver::new(
        "clamped",
        TriggerCondition::RelativeTime {
            offset: Duration::from_seconds(100.0),
        },
        DeltaVLaw::Tangent {
            magnitude: MagnitudeSpec::DeltaV(0.05),
        },
    )
    .unwrap()
    .finite(Duration::ZERO);
    burn.initialize(epoch(), &mut ctx).unwrap();

    // The 500 s window cannot be centered 100 s out; the start clamps to now
    assert_eq!(burn.core.start_epoch().unwrap(), epoch());
    assert_abs_diff_eq!(
        (burn.core.evaluation_epoch().unwrap() - epoch()).to_seconds(),
        100.0,
        epsilon = 1e-9
    );
    assert_abs_diff_eq!(
        burn.core.scheduled_duration().to_seconds(),
        500.0,
        epsilon = 1e-9
    );
}

#[test]
fn marker_waits_for_eclipse_entry() {
    let body = CentralBody::earth();
    let orbit = Orbit::keplerian(7_000.0, 0.0, 0.0, 0.0, 0.0, 0.5, epoch(), body);
    let mut ctx =
        impulsive_ctx(orbit, 1.0).with_sun_direction(Vector3::new(1.0, 0.0, 0.0));

    let mut marker = Marker::new("shadow", TriggerCondition::EclipseEntry { orbit: 0 });
    marker.initialize(epoch(), &mut ctx).unwrap();
    let start = marker.core.start_epoch().unwrap();
    let period = orbit.period().unwrap();
    assert!(start > epoch());
    assert!(start < epoch() + period);

    ctx.update(start).unwrap();
    assert_eq!(
        marker.execute(start, &mut ctx).unwrap(),
        ExecuteStatus::Complete
    );
    // The entry point sits on the anti-sun side
    assert!(ctx.orbital_state().x_km < 0.0);
}

#[test]
fn eclipse_conditions_require_a_sun_ephemeris() {
    let orbit = Orbit::keplerian(
        7_000.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.5,
        epoch(),
        CentralBody::earth(),
    );
    let mut ctx = impulsive_ctx(orbit, 1.0);
    let mut marker = Marker::new("no-sun", TriggerCondition::EclipseExit { orbit: 0 });
    assert!(matches!(
        marker.initialize(epoch(), &mut ctx).unwrap_err(),
        MissionError::Event {
            source: EventError::NoSunEphemeris
        }
    ));
}

#[test]
fn mission_event_enum_dispatches_a_nested_sequence() {
    let orbit = Orbit::keplerian(
        7_000.0,
        0.0,
        0.4,
        0.0,
        0.0,
        0.0,
        epoch(),
        CentralBody::earth(),
    );
    let mut ctx = impulsive_ctx(orbit, 1.0);

    let inner = MissionSequence::new("inner").with_event(tangent(
        "kick",
        TriggerCondition::None,
        0.01,
    ));
    let mut event: MissionEvent = MissionSequence::new("outer")
        .with_event(inner)
        .with_event(Marker::new(
            "after",
            TriggerCondition::RelativeTime {
                offset: Duration::from_seconds(120.0),
            },
        ))
        .into();

    event.initialize(epoch(), &mut ctx).unwrap();
    assert_eq!(
        event.execute(epoch(), &mut ctx).unwrap(),
        ExecuteStatus::InProgress
    );
    let t_marker = epoch() + Duration::from_seconds(120.0);
    ctx.update(t_marker).unwrap();
    assert_eq!(
        event.execute(t_marker, &mut ctx).unwrap(),
        ExecuteStatus::Complete
    );
    assert!(event.is_complete());
    assert_abs_diff_eq!(ctx.available_delta_v_km_s(), 0.99, epsilon = 1e-12);
}
