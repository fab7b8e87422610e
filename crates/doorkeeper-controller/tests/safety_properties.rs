//! Tick-level safety properties of the controller.
//!
//! Every test drives the scheduler with a manual clock in 10 ms ticks and
//! checks the state and motor outputs after each tick.

mod common;

use std::time::Duration;

use common::{Rig, TICK};
use doorkeeper_controller::Clock;
use doorkeeper_core::{ControllerState, DoorState, MotorCommand, TransitionCause};
use doorkeeper_hardware::mock::SimulatedMechanism;
use doorkeeper_protocol::StatusCode;

fn assert_outputs_match_state(rig: &Rig) {
    for (door, handles) in rig.scheduler.doors().iter().zip(&rig.handles) {
        assert_eq!(
            handles.motor(),
            door.state().motor_command(),
            "door {} in {}",
            door.id(),
            door.state()
        );
        assert_eq!(door.motion_started_at().is_some(), door.state().is_moving());
    }
}

#[test]
fn test_reference_scenario_ends_in_fault() {
    let mut rig = Rig::reference();
    let start = rig.clock.now();

    let reply = rig.command("Open A");
    assert_eq!(reply.status, StatusCode::Accepted);
    assert_eq!(rig.state("A"), DoorState::Opening);

    let mut failsafe_at = None;
    let mut fault_at = None;
    while rig.elapsed_since(start) < Duration::from_millis(60_000) {
        rig.step();
        assert_outputs_match_state(&rig);

        let state = rig.state("A");
        assert!(!matches!(state, DoorState::Open | DoorState::Closed), "reached {state}");
        if state == DoorState::FailsafeClosing && failsafe_at.is_none() {
            failsafe_at = Some(rig.elapsed_since(start));
        }
        if state == DoorState::Fault && fault_at.is_none() {
            fault_at = Some(rig.elapsed_since(start));
        }
    }

    assert_eq!(failsafe_at, Some(Duration::from_millis(26_500)));
    assert_eq!(fault_at, Some(Duration::from_millis(55_500)));

    let status = rig.command("Status");
    assert_eq!(status.controller, ControllerState::Error);
    assert_eq!(status.doors[0].state, DoorState::Fault);

    let reply = rig.command("Open A");
    assert_eq!(reply.status, StatusCode::Rejected);
    assert_eq!(reply.doors[0].state, DoorState::Fault);
    assert_eq!(rig.state("A"), DoorState::Fault);
}

#[test]
fn test_timeout_history_records_causes() {
    let mut rig = Rig::reference();
    rig.command("Open A");
    for _ in 0..6_000 {
        rig.step();
    }

    let causes: Vec<_> = rig
        .scheduler
        .door("A")
        .unwrap()
        .history()
        .iter()
        .map(|t| (t.to, t.cause))
        .collect();
    assert_eq!(
        causes,
        vec![
            (DoorState::Opening, TransitionCause::Command),
            (DoorState::FailsafeClosing, TransitionCause::Timeout),
            (DoorState::Fault, TransitionCause::Timeout),
        ]
    );
}

#[test]
fn test_open_confirmed_only_by_switch() {
    let mut rig = Rig::reference();
    let start = rig.clock.now();
    rig.command("Open A");

    let switch_at = Duration::from_millis(12_340);
    while rig.elapsed_since(start) < switch_at {
        rig.step();
        assert_eq!(rig.state("A"), DoorState::Opening);
    }

    rig.handles[0].limit.set_high(true);
    let report = rig.tick_with(&[]);
    assert_eq!(report.transitions.len(), 1);
    assert_eq!(report.transitions[0].cause, TransitionCause::LimitSwitch);
    assert_eq!(rig.state("A"), DoorState::Open);
    assert_outputs_match_state(&rig);
}

#[test]
fn test_close_completes_on_elapsed_time() {
    let mut rig = Rig::new(&[("A", 1_000, 2_000)]);
    rig.command("Open A");
    rig.handles[0].limit.set_high(true);
    rig.step();
    assert_eq!(rig.state("A"), DoorState::Open);

    rig.handles[0].limit.set_high(false);
    assert_eq!(rig.command("Close A").status, StatusCode::Accepted);

    for _ in 0..199 {
        rig.step();
        assert_eq!(rig.state("A"), DoorState::Closing);
    }
    rig.step();
    assert_eq!(rig.state("A"), DoorState::Closed);
    assert_outputs_match_state(&rig);
}

#[test]
fn test_rejections_leave_state_unchanged() {
    let mut rig = Rig::new(&[("A", 1_000, 2_000)]);

    let reply = rig.command("Close A");
    assert_eq!(reply.status, StatusCode::Rejected);
    assert_eq!(rig.state("A"), DoorState::Closed);

    rig.command("Open A");
    rig.handles[0].limit.set_high(true);
    rig.step();

    let first = rig.command("Open A");
    for _ in 0..5 {
        let again = rig.command("Open A");
        assert_eq!(again.status, StatusCode::Rejected);
        assert_eq!(again.status, first.status);
        assert_eq!(rig.state("A"), DoorState::Open);
    }
}

#[test]
fn test_fault_is_isolated_to_one_door() {
    let mut rig = Rig::new(&[("A", 100, 200), ("B", 1_000, 2_000)]);
    rig.command("Open A");
    for _ in 0..30 {
        rig.step();
    }
    assert_eq!(rig.state("A"), DoorState::Fault);

    assert_eq!(rig.command("Open B").status, StatusCode::Accepted);
    rig.handles[1].limit.set_high(true);
    rig.step();
    assert_eq!(rig.state("B"), DoorState::Open);
    assert_eq!(rig.scheduler.controller_state(), ControllerState::Error);
}

#[test]
fn test_actuator_failure_is_reported_and_isolated() {
    let mut rig = Rig::new(&[("A", 1_000, 2_000), ("B", 1_000, 2_000)]);
    rig.handles[0].in1.fail_writes(true);

    let reply = rig.command("Open A");
    assert_eq!(reply.status, StatusCode::Rejected);
    assert_eq!(rig.state("A"), DoorState::Fault);
    assert_eq!(rig.handles[0].motor(), MotorCommand::Off);

    assert_eq!(rig.command("Open B").status, StatusCode::Accepted);
}

#[test]
fn test_commands_from_many_connections_in_one_tick() {
    let mut rig = Rig::new(&[("A", 1_000, 2_000), ("B", 1_000, 2_000)]);
    let report = rig.tick_with(&["Open A", "Open B", "Status", "Open A"]);

    assert_eq!(report.commands, 4);
    let statuses: Vec<_> = rig.replies.iter().map(|r| r.line.clone()).collect();
    assert!(statuses[0].contains("Status: accepted"));
    assert!(statuses[1].contains("Status: accepted"));
    assert!(statuses[2].contains("A: OPENING; B: OPENING"));
    assert!(statuses[3].contains("Status: rejected"));
}

#[test]
fn test_simulated_mechanism_full_cycle() {
    let mut rig = Rig::new(&[("A", 1_000, 900)]);
    let start = rig.clock.now();
    let mut mechanism = SimulatedMechanism::new(
        rig.handles[0].clone(),
        Duration::from_millis(800),
        true,
        start,
    );

    rig.command("Open A");
    while rig.state("A") == DoorState::Opening {
        rig.clock.advance(TICK);
        mechanism.update(rig.clock.now());
        rig.tick_with(&[]);
    }
    assert_eq!(rig.state("A"), DoorState::Open);
    assert!(mechanism.is_fully_open());

    rig.command("Close A");
    while rig.state("A") == DoorState::Closing {
        rig.clock.advance(TICK);
        mechanism.update(rig.clock.now());
        rig.tick_with(&[]);
    }
    assert_eq!(rig.state("A"), DoorState::Closed);
    assert!(mechanism.position().is_zero());
}

#[test]
fn test_jammed_mechanism_fails_safe() {
    let mut rig = Rig::new(&[("A", 500, 600)]);
    let mut mechanism = SimulatedMechanism::new(
        rig.handles[0].clone(),
        Duration::from_millis(400),
        true,
        rig.clock.now(),
    );
    mechanism.set_jammed(true);

    rig.command("Open A");
    for _ in 0..150 {
        rig.clock.advance(TICK);
        mechanism.update(rig.clock.now());
        rig.tick_with(&[]);
        assert_outputs_match_state(&rig);
    }
    assert_eq!(rig.state("A"), DoorState::Fault);
}
