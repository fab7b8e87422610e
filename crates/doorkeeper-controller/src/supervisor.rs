//! Safety supervisor.
//!
//! Runs once per tick, before any command is processed, and resolves every
//! motion whose timer has run out:
//!
//! | State | Limit | Forced transition |
//! |-------|-------|-------------------|
//! | OPENING | `open_limit` | FAILSAFE_CLOSING (timer restarts) |
//! | CLOSING | `close_duration` | CLOSED |
//! | FAILSAFE_CLOSING | `close_duration` | FAULT |
//!
//! The failsafe reversal is unconditional. It is never skipped, delayed or
//! rate limited, and it does not look at pending commands.

use std::time::Instant;

use doorkeeper_core::{DoorState, TransitionCause};
use doorkeeper_hardware::{Actuator, LimitSwitch};

use crate::door::{Door, StateTransition};

#[derive(Debug, Clone, Copy, Default)]
pub struct SafetySupervisor;

impl SafetySupervisor {
    pub fn new() -> Self {
        Self
    }

    /// Check one door and apply the forced transition, if due.
    pub fn check<A: Actuator, L: LimitSwitch>(
        &self,
        door: &mut Door<A, L>,
        now: Instant,
    ) -> Option<StateTransition> {
        let elapsed = door.elapsed(now)?;
        let timing = door.timing();

        let target = match door.state() {
            DoorState::Opening if elapsed >= timing.open_limit => DoorState::FailsafeClosing,
            DoorState::Closing if elapsed >= timing.close_duration => DoorState::Closed,
            DoorState::FailsafeClosing if elapsed >= timing.close_duration => DoorState::Fault,
            _ => return None,
        };
        Some(door.transition(target, TransitionCause::Timeout, now))
    }

    /// Check every door. One door's outcome never affects another's.
    pub fn run<A: Actuator, L: LimitSwitch>(
        &self,
        doors: &mut [Door<A, L>],
        now: Instant,
    ) -> Vec<StateTransition> {
        doors
            .iter_mut()
            .filter_map(|door| self.check(door, now))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorkeeper_core::{DoorId, DoorTiming, MotorCommand};
    use doorkeeper_hardware::mock::{MockInputPin, MockOutputPin};
    use doorkeeper_hardware::{HBridgeActuator, PinLimitSwitch};
    use rstest::rstest;
    use std::time::Duration;

    type TestDoor = Door<HBridgeActuator<MockOutputPin>, PinLimitSwitch<MockInputPin>>;

    fn door(id: &str, state: DoorState, t0: Instant) -> TestDoor {
        let id = DoorId::new(id).unwrap();
        let (in1, _) = MockOutputPin::new("in1");
        let (in2, _) = MockOutputPin::new("in2");
        let (limit, _) = MockInputPin::new("limit");
        Door::builder(
            id.clone(),
            HBridgeActuator::new(in1, in2, None),
            PinLimitSwitch::new(limit, true),
        )
        .with_timing(DoorTiming::from_millis(&id, 26_500, 29_000).unwrap())
        .with_initial_state(state)
        .build(t0)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[rstest]
    #[case(DoorState::Opening, 26_499, None)]
    #[case(DoorState::Opening, 26_500, Some(DoorState::FailsafeClosing))]
    #[case(DoorState::Closing, 28_999, None)]
    #[case(DoorState::Closing, 29_000, Some(DoorState::Closed))]
    #[case(DoorState::FailsafeClosing, 29_000, Some(DoorState::Fault))]
    #[case(DoorState::Closed, 100_000, None)]
    #[case(DoorState::Open, 100_000, None)]
    #[case(DoorState::Fault, 100_000, None)]
    fn test_timeout_rules(
        #[case] state: DoorState,
        #[case] elapsed_ms: u64,
        #[case] expected: Option<DoorState>,
    ) {
        let t0 = Instant::now();
        let mut door = door("A", state, t0);
        let transition = SafetySupervisor::new().check(&mut door, t0 + ms(elapsed_ms));

        assert_eq!(transition.as_ref().map(|t| t.to), expected);
        if let Some(t) = transition {
            assert_eq!(t.cause, TransitionCause::Timeout);
        }
    }

    #[test]
    fn test_failsafe_restarts_timer_and_reverses_motor() {
        let t0 = Instant::now();
        let mut door = door("A", DoorState::Closed, t0);
        door.request_open(t0).unwrap();

        SafetySupervisor::new().check(&mut door, t0 + ms(26_500)).unwrap();
        assert_eq!(door.state(), DoorState::FailsafeClosing);
        assert_eq!(door.motion_started_at(), Some(t0 + ms(26_500)));
        assert_eq!(door.motor(), MotorCommand::Retract);
    }

    #[test]
    fn test_run_is_independent_per_door() {
        let t0 = Instant::now();
        let mut doors = vec![
            door("A", DoorState::FailsafeClosing, t0),
            door("B", DoorState::Closing, t0 + ms(10_000)),
            door("C", DoorState::Open, t0),
        ];

        let transitions = SafetySupervisor::new().run(&mut doors, t0 + ms(29_000));
        assert_eq!(transitions.len(), 1);
        assert_eq!(doors[0].state(), DoorState::Fault);
        assert_eq!(doors[1].state(), DoorState::Closing);
        assert_eq!(doors[2].state(), DoorState::Open);
    }
}
