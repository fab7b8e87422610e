//! Door state machine.
//!
//! One [`Door`] owns the state, motion timer and hardware of a single
//! mechanism. All mutation goes through [`Door::transition`], which drives
//! the actuator first and only then commits the new state, so the motor
//! output is always the one [`DoorState::motor_command`] prescribes.
//!
//! # States
//!
//! - `CLOSED`: at rest, motor off. Accepts `Open`.
//! - `OPENING`: motor extending, timer running. Completes on the limit switch.
//! - `OPEN`: at rest against the open stop. Accepts `Close`.
//! - `CLOSING`: motor retracting, timer running. Completes on elapsed time.
//! - `FAILSAFE_CLOSING`: emergency retract after an opening timeout.
//! - `FAULT`: motor off, position unverified. Terminal until restart.
//!
//! # Valid Transitions
//!
//! - CLOSED → OPENING (command)
//! - OPENING → OPEN (limit switch, before `open_limit`)
//! - OPENING → FAILSAFE_CLOSING (timeout)
//! - OPEN → CLOSING (command)
//! - CLOSING → CLOSED (timeout)
//! - FAILSAFE_CLOSING → FAULT (timeout)
//! - any → FAULT (actuator failure)
//!
//! Timeouts are enforced by the [`SafetySupervisor`](crate::SafetySupervisor);
//! the door only exposes the elapsed motion time.
//!
//! # Examples
//!
//! ```
//! use std::time::{Duration, Instant};
//! use doorkeeper_core::{DoorId, DoorState, DoorTiming};
//! use doorkeeper_controller::Door;
//! use doorkeeper_hardware::mock::{MockInputPin, MockOutputPin};
//! use doorkeeper_hardware::{HBridgeActuator, PinLimitSwitch};
//!
//! let (in1, _) = MockOutputPin::new("in1");
//! let (in2, _) = MockOutputPin::new("in2");
//! let (limit, limit_handle) = MockInputPin::new("limit");
//!
//! let start = Instant::now();
//! let mut door = Door::builder(
//!     DoorId::new("A").unwrap(),
//!     HBridgeActuator::new(in1, in2, None),
//!     PinLimitSwitch::new(limit, true),
//! )
//! .build(start);
//!
//! door.request_open(start).unwrap();
//! assert_eq!(door.state(), DoorState::Opening);
//!
//! limit_handle.set_high(true);
//! door.poll_limit_switch(start + Duration::from_secs(3));
//! assert_eq!(door.state(), DoorState::Open);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use doorkeeper_core::constants::MAX_HISTORY_SIZE;
use doorkeeper_core::{DoorId, DoorState, DoorTiming, MotorCommand, TransitionCause};
use doorkeeper_hardware::{Actuator, LimitSwitch};
use doorkeeper_protocol::DoorSnapshot;
use tracing::{error, info, warn};

/// A single recorded state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub door: DoorId,
    pub from: DoorState,
    pub to: DoorState,
    pub cause: TransitionCause,
    /// When the transition was committed.
    pub at: Instant,
}

/// Why a command was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Door state after the attempt.
    pub state: DoorState,
    pub reason: String,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// One motor-actuated mechanism with its limit switch.
#[derive(Debug)]
pub struct Door<A, L> {
    id: DoorId,
    timing: DoorTiming,
    state: DoorState,
    motion_started_at: Option<Instant>,
    limit_switch_value: bool,
    limit_read_failing: bool,
    actuator: A,
    limit: L,
    history: VecDeque<StateTransition>,
}

impl<A: Actuator, L: LimitSwitch> Door<A, L> {
    /// Create a builder for a door in its boot state (`CLOSED`, default timing).
    pub fn builder(id: DoorId, actuator: A, limit: L) -> DoorBuilder<A, L> {
        DoorBuilder {
            id,
            actuator,
            limit,
            timing: DoorTiming::default(),
            initial_state: DoorState::Closed,
        }
    }

    pub fn id(&self) -> &DoorId {
        &self.id
    }

    pub fn state(&self) -> DoorState {
        self.state
    }

    pub fn timing(&self) -> DoorTiming {
        self.timing
    }

    /// Start of the current motion, set exactly while the door is moving.
    pub fn motion_started_at(&self) -> Option<Instant> {
        self.motion_started_at
    }

    /// Time spent in the current motion, `None` when at rest.
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        self.motion_started_at
            .map(|started| now.saturating_duration_since(started))
    }

    /// Limit switch level seen by the last poll.
    pub fn limit_switch_value(&self) -> bool {
        self.limit_switch_value
    }

    /// Motor command last applied to the actuator.
    pub fn motor(&self) -> MotorCommand {
        self.actuator.current()
    }

    pub fn snapshot(&self) -> DoorSnapshot {
        DoorSnapshot::new(self.id.clone(), self.state)
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// The last `count` transitions, oldest first.
    pub fn last_transitions(&self, count: usize) -> Vec<StateTransition> {
        let skip = self.history.len().saturating_sub(count);
        self.history.iter().skip(skip).cloned().collect()
    }

    /// Handle an `Open` command.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] unless the door is `CLOSED`, or if the
    /// actuator could not be driven (the door is then in `FAULT`).
    pub fn request_open(&mut self, now: Instant) -> Result<StateTransition, Rejection> {
        self.request(DoorState::Closed, DoorState::Opening, "Open", now)
    }

    /// Handle a `Close` command.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] unless the door is `OPEN`, or if the
    /// actuator could not be driven (the door is then in `FAULT`).
    pub fn request_close(&mut self, now: Instant) -> Result<StateTransition, Rejection> {
        self.request(DoorState::Open, DoorState::Closing, "Close", now)
    }

    fn request(
        &mut self,
        required: DoorState,
        target: DoorState,
        verb: &str,
        now: Instant,
    ) -> Result<StateTransition, Rejection> {
        if self.state == DoorState::Fault {
            return Err(Rejection {
                state: self.state,
                reason: format!("door {} is in FAULT, restart required", self.id),
            });
        }
        if self.state != required {
            return Err(Rejection {
                state: self.state,
                reason: format!("door {} is {}, {verb} requires {required}", self.id, self.state),
            });
        }

        let transition = self.transition(target, TransitionCause::Command, now);
        if transition.to == target {
            Ok(transition)
        } else {
            Err(Rejection {
                state: self.state,
                reason: format!("door {} actuator failure, now {}", self.id, self.state),
            })
        }
    }

    /// Read the limit switch and complete an opening motion if it is reached.
    ///
    /// A read error counts as "not reached"; the opening ceiling then
    /// resolves the motion.
    pub fn poll_limit_switch(&mut self, now: Instant) -> Option<StateTransition> {
        let reached = match self.limit.is_reached() {
            Ok(reached) => {
                if self.limit_read_failing {
                    info!(door = %self.id, "limit switch readable again");
                    self.limit_read_failing = false;
                }
                reached
            }
            Err(err) => {
                if !self.limit_read_failing {
                    warn!(door = %self.id, error = %err, "limit switch read failed, treating as not reached");
                    self.limit_read_failing = true;
                }
                false
            }
        };
        self.observe_limit_switch(reached, now)
    }

    /// Apply a limit switch reading.
    ///
    /// Only meaningful while `OPENING` and only before the opening ceiling;
    /// at or past the ceiling the supervisor's failsafe wins.
    pub fn observe_limit_switch(&mut self, reached: bool, now: Instant) -> Option<StateTransition> {
        self.limit_switch_value = reached;
        if self.state != DoorState::Opening || !reached {
            return None;
        }
        let within_ceiling = self
            .elapsed(now)
            .is_some_and(|elapsed| elapsed < self.timing.open_limit);
        within_ceiling.then(|| self.transition(DoorState::Open, TransitionCause::LimitSwitch, now))
    }

    /// Force the door into `FAULT`. Returns `None` if it already is.
    pub fn force_fault(&mut self, cause: TransitionCause, now: Instant) -> Option<StateTransition> {
        (self.state != DoorState::Fault).then(|| self.transition(DoorState::Fault, cause, now))
    }

    /// Re-assert the motor output for the current state.
    ///
    /// Used at boot so the hardware matches the assumed `CLOSED` state.
    pub fn sync_output(&mut self, now: Instant) -> Option<StateTransition> {
        match self.actuator.drive(self.state.motor_command()) {
            Ok(()) => None,
            Err(err) => {
                error!(door = %self.id, error = %err, "could not assert motor output");
                self.fail(now)
            }
        }
    }

    /// De-energize the motor without changing state.
    pub fn de_energize(&mut self) -> doorkeeper_hardware::Result<()> {
        self.actuator.drive(MotorCommand::Off)
    }

    /// Drive the actuator for `to` and commit the transition.
    ///
    /// If the actuator write fails the motor is switched off on a best-effort
    /// basis and the door goes to `FAULT` instead. The returned record is the
    /// transition actually committed.
    pub(crate) fn transition(
        &mut self,
        to: DoorState,
        cause: TransitionCause,
        now: Instant,
    ) -> StateTransition {
        match self.actuator.drive(to.motor_command()) {
            Ok(()) => self.commit(to, cause, now),
            Err(err) => {
                error!(door = %self.id, target = %to, error = %err, "actuator write failed");
                self.fail(now).unwrap_or_else(|| self.record(self.state, self.state, cause, now))
            }
        }
    }

    fn fail(&mut self, now: Instant) -> Option<StateTransition> {
        if let Err(err) = self.actuator.drive(MotorCommand::Off) {
            error!(door = %self.id, error = %err, "could not de-energize motor");
        }
        (self.state != DoorState::Fault)
            .then(|| self.commit(DoorState::Fault, TransitionCause::HardwareFailure, now))
    }

    fn commit(&mut self, to: DoorState, cause: TransitionCause, now: Instant) -> StateTransition {
        let from = self.state;
        self.state = to;
        self.motion_started_at = to.is_moving().then_some(now);

        match to {
            DoorState::Fault => {
                error!(door = %self.id, %from, %to, %cause, "door entered FAULT, restart required");
            }
            DoorState::FailsafeClosing => {
                warn!(door = %self.id, %from, %to, %cause, "open limit exceeded, failsafe closing");
            }
            _ => info!(door = %self.id, %from, %to, %cause, "door state changed"),
        }

        let transition = self.record(from, to, cause, now);
        self.history.push_back(transition.clone());
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        transition
    }

    fn record(
        &self,
        from: DoorState,
        to: DoorState,
        cause: TransitionCause,
        at: Instant,
    ) -> StateTransition {
        StateTransition {
            door: self.id.clone(),
            from,
            to,
            cause,
            at,
        }
    }
}

/// Builder for [`Door`].
#[derive(Debug)]
pub struct DoorBuilder<A, L> {
    id: DoorId,
    actuator: A,
    limit: L,
    timing: DoorTiming,
    initial_state: DoorState,
}

impl<A: Actuator, L: LimitSwitch> DoorBuilder<A, L> {
    pub fn with_timing(mut self, timing: DoorTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Start in a state other than `CLOSED`.
    ///
    /// A moving initial state starts its timer at the `now` given to
    /// [`build`](Self::build). The actuator is not touched until
    /// [`Door::sync_output`] or the first transition.
    pub fn with_initial_state(mut self, state: DoorState) -> Self {
        self.initial_state = state;
        self
    }

    pub fn build(self, now: Instant) -> Door<A, L> {
        Door {
            id: self.id,
            timing: self.timing,
            state: self.initial_state,
            motion_started_at: self.initial_state.is_moving().then_some(now),
            limit_switch_value: false,
            limit_read_failing: false,
            actuator: self.actuator,
            limit: self.limit,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }
}
