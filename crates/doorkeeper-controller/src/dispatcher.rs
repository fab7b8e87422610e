//! Command dispatcher.
//!
//! Maps one inbound line to at most one state machine call and builds the
//! reply. It never retries, queues or waits for a motion to finish: an
//! accepted `Open` is answered with `OPENING`, not `OPEN`.
//!
//! | Input | Status code | Doors in reply |
//! |-------|-------------|----------------|
//! | unknown verb, bad arity, overlong line | `invalid_command` | none |
//! | door id not configured | `unknown_target` | none |
//! | precondition not met | `rejected` | all |
//! | transition performed | `accepted` | all |
//! | `Status` / `Status <id>` | `ok` | all / the one door |

use std::time::Instant;

use doorkeeper_core::{ControllerState, DoorId};
use doorkeeper_hardware::{Actuator, LimitSwitch};
use doorkeeper_protocol::{Command, Line, ProtocolError, Reply, StatusCode};
use tracing::debug;

use crate::door::Door;

#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher;

impl Dispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Handle one decoded line.
    pub fn handle<A: Actuator, L: LimitSwitch>(
        &self,
        doors: &mut [Door<A, L>],
        line: &Line,
        now: Instant,
    ) -> Reply {
        match line {
            Line::Text(text) => self.dispatch(doors, text, now),
            Line::Overlong { length } => {
                debug!(length, "overlong line discarded");
                error_reply(doors, StatusCode::InvalidCommand, "line too long")
            }
        }
    }

    /// Parse and execute one command line.
    pub fn dispatch<A: Actuator, L: LimitSwitch>(
        &self,
        doors: &mut [Door<A, L>],
        line: &str,
        now: Instant,
    ) -> Reply {
        match Command::parse(line) {
            Ok(command) => self.execute(doors, command, now),
            Err(ProtocolError::UnknownTarget(target)) => unknown_target(doors, &target),
            Err(err) => {
                debug!(error = %err, "command not found");
                error_reply(doors, StatusCode::InvalidCommand, "command not found")
            }
        }
    }

    /// Execute an already parsed command.
    pub fn execute<A: Actuator, L: LimitSwitch>(
        &self,
        doors: &mut [Door<A, L>],
        command: Command,
        now: Instant,
    ) -> Reply {
        let (status, reason) = match &command {
            Command::Status(None) => (StatusCode::Ok, "status".to_string()),
            Command::Status(Some(id)) => {
                let Some(door) = find(doors, id) else {
                    return unknown_target(doors, id.as_str());
                };
                let snapshot = vec![door.snapshot()];
                return Reply::new(
                    StatusCode::Ok,
                    format!("status of {id}"),
                    controller_state(doors),
                    snapshot,
                );
            }
            Command::Open(id) | Command::Close(id) => {
                let Some(door) = find_mut(doors, id) else {
                    return unknown_target(doors, id.as_str());
                };
                let result = if matches!(command, Command::Open(_)) {
                    door.request_open(now).map(|_| format!("opening {id}"))
                } else {
                    door.request_close(now).map(|_| format!("closing {id}"))
                };
                match result {
                    Ok(reason) => (StatusCode::Accepted, reason),
                    Err(rejection) => {
                        debug!(door = %id, command = %command, reason = %rejection, "command rejected");
                        (StatusCode::Rejected, rejection.reason)
                    }
                }
            }
        };

        Reply::new(
            status,
            reason,
            controller_state(doors),
            doors.iter().map(Door::snapshot).collect(),
        )
    }
}

/// Aggregate state over all doors.
pub fn controller_state<A: Actuator, L: LimitSwitch>(doors: &[Door<A, L>]) -> ControllerState {
    ControllerState::aggregate(doors.iter().map(Door::state))
}

fn find<'a, A: Actuator, L: LimitSwitch>(doors: &'a [Door<A, L>], id: &DoorId) -> Option<&'a Door<A, L>> {
    doors.iter().find(|door| door.id() == id)
}

fn find_mut<'a, A: Actuator, L: LimitSwitch>(
    doors: &'a mut [Door<A, L>],
    id: &DoorId,
) -> Option<&'a mut Door<A, L>> {
    doors.iter_mut().find(|door| door.id() == id)
}

fn unknown_target<A: Actuator, L: LimitSwitch>(doors: &[Door<A, L>], target: &str) -> Reply {
    error_reply(doors, StatusCode::UnknownTarget, format!("unknown door {target}"))
}

fn error_reply<A: Actuator, L: LimitSwitch>(
    doors: &[Door<A, L>],
    status: StatusCode,
    reason: impl Into<String>,
) -> Reply {
    Reply::new(status, reason, controller_state(doors), Vec::new())
}
