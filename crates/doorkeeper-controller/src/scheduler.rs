//! Cooperative scheduler.
//!
//! One call to [`Scheduler::tick`] runs, in strict order:
//!
//! 1. poll every limit switch,
//! 2. run the [`SafetySupervisor`] over every door,
//! 3. drain at most one buffered line per connection and dispatch it,
//! 4. hand the encoded replies to the outbox.
//!
//! Nothing in a tick waits on external state. Network input reaches the
//! scheduler through a [`CommandInbox`] that only returns lines already
//! complete, and replies leave through a [`ReplyOutbox`] that only queues.
//! Because step 2 precedes step 3, a command is never accepted against a
//! motion that expired in the same tick.

use std::collections::HashSet;
use std::fmt;
use std::time::Instant;

use doorkeeper_core::{ControllerState, Error, Result};
use doorkeeper_hardware::{Actuator, LimitSwitch};
use doorkeeper_protocol::{Line, ReplyEncoder, ReplyFormat};
use tracing::{error, info, trace};

use crate::dispatcher::{Dispatcher, controller_state};
use crate::door::{Door, StateTransition};
use crate::supervisor::SafetySupervisor;

/// Identifies one client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A complete line received on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub connection: ConnectionId,
    pub line: Line,
}

/// An encoded reply for a connection, without line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub connection: ConnectionId,
    pub line: String,
}

/// Source of buffered command lines.
pub trait CommandInbox {
    /// Take the lines to process this tick, at most one per connection.
    ///
    /// Must return immediately with whatever is already buffered.
    fn drain(&mut self) -> Vec<Inbound>;
}

/// Sink for replies.
pub trait ReplyOutbox {
    /// Queue a reply. Must not block.
    fn deliver(&mut self, reply: Outbound);
}

/// In-memory inbox holding pre-decoded lines.
///
/// Hands out the oldest pending line of each connection per drain, keeping
/// the per-connection order.
impl CommandInbox for Vec<Inbound> {
    fn drain(&mut self) -> Vec<Inbound> {
        let mut seen = HashSet::new();
        let mut taken = Vec::new();
        let mut kept = Vec::new();
        for inbound in std::mem::take(self) {
            if seen.insert(inbound.connection) {
                taken.push(inbound);
            } else {
                kept.push(inbound);
            }
        }
        *self = kept;
        taken
    }
}

impl ReplyOutbox for Vec<Outbound> {
    fn deliver(&mut self, reply: Outbound) {
        self.push(reply);
    }
}

/// What one tick did.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Transitions from limit switches and the supervisor.
    pub transitions: Vec<StateTransition>,
    /// Number of lines dispatched.
    pub commands: usize,
}

/// Owns every door and runs the tick sequence.
#[derive(Debug)]
pub struct Scheduler<A, L> {
    doors: Vec<Door<A, L>>,
    supervisor: SafetySupervisor,
    dispatcher: Dispatcher,
    format: ReplyFormat,
    ticks: u64,
}

impl<A: Actuator, L: LimitSwitch> Scheduler<A, L> {
    /// Take ownership of the doors and assert their boot outputs.
    ///
    /// Doors are assumed to rest `CLOSED` at boot; the limit switch is not
    /// consulted and no homing motion is made.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no door is given and
    /// [`Error::DuplicateDoor`] if two doors share an id.
    pub fn new(mut doors: Vec<Door<A, L>>, format: ReplyFormat, now: Instant) -> Result<Self> {
        if doors.is_empty() {
            return Err(Error::Config("at least one door is required".to_string()));
        }
        let mut ids = HashSet::new();
        for door in &doors {
            if !ids.insert(door.id().clone()) {
                return Err(Error::DuplicateDoor(door.id().to_string()));
            }
        }

        for door in &mut doors {
            door.sync_output(now);
            let timing = door.timing();
            info!(
                door = %door.id(),
                state = %door.state(),
                open_limit_ms = timing.open_limit.as_millis() as u64,
                close_duration_ms = timing.close_duration.as_millis() as u64,
                "door ready"
            );
        }

        Ok(Self {
            doors,
            supervisor: SafetySupervisor::new(),
            dispatcher: Dispatcher::new(),
            format,
            ticks: 0,
        })
    }

    pub fn doors(&self) -> &[Door<A, L>] {
        &self.doors
    }

    pub fn door(&self, id: &str) -> Option<&Door<A, L>> {
        self.doors.iter().find(|door| door.id().as_str() == id)
    }

    pub fn controller_state(&self) -> ControllerState {
        controller_state(&self.doors)
    }

    pub fn format(&self) -> ReplyFormat {
        self.format
    }

    /// Number of ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run one tick at time `now`.
    pub fn tick(
        &mut self,
        now: Instant,
        inbox: &mut impl CommandInbox,
        outbox: &mut impl ReplyOutbox,
    ) -> TickReport {
        self.ticks += 1;
        let mut report = TickReport::default();

        // 1. limit switches
        for door in &mut self.doors {
            report.transitions.extend(door.poll_limit_switch(now));
        }

        // 2. safety timeouts
        report
            .transitions
            .extend(self.supervisor.run(&mut self.doors, now));

        // 3. commands
        let mut replies = Vec::new();
        for inbound in inbox.drain() {
            let reply = self.dispatcher.handle(&mut self.doors, &inbound.line, now);
            trace!(connection = %inbound.connection, status = %reply.status, "command handled");
            replies.push(Outbound {
                connection: inbound.connection,
                line: self.format.encode(&reply),
            });
        }
        report.commands = replies.len();

        // 4. replies
        for reply in replies {
            outbox.deliver(reply);
        }

        report
    }

    /// De-energize every actuator. Door states are left as they are.
    pub fn shutdown(&mut self) {
        for door in &mut self.doors {
            match door.de_energize() {
                Ok(()) => info!(door = %door.id(), state = %door.state(), "motor de-energized"),
                Err(err) => error!(door = %door.id(), error = %err, "could not de-energize motor"),
            }
        }
    }
}
