//! Door controller core.
//!
//! This crate holds the per-door safety and motion state machine and the
//! cooperative scheduler that interleaves it with command handling and
//! limit switch polling.
//!
//! # Components
//!
//! - [`Door`]: state, motion timer and hardware of one mechanism.
//! - [`SafetySupervisor`]: forces transitions when motion timers expire.
//! - [`Dispatcher`]: turns command lines into state machine calls and replies.
//! - [`Scheduler`]: runs limit poll, supervisor, command drain and reply
//!   flush once per tick, in that order.
//! - [`Clock`]: where the service loop gets `now` from.
//!
//! Every operation takes an explicit `now` and returns immediately, which
//! keeps the core deterministic under test.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use doorkeeper_controller::{Clock, ConnectionId, Door, Inbound, ManualClock, Outbound, Scheduler};
//! use doorkeeper_core::{DoorId, DoorState};
//! use doorkeeper_hardware::mock::{MockInputPin, MockOutputPin};
//! use doorkeeper_hardware::{HBridgeActuator, PinLimitSwitch};
//! use doorkeeper_protocol::{Line, ReplyFormat};
//!
//! let clock = ManualClock::new();
//! let (in1, _) = MockOutputPin::new("in1");
//! let (in2, _) = MockOutputPin::new("in2");
//! let (limit, _) = MockInputPin::new("limit");
//! let door = Door::builder(
//!     DoorId::new("A").unwrap(),
//!     HBridgeActuator::new(in1, in2, None),
//!     PinLimitSwitch::new(limit, true),
//! )
//! .build(clock.now());
//!
//! let mut scheduler = Scheduler::new(vec![door], ReplyFormat::Plain, clock.now()).unwrap();
//! let mut inbox = vec![Inbound { connection: ConnectionId(1), line: Line::Text("Open A".into()) }];
//! let mut outbox: Vec<Outbound> = Vec::new();
//!
//! scheduler.tick(clock.now(), &mut inbox, &mut outbox);
//! assert_eq!(outbox[0].line, "State: RUNNING; Status: accepted; Reason: opening A; A: OPENING");
//!
//! // No limit switch: the default 26.5 s ceiling forces a failsafe close.
//! clock.advance(Duration::from_millis(26_500));
//! scheduler.tick(clock.now(), &mut Vec::<Inbound>::new(), &mut outbox);
//! assert_eq!(scheduler.door("A").unwrap().state(), DoorState::FailsafeClosing);
//! ```

pub mod clock;
pub mod dispatcher;
pub mod door;
pub mod scheduler;
pub mod supervisor;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use dispatcher::Dispatcher;
pub use door::{Door, DoorBuilder, Rejection, StateTransition};
pub use scheduler::{
    CommandInbox, ConnectionId, Inbound, Outbound, ReplyOutbox, Scheduler, TickReport,
};
pub use supervisor::SafetySupervisor;
