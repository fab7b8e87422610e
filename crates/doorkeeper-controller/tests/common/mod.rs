//! Shared fixtures for controller integration tests.

#![allow(dead_code)]

use std::time::Duration;

use doorkeeper_controller::{
    Clock, ConnectionId, Door, Inbound, ManualClock, Outbound, Scheduler, TickReport,
};
use doorkeeper_core::{DoorId, DoorState, DoorTiming};
use doorkeeper_hardware::mock::{MechanismHandles, MockInputPin, MockOutputPin};
use doorkeeper_hardware::{HBridgeActuator, PinLimitSwitch};
use doorkeeper_protocol::{Line, PlainText, Reply, ReplyEncoder, ReplyFormat};

pub type MockDoor = Door<HBridgeActuator<MockOutputPin>, PinLimitSwitch<MockInputPin>>;
pub type MockScheduler = Scheduler<HBridgeActuator<MockOutputPin>, PinLimitSwitch<MockInputPin>>;

pub const TICK: Duration = Duration::from_millis(10);

/// Build a door on mock pins, returning the handles that observe it.
pub fn mock_door(id: &str, open_limit_ms: u64, close_duration_ms: u64, clock: &ManualClock) -> (MockDoor, MechanismHandles) {
    let door_id = DoorId::new(id).unwrap();
    let (in1, in1_h) = MockOutputPin::new(format!("{id}.in1"));
    let (in2, in2_h) = MockOutputPin::new(format!("{id}.in2"));
    let (en, en_h) = MockOutputPin::new(format!("{id}.enable"));
    let (limit, limit_h) = MockInputPin::new(format!("{id}.limit"));

    let door = Door::builder(
        door_id.clone(),
        HBridgeActuator::new(in1, in2, Some(en)),
        PinLimitSwitch::new(limit, true),
    )
    .with_timing(DoorTiming::from_millis(&door_id, open_limit_ms, close_duration_ms).unwrap())
    .build(clock.now());

    let handles = MechanismHandles {
        in1: in1_h,
        in2: in2_h,
        enable: Some(en_h),
        limit: limit_h,
    };
    (door, handles)
}

/// Scheduler over mock doors driven by a manual clock.
pub struct Rig {
    pub scheduler: MockScheduler,
    pub clock: ManualClock,
    pub handles: Vec<MechanismHandles>,
    pub replies: Vec<Outbound>,
}

impl Rig {
    /// Doors given as `(id, open_limit_ms, close_duration_ms)`.
    pub fn new(doors: &[(&str, u64, u64)]) -> Self {
        let clock = ManualClock::new();
        let (doors, handles): (Vec<_>, Vec<_>) = doors
            .iter()
            .map(|(id, open, close)| mock_door(id, *open, *close, &clock))
            .unzip();
        let scheduler = Scheduler::new(doors, ReplyFormat::Plain, clock.now()).unwrap();
        Self {
            scheduler,
            clock,
            handles,
            replies: Vec::new(),
        }
    }

    /// Door A with the reference timings (26.5 s / 29 s).
    pub fn reference() -> Self {
        Self::new(&[("A", 26_500, 29_000)])
    }

    pub fn state(&self, id: &str) -> DoorState {
        self.scheduler.door(id).unwrap().state()
    }

    /// Run one tick with the given command lines (one per connection).
    pub fn tick_with(&mut self, lines: &[&str]) -> TickReport {
        let mut inbox: Vec<Inbound> = lines
            .iter()
            .enumerate()
            .map(|(i, text)| Inbound {
                connection: ConnectionId(i as u64),
                line: Line::Text(text.to_string()),
            })
            .collect();
        self.scheduler.tick(self.clock.now(), &mut inbox, &mut self.replies)
    }

    /// Send one command and decode its reply.
    pub fn command(&mut self, line: &str) -> Reply {
        self.tick_with(&[line]);
        let out = self.replies.last().unwrap();
        PlainText.decode(&out.line).unwrap()
    }

    /// Advance the clock by one tick period and tick.
    pub fn step(&mut self) -> TickReport {
        self.clock.advance(TICK);
        self.tick_with(&[])
    }

    /// Elapsed time since the rig was created.
    pub fn elapsed_since(&self, start: std::time::Instant) -> Duration {
        self.clock.now() - start
    }
}
