//! The service loop.
//!
//! Drives [`Scheduler::tick`] from a Tokio interval. The loop only awaits
//! between ticks, so reader and writer tasks run there and never inside a
//! tick.

use std::future::Future;
use std::time::{Duration, Instant};

use doorkeeper_controller::{Clock, CommandInbox, Inbound, Outbound, ReplyOutbox, Scheduler};
use doorkeeper_hardware::{Actuator, LimitSwitch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::server::{DoorServer, ServerInbox, ServerOutbox};

/// Where a tick reads commands and writes replies.
pub trait Transport {
    type Inbox: CommandInbox;
    type Outbox: ReplyOutbox;

    /// Queues for the coming tick. Must not wait.
    fn channels(&mut self) -> (&mut Self::Inbox, &mut Self::Outbox);
}

impl Transport for DoorServer {
    type Inbox = ServerInbox;
    type Outbox = ServerOutbox;

    fn channels(&mut self) -> (&mut ServerInbox, &mut ServerOutbox) {
        self.io()
    }
}

/// In-process transport: lines pushed by hand, replies collected.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    pub inbox: Vec<Inbound>,
    pub outbox: Vec<Outbound>,
}

impl Transport for MemoryTransport {
    type Inbox = Vec<Inbound>;
    type Outbox = Vec<Outbound>;

    fn channels(&mut self) -> (&mut Vec<Inbound>, &mut Vec<Outbound>) {
        (&mut self.inbox, &mut self.outbox)
    }
}

/// Totals over one run of the service loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSummary {
    pub ticks: u64,
    pub commands: u64,
    pub transitions: u64,
}

/// Tick until `shutdown` resolves, then de-energize every door.
pub async fn run_service<A, L, T, C>(
    scheduler: &mut Scheduler<A, L>,
    transport: &mut T,
    clock: &C,
    tick: Duration,
    shutdown: impl Future<Output = ()>,
) -> ServiceSummary
where
    A: Actuator,
    L: LimitSwitch,
    T: Transport,
    C: Clock,
{
    run_service_with(scheduler, transport, clock, tick, shutdown, |_| {}).await
}

/// Like [`run_service`], calling `before_tick` with the tick time ahead of
/// every tick. The simulator moves its virtual mechanisms there.
pub async fn run_service_with<A, L, T, C>(
    scheduler: &mut Scheduler<A, L>,
    transport: &mut T,
    clock: &C,
    tick: Duration,
    shutdown: impl Future<Output = ()>,
    mut before_tick: impl FnMut(Instant),
) -> ServiceSummary
where
    A: Actuator,
    L: LimitSwitch,
    T: Transport,
    C: Clock,
{
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut summary = ServiceSummary::default();
    info!(tick_ms = tick.as_millis() as u64, "service loop started");

    loop {
        tokio::select! {
            biased;
            () = &mut shutdown => break,
            _ = interval.tick() => {
                let now = clock.now();
                before_tick(now);

                let (inbox, outbox) = transport.channels();
                let report = scheduler.tick(now, inbox, outbox);

                summary.ticks += 1;
                summary.commands += report.commands as u64;
                summary.transitions += report.transitions.len() as u64;

                let spent = clock.now().saturating_duration_since(now);
                if spent > tick {
                    warn!(
                        spent_us = spent.as_micros() as u64,
                        tick_ms = tick.as_millis() as u64,
                        "tick overran its period"
                    );
                }
            }
        }
    }

    debug!(ticks = summary.ticks, "shutdown requested");
    scheduler.shutdown();
    info!(
        ticks = summary.ticks,
        commands = summary.commands,
        transitions = summary.transitions,
        "service loop stopped"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorkeeper_controller::{ConnectionId, Door, MonotonicClock};
    use doorkeeper_core::{DoorId, DoorState, DoorTiming, MotorCommand};
    use doorkeeper_hardware::mock::{MockInputPin, MockOutputPin};
    use doorkeeper_hardware::{HBridgeActuator, PinLimitSwitch};
    use doorkeeper_protocol::{Line, ReplyFormat};

    type TestScheduler = Scheduler<HBridgeActuator<MockOutputPin>, PinLimitSwitch<MockInputPin>>;

    fn scheduler(open_ms: u64, close_ms: u64) -> TestScheduler {
        let id = DoorId::new("A").unwrap();
        let (in1, _) = MockOutputPin::new("in1");
        let (in2, _) = MockOutputPin::new("in2");
        let (limit, _) = MockInputPin::new("limit");
        let now = MonotonicClock.now();
        let door = Door::builder(
            id.clone(),
            HBridgeActuator::new(in1, in2, None),
            PinLimitSwitch::new(limit, true),
        )
        .with_timing(DoorTiming::from_millis(&id, open_ms, close_ms).unwrap())
        .build(now);
        Scheduler::new(vec![door], ReplyFormat::Plain, now).unwrap()
    }

    fn open_a() -> Inbound {
        Inbound {
            connection: ConnectionId(1),
            line: Line::Text("Open A".to_string()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_follow_paused_time() {
        let mut scheduler = scheduler(26_500, 29_000);
        let mut transport = MemoryTransport {
            inbox: vec![open_a()],
            ..Default::default()
        };

        let summary = run_service(
            &mut scheduler,
            &mut transport,
            &MonotonicClock,
            Duration::from_millis(10),
            tokio::time::sleep(Duration::from_secs(30)),
        )
        .await;

        let door = scheduler.door("A").unwrap();
        assert_eq!(door.state(), DoorState::FailsafeClosing);
        assert_eq!(summary.commands, 1);
        assert_eq!(summary.transitions, 1);
        assert!(summary.ticks >= 2_900, "{} ticks", summary.ticks);
        assert!(transport.outbox[0].line.contains("Status: accepted"));
        // Shut down mid-motion: the motor is released, the state is kept.
        assert_eq!(door.motor(), MotorCommand::Off);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaches_fault_without_switch() {
        let mut scheduler = scheduler(1_000, 2_000);
        let mut transport = MemoryTransport {
            inbox: vec![open_a()],
            ..Default::default()
        };

        run_service(
            &mut scheduler,
            &mut transport,
            &MonotonicClock,
            Duration::from_millis(10),
            tokio::time::sleep(Duration::from_secs(5)),
        )
        .await;

        assert_eq!(scheduler.door("A").unwrap().state(), DoorState::Fault);
    }

    #[tokio::test(start_paused = true)]
    async fn test_before_tick_sees_every_tick() {
        let mut scheduler = scheduler(1_000, 2_000);
        let mut transport = MemoryTransport::default();
        let mut calls = 0u64;

        let summary = run_service_with(
            &mut scheduler,
            &mut transport,
            &MonotonicClock,
            Duration::from_millis(10),
            tokio::time::sleep(Duration::from_millis(105)),
            |_| calls += 1,
        )
        .await;

        assert_eq!(calls, summary.ticks);
        assert!(calls >= 10);
    }
}
