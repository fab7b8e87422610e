//! `doorkeeper serve`: build the doors, bind the server, run until signalled.

use std::time::Instant;

use anyhow::{Context, Result};
use doorkeeper_controller::{Clock, Door, MonotonicClock, Scheduler};
use doorkeeper_hardware::mock::{MechanismHandles, MockInputPin, MockOutputPin, SimulatedMechanism};
use doorkeeper_hardware::{AnyActuator, AnyLimitSwitch, HBridgeActuator, PinLimitSwitch};
use doorkeeper_network::{DoorServer, DoorServerConfig, run_service_with};
use tracing::{error, info, warn};

use crate::config::{Config, DoorConfig};

type DaemonDoor = Door<AnyActuator, AnyLimitSwitch>;

pub async fn run(config: &Config, simulate: bool) -> Result<()> {
    let clock = MonotonicClock;
    let now = clock.now();

    let simulate = simulate || config.simulation.enabled;
    let (doors, mut mechanisms) = if simulate {
        info!(travel_ms = config.simulation.travel_ms, "simulating door mechanisms");
        simulated_doors(config, now)?
    } else {
        (gpio_doors(config, now)?, Vec::new())
    };

    let mut scheduler =
        Scheduler::new(doors, config.reply.format, now).context("building scheduler")?;
    let mut server = DoorServer::bind(DoorServerConfig {
        bind_addr: config.bind_addr()?,
        max_connections: config.server.max_connections,
    })
    .await?;

    let summary = run_service_with(
        &mut scheduler,
        &mut server,
        &clock,
        config.tick(),
        shutdown_signal(),
        |now| {
            for mechanism in &mut mechanisms {
                mechanism.update(now);
            }
        },
    )
    .await;

    for door in scheduler.doors() {
        info!(door = %door.id(), state = %door.state(), "final state");
    }
    info!(ticks = summary.ticks, commands = summary.commands, "doorkeeper stopped");
    Ok(())
}

fn door(
    config: &DoorConfig,
    actuator: AnyActuator,
    limit: AnyLimitSwitch,
    now: Instant,
) -> Result<DaemonDoor> {
    Ok(Door::builder(config.id.clone(), actuator, limit)
        .with_timing(config.timing()?)
        .build(now))
}

fn simulated_doors(config: &Config, now: Instant) -> Result<(Vec<DaemonDoor>, Vec<SimulatedMechanism>)> {
    let travel = config.simulation_travel();
    let mut doors = Vec::with_capacity(config.doors.len());
    let mut mechanisms = Vec::with_capacity(config.doors.len());

    for door_config in &config.doors {
        let id = &door_config.id;
        let (extend, extend_h) = MockOutputPin::new(format!("{id}.extend"));
        let (retract, retract_h) = MockOutputPin::new(format!("{id}.retract"));
        let (enable, enable_h) = MockOutputPin::new(format!("{id}.enable"));
        let (limit, limit_h) = MockInputPin::new(format!("{id}.limit"));

        let actuator: AnyActuator =
            HBridgeActuator::new(extend.into(), retract.into(), Some(enable.into()));
        let switch: AnyLimitSwitch = PinLimitSwitch::new(limit.into(), true);
        doors.push(door(door_config, actuator, switch, now)?);

        let handles = MechanismHandles {
            in1: extend_h,
            in2: retract_h,
            enable: Some(enable_h),
            limit: limit_h,
        };
        let mut mechanism = SimulatedMechanism::new(handles, travel, true, now);
        if config.simulation.jammed.contains(id) {
            warn!(door = %id, "simulated mechanism is jammed");
            mechanism.set_jammed(true);
        } else if travel.as_millis() >= u128::from(door_config.open_limit_ms) {
            warn!(
                door = %id,
                travel_ms = config.simulation.travel_ms,
                open_limit_ms = door_config.open_limit_ms,
                "simulated travel exceeds open limit, door will fail safe"
            );
        }
        mechanisms.push(mechanism);
    }

    Ok((doors, mechanisms))
}

#[cfg(feature = "hardware-rpi")]
fn gpio_doors(config: &Config, now: Instant) -> Result<Vec<DaemonDoor>> {
    use doorkeeper_hardware::rpi::RpiGpio;
    use doorkeeper_hardware::{AnyInputPin, AnyOutputPin};

    let gpio = RpiGpio::open().context("opening GPIO")?;
    let mut doors = Vec::with_capacity(config.doors.len());

    for door_config in &config.doors {
        let id = &door_config.id;
        let pins = door_config
            .pins
            .with_context(|| format!("door {id} has no pins configured"))?;

        let extend = AnyOutputPin::Rpi(gpio.output(pins.extend)?);
        let retract = AnyOutputPin::Rpi(gpio.output(pins.retract)?);
        let enable = pins
            .enable
            .map(|pin| gpio.output(pin).map(AnyOutputPin::Rpi))
            .transpose()?;
        let limit = AnyInputPin::Rpi(gpio.input(pins.limit, pins.limit_active_high)?);

        info!(
            door = %id,
            extend = pins.extend,
            retract = pins.retract,
            enable = ?pins.enable,
            limit = pins.limit,
            "GPIO pins claimed"
        );

        doors.push(door(
            door_config,
            HBridgeActuator::new(extend, retract, enable),
            PinLimitSwitch::new(limit, pins.limit_active_high),
            now,
        )?);
    }

    Ok(doors)
}

#[cfg(not(feature = "hardware-rpi"))]
fn gpio_doors(_config: &Config, _now: Instant) -> Result<Vec<DaemonDoor>> {
    anyhow::bail!("built without GPIO support: rebuild with `--features hardware-rpi` or pass `--simulate`")
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("interrupt received, shutting down"),
        () = terminate => info!("terminate received, shutting down"),
    }
}
