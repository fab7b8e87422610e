//! Client subcommands: talk to a running controller.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use doorkeeper_core::{DoorId, DoorState};
use doorkeeper_network::{DoorClient, DoorClientConfig, MotionReport};
use doorkeeper_protocol::{Command, Reply, StatusCode};

/// Margin added on top of a measured opening time.
const OPEN_LIMIT_MARGIN: f64 = 1.25;

pub async fn connect(addr: SocketAddr, timeout: Duration) -> Result<DoorClient> {
    let mut client = DoorClient::new(DoorClientConfig {
        server_addr: addr,
        timeout,
        ..Default::default()
    });
    client
        .connect()
        .await
        .with_context(|| format!("connecting to {addr}"))?;
    Ok(client)
}

pub async fn status(client: &mut DoorClient, door: Option<DoorId>) -> Result<()> {
    let reply = match door {
        Some(door) => client.send(&Command::Status(Some(door))).await?,
        None => client.status().await?,
    };
    if reply.status != StatusCode::Ok {
        anyhow::bail!("{}: {}", reply.status, reply.reason);
    }
    print!("{}", render_status(&reply));
    Ok(())
}

pub async fn open(client: &mut DoorClient, door: &DoorId, wait: bool) -> Result<()> {
    let report = client.open_door(door, wait).await?;
    println!("{}", render_motion(door, &report));
    Ok(())
}

pub async fn close(client: &mut DoorClient, door: &DoorId, wait: bool) -> Result<()> {
    let report = client.close_door(door, wait).await?;
    println!("{}", render_motion(door, &report));
    Ok(())
}

/// Open then close `door`, printing the opening time and a suggested limit.
pub async fn calibrate(client: &mut DoorClient, door: &DoorId) -> Result<()> {
    let state = client.door_state(door).await?;
    if state != DoorState::Closed {
        anyhow::bail!("door {door} must be CLOSED to calibrate, it is {state}");
    }

    let opened = client
        .open_door(door, true)
        .await
        .with_context(|| format!("opening {door}"))?;
    let closed = client
        .close_door(door, true)
        .await
        .with_context(|| format!("closing {door}"))?;

    print!("{}", render_calibration(door, opened.elapsed, closed.elapsed));
    Ok(())
}

/// Closing has no switch, so its time only echoes `close_duration_ms`.
fn render_calibration(door: &DoorId, opened: Duration, closed: Duration) -> String {
    format!(
        "Opening {door} takes {:.2}s (until the limit switch)\n\
         Closing {door} took {:.2}s (timed by close_duration_ms, not measured)\n\
         \n\
         Suggested configuration:\n  \
         [[doors]]\n  \
         id = \"{door}\"\n  \
         open_limit_ms = {}\n",
        opened.as_secs_f64(),
        closed.as_secs_f64(),
        suggested_open_limit_ms(opened)
    )
}

/// Measured opening time plus margin, rounded up to 100 ms.
fn suggested_open_limit_ms(measured: Duration) -> u64 {
    let padded = (measured.as_millis() as f64 * OPEN_LIMIT_MARGIN).ceil() as u64;
    padded.div_ceil(100) * 100
}

fn render_status(reply: &Reply) -> String {
    let mut out = format!("Controller: {}\n", reply.controller);
    for door in &reply.doors {
        out.push_str(&format!("  {:<8} {}\n", door.id.as_str(), door.state));
    }
    out
}

fn render_motion(door: &DoorId, report: &MotionReport) -> String {
    if report.final_state.is_moving() {
        format!("Door {door}: {}", report.final_state)
    } else {
        format!(
            "Door {door}: {} after {:.2}s",
            report.final_state,
            report.elapsed.as_secs_f64()
        )
    }
}
