//! Network layer for the door controller.
//!
//! This crate puts the scheduler on a TCP port and provides a client for it.
//!
//! # Components
//!
//! - [`DoorServer`]: accepts connections and buffers their lines and replies
//!   in per-connection queues the scheduler reads without waiting.
//! - [`run_service`]: the tick loop.
//! - [`DoorClient`]: sends commands and optionally waits for motions.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use doorkeeper_controller::{Clock, Door, MonotonicClock, Scheduler};
//! use doorkeeper_core::DoorId;
//! use doorkeeper_hardware::mock::{MockInputPin, MockOutputPin};
//! use doorkeeper_hardware::{HBridgeActuator, PinLimitSwitch};
//! use doorkeeper_network::{DoorServer, DoorServerConfig, run_service};
//! use doorkeeper_protocol::ReplyFormat;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (in1, _) = MockOutputPin::new("in1");
//! let (in2, _) = MockOutputPin::new("in2");
//! let (limit, _) = MockInputPin::new("limit");
//! let clock = MonotonicClock;
//! let door = Door::builder(
//!     DoorId::new("A")?,
//!     HBridgeActuator::new(in1, in2, None),
//!     PinLimitSwitch::new(limit, true),
//! )
//! .build(clock.now());
//!
//! let mut scheduler = Scheduler::new(vec![door], ReplyFormat::Plain, clock.now())?;
//! let mut server = DoorServer::bind(DoorServerConfig::default()).await?;
//! let shutdown = async {
//!     let _ = tokio::signal::ctrl_c().await;
//! };
//! run_service(&mut scheduler, &mut server, &clock, Duration::from_millis(10), shutdown).await;
//! # Ok(())
//! # }
//! ```

mod client;
mod server;
mod service;

pub use client::{ClientError, DoorClient, DoorClientConfig, MotionReport};
pub use server::{
    ConnectionInfo, DoorServer, DoorServerConfig, ServerError, ServerInbox, ServerOutbox,
};
pub use service::{MemoryTransport, ServiceSummary, Transport, run_service, run_service_with};
