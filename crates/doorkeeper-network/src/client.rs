//! TCP client for the door controller.
//!
//! Speaks the line protocol: one command out, one reply back. On top of
//! that, [`DoorClient::open_door`] and [`DoorClient::close_door`] can wait
//! for the motion to finish by polling `Status <id>`.
//!
//! # Example
//!
//! ```no_run
//! use doorkeeper_core::DoorId;
//! use doorkeeper_network::{DoorClient, DoorClientConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = DoorClient::new(DoorClientConfig {
//!     server_addr: "127.0.0.1:8888".parse()?,
//!     ..Default::default()
//! });
//! client.connect().await?;
//!
//! let report = client.open_door(&DoorId::new("A")?, true).await?;
//! println!("door A {} after {:?}", report.final_state, report.elapsed);
//!
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use doorkeeper_core::constants::{
    DEFAULT_CLIENT_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_PORT,
};
use doorkeeper_core::{DoorId, DoorState};
use doorkeeper_protocol::{
    Command, Line, LineCodec, ProtocolError, Reply, ReplyEncoder, ReplyFormat, StatusCode,
};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, trace, warn};

/// Longest reply line accepted. Replies grow with the number of doors.
const MAX_REPLY_LENGTH: usize = 4096;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct DoorClientConfig {
    pub server_addr: SocketAddr,
    /// Timeout for connect and for each request.
    pub timeout: Duration,
    /// Delay between status polls while waiting for a motion.
    pub poll_interval: Duration,
    /// Give up waiting for a motion after this long.
    pub motion_timeout: Duration,
}

impl Default for DoorClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            timeout: Duration::from_millis(DEFAULT_CLIENT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            motion_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Not connected to server")]
    NotConnected,

    #[error("Connection timeout after {0}ms")]
    ConnectionTimeout(u64),

    #[error("Read timeout after {0}ms")]
    ReadTimeout(u64),

    #[error("Write timeout after {0}ms")]
    WriteTimeout(u64),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command {command} answered {status}: {reason}")]
    Refused {
        command: String,
        status: StatusCode,
        reason: String,
    },

    #[error("Door {0} missing from reply")]
    MissingDoor(DoorId),

    #[error("Door {0} is in FAULT")]
    DoorFault(DoorId),

    #[error("Door {door} stopped in {actual}, expected {expected}")]
    UnexpectedState {
        door: DoorId,
        expected: DoorState,
        actual: DoorState,
    },

    #[error("Door {door} still moving after {elapsed_ms}ms")]
    MotionTimeout { door: DoorId, elapsed_ms: u64 },
}

/// Outcome of an open or close request.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionReport {
    /// Reply to the command itself.
    pub reply: Reply,
    /// Last state seen. `OPENING`/`CLOSING` when not waiting.
    pub final_state: DoorState,
    /// Time from sending the command to seeing `final_state`.
    pub elapsed: Duration,
}

/// TCP client for the door controller.
pub struct DoorClient {
    config: DoorClientConfig,
    framed: Option<Framed<TcpStream, LineCodec>>,
}

impl DoorClient {
    /// Create a client. Not connected until [`connect`](Self::connect).
    pub fn new(config: DoorClientConfig) -> Self {
        debug!("Creating door client for server {}", config.server_addr);
        Self {
            config,
            framed: None,
        }
    }

    pub fn config(&self) -> &DoorClientConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.framed.is_some()
    }

    /// Connect to the controller.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConnectionTimeout`] if the connection is not
    /// established within the configured timeout, or the I/O error.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        let addr = self.config.server_addr;
        let timeout = self.config.timeout;
        info!("Connecting to door controller at {}", addr);

        let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                error!("Connection failed: {}", e);
                return Err(e.into());
            }
            Err(_) => {
                warn!("Connection timeout after {}ms", timeout.as_millis());
                return Err(ClientError::ConnectionTimeout(timeout.as_millis() as u64));
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        self.framed = Some(Framed::new(
            stream,
            LineCodec::with_max_length(MAX_REPLY_LENGTH),
        ));
        debug!("Client connected and ready");
        Ok(())
    }

    /// Send one line and wait for its reply.
    ///
    /// Plain and JSON replies are both understood.
    pub async fn request(&mut self, line: &str) -> Result<Reply, ClientError> {
        let timeout = self.config.timeout;
        let framed = self.framed.as_mut().ok_or(ClientError::NotConnected)?;

        trace!(line, "Sending command");
        match tokio::time::timeout(timeout, framed.send(line)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(ClientError::WriteTimeout(timeout.as_millis() as u64)),
        }

        let text = match tokio::time::timeout(timeout, framed.next()).await {
            Ok(Some(Ok(Line::Text(text)))) => text,
            Ok(Some(Ok(Line::Overlong { length }))) => {
                return Err(ProtocolError::LineTooLong {
                    length,
                    max: MAX_REPLY_LENGTH,
                }
                .into());
            }
            Ok(Some(Err(e))) => return Err(e.into()),
            Ok(None) => {
                self.framed = None;
                return Err(ClientError::ConnectionLost(
                    "Server closed connection".to_string(),
                ));
            }
            Err(_) => return Err(ClientError::ReadTimeout(timeout.as_millis() as u64)),
        };

        trace!(reply = %text, "Received reply");
        Ok(reply_format(&text).decode(&text)?)
    }

    /// Send a parsed command.
    pub async fn send(&mut self, command: &Command) -> Result<Reply, ClientError> {
        self.request(&command.to_string()).await
    }

    /// State of every door.
    pub async fn status(&mut self) -> Result<Reply, ClientError> {
        self.send(&Command::Status(None)).await
    }

    /// State of one door.
    pub async fn door_state(&mut self, door: &DoorId) -> Result<DoorState, ClientError> {
        let reply = self.send(&Command::Status(Some(door.clone()))).await?;
        refuse_unless(&reply, StatusCode::Ok, &format!("Status {door}"))?;
        reply
            .door(door)
            .ok_or_else(|| ClientError::MissingDoor(door.clone()))
    }

    /// Open a door; with `wait`, return once it has stopped moving.
    ///
    /// # Errors
    ///
    /// Fails if the command is not accepted, if the door ends in `FAULT`
    /// or in any state other than `OPEN`.
    pub async fn open_door(&mut self, door: &DoorId, wait: bool) -> Result<MotionReport, ClientError> {
        self.move_door(Command::Open(door.clone()), DoorState::Open, wait)
            .await
    }

    /// Close a door; with `wait`, return once it has stopped moving.
    ///
    /// # Errors
    ///
    /// Fails if the command is not accepted, if the door ends in `FAULT`
    /// or in any state other than `CLOSED`.
    pub async fn close_door(&mut self, door: &DoorId, wait: bool) -> Result<MotionReport, ClientError> {
        self.move_door(Command::Close(door.clone()), DoorState::Closed, wait)
            .await
    }

    async fn move_door(
        &mut self,
        command: Command,
        target: DoorState,
        wait: bool,
    ) -> Result<MotionReport, ClientError> {
        let Some(door) = command.target().cloned() else {
            return Err(ProtocolError::invalid_command("motion command without door").into());
        };

        let started = Instant::now();
        let reply = self.send(&command).await?;
        refuse_unless(&reply, StatusCode::Accepted, &command.to_string())?;

        let mut state = reply
            .door(&door)
            .ok_or_else(|| ClientError::MissingDoor(door.clone()))?;
        info!(door = %door, state = %state, "command accepted");

        if wait {
            while state.is_moving() {
                if started.elapsed() >= self.config.motion_timeout {
                    return Err(ClientError::MotionTimeout {
                        door,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    });
                }
                tokio::time::sleep(self.config.poll_interval).await;
                let next = self.door_state(&door).await?;
                if next != state {
                    debug!(door = %door, from = %state, to = %next, "door state changed");
                }
                state = next;
            }

            if state == DoorState::Fault {
                return Err(ClientError::DoorFault(door));
            }
            if state != target {
                return Err(ClientError::UnexpectedState {
                    door,
                    expected: target,
                    actual: state,
                });
            }
        }

        Ok(MotionReport {
            reply,
            final_state: state,
            elapsed: started.elapsed(),
        })
    }

    /// Close the connection. Calling it again is a no-op.
    pub async fn disconnect(&mut self) -> Result<(), ClientError> {
        if let Some(mut framed) = self.framed.take() {
            info!("Closing connection to {}", self.config.server_addr);

            let close_timeout = Duration::from_millis(500);
            match tokio::time::timeout(close_timeout, SinkExt::<&str>::flush(&mut framed)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Error flushing during close: {}", e),
                Err(_) => warn!("Flush timeout during close ({}ms)", close_timeout.as_millis()),
            }

            let mut stream = framed.into_inner();
            match tokio::time::timeout(close_timeout, stream.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Error during shutdown: {}", e),
                Err(_) => warn!("Shutdown timeout during close ({}ms)", close_timeout.as_millis()),
            }

            debug!("Connection closed");
        }
        Ok(())
    }
}

impl Drop for DoorClient {
    fn drop(&mut self) {
        if self.framed.is_some() {
            debug!("DoorClient dropped while connected - connection will be closed");
        }
    }
}

/// JSON replies are objects; everything else is plain text.
fn reply_format(line: &str) -> ReplyFormat {
    if line.trim_start().starts_with('{') {
        ReplyFormat::Json
    } else {
        ReplyFormat::Plain
    }
}

fn refuse_unless(reply: &Reply, expected: StatusCode, command: &str) -> Result<(), ClientError> {
    if reply.status == expected {
        return Ok(());
    }
    Err(ClientError::Refused {
        command: command.to_string(),
        status: reply.status,
        reason: reply.reason.clone(),
    })
}
