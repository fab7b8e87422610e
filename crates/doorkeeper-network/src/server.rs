//! TCP server feeding the scheduler.
//!
//! The server never hands a socket to the scheduler. Each connection gets a
//! reader task and a writer task on the runtime; the scheduler only touches
//! the queues between them, through [`CommandInbox`] and [`ReplyOutbox`].
//!
//! ```text
//!  client ──> reader task ──> bounded queue ──┐
//!                  (LineCodec)                 ├──> Scheduler::tick
//!  client <── writer task <── bounded queue <──┘
//! ```
//!
//! A client that stops mid-line therefore only stalls its own reader task,
//! and a client that stops reading only fills its own reply queue.
//!
//! # Example
//!
//! ```no_run
//! use doorkeeper_network::{DoorServer, DoorServerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DoorServerConfig {
//!     bind_addr: "0.0.0.0:8888".parse()?,
//!     max_connections: 4,
//! };
//! let server = DoorServer::bind(config).await?;
//! println!("listening on {}", server.local_addr());
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use doorkeeper_controller::{CommandInbox, ConnectionId, Inbound, Outbound, ReplyOutbox};
use doorkeeper_core::constants::{DEFAULT_MAX_CONNECTIONS, DEFAULT_PORT, MAX_PENDING_LINES};
use doorkeeper_protocol::{Line, LineCodec};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, trace, warn};

/// Replies queued per connection before the client is considered stuck.
const MAX_PENDING_REPLIES: usize = 32;

/// Pause after a failed accept, e.g. when out of file descriptors.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct DoorServerConfig {
    /// Address to listen on.
    pub bind_addr: SocketAddr,
    /// Simultaneous connections; further ones are closed on accept.
    pub max_connections: usize,
}

impl Default for DoorServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata of one accepted connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub remote_addr: SocketAddr,
    pub connected_at: DateTime<Utc>,
}

impl ConnectionInfo {
    pub fn uptime(&self) -> chrono::Duration {
        Utc::now() - self.connected_at
    }
}

/// Handed from the acceptor task to the server.
#[derive(Debug)]
struct Accepted {
    info: ConnectionInfo,
    lines: mpsc::Receiver<Line>,
    replies: mpsc::Sender<String>,
    reader: AbortHandle,
}

/// Receiving half of a connection, owned by the inbox.
#[derive(Debug)]
struct ReaderEnd {
    lines: mpsc::Receiver<Line>,
    task: AbortHandle,
}

impl Drop for ReaderEnd {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Lines received on every open connection.
#[derive(Debug, Default)]
pub struct ServerInbox {
    readers: BTreeMap<ConnectionId, ReaderEnd>,
    closed: Vec<ConnectionId>,
}

impl CommandInbox for ServerInbox {
    fn drain(&mut self) -> Vec<Inbound> {
        let mut taken = Vec::new();
        for (&connection, reader) in &mut self.readers {
            match reader.lines.try_recv() {
                Ok(line) => taken.push(Inbound { connection, line }),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => self.closed.push(connection),
            }
        }
        for connection in &self.closed {
            self.readers.remove(connection);
        }
        taken
    }
}

/// Reply queues of every open connection.
#[derive(Debug, Default)]
pub struct ServerOutbox {
    writers: BTreeMap<ConnectionId, mpsc::Sender<String>>,
    closed: Vec<ConnectionId>,
}

impl ReplyOutbox for ServerOutbox {
    fn deliver(&mut self, reply: Outbound) {
        let Some(writer) = self.writers.get(&reply.connection) else {
            debug!(connection = %reply.connection, "reply for closed connection dropped");
            return;
        };
        match writer.try_send(reply.line) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(
                    connection = %reply.connection,
                    pending = MAX_PENDING_REPLIES,
                    "client is not reading replies, closing connection"
                );
                self.writers.remove(&reply.connection);
                self.closed.push(reply.connection);
            }
            Err(TrySendError::Closed(_)) => {
                debug!(connection = %reply.connection, "writer gone, reply dropped");
                self.writers.remove(&reply.connection);
                self.closed.push(reply.connection);
            }
        }
    }
}

/// TCP front end of the controller.
#[derive(Debug)]
pub struct DoorServer {
    local_addr: SocketAddr,
    accepted: mpsc::UnboundedReceiver<Accepted>,
    acceptor: JoinHandle<()>,
    inbox: ServerInbox,
    outbox: ServerOutbox,
    connections: BTreeMap<ConnectionId, ConnectionInfo>,
}

impl DoorServer {
    /// Bind the listener and start accepting connections.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::BindFailed`] if the address cannot be bound.
    pub async fn bind(config: DoorServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| ServerError::BindFailed {
                addr: config.bind_addr,
                source,
            })?;
        let local_addr = listener.local_addr()?;

        info!(
            addr = %local_addr,
            max_connections = config.max_connections,
            "door server listening"
        );

        let (tx, accepted) = mpsc::unbounded_channel();
        let acceptor = tokio::spawn(accept_loop(listener, config.max_connections, tx));

        Ok(Self {
            local_addr,
            accepted,
            acceptor,
            inbox: ServerInbox::default(),
            outbox: ServerOutbox::default(),
            connections: BTreeMap::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Register new connections, forget closed ones and return the queues
    /// for the next tick.
    ///
    /// Never waits.
    pub fn io(&mut self) -> (&mut ServerInbox, &mut ServerOutbox) {
        let closed: Vec<_> = self
            .inbox
            .closed
            .drain(..)
            .chain(self.outbox.closed.drain(..))
            .collect();
        for connection in closed {
            self.inbox.readers.remove(&connection);
            self.outbox.writers.remove(&connection);
            if let Some(info) = self.connections.remove(&connection) {
                info!(
                    connection = %connection,
                    addr = %info.remote_addr,
                    uptime_secs = info.uptime().num_seconds(),
                    "client disconnected"
                );
            }
        }

        while let Ok(accepted) = self.accepted.try_recv() {
            let id = accepted.info.id;
            self.inbox.readers.insert(
                id,
                ReaderEnd {
                    lines: accepted.lines,
                    task: accepted.reader,
                },
            );
            self.outbox.writers.insert(id, accepted.replies);
            self.connections.insert(id, accepted.info);
        }

        (&mut self.inbox, &mut self.outbox)
    }

    /// Connections registered so far, oldest first.
    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.connections.values().cloned().collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Drop for DoorServer {
    fn drop(&mut self) {
        self.acceptor.abort();
        debug!(addr = %self.local_addr, "door server stopped");
    }
}

/// Decrements the live connection count when the reader task ends.
struct ConnectionSlot(Arc<AtomicUsize>);

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn accept_loop(
    listener: TcpListener,
    max_connections: usize,
    accepted: mpsc::UnboundedSender<Accepted>,
) {
    let live = Arc::new(AtomicUsize::new(0));
    let mut next_id = 0u64;

    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(error = %err, "accept failed");
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                continue;
            }
        };

        let current = live.load(Ordering::SeqCst);
        if current >= max_connections {
            error!(
                addr = %addr,
                max_connections,
                current_connections = current,
                "Connection rejected: maximum connections reached"
            );
            drop(stream);
            continue;
        }

        if let Err(err) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY for {}: {}", addr, err);
        }

        next_id += 1;
        let id = ConnectionId(next_id);
        live.fetch_add(1, Ordering::SeqCst);
        let slot = ConnectionSlot(Arc::clone(&live));

        let connection = spawn_connection(id, addr, stream, slot);
        info!(connection = %id, addr = %addr, "client connected");

        if accepted.send(connection).is_err() {
            debug!("server dropped, acceptor exiting");
            return;
        }
    }
}

fn spawn_connection(
    id: ConnectionId,
    remote_addr: SocketAddr,
    stream: TcpStream,
    slot: ConnectionSlot,
) -> Accepted {
    let (read_half, write_half) = stream.into_split();
    let (line_tx, lines) = mpsc::channel(MAX_PENDING_LINES);
    let (replies, reply_rx) = mpsc::channel(MAX_PENDING_REPLIES);

    let reader = tokio::spawn(read_lines(id, read_half, line_tx, slot)).abort_handle();
    tokio::spawn(write_replies(id, write_half, reply_rx));

    Accepted {
        info: ConnectionInfo {
            id,
            remote_addr,
            connected_at: Utc::now(),
        },
        lines,
        replies,
        reader,
    }
}

async fn read_lines(
    id: ConnectionId,
    read_half: OwnedReadHalf,
    lines: mpsc::Sender<Line>,
    _slot: ConnectionSlot,
) {
    let mut framed = FramedRead::new(read_half, LineCodec::new());
    while let Some(item) = framed.next().await {
        match item {
            Ok(line) => {
                trace!(connection = %id, ?line, "line received");
                // Waits while the queue is full, which stops reading the socket.
                if lines.send(line).await.is_err() {
                    break;
                }
            }
            Err(err) => {
                warn!(connection = %id, error = %err, "read failed");
                break;
            }
        }
    }
    debug!(connection = %id, "reader finished");
}

async fn write_replies(
    id: ConnectionId,
    write_half: OwnedWriteHalf,
    mut replies: mpsc::Receiver<String>,
) {
    let mut framed = FramedWrite::new(write_half, LineCodec::new());
    while let Some(reply) = replies.recv().await {
        if let Err(err) = framed.send(reply).await {
            debug!(connection = %id, error = %err, "write failed");
            return;
        }
    }
    // Flushes and shuts down the write side.
    let _ = SinkExt::<String>::close(&mut framed).await;
    debug!(connection = %id, "writer finished");
}
