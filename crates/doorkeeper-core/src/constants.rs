//! Core constants for the door controller.
//!
//! This module collects the timing defaults, identifier limits and wire
//! protocol limits shared by every crate in the workspace.
//!
//! # Wire Format
//!
//! Commands are single ASCII lines terminated by `\n`:
//!
//! ```text
//! Open A\n
//! Close B\n
//! Status\n
//! ```
//!
//! # Usage
//!
//! ```
//! use doorkeeper_core::constants::*;
//! use std::time::Duration;
//!
//! let open_limit = Duration::from_millis(DEFAULT_OPEN_LIMIT_MS);
//! assert_eq!(open_limit.as_millis(), 26_500);
//! assert_eq!(LINE_TERMINATOR, b'\n');
//! ```

// ============================================================================
// Motion Timing
// ============================================================================

/// Default ceiling for an opening motion (milliseconds).
///
/// If the open limit switch has not confirmed the fully-open position within
/// this time, the door is reversed into a failsafe close.
///
/// # Value: 26500ms
pub const DEFAULT_OPEN_LIMIT_MS: u64 = 26_500;

/// Default duration of a closing motion (milliseconds).
///
/// There is no switch on the closed side, so closing completes purely on
/// elapsed time. The same duration bounds the failsafe close.
///
/// # Value: 29000ms
pub const DEFAULT_CLOSE_DURATION_MS: u64 = 29_000;

/// Default scheduler tick period (milliseconds).
///
/// Every tick polls the limit switches, runs the safety supervisor and
/// drains at most one command per connection.
///
/// # Value: 10ms
pub const DEFAULT_TICK_MS: u64 = 10;

/// Smallest tick period accepted by configuration validation.
pub const MIN_TICK_MS: u64 = 1;

/// Largest tick period accepted by configuration validation.
///
/// Anything slower would let a timeout overshoot by more than a second.
pub const MAX_TICK_MS: u64 = 1_000;

// ============================================================================
// Door Identification
// ============================================================================

/// Maximum length of a door identifier (characters).
///
/// Identifiers are short labels such as `A`, `B` or `LID2`.
pub const MAX_DOOR_ID_LENGTH: usize = 8;

/// Maximum number of state transitions remembered per door.
///
/// Each record is a few dozen bytes; 100 records cover roughly 30 complete
/// open/close cycles, which is plenty for diagnosing a fault.
pub const MAX_HISTORY_SIZE: usize = 100;

// ============================================================================
// Wire Protocol
// ============================================================================

/// Line terminator for commands and replies.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Maximum accepted command line length (bytes, excluding the terminator).
///
/// Longer lines are discarded up to the next terminator and answered with
/// `invalid_command`. This bounds per-connection buffering.
pub const MAX_LINE_LENGTH: usize = 256;

/// Maximum number of complete lines buffered per connection.
///
/// The scheduler drains one line per connection per tick; a client that
/// pipelines more than this is back-pressured by its reader task.
pub const MAX_PENDING_LINES: usize = 8;

/// Separator between fields of a plain-text reply.
pub const PLAIN_FIELD_SEPARATOR: &str = "; ";

// ============================================================================
// Network Defaults
// ============================================================================

/// Default TCP port the controller listens on.
pub const DEFAULT_PORT: u16 = 8888;

/// Default maximum number of simultaneous client connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 16;

/// Default client I/O timeout (milliseconds).
pub const DEFAULT_CLIENT_TIMEOUT_MS: u64 = 3_000;

/// Default interval between status polls while a client waits for motion
/// to finish (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;
