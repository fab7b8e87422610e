//! Line protocol spoken between operators and the door controller.
//!
//! - [`Command`]: the closed set of command lines (`Open`, `Close`, `Status`).
//! - [`Reply`]: status code, reason, aggregate state and door snapshots.
//! - [`ReplyEncoder`]: pluggable rendering of replies ([`PlainText`], [`Json`]).
//! - [`LineCodec`]: newline framing for Tokio streams.

pub mod codec;
pub mod command;
pub mod encoding;
pub mod error;
pub mod reply;

pub use codec::{Line, LineCodec};
pub use command::{Command, Verb};
pub use encoding::{Json, PlainText, ReplyEncoder, ReplyFormat};
pub use error::{ProtocolError, Result};
pub use reply::{DoorSnapshot, Reply, StatusCode};
