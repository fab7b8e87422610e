//! Command grammar.
//!
//! A command is one line of ASCII text:
//!
//! ```text
//! Open <door-id>
//! Close <door-id>
//! Status
//! Status <door-id>
//! ```
//!
//! Verbs are case-sensitive. Tokens are separated by ASCII whitespace and
//! trailing whitespace (including a `\r` left by telnet-style clients) is
//! ignored.

use crate::error::{ProtocolError, Result};
use doorkeeper_core::DoorId;
use std::fmt;
use std::str::FromStr;

/// Command verb, the first token of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Open,
    Close,
    Status,
}

impl Verb {
    /// Wire spelling of the verb.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Open => "Open",
            Verb::Close => "Close",
            Verb::Status => "Status",
        }
    }

    fn parse(token: &str) -> Option<Self> {
        match token {
            "Open" => Some(Verb::Open),
            "Close" => Some(Verb::Close),
            "Status" => Some(Verb::Status),
            _ => None,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed command line.
///
/// # Examples
///
/// ```
/// use doorkeeper_core::DoorId;
/// use doorkeeper_protocol::Command;
///
/// let cmd: Command = "Open A".parse().unwrap();
/// assert_eq!(cmd, Command::Open(DoorId::new("A").unwrap()));
/// assert_eq!(cmd.to_string(), "Open A");
///
/// assert_eq!("Status".parse::<Command>().unwrap(), Command::Status(None));
/// assert!("open A".parse::<Command>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open(DoorId),
    Close(DoorId),
    /// Status of every door, or of a single one.
    Status(Option<DoorId>),
}

impl Command {
    /// Parse one command line.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::InvalidCommand`] for an unknown verb or a wrong
    ///   number of arguments.
    /// - [`ProtocolError::UnknownTarget`] when the door argument is not a
    ///   syntactically valid identifier. Whether a valid identifier is
    ///   actually configured is decided by the dispatcher.
    pub fn parse(line: &str) -> Result<Self> {
        let mut tokens = line.split_ascii_whitespace();

        let verb = tokens
            .next()
            .and_then(Verb::parse)
            .ok_or_else(|| ProtocolError::invalid_command(line.trim_end()))?;
        let target = tokens.next();
        if tokens.next().is_some() {
            return Err(ProtocolError::invalid_command(line.trim_end()));
        }

        match (verb, target) {
            (Verb::Open, Some(id)) => Ok(Command::Open(parse_target(id)?)),
            (Verb::Close, Some(id)) => Ok(Command::Close(parse_target(id)?)),
            (Verb::Status, Some(id)) => Ok(Command::Status(Some(parse_target(id)?))),
            (Verb::Status, None) => Ok(Command::Status(None)),
            (Verb::Open | Verb::Close, None) => {
                Err(ProtocolError::invalid_command(line.trim_end()))
            }
        }
    }

    #[must_use]
    pub fn verb(&self) -> Verb {
        match self {
            Command::Open(_) => Verb::Open,
            Command::Close(_) => Verb::Close,
            Command::Status(_) => Verb::Status,
        }
    }

    /// The door the command addresses, if any.
    #[must_use]
    pub fn target(&self) -> Option<&DoorId> {
        match self {
            Command::Open(id) | Command::Close(id) => Some(id),
            Command::Status(id) => id.as_ref(),
        }
    }
}

fn parse_target(token: &str) -> Result<DoorId> {
    DoorId::new(token).map_err(|_| ProtocolError::unknown_target(token))
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Command::parse(s)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target() {
            Some(id) => write!(f, "{} {}", self.verb(), id),
            None => f.write_str(self.verb().as_str()),
        }
    }
}
