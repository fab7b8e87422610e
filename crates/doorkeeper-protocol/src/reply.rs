//! Reply model.
//!
//! A reply carries abstract fields only. Turning it into text is the job of
//! a [`ReplyEncoder`](crate::ReplyEncoder).

use doorkeeper_core::{ControllerState, DoorId, DoorState};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome code of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    /// Transition performed.
    Accepted,
    /// Valid command against an unmet precondition; nothing changed.
    Rejected,
    /// Unknown verb or wrong arguments.
    InvalidCommand,
    /// Door id not configured.
    UnknownTarget,
    /// Status query answered.
    Ok,
}

impl StatusCode {
    pub const ALL: [StatusCode; 5] = [
        StatusCode::Accepted,
        StatusCode::Rejected,
        StatusCode::InvalidCommand,
        StatusCode::UnknownTarget,
        StatusCode::Ok,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Accepted => "accepted",
            StatusCode::Rejected => "rejected",
            StatusCode::InvalidCommand => "invalid_command",
            StatusCode::UnknownTarget => "unknown_target",
            StatusCode::Ok => "ok",
        }
    }

    /// Whether the command did what was asked.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, StatusCode::Accepted | StatusCode::Ok)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusCode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        StatusCode::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| format!("unknown status code {s:?}"))
    }
}

/// State of one door at the time the reply was built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorSnapshot {
    pub id: DoorId,
    pub state: DoorState,
}

impl DoorSnapshot {
    pub fn new(id: DoorId, state: DoorState) -> Self {
        Self { id, state }
    }
}

/// Reply to one command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    /// Human readable explanation.
    pub reason: String,
    /// Aggregate state of the whole controller.
    pub controller: ControllerState,
    /// Door states in configuration order. Empty for protocol errors.
    pub doors: Vec<DoorSnapshot>,
}

impl Reply {
    pub fn new(
        status: StatusCode,
        reason: impl Into<String>,
        controller: ControllerState,
        doors: Vec<DoorSnapshot>,
    ) -> Self {
        Self {
            status,
            reason: reason.into(),
            controller,
            doors,
        }
    }

    /// State of `id` in this reply, if it was included.
    ///
    /// ```
    /// use doorkeeper_core::{ControllerState, DoorId, DoorState};
    /// use doorkeeper_protocol::{DoorSnapshot, Reply, StatusCode};
    ///
    /// let a = DoorId::new("A").unwrap();
    /// let reply = Reply::new(
    ///     StatusCode::Ok,
    ///     "status",
    ///     ControllerState::Stop,
    ///     vec![DoorSnapshot::new(a.clone(), DoorState::Closed)],
    /// );
    /// assert_eq!(reply.door(&a), Some(DoorState::Closed));
    /// ```
    #[must_use]
    pub fn door(&self, id: &DoorId) -> Option<DoorState> {
        self.doors.iter().find(|d| &d.id == id).map(|d| d.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(StatusCode::Accepted, true)]
    #[case(StatusCode::Ok, true)]
    #[case(StatusCode::Rejected, false)]
    #[case(StatusCode::InvalidCommand, false)]
    #[case(StatusCode::UnknownTarget, false)]
    fn test_status_success(#[case] code: StatusCode, #[case] success: bool) {
        assert_eq!(code.is_success(), success);
        assert_eq!(code.as_str().parse::<StatusCode>().unwrap(), code);
    }

    #[test]
    fn test_status_serde_matches_display() {
        let json = serde_json::to_string(&StatusCode::InvalidCommand).unwrap();
        assert_eq!(json, "\"invalid_command\"");
    }

    #[test]
    fn test_door_lookup_missing() {
        let reply = Reply::new(StatusCode::InvalidCommand, "", ControllerState::Stop, vec![]);
        assert_eq!(reply.door(&DoorId::new("A").unwrap()), None);
    }
}
