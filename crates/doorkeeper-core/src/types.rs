use crate::{
    Result,
    constants::{DEFAULT_CLOSE_DURATION_MS, DEFAULT_OPEN_LIMIT_MS, MAX_DOOR_ID_LENGTH},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Door identifier (1-8 ASCII alphanumeric characters, case-sensitive)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DoorId(String);

impl DoorId {
    /// Create a new door ID with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidDoorId` if the ID is empty, longer than
    /// 8 characters or contains anything other than ASCII letters and digits.
    pub fn new(id: &str) -> Result<Self> {
        if id.is_empty() || id.len() > MAX_DOOR_ID_LENGTH {
            return Err(Error::InvalidDoorId(format!(
                "door id must be 1-{MAX_DOOR_ID_LENGTH} chars, got {:?}",
                id
            )));
        }

        if !id.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(Error::InvalidDoorId(format!(
                "door id must be ASCII alphanumeric, got {id:?}"
            )));
        }

        Ok(DoorId(id.to_string()))
    }

    /// Get the door ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DoorId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for DoorId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DoorId::new(s)
    }
}

impl TryFrom<String> for DoorId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        DoorId::new(&value)
    }
}

impl From<DoorId> for String {
    fn from(id: DoorId) -> Self {
        id.0
    }
}

/// State of a single door mechanism.
///
/// `Opening`, `Closing` and `FailsafeClosing` are the moving states; the
/// motor is energized in exactly those. `Fault` is terminal until restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DoorState {
    Closed,
    Opening,
    Open,
    Closing,
    FailsafeClosing,
    Fault,
}

impl DoorState {
    /// All states, in declaration order.
    pub const ALL: [DoorState; 6] = [
        DoorState::Closed,
        DoorState::Opening,
        DoorState::Open,
        DoorState::Closing,
        DoorState::FailsafeClosing,
        DoorState::Fault,
    ];

    /// Wire name of the state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DoorState::Closed => "CLOSED",
            DoorState::Opening => "OPENING",
            DoorState::Open => "OPEN",
            DoorState::Closing => "CLOSING",
            DoorState::FailsafeClosing => "FAILSAFE_CLOSING",
            DoorState::Fault => "FAULT",
        }
    }

    /// Whether the motor is energized in this state.
    #[must_use]
    pub fn is_moving(&self) -> bool {
        matches!(
            self,
            DoorState::Opening | DoorState::Closing | DoorState::FailsafeClosing
        )
    }

    /// Whether the state can never be left without a restart.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, DoorState::Fault)
    }

    /// Motor output that must be asserted while in this state.
    ///
    /// # Examples
    ///
    /// ```
    /// use doorkeeper_core::{DoorState, MotorCommand};
    ///
    /// assert_eq!(DoorState::Opening.motor_command(), MotorCommand::Extend);
    /// assert_eq!(DoorState::FailsafeClosing.motor_command(), MotorCommand::Retract);
    /// assert_eq!(DoorState::Fault.motor_command(), MotorCommand::Off);
    /// ```
    #[must_use]
    pub fn motor_command(&self) -> MotorCommand {
        match self {
            DoorState::Opening => MotorCommand::Extend,
            DoorState::Closing | DoorState::FailsafeClosing => MotorCommand::Retract,
            DoorState::Closed | DoorState::Open | DoorState::Fault => MotorCommand::Off,
        }
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DoorState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DoorState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| Error::UnknownState(s.to_string()))
    }
}

/// Logical motor direction handed to an actuator driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorCommand {
    /// Drive towards the open stop.
    Extend,
    /// Drive towards the closed position.
    Retract,
    /// De-energize the motor.
    Off,
}

impl fmt::Display for MotorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotorCommand::Extend => f.write_str("extend"),
            MotorCommand::Retract => f.write_str("retract"),
            MotorCommand::Off => f.write_str("off"),
        }
    }
}

/// Per-door motion timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorTiming {
    /// Ceiling for reaching the open limit switch.
    pub open_limit: Duration,

    /// Nominal duration of a closing motion (also bounds the failsafe close).
    pub close_duration: Duration,
}

impl DoorTiming {
    /// Create timing from millisecond values.
    ///
    /// # Errors
    /// Returns `Error::InvalidTiming` if either value is zero.
    pub fn from_millis(door: &DoorId, open_limit_ms: u64, close_duration_ms: u64) -> Result<Self> {
        if open_limit_ms == 0 {
            return Err(Error::InvalidTiming {
                door: door.to_string(),
                reason: "open_limit_ms must be non-zero".to_string(),
            });
        }
        if close_duration_ms == 0 {
            return Err(Error::InvalidTiming {
                door: door.to_string(),
                reason: "close_duration_ms must be non-zero".to_string(),
            });
        }

        Ok(Self {
            open_limit: Duration::from_millis(open_limit_ms),
            close_duration: Duration::from_millis(close_duration_ms),
        })
    }
}

impl Default for DoorTiming {
    fn default() -> Self {
        Self {
            open_limit: Duration::from_millis(DEFAULT_OPEN_LIMIT_MS),
            close_duration: Duration::from_millis(DEFAULT_CLOSE_DURATION_MS),
        }
    }
}

/// Aggregate state of the whole controller.
///
/// This is the first field of every reply and what polling clients watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControllerState {
    /// At least one door is moving and none is faulted.
    Running,
    /// Every door is at rest.
    Stop,
    /// At least one door is in `FAULT`.
    Error,
}

impl ControllerState {
    /// Derive the aggregate state from the individual door states.
    ///
    /// # Examples
    ///
    /// ```
    /// use doorkeeper_core::{ControllerState, DoorState};
    ///
    /// let states = [DoorState::Opening, DoorState::Closed];
    /// assert_eq!(ControllerState::aggregate(states), ControllerState::Running);
    /// ```
    pub fn aggregate(states: impl IntoIterator<Item = DoorState>) -> Self {
        let mut running = false;
        for state in states {
            if state.is_terminal() {
                return ControllerState::Error;
            }
            running |= state.is_moving();
        }
        if running {
            ControllerState::Running
        } else {
            ControllerState::Stop
        }
    }

    /// Wire name of the aggregate state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerState::Running => "RUNNING",
            ControllerState::Stop => "STOP",
            ControllerState::Error => "ERROR",
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ControllerState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "RUNNING" => Ok(ControllerState::Running),
            "STOP" => Ok(ControllerState::Stop),
            "ERROR" => Ok(ControllerState::Error),
            other => Err(Error::UnknownState(other.to_string())),
        }
    }
}

/// What caused a door to change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    /// An accepted `Open` or `Close` command.
    Command,
    /// The open limit switch was observed.
    LimitSwitch,
    /// The safety supervisor saw a motion timer expire.
    Timeout,
    /// The actuator could not be driven.
    HardwareFailure,
}

impl fmt::Display for TransitionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionCause::Command => f.write_str("command"),
            TransitionCause::LimitSwitch => f.write_str("limit_switch"),
            TransitionCause::Timeout => f.write_str("timeout"),
            TransitionCause::HardwareFailure => f.write_str("hardware_failure"),
        }
    }
}
