//! Hardware device trait definitions.
//!
//! This module defines the contract between the door controller core and
//! the physical I/O: binary output lines, binary input lines, the motor
//! actuator built from output lines and the limit switch built from an
//! input line.
//!
//! Every method is synchronous and must return promptly. The scheduler
//! calls them from inside a tick, so an implementation that waits on a bus
//! or a lock would delay the safety checks of every door.

use crate::error::Result;
use doorkeeper_core::MotorCommand;

/// A single binary output line.
pub trait OutputPin {
    /// Drive the line high.
    fn set_high(&mut self) -> Result<()>;

    /// Drive the line low.
    fn set_low(&mut self) -> Result<()>;

    /// Drive the line to the given level.
    fn set_level(&mut self, high: bool) -> Result<()> {
        if high { self.set_high() } else { self.set_low() }
    }
}

/// A single binary input line.
pub trait InputPin {
    /// Read the current level of the line.
    fn is_high(&mut self) -> Result<bool>;
}

/// Motor actuator abstraction.
///
/// Translates a logical [`MotorCommand`] into the electrical signals of a
/// motor driver. Implementations are stateless apart from remembering the
/// last command they applied.
///
/// # Examples
///
/// ```
/// use doorkeeper_core::MotorCommand;
/// use doorkeeper_hardware::traits::Actuator;
/// use doorkeeper_hardware::{HBridgeActuator, mock::MockOutputPin};
///
/// let (in1, in1_handle) = MockOutputPin::new("in1");
/// let (in2, _) = MockOutputPin::new("in2");
/// let mut actuator = HBridgeActuator::new(in1, in2, None);
///
/// actuator.drive(MotorCommand::Extend).unwrap();
/// assert!(in1_handle.is_high());
/// assert_eq!(actuator.current(), MotorCommand::Extend);
/// ```
pub trait Actuator {
    /// Apply a motor command.
    ///
    /// # Errors
    ///
    /// Returns an error if any output line could not be written. The
    /// caller must then treat the mechanism position as unverified.
    fn drive(&mut self, command: MotorCommand) -> Result<()>;

    /// The last command successfully applied.
    fn current(&self) -> MotorCommand;
}

/// Limit switch abstraction.
///
/// Reports whether the mechanism rests against its fully-open stop.
/// Polled once per tick; no memory beyond the current read.
pub trait LimitSwitch {
    /// Read the switch.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying input could not be read.
    fn is_reached(&mut self) -> Result<bool>;
}

impl<T: Actuator + ?Sized> Actuator for Box<T> {
    fn drive(&mut self, command: MotorCommand) -> Result<()> {
        (**self).drive(command)
    }

    fn current(&self) -> MotorCommand {
        (**self).current()
    }
}

impl<T: LimitSwitch + ?Sized> LimitSwitch for Box<T> {
    fn is_reached(&mut self) -> Result<bool> {
        (**self).is_reached()
    }
}
