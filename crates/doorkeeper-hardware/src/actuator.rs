//! H-bridge motor actuator.
//!
//! Most lid and valve mechanisms are driven by a DC gear motor through an
//! H-bridge with two direction inputs and an optional enable input:
//!
//! | Command | in1 | in2 | enable |
//! |---------|-----|-----|--------|
//! | Extend  | H   | L   | H      |
//! | Retract | L   | H   | H      |
//! | Off     | L   | L   | L      |
//!
//! A reversal always passes through `Off` first so both halves of the
//! bridge are never driven at the same time.

use crate::error::Result;
use crate::traits::{Actuator, OutputPin};
use doorkeeper_core::MotorCommand;
use tracing::trace;

/// Actuator driving an H-bridge through two or three output lines.
#[derive(Debug)]
pub struct HBridgeActuator<P> {
    in1: P,
    in2: P,
    enable: Option<P>,
    current: MotorCommand,
}

impl<P: OutputPin> HBridgeActuator<P> {
    /// Create an actuator from its direction lines and optional enable line.
    ///
    /// The lines are not touched until the first [`Actuator::drive`] call.
    pub fn new(in1: P, in2: P, enable: Option<P>) -> Self {
        Self {
            in1,
            in2,
            enable,
            current: MotorCommand::Off,
        }
    }

    fn write_off(&mut self) -> Result<()> {
        if let Some(enable) = self.enable.as_mut() {
            enable.set_low()?;
        }
        self.in1.set_low()?;
        self.in2.set_low()
    }

    fn write_direction(&mut self, extend: bool) -> Result<()> {
        // Release the active side before asserting the other one.
        if extend {
            self.in2.set_low()?;
            self.in1.set_high()?;
        } else {
            self.in1.set_low()?;
            self.in2.set_high()?;
        }
        if let Some(enable) = self.enable.as_mut() {
            enable.set_high()?;
        }
        Ok(())
    }
}

impl<P: OutputPin> Actuator for HBridgeActuator<P> {
    fn drive(&mut self, command: MotorCommand) -> Result<()> {
        trace!(from = %self.current, to = %command, "driving h-bridge");

        let reversing = matches!(
            (self.current, command),
            (MotorCommand::Extend, MotorCommand::Retract)
                | (MotorCommand::Retract, MotorCommand::Extend)
        );
        if reversing {
            self.write_off()?;
            self.current = MotorCommand::Off;
        }

        match command {
            MotorCommand::Extend => self.write_direction(true)?,
            MotorCommand::Retract => self.write_direction(false)?,
            MotorCommand::Off => self.write_off()?,
        }

        self.current = command;
        Ok(())
    }

    fn current(&self) -> MotorCommand {
        self.current
    }
}
