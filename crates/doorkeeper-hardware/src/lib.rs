//! Hardware abstraction layer for the door controller.
//!
//! This crate provides the two physical capabilities the door state machine
//! needs, behind small synchronous traits:
//!
//! - [`Actuator`]: turn a logical [`MotorCommand`] (extend, retract, off)
//!   into the output signals of a motor driver.
//! - [`LimitSwitch`]: report whether the mechanism reached its open stop.
//!
//! Both are built from single binary lines ([`OutputPin`], [`InputPin`]) so
//! the same [`HBridgeActuator`] and [`PinLimitSwitch`] work with the mock
//! backend used in tests and simulation and with Raspberry Pi GPIO (feature
//! `hardware-rpi`).
//!
//! # Non-blocking
//!
//! Every call is synchronous and expected to complete in microseconds. The
//! scheduler invokes them inside its tick; nothing here may wait.
//!
//! # Example
//!
//! ```
//! use doorkeeper_core::MotorCommand;
//! use doorkeeper_hardware::mock::{MockInputPin, MockOutputPin};
//! use doorkeeper_hardware::{Actuator, HBridgeActuator, LimitSwitch, PinLimitSwitch};
//!
//! let (in1, _) = MockOutputPin::new("in1");
//! let (in2, in2_handle) = MockOutputPin::new("in2");
//! let mut actuator = HBridgeActuator::new(in1, in2, None);
//! actuator.drive(MotorCommand::Retract).unwrap();
//! assert!(in2_handle.is_high());
//!
//! let (pin, limit_handle) = MockInputPin::new("limit");
//! let mut switch = PinLimitSwitch::new(pin, true);
//! limit_handle.set_high(true);
//! assert!(switch.is_reached().unwrap());
//! ```
//!
//! [`MotorCommand`]: doorkeeper_core::MotorCommand

pub mod actuator;
pub mod devices;
pub mod error;
pub mod mock;
#[cfg(feature = "hardware-rpi")]
pub mod rpi;
pub mod sensor;
pub mod traits;

// Re-export commonly used types for convenience
pub use actuator::HBridgeActuator;
pub use devices::{AnyActuator, AnyInputPin, AnyLimitSwitch, AnyOutputPin};
pub use error::{HardwareError, Result};
pub use sensor::PinLimitSwitch;
pub use traits::{Actuator, InputPin, LimitSwitch, OutputPin};
