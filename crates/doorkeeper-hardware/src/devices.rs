//! Enum wrappers for dynamic dispatch over pin backends.
//!
//! The controller is generic over its actuator and limit switch types. A
//! single binary has to pick the backend at runtime (mock for simulation,
//! GPIO for real hardware), so pins are wrapped in these enums rather than
//! boxed trait objects. The match compiles down to a jump per call.

use crate::actuator::HBridgeActuator;
use crate::error::Result;
use crate::mock::{MockInputPin, MockOutputPin};
use crate::sensor::PinLimitSwitch;
use crate::traits::{InputPin, OutputPin};

/// Output pin from any supported backend.
#[derive(Debug)]
pub enum AnyOutputPin {
    Mock(MockOutputPin),
    #[cfg(feature = "hardware-rpi")]
    Rpi(crate::rpi::RpiOutputPin),
}

impl OutputPin for AnyOutputPin {
    fn set_high(&mut self) -> Result<()> {
        match self {
            AnyOutputPin::Mock(pin) => pin.set_high(),
            #[cfg(feature = "hardware-rpi")]
            AnyOutputPin::Rpi(pin) => pin.set_high(),
        }
    }

    fn set_low(&mut self) -> Result<()> {
        match self {
            AnyOutputPin::Mock(pin) => pin.set_low(),
            #[cfg(feature = "hardware-rpi")]
            AnyOutputPin::Rpi(pin) => pin.set_low(),
        }
    }
}

impl From<MockOutputPin> for AnyOutputPin {
    fn from(pin: MockOutputPin) -> Self {
        AnyOutputPin::Mock(pin)
    }
}

/// Input pin from any supported backend.
#[derive(Debug)]
pub enum AnyInputPin {
    Mock(MockInputPin),
    #[cfg(feature = "hardware-rpi")]
    Rpi(crate::rpi::RpiInputPin),
}

impl InputPin for AnyInputPin {
    fn is_high(&mut self) -> Result<bool> {
        match self {
            AnyInputPin::Mock(pin) => pin.is_high(),
            #[cfg(feature = "hardware-rpi")]
            AnyInputPin::Rpi(pin) => pin.is_high(),
        }
    }
}

impl From<MockInputPin> for AnyInputPin {
    fn from(pin: MockInputPin) -> Self {
        AnyInputPin::Mock(pin)
    }
}

/// Actuator type used by the daemon.
pub type AnyActuator = HBridgeActuator<AnyOutputPin>;

/// Limit switch type used by the daemon.
pub type AnyLimitSwitch = PinLimitSwitch<AnyInputPin>;
