//! Raspberry Pi GPIO backend (feature `hardware-rpi`).

use crate::error::{HardwareError, Result};
use crate::traits::{InputPin, OutputPin};
use rppal::gpio::Gpio;

/// Handle to the GPIO peripheral used to claim pins.
pub struct RpiGpio {
    gpio: Gpio,
}

impl RpiGpio {
    /// Open the GPIO peripheral.
    ///
    /// # Errors
    ///
    /// Returns an error if `/dev/gpiomem` cannot be opened.
    pub fn open() -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HardwareError::initialization_failed(e.to_string()))?;
        Ok(Self { gpio })
    }

    /// Claim a BCM pin as an output, driven low.
    pub fn output(&self, pin: u8) -> Result<RpiOutputPin> {
        let mut output = self
            .gpio
            .get(pin)
            .map_err(|e| HardwareError::pin_unavailable(pin, e.to_string()))?
            .into_output();
        output.set_low();
        Ok(RpiOutputPin { pin: output })
    }

    /// Claim a BCM pin as an input with the pull resistor matching the
    /// switch polarity (pull-down for active high, pull-up for active low).
    pub fn input(&self, pin: u8, active_high: bool) -> Result<RpiInputPin> {
        let raw = self
            .gpio
            .get(pin)
            .map_err(|e| HardwareError::pin_unavailable(pin, e.to_string()))?;
        let input = if active_high {
            raw.into_input_pulldown()
        } else {
            raw.into_input_pullup()
        };
        Ok(RpiInputPin { pin: input })
    }
}

#[derive(Debug)]
pub struct RpiOutputPin {
    pin: rppal::gpio::OutputPin,
}

impl OutputPin for RpiOutputPin {
    fn set_high(&mut self) -> Result<()> {
        self.pin.set_high();
        Ok(())
    }

    fn set_low(&mut self) -> Result<()> {
        self.pin.set_low();
        Ok(())
    }
}

#[derive(Debug)]
pub struct RpiInputPin {
    pin: rppal::gpio::InputPin,
}

impl InputPin for RpiInputPin {
    fn is_high(&mut self) -> Result<bool> {
        Ok(self.pin.is_high())
    }
}
