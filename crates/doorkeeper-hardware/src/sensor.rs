//! Limit switch backed by a single input line.

use crate::error::Result;
use crate::traits::{InputPin, LimitSwitch};

/// Limit switch reading one input pin.
///
/// Switches are wired either normally-open to a pull-down (active high) or
/// normally-closed to a pull-up (active low); `active_high` selects which
/// level means "reached".
#[derive(Debug)]
pub struct PinLimitSwitch<P> {
    pin: P,
    active_high: bool,
}

impl<P: InputPin> PinLimitSwitch<P> {
    pub fn new(pin: P, active_high: bool) -> Self {
        Self { pin, active_high }
    }

    /// Whether a high level means the stop was reached.
    pub fn active_high(&self) -> bool {
        self.active_high
    }
}

impl<P: InputPin> LimitSwitch for PinLimitSwitch<P> {
    fn is_reached(&mut self) -> Result<bool> {
        Ok(self.pin.is_high()? == self.active_high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockInputPin;

    #[test]
    fn test_active_high_switch() {
        let (pin, handle) = MockInputPin::new("limit");
        let mut switch = PinLimitSwitch::new(pin, true);

        assert!(!switch.is_reached().unwrap());
        handle.set_high(true);
        assert!(switch.is_reached().unwrap());
    }

    #[test]
    fn test_active_low_switch() {
        let (pin, handle) = MockInputPin::new("limit");
        let mut switch = PinLimitSwitch::new(pin, false);

        assert!(switch.is_reached().unwrap());
        handle.set_high(true);
        assert!(!switch.is_reached().unwrap());
    }

    #[test]
    fn test_read_failure_propagates() {
        let (pin, handle) = MockInputPin::new("limit");
        let mut switch = PinLimitSwitch::new(pin, true);

        handle.fail_reads(true);
        assert!(switch.is_reached().is_err());
    }
}
