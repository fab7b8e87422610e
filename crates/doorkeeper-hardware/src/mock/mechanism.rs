//! Simulated door mechanism.
//!
//! Watches the mock motor lines of one door and integrates a virtual
//! position over time. When the position reaches full travel the mock open
//! limit switch is closed. The closed side has no switch, matching the
//! real hardware.
//!
//! ```
//! use std::time::{Duration, Instant};
//! use doorkeeper_core::MotorCommand;
//! use doorkeeper_hardware::mock::{MechanismHandles, MockInputPin, MockOutputPin, SimulatedMechanism};
//! use doorkeeper_hardware::traits::Actuator;
//! use doorkeeper_hardware::HBridgeActuator;
//!
//! let (in1, in1_h) = MockOutputPin::new("in1");
//! let (in2, in2_h) = MockOutputPin::new("in2");
//! let (_limit, limit_h) = MockInputPin::new("limit");
//! let mut actuator = HBridgeActuator::new(in1, in2, None);
//!
//! let start = Instant::now();
//! let handles = MechanismHandles { in1: in1_h, in2: in2_h, enable: None, limit: limit_h.clone() };
//! let mut mechanism = SimulatedMechanism::new(handles, Duration::from_secs(2), true, start);
//!
//! actuator.drive(MotorCommand::Extend).unwrap();
//! mechanism.update(start + Duration::from_secs(3));
//! assert!(limit_h.is_high());
//! ```

use super::pin::{MockInputPinHandle, MockOutputPinHandle};
use doorkeeper_core::MotorCommand;
use std::time::{Duration, Instant};
use tracing::debug;

/// Handles the simulation needs to observe and drive one door.
#[derive(Debug, Clone)]
pub struct MechanismHandles {
    pub in1: MockOutputPinHandle,
    pub in2: MockOutputPinHandle,
    pub enable: Option<MockOutputPinHandle>,
    pub limit: MockInputPinHandle,
}

impl MechanismHandles {
    /// Motor command currently expressed by the output lines.
    pub fn motor(&self) -> MotorCommand {
        let enabled = self.enable.as_ref().is_none_or(MockOutputPinHandle::is_high);
        match (enabled, self.in1.is_high(), self.in2.is_high()) {
            (true, true, false) => MotorCommand::Extend,
            (true, false, true) => MotorCommand::Retract,
            _ => MotorCommand::Off,
        }
    }
}

/// Virtual mechanism driven by mock pins.
#[derive(Debug)]
pub struct SimulatedMechanism {
    handles: MechanismHandles,
    travel: Duration,
    position: Duration,
    limit_active_high: bool,
    jammed: bool,
    last_update: Instant,
}

impl SimulatedMechanism {
    /// Create a mechanism resting in the closed position.
    pub fn new(
        handles: MechanismHandles,
        travel: Duration,
        limit_active_high: bool,
        now: Instant,
    ) -> Self {
        let mechanism = Self {
            handles,
            travel,
            position: Duration::ZERO,
            limit_active_high,
            jammed: false,
            last_update: now,
        };
        mechanism.publish_limit();
        mechanism
    }

    /// Stop the mechanism from moving, as if something blocked it.
    pub fn set_jammed(&mut self, jammed: bool) {
        self.jammed = jammed;
    }

    /// Travelled distance expressed as motor run time from closed.
    pub fn position(&self) -> Duration {
        self.position
    }

    /// Whether the mechanism rests against the open stop.
    pub fn is_fully_open(&self) -> bool {
        self.position >= self.travel
    }

    /// Advance the simulation to `now`.
    pub fn update(&mut self, now: Instant) {
        let dt = now.saturating_duration_since(self.last_update);
        self.last_update = now;

        if self.jammed {
            return;
        }

        let before = self.position;
        match self.handles.motor() {
            MotorCommand::Extend => {
                self.position = (self.position + dt).min(self.travel);
            }
            MotorCommand::Retract => {
                self.position = self.position.saturating_sub(dt);
            }
            MotorCommand::Off => {}
        }

        if before != self.position && (self.position.is_zero() || self.is_fully_open()) {
            debug!(
                position_ms = self.position.as_millis() as u64,
                open = self.is_fully_open(),
                "simulated mechanism reached end of travel"
            );
        }
        self.publish_limit();
    }

    fn publish_limit(&self) {
        let reached = self.is_fully_open();
        self.handles.limit.set_high(reached == self.limit_active_high);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockInputPin, MockOutputPin};
    use crate::traits::{Actuator, InputPin};
    use crate::HBridgeActuator;

    struct Rig {
        actuator: HBridgeActuator<MockOutputPin>,
        limit: MockInputPin,
        mechanism: SimulatedMechanism,
        start: Instant,
    }

    fn rig(active_high: bool) -> Rig {
        let (in1, in1_h) = MockOutputPin::new("in1");
        let (in2, in2_h) = MockOutputPin::new("in2");
        let (en, en_h) = MockOutputPin::new("enable");
        let (limit, limit_h) = MockInputPin::new("limit");
        let start = Instant::now();
        let handles = MechanismHandles {
            in1: in1_h,
            in2: in2_h,
            enable: Some(en_h),
            limit: limit_h,
        };
        Rig {
            actuator: HBridgeActuator::new(in1, in2, Some(en)),
            limit,
            mechanism: SimulatedMechanism::new(handles, Duration::from_millis(1000), active_high, start),
            start,
        }
    }

    #[test]
    fn test_extends_to_open_stop() {
        let mut rig = rig(true);
        rig.actuator.drive(MotorCommand::Extend).unwrap();

        rig.mechanism.update(rig.start + Duration::from_millis(500));
        assert!(!rig.limit.is_high().unwrap());

        rig.mechanism.update(rig.start + Duration::from_millis(1200));
        assert!(rig.limit.is_high().unwrap());
        assert_eq!(rig.mechanism.position(), Duration::from_millis(1000));
    }

    #[test]
    fn test_retract_releases_switch() {
        let mut rig = rig(true);
        rig.actuator.drive(MotorCommand::Extend).unwrap();
        rig.mechanism.update(rig.start + Duration::from_millis(1000));

        rig.actuator.drive(MotorCommand::Retract).unwrap();
        rig.mechanism.update(rig.start + Duration::from_millis(1100));
        assert!(!rig.limit.is_high().unwrap());

        rig.mechanism.update(rig.start + Duration::from_millis(5000));
        assert!(rig.mechanism.position().is_zero());
    }

    #[test]
    fn test_jammed_mechanism_never_opens() {
        let mut rig = rig(true);
        rig.mechanism.set_jammed(true);
        rig.actuator.drive(MotorCommand::Extend).unwrap();

        rig.mechanism.update(rig.start + Duration::from_secs(60));
        assert!(!rig.limit.is_high().unwrap());
    }

    #[test]
    fn test_active_low_switch_idles_high() {
        let mut rig = rig(false);
        assert!(rig.limit.is_high().unwrap());

        rig.actuator.drive(MotorCommand::Extend).unwrap();
        rig.mechanism.update(rig.start + Duration::from_secs(2));
        assert!(!rig.limit.is_high().unwrap());
    }

    #[test]
    fn test_disabled_bridge_does_not_move() {
        let rig = rig(true);
        assert_eq!(rig.mechanism.handles.motor(), MotorCommand::Off);
    }
}
