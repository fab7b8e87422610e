//! Mock device implementations for testing and development.
//!
//! This module provides simulated pins that can be inspected and driven
//! programmatically without physical hardware, plus a simulated mechanism
//! that closes a mock limit switch after a configurable travel time.

pub mod mechanism;
pub mod pin;

// Re-export commonly used types
pub use mechanism::{MechanismHandles, SimulatedMechanism};
pub use pin::{MockInputPin, MockInputPinHandle, MockOutputPin, MockOutputPinHandle};
