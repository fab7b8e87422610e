//! Mock GPIO pins.
//!
//! Each mock pin is created together with a handle sharing its state. The
//! pin goes into the actuator or limit switch; the handle stays with the
//! test (or the simulated mechanism) to observe and drive levels.

use crate::error::{HardwareError, Result};
use crate::traits::{InputPin, OutputPin};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct OutputState {
    high: bool,
    history: Vec<bool>,
    fail_writes: bool,
}

fn lock(state: &Mutex<OutputState>) -> MutexGuard<'_, OutputState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock output line.
///
/// # Examples
///
/// ```
/// use doorkeeper_hardware::mock::MockOutputPin;
/// use doorkeeper_hardware::traits::OutputPin;
///
/// let (mut pin, handle) = MockOutputPin::new("in1");
/// pin.set_high().unwrap();
/// assert!(handle.is_high());
/// assert_eq!(handle.history(), vec![true]);
/// ```
#[derive(Debug)]
pub struct MockOutputPin {
    name: String,
    state: Arc<Mutex<OutputState>>,
}

impl MockOutputPin {
    /// Create a new mock output, initially low.
    pub fn new(name: impl Into<String>) -> (Self, MockOutputPinHandle) {
        let state = Arc::new(Mutex::new(OutputState::default()));
        let pin = Self {
            name: name.into(),
            state: Arc::clone(&state),
        };
        (pin, MockOutputPinHandle { state })
    }

    fn write(&mut self, high: bool) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_writes {
            return Err(HardwareError::write_failed(&self.name, "injected failure"));
        }
        state.high = high;
        state.history.push(high);
        Ok(())
    }
}

impl OutputPin for MockOutputPin {
    fn set_high(&mut self) -> Result<()> {
        self.write(true)
    }

    fn set_low(&mut self) -> Result<()> {
        self.write(false)
    }
}

/// Handle for observing a mock output line.
#[derive(Debug, Clone)]
pub struct MockOutputPinHandle {
    state: Arc<Mutex<OutputState>>,
}

impl MockOutputPinHandle {
    /// Current level of the line.
    pub fn is_high(&self) -> bool {
        lock(&self.state).high
    }

    /// Every level written so far, oldest first.
    pub fn history(&self) -> Vec<bool> {
        lock(&self.state).history.clone()
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }
}

#[derive(Debug, Default)]
struct InputState {
    high: AtomicBool,
    fail_reads: AtomicBool,
}

/// Mock input line.
#[derive(Debug)]
pub struct MockInputPin {
    name: String,
    state: Arc<InputState>,
}

impl MockInputPin {
    /// Create a new mock input, initially low.
    pub fn new(name: impl Into<String>) -> (Self, MockInputPinHandle) {
        let state = Arc::new(InputState::default());
        let pin = Self {
            name: name.into(),
            state: Arc::clone(&state),
        };
        (pin, MockInputPinHandle { state })
    }
}

impl InputPin for MockInputPin {
    fn is_high(&mut self) -> Result<bool> {
        if self.state.fail_reads.load(Ordering::SeqCst) {
            return Err(HardwareError::read_failed(&self.name, "injected failure"));
        }
        Ok(self.state.high.load(Ordering::SeqCst))
    }
}

/// Handle for driving a mock input line.
#[derive(Debug, Clone)]
pub struct MockInputPinHandle {
    state: Arc<InputState>,
}

impl MockInputPinHandle {
    /// Set the level the pin will report.
    pub fn set_high(&self, high: bool) {
        self.state.high.store(high, Ordering::SeqCst);
    }

    /// Level the pin currently reports.
    pub fn is_high(&self) -> bool {
        self.state.high.load(Ordering::SeqCst)
    }

    /// Make subsequent reads fail (or succeed again).
    pub fn fail_reads(&self, fail: bool) {
        self.state.fail_reads.store(fail, Ordering::SeqCst);
    }
}
