//! Error types for hardware operations.
//!
//! This module defines error types specific to GPIO-level operations:
//! pin acquisition, level writes and level reads.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during hardware device operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Pin is not available or has been released.
    #[error("Pin {pin} unavailable: {message}")]
    PinUnavailable { pin: u8, message: String },

    /// Writing an output level failed.
    #[error("Failed to write {line}: {message}")]
    WriteFailed { line: String, message: String },

    /// Reading an input level failed.
    #[error("Failed to read {line}: {message}")]
    ReadFailed { line: String, message: String },

    /// Backend initialization failed.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },
}

impl HardwareError {
    /// Create a new pin unavailable error.
    pub fn pin_unavailable(pin: u8, message: impl Into<String>) -> Self {
        Self::PinUnavailable {
            pin,
            message: message.into(),
        }
    }

    /// Create a new write failure.
    pub fn write_failed(line: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            line: line.into(),
            message: message.into(),
        }
    }

    /// Create a new read failure.
    pub fn read_failed(line: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReadFailed {
            line: line.into(),
            message: message.into(),
        }
    }

    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_unavailable_error() {
        let error = HardwareError::pin_unavailable(17, "busy");
        assert!(matches!(error, HardwareError::PinUnavailable { pin: 17, .. }));
        assert_eq!(error.to_string(), "Pin 17 unavailable: busy");
    }

    #[test]
    fn test_write_failed_error() {
        let error = HardwareError::write_failed("in1", "bus fault");
        assert_eq!(error.to_string(), "Failed to write in1: bus fault");
    }

    #[test]
    fn test_read_failed_error() {
        let error = HardwareError::read_failed("limit", "no response");
        assert_eq!(error.to_string(), "Failed to read limit: no response");
    }
}
