use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Identifier errors
    #[error("Invalid door id: {0}")]
    InvalidDoorId(String),

    #[error("Duplicate door id: {0}")]
    DuplicateDoor(String),

    // Timing errors
    #[error("Invalid timing for door {door}: {reason}")]
    InvalidTiming { door: String, reason: String },

    // State errors
    #[error("Unknown door state: {0}")]
    UnknownState(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DoorId, DoorTiming};

    #[test]
    fn test_constructors_report_their_variant() {
        assert!(matches!(DoorId::new(""), Err(Error::InvalidDoorId(_))));
        assert!(matches!(
            DoorTiming::from_millis(&DoorId::new("A").unwrap(), 0, 29_000),
            Err(Error::InvalidTiming { .. })
        ));
        assert!(matches!("AJAR".parse::<crate::DoorState>(), Err(Error::UnknownState(_))));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::DuplicateDoor("A".into()).to_string(),
            "Duplicate door id: A"
        );
        assert_eq!(
            Error::Config("at least one door is required".into()).to_string(),
            "Configuration error: at least one door is required"
        );
    }
}
