use thiserror::Error;

/// Errors raised while framing, parsing or decoding protocol lines.
///
/// Parse errors never terminate a connection. The dispatcher turns them into
/// `invalid_command` or `unknown_target` replies.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Command not found: {0:?}")]
    InvalidCommand(String),

    #[error("Unknown target: {0:?}")]
    UnknownTarget(String),

    #[error("Line too long: {length} bytes (max {max})")]
    LineTooLong { length: usize, max: usize },

    #[error("Malformed reply: {0}")]
    MalformedReply(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    pub fn invalid_command(line: impl Into<String>) -> Self {
        Self::InvalidCommand(line.into())
    }

    pub fn unknown_target(target: impl Into<String>) -> Self {
        Self::UnknownTarget(target.into())
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedReply(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
