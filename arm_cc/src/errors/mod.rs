mod reply_code;

pub use reply_code::ReplyCode;

use std::error::Error;
use std::fmt;

/// Errors raised by the protocol layer and the backend driver.
#[derive(Debug, Clone)]
pub enum CcError {
    Serialization(String),
    Payload(String),
    FailedToSend(String),
    FailedToReceive(String),
    Disconnected,
}

impl Error for CcError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}

impl fmt::Display for CcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CcError::Serialization(ref msg) => write!(f, "serialization error: {}", msg),
            CcError::Payload(ref msg) => write!(f, "payload error: {}", msg),
            CcError::FailedToSend(ref msg) => write!(f, "send error: {}", msg),
            CcError::FailedToReceive(ref msg) => write!(f, "receive error: {}", msg),
            CcError::Disconnected => write!(f, "peer disconnected"),
        }
    }
}

impl From<serde_json::Error> for CcError {
    fn from(e: serde_json::Error) -> Self {
        CcError::Serialization(e.to_string())
    }
}
