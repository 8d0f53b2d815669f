use int_enum::IntEnum;
use serde::{Deserialize, Serialize};

/// Result codes surfaced to clients in the `RE` reply field.
#[repr(u16)]
#[derive(Debug, Serialize, Deserialize, IntEnum, Clone, Copy, PartialEq, Eq)]
pub enum ReplyCode {
    Success = 0,
    DataError = 1,
    CommandError = 2,
    OperationNoneError = 3,
    OperationGetError = 4,
    RobotError = 5,
    ProcessError = 6,
    ProgramError = 7,
}

impl ReplyCode {
    pub fn message(&self) -> &str {
        match self {
            ReplyCode::Success => "Command completed.",
            ReplyCode::DataError => "Malformed or out-of-range request data.",
            ReplyCode::CommandError => "Unknown command id.",
            ReplyCode::OperationNoneError => "Operation permission not held.",
            ReplyCode::OperationGetError => "Operation permission could not be acquired.",
            ReplyCode::RobotError => "The backend reported a motion or hardware fault.",
            ReplyCode::ProcessError => "Session has no connect permission.",
            ReplyCode::ProgramError => "The uploaded program reported errors.",
        }
    }
}
