use int_enum::IntEnum;
use serde::{Deserialize, Serialize};

/// Command identifiers carried in the `CD` request field.
#[repr(u16)]
#[derive(Debug, Serialize, Deserialize, IntEnum, Clone, Copy, PartialEq, Eq)]
pub enum CommandId {
    Program = 0x000,
    Home = 0x100,
    JmovePtp = 0x101,
    MovePtp = 0x102,
    SpeedPtp = 0x103,
    SpeedLine = 0x104,
    Rtoj = 0x105,
    QjmovePtp = 0x106,
    SetTool = 0x107,
    SetBase = 0x108,
    JmoveLine = 0x109,
    MoveLine = 0x10A,
    SetPosture = 0x10B,
    GetPosture = 0x10C,
    Mark = 0x10D,
    Jmark = 0x10E,
    Abort = 0x10F,
    SysSts = 0x110,
    SetIo = 0x200,
    GetIo = 0x201,
    SetAdc = 0x202,
    GetAdc = 0x203,
    NoCommand = 0xFFF,
}

impl CommandId {
    /// Commands that reconfigure or move the manipulator and therefore
    /// require the session's exclusive operation permission. Everything
    /// else (queries, conversions, digital I/O) is available to any
    /// connected session.
    pub fn requires_operation(self) -> bool {
        matches!(
            self,
            CommandId::Home
                | CommandId::JmovePtp
                | CommandId::MovePtp
                | CommandId::SpeedPtp
                | CommandId::SpeedLine
                | CommandId::QjmovePtp
                | CommandId::SetTool
                | CommandId::SetBase
                | CommandId::JmoveLine
                | CommandId::MoveLine
                | CommandId::SetPosture
        )
    }
}
