use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{BackendFault, CallResult};

/// RPC requests understood by the native motion service. One JSON object
/// per line, tagged by function name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "Function")]
pub enum Call {
    AcquirePermission,
    ReleasePermission,
    JointMove {
        #[serde(rename = "Joints")]
        joints: [f64; 6],
        #[serde(rename = "Speed")]
        speed: f64,
        #[serde(rename = "AccelTime")]
        accel_time: f64,
        #[serde(rename = "DecelTime")]
        decel_time: f64,
    },
    CartesianPtpMove {
        #[serde(rename = "Pose")]
        pose: [f64; 6],
        #[serde(rename = "Posture")]
        posture: i32,
        #[serde(rename = "Speed")]
        speed: f64,
        #[serde(rename = "AccelTime")]
        accel_time: f64,
        #[serde(rename = "DecelTime")]
        decel_time: f64,
    },
    /// PTP move with explicit multi-turn data and solver option.
    CartesianPtpMoveExt {
        #[serde(rename = "Pose")]
        pose: [f64; 6],
        #[serde(rename = "Posture")]
        posture: i32,
        #[serde(rename = "MultiTurn")]
        multi_turn: u32,
        #[serde(rename = "IkOption")]
        ik_option: u32,
        #[serde(rename = "Speed")]
        speed: f64,
        #[serde(rename = "AccelTime")]
        accel_time: f64,
        #[serde(rename = "DecelTime")]
        decel_time: f64,
    },
    CartesianLinearMove {
        #[serde(rename = "Pose")]
        pose: [f64; 6],
        #[serde(rename = "Posture")]
        posture: i32,
        #[serde(rename = "Speed")]
        speed: f64,
        #[serde(rename = "AccelTime")]
        accel_time: f64,
        #[serde(rename = "DecelTime")]
        decel_time: f64,
    },
    /// Cartesian to joint conversion. Values: J1..J6.
    ToJoints {
        #[serde(rename = "Pose")]
        pose: [f64; 6],
        #[serde(rename = "Posture")]
        posture: i32,
        #[serde(rename = "MultiTurn")]
        multi_turn: u32,
        #[serde(rename = "IkOption")]
        ik_option: u32,
    },
    /// Joint to cartesian conversion. Values: X..Rz, posture.
    ToCartesian {
        #[serde(rename = "Joints")]
        joints: [f64; 6],
    },
    SetToolOffset {
        #[serde(rename = "Id")]
        id: u8,
        #[serde(rename = "Offset")]
        offset: [f64; 6],
    },
    ChangeTool {
        #[serde(rename = "Id")]
        id: u8,
    },
    /// Current cartesian pose. Values: X..Rz, posture.
    Mark,
    /// Current joint pose. Values: J1..J6.
    JointMark,
    /// Values: id of the interrupted motion.
    AbortMotion,
    /// Blocks until in-flight motion completes.
    WaitMotion,
    SystemStatus {
        #[serde(rename = "Kind")]
        kind: i32,
    },
    SetLookAhead {
        #[serde(rename = "On")]
        on: bool,
    },
    SetPassThrough {
        #[serde(rename = "On")]
        on: bool,
    },
    SetOverlap {
        #[serde(rename = "Value")]
        value: u32,
    },
    SetZone {
        #[serde(rename = "Value")]
        value: u32,
    },
    DisableOverride {
        #[serde(rename = "Mask")]
        mask: u8,
    },
    /// Raw column write. A mask bit of 1 leaves the line untouched.
    /// Values: the column's low and high words after the write.
    ColumnIo {
        #[serde(rename = "Column")]
        column: u32,
        #[serde(rename = "DataLow")]
        data_low: u32,
        #[serde(rename = "MaskLow")]
        mask_low: u32,
        #[serde(rename = "DataHigh")]
        data_high: u32,
        #[serde(rename = "MaskHigh")]
        mask_high: u32,
    },
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Call::AcquirePermission => "AcquirePermission",
            Call::ReleasePermission => "ReleasePermission",
            Call::JointMove { .. } => "JointMove",
            Call::CartesianPtpMove { .. } => "CartesianPtpMove",
            Call::CartesianPtpMoveExt { .. } => "CartesianPtpMoveExt",
            Call::CartesianLinearMove { .. } => "CartesianLinearMove",
            Call::ToJoints { .. } => "ToJoints",
            Call::ToCartesian { .. } => "ToCartesian",
            Call::SetToolOffset { .. } => "SetToolOffset",
            Call::ChangeTool { .. } => "ChangeTool",
            Call::Mark => "Mark",
            Call::JointMark => "JointMark",
            Call::AbortMotion => "AbortMotion",
            Call::WaitMotion => "WaitMotion",
            Call::SystemStatus { .. } => "SystemStatus",
            Call::SetLookAhead { .. } => "SetLookAhead",
            Call::SetPassThrough { .. } => "SetPassThrough",
            Call::SetOverlap { .. } => "SetOverlap",
            Call::SetZone { .. } => "SetZone",
            Call::DisableOverride { .. } => "DisableOverride",
            Call::ColumnIo { .. } => "ColumnIo",
        }
    }
}

/// One backend response line.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CallReply {
    #[serde(rename = "Function", default)]
    pub function: String,
    #[serde(rename = "Success")]
    pub success: bool,
    #[serde(rename = "ErrDiv", default)]
    pub err_div: u8,
    #[serde(rename = "ErrCode", default)]
    pub err_code: u16,
    #[serde(rename = "Values", default)]
    pub values: Vec<Value>,
}

impl CallReply {
    pub fn ok(function: &str, values: Vec<Value>) -> Self {
        Self {
            function: function.to_string(),
            success: true,
            err_div: 0,
            err_code: 0,
            values,
        }
    }

    pub fn fault(function: &str, division: u8, code: u16) -> Self {
        Self {
            function: function.to_string(),
            success: false,
            err_div: division,
            err_code: code,
            values: Vec::new(),
        }
    }

    pub fn into_result(self) -> CallResult {
        if self.success {
            Ok(self.values)
        } else {
            Err(BackendFault {
                division: self.err_div,
                code: self.err_code,
            })
        }
    }
}
