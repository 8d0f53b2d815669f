use serde::{Deserialize, Serialize};

use crate::errors::CcError;
use crate::MULTI_TURN_UNUSED;

/// Cartesian move request payload. Optional fields fall back to the
/// session's cached motion defaults.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CartesianTarget {
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
    #[serde(rename = "Z")]
    pub z: f64,
    #[serde(rename = "Rx")]
    pub rx: f64,
    #[serde(rename = "Ry")]
    pub ry: f64,
    #[serde(rename = "Rz")]
    pub rz: f64,
    #[serde(rename = "P")]
    pub posture: i32,
    #[serde(rename = "CC", default, skip_serializing_if = "Option::is_none")]
    pub multi_turn: Option<String>,
    #[serde(rename = "SP", default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(rename = "ATM", default, skip_serializing_if = "Option::is_none")]
    pub accel_time: Option<f64>,
    #[serde(rename = "DTM", default, skip_serializing_if = "Option::is_none")]
    pub decel_time: Option<f64>,
}

impl CartesianTarget {
    pub fn pose(&self) -> [f64; 6] {
        [self.x, self.y, self.z, self.rx, self.ry, self.rz]
    }

    /// The `CC` field is a hexadecimal string; absence means "unused".
    pub fn multi_turn_value(&self) -> Result<u32, CcError> {
        match self.multi_turn.as_deref() {
            None => Ok(MULTI_TURN_UNUSED),
            Some(raw) => {
                let digits = raw.trim_start_matches("0x").trim_start_matches("0X");
                u32::from_str_radix(digits, 16)
                    .map_err(|_| CcError::Payload(format!("bad multi-turn value {:?}", raw)))
            }
        }
    }
}

/// Joint move request payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JointTarget {
    #[serde(rename = "J1")]
    pub j1: f64,
    #[serde(rename = "J2")]
    pub j2: f64,
    #[serde(rename = "J3")]
    pub j3: f64,
    #[serde(rename = "J4")]
    pub j4: f64,
    #[serde(rename = "J5")]
    pub j5: f64,
    #[serde(rename = "J6")]
    pub j6: f64,
    #[serde(rename = "SP", default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(rename = "ATM", default, skip_serializing_if = "Option::is_none")]
    pub accel_time: Option<f64>,
    #[serde(rename = "DTM", default, skip_serializing_if = "Option::is_none")]
    pub decel_time: Option<f64>,
}

impl JointTarget {
    pub fn joints(&self) -> [f64; 6] {
        [self.j1, self.j2, self.j3, self.j4, self.j5, self.j6]
    }
}

/// Reply payload of an abort: the id of the interrupted motion.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AbortReply {
    #[serde(rename = "ID")]
    pub motion_id: i64,
}
