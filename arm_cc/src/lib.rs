use serde::{Deserialize, Serialize};

pub mod backend;
pub mod command_id;
pub mod commands;
pub mod errors;
#[cfg(feature = "driver")]
pub mod framing;
pub mod packets;

pub use command_id::CommandId;
pub use errors::{CcError, ReplyCode};

/// Multi-turn field value meaning "no multi-turn data supplied".
pub const MULTI_TURN_UNUSED: u32 = 0xFF00_0000;

/// Default solver option passed to the backend's inverse-kinematics calls.
pub const IK_OPTION_DEFAULT: u32 = 0x1111_1111;

/// Posture value meaning "use the shared posture setting".
pub const POSTURE_UNSET: i32 = -1;

/// A Cartesian pose with its posture selector, as carried in reply payloads.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CartesianPose {
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
}

impl CartesianPose {
    pub fn new(pose: [f64; 6], posture: i32) -> Self {
        Self {
            x: pose[0],
            y: pose[1],
            z: pose[2],
            rx: pose[3],
            ry: pose[4],
            rz: pose[5],
            posture,
        }
    }
}

/// A joint-space pose, as carried in reply payloads.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct JointPose {
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
}

impl JointPose {
    pub fn new(joints: [f64; 6]) -> Self {
        Self {
            j1: joints[0],
            j2: joints[1],
            j3: joints[2],
            j4: joints[3],
            j5: joints[4],
            j6: joints[5],
        }
    }

    pub fn to_array(self) -> [f64; 6] {
        [self.j1, self.j2, self.j3, self.j4, self.j5, self.j6]
    }
}
