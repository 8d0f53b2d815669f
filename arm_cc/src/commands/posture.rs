use serde::{Deserialize, Serialize};

/// Posture-set request payload.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostureSet {
    #[serde(rename = "P")]
    pub posture: i32,
}

/// Posture-get reply payload.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostureReply {
    #[serde(rename = "P")]
    pub posture: i32,
}
