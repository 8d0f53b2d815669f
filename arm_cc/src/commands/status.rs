use serde::{Deserialize, Serialize};

/// System-status request payload.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusQuery {
    #[serde(rename = "TYPE")]
    pub kind: i32,
}

/// System-status reply payload. The backend decides the shape of the
/// nested value per query kind.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StatusReply {
    #[serde(rename = "RE")]
    pub value: serde_json::Value,
}
