use serde::{Deserialize, Serialize};

/// Speed-set request payload, shared by the PTP and linear variants.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SpeedSet {
    #[serde(rename = "SP")]
    pub speed: f64,
}
