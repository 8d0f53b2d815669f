use serde::{Deserialize, Serialize};

/// Offset payload used by the tool-offset and base-offset commands.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct OffsetData {
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
}

impl OffsetData {
    pub fn to_array(self) -> [f64; 6] {
        [self.x, self.y, self.z, self.rx, self.ry, self.rz]
    }
}
