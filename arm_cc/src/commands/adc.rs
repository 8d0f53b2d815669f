use serde::{Deserialize, Serialize};

/// ADC configuration request payload: channel 0 or 1, measurement mode
/// 0 to 2.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcSet {
    #[serde(rename = "CH")]
    pub channel: u8,
    #[serde(rename = "MO")]
    pub mode: u8,
}

/// ADC read reply payload: both channels' current 12-bit readings.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcReply {
    #[serde(rename = "ADC")]
    pub values: (u16, u16),
}
