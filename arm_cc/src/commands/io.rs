use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

/// Digital-out request payload. `SL` is a pattern over `{0,1,*}` where
/// `*` leaves the line untouched; clients may also send a bare number,
/// which is taken digit for digit.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IoWrite {
    #[serde(rename = "AD")]
    pub address: u32,
    #[serde(rename = "SL", deserialize_with = "string_or_number")]
    pub signal: String,
}

/// Digital-in request payload. Omitting `EA` reads the single line at `SA`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoRead {
    #[serde(rename = "SA")]
    pub start: u32,
    #[serde(rename = "EA", default, skip_serializing_if = "Option::is_none")]
    pub end: Option<u32>,
}

/// Digital-in reply payload: the requested range as a bit string, highest
/// address first.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IoReadReply {
    #[serde(rename = "SL")]
    pub signal: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "signal must be a string or number, got {}",
            other
        ))),
    }
}
