use int_enum::IntEnum;
use serde::{Deserialize, Serialize};

use crate::errors::{CcError, ReplyCode};

/// Payload string for replies that carry no result fields.
pub const EMPTY_DATA: &str = "{}";

/// Discriminates what the `DA` payload of a request means.
#[repr(u8)]
#[derive(Debug, IntEnum, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Command = 0,
    Program = 1,
    ConnectCheck = 2,
    OperationGet = 3,
}

/// One client request. `DA` is itself a JSON object, carried as a string
/// inside the envelope.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Envelope {
    #[serde(rename = "CD")]
    pub command: u16,
    #[serde(rename = "PR")]
    pub process: serde_json::Value,
    #[serde(rename = "DT")]
    pub data_type: u8,
    #[serde(rename = "DA")]
    pub data: String,
}

impl Envelope {
    pub fn payload<T: serde::de::DeserializeOwned>(&self) -> Result<T, CcError> {
        serde_json::from_str(&self.data).map_err(Into::into)
    }
}

/// One reply to a client. `CD` echoes the request id, `RE` carries the
/// result code, `DA` carries result fields as a JSON-object string.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Reply {
    #[serde(rename = "CD")]
    pub command: u16,
    #[serde(rename = "RE")]
    pub code: u16,
    #[serde(rename = "DA")]
    pub data: String,
}

impl Reply {
    pub fn new(command: u16, code: ReplyCode, data: String) -> Self {
        Self {
            command,
            code: u16::from(code),
            data,
        }
    }

    pub fn empty(command: u16, code: ReplyCode) -> Self {
        Self::new(command, code, EMPTY_DATA.to_string())
    }

    /// Serializes the reply as one self-delimiting message, no length
    /// prefix and no trailing delimiter.
    pub fn encode(&self) -> Result<Vec<u8>, CcError> {
        serde_json::to_vec(self).map_err(Into::into)
    }
}
