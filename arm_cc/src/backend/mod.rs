//! Boundary to the native motion service.
//!
//! The service performs kinematics and actuation; this module only defines
//! the calls the daemon makes against it and a driver that carries them
//! over a line-delimited JSON connection.

mod call;
#[cfg(feature = "driver")]
mod driver;

pub use call::{Call, CallReply};
#[cfg(feature = "driver")]
pub use driver::{BackendConfig, BackendDriver};

use std::fmt;

use serde_json::Value;

use crate::errors::CcError;

/// A failed backend call, reported as an error division plus a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendFault {
    pub division: u8,
    pub code: u16,
}

impl BackendFault {
    /// The backend's signature for "caller does not hold operation
    /// permission".
    pub fn is_permission_denied(&self) -> bool {
        self.division == 3 && self.code == 1
    }
}

impl fmt::Display for BackendFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "backend fault division {} code {}", self.division, self.code)
    }
}

/// Outcome of one backend call: result values, or the reported fault.
pub type CallResult = Result<Vec<Value>, BackendFault>;

pub fn value_f64(values: &[Value], index: usize) -> Result<f64, CcError> {
    values
        .get(index)
        .and_then(Value::as_f64)
        .ok_or_else(|| CcError::Payload(format!("backend reply value {} is not a number", index)))
}

pub fn value_i64(values: &[Value], index: usize) -> Result<i64, CcError> {
    values
        .get(index)
        .and_then(Value::as_i64)
        .ok_or_else(|| CcError::Payload(format!("backend reply value {} is not an integer", index)))
}

pub fn value_u32(values: &[Value], index: usize) -> Result<u32, CcError> {
    values
        .get(index)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| CcError::Payload(format!("backend reply value {} is not a 32-bit word", index)))
}
