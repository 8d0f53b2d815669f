use std::net::ToSocketAddrs;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::warn;

use super::{Call, CallReply, CallResult};
use crate::errors::CcError;

/// Where the native motion service listens.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub addr: String,
    pub port: u32,
}

impl BackendConfig {
    pub fn new(addr: String, port: u32) -> Self {
        Self { addr, port }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.addr.is_empty() {
            return Err("Address cannot be empty.".to_string());
        }
        if self.port == 0 {
            return Err("Port number must be greater than 0.".to_string());
        }
        Ok(())
    }

    pub fn connection_url(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }

    /// Resolves the address to a `SocketAddr` if possible.
    pub fn resolve(&self) -> Result<String, String> {
        match self.connection_url().to_socket_addrs() {
            Ok(mut iter) => match iter.next() {
                Some(socket_addr) => Ok(socket_addr.to_string()),
                None => Err("Could not resolve address".to_string()),
            },
            Err(_) => Err("Invalid address format".to_string()),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1".to_string(),
            port: 12345,
        }
    }
}

struct DriverIo {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// Connection to the native motion service. Calls are strict
/// request/response pairs; the lock keeps one call in flight at a time, so
/// concurrent sessions serialize at this boundary.
pub struct BackendDriver {
    config: BackendConfig,
    io: Mutex<DriverIo>,
}

impl BackendDriver {
    pub async fn connect(config: BackendConfig) -> Result<Self, CcError> {
        let stream = connect_with_retries(&config.connection_url(), 3).await?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            config,
            io: Mutex::new(DriverIo {
                reader: BufReader::new(read_half),
                writer: write_half,
            }),
        })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    async fn call(&self, call: Call) -> Result<CallResult, CcError> {
        let mut io = self.io.lock().await;
        let mut line = serde_json::to_string(&call)?;
        line.push('\n');
        #[cfg(feature = "logging")]
        tracing::debug!("backend call: {}", line.trim_end());
        io.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| CcError::FailedToSend(e.to_string()))?;

        let mut reply_line = String::new();
        let n = io
            .reader
            .read_line(&mut reply_line)
            .await
            .map_err(|e| CcError::FailedToReceive(e.to_string()))?;
        if n == 0 {
            return Err(CcError::Disconnected);
        }
        #[cfg(feature = "logging")]
        tracing::debug!("backend reply: {}", reply_line.trim_end());
        let reply: CallReply = serde_json::from_str(reply_line.trim_end())?;
        Ok(reply.into_result())
    }

    pub async fn acquire_permission(&self) -> Result<CallResult, CcError> {
        self.call(Call::AcquirePermission).await
    }

    pub async fn release_permission(&self) -> Result<CallResult, CcError> {
        self.call(Call::ReleasePermission).await
    }

    pub async fn joint_move(
        &self,
        joints: [f64; 6],
        speed: f64,
        accel_time: f64,
        decel_time: f64,
    ) -> Result<CallResult, CcError> {
        self.call(Call::JointMove {
            joints,
            speed,
            accel_time,
            decel_time,
        })
        .await
    }

    pub async fn cartesian_ptp_move(
        &self,
        pose: [f64; 6],
        posture: i32,
        speed: f64,
        accel_time: f64,
        decel_time: f64,
    ) -> Result<CallResult, CcError> {
        self.call(Call::CartesianPtpMove {
            pose,
            posture,
            speed,
            accel_time,
            decel_time,
        })
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn cartesian_ptp_move_ext(
        &self,
        pose: [f64; 6],
        posture: i32,
        multi_turn: u32,
        ik_option: u32,
        speed: f64,
        accel_time: f64,
        decel_time: f64,
    ) -> Result<CallResult, CcError> {
        self.call(Call::CartesianPtpMoveExt {
            pose,
            posture,
            multi_turn,
            ik_option,
            speed,
            accel_time,
            decel_time,
        })
        .await
    }

    pub async fn cartesian_linear_move(
        &self,
        pose: [f64; 6],
        posture: i32,
        speed: f64,
        accel_time: f64,
        decel_time: f64,
    ) -> Result<CallResult, CcError> {
        self.call(Call::CartesianLinearMove {
            pose,
            posture,
            speed,
            accel_time,
            decel_time,
        })
        .await
    }

    pub async fn to_joints(
        &self,
        pose: [f64; 6],
        posture: i32,
        multi_turn: u32,
        ik_option: u32,
    ) -> Result<CallResult, CcError> {
        self.call(Call::ToJoints {
            pose,
            posture,
            multi_turn,
            ik_option,
        })
        .await
    }

    pub async fn to_cartesian(&self, joints: [f64; 6]) -> Result<CallResult, CcError> {
        self.call(Call::ToCartesian { joints }).await
    }

    pub async fn set_tool_offset(&self, id: u8, offset: [f64; 6]) -> Result<CallResult, CcError> {
        self.call(Call::SetToolOffset { id, offset }).await
    }

    pub async fn change_tool(&self, id: u8) -> Result<CallResult, CcError> {
        self.call(Call::ChangeTool { id }).await
    }

    pub async fn mark(&self) -> Result<CallResult, CcError> {
        self.call(Call::Mark).await
    }

    pub async fn joint_mark(&self) -> Result<CallResult, CcError> {
        self.call(Call::JointMark).await
    }

    pub async fn abort_motion(&self) -> Result<CallResult, CcError> {
        self.call(Call::AbortMotion).await
    }

    pub async fn wait_motion(&self) -> Result<CallResult, CcError> {
        self.call(Call::WaitMotion).await
    }

    pub async fn system_status(&self, kind: i32) -> Result<CallResult, CcError> {
        self.call(Call::SystemStatus { kind }).await
    }

    pub async fn set_look_ahead(&self, on: bool) -> Result<CallResult, CcError> {
        self.call(Call::SetLookAhead { on }).await
    }

    pub async fn set_pass_through(&self, on: bool) -> Result<CallResult, CcError> {
        self.call(Call::SetPassThrough { on }).await
    }

    pub async fn set_overlap(&self, value: u32) -> Result<CallResult, CcError> {
        self.call(Call::SetOverlap { value }).await
    }

    pub async fn set_zone(&self, value: u32) -> Result<CallResult, CcError> {
        self.call(Call::SetZone { value }).await
    }

    pub async fn disable_override(&self, mask: u8) -> Result<CallResult, CcError> {
        self.call(Call::DisableOverride { mask }).await
    }

    pub async fn column_io(
        &self,
        column: u32,
        data_low: u32,
        mask_low: u32,
        data_high: u32,
        mask_high: u32,
    ) -> Result<CallResult, CcError> {
        self.call(Call::ColumnIo {
            column,
            data_low,
            mask_low,
            data_high,
            mask_high,
        })
        .await
    }
}

async fn connect_with_retries(addr: &str, retries: u32) -> Result<TcpStream, CcError> {
    for attempt in 0..retries {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                warn!("backend connect attempt {} to {} failed: {}", attempt + 1, addr, e);
                if attempt + 1 == retries {
                    return Err(CcError::Disconnected);
                }
                sleep(Duration::from_secs(2)).await;
            }
        }
    }
    Err(CcError::Disconnected)
}
