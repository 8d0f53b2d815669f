//! In-memory stand-in for the native motion service.
//!
//! Accepts the backend's line-delimited JSON calls over TCP and applies
//! them to a mutable robot state. Conversions are arithmetic fakes, not
//! kinematics. The state also keeps counters and a call log so
//! integration tests can assert on connection reuse and call ordering.

use std::collections::HashMap;
use std::sync::Arc;

use arm_cc::backend::{Call, CallReply};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::warn;

/// Mutable robot state plus the counters tests inspect.
#[derive(Debug, Default)]
pub struct SimState {
    pub joints: [f64; 6],
    pub pose: [f64; 6],
    pub posture: i32,
    pub tool: u8,
    /// Column number to 64-bit line word (high word in the upper half).
    pub columns: HashMap<u32, u64>,
    /// Accepted backend connections since startup.
    pub connections: u32,
    pub permission_acquires: u32,
    /// When set, permission requests fail with the denied signature.
    pub deny_permission: bool,
    /// Function name to fault injected for that call.
    pub fail: HashMap<String, (u8, u16)>,
    /// Every handled function name, in arrival order.
    pub calls: Vec<String>,
    /// Speed of the most recent move call.
    pub last_speed: Option<f64>,
    motion_count: i64,
}

impl SimState {
    fn column_io(&mut self, column: u32, data: u64, mask: u64) -> (u32, u32) {
        let current = self.columns.get(&column).copied().unwrap_or(0);
        let next = (current & mask) | (data & !mask);
        self.columns.insert(column, next);
        ((next & 0xFFFF_FFFF) as u32, (next >> 32) as u32)
    }
}

/// The simulator; `state` is shared with whoever wants to seed or inspect
/// it.
pub struct BackendSim {
    pub state: Arc<Mutex<SimState>>,
}

impl BackendSim {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
        }
    }

    /// Serves backend calls on an already-bound listener until the task is
    /// dropped.
    pub async fn serve(&self, listener: TcpListener) {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("sim accept failed: {}", e);
                    continue;
                }
            };
            let state = Arc::clone(&self.state);
            state.lock().await.connections += 1;
            tokio::spawn(async move {
                handle_connection(state, stream).await;
            });
        }
    }
}

impl Default for BackendSim {
    fn default() -> Self {
        Self::new()
    }
}

async fn handle_connection(state: Arc<Mutex<SimState>>, stream: TcpStream) {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let call: Call = match serde_json::from_str(&line) {
            Ok(call) => call,
            Err(e) => {
                warn!("sim dropped unparseable call: {}", e);
                continue;
            }
        };
        let reply = {
            let mut state = state.lock().await;
            apply(&mut state, call)
        };
        let mut out = match serde_json::to_string(&reply) {
            Ok(out) => out,
            Err(e) => {
                warn!("sim reply failed to serialize: {}", e);
                break;
            }
        };
        out.push('\n');
        if write_half.write_all(out.as_bytes()).await.is_err() {
            break;
        }
    }
}

fn apply(state: &mut SimState, call: Call) -> CallReply {
    let name = call.name();
    state.calls.push(name.to_string());
    if let Some((division, code)) = state.fail.get(name).copied() {
        return CallReply::fault(name, division, code);
    }
    match call {
        Call::AcquirePermission => {
            state.permission_acquires += 1;
            if state.deny_permission {
                CallReply::fault(name, 3, 1)
            } else {
                CallReply::ok(name, vec![])
            }
        }
        Call::ReleasePermission => CallReply::ok(name, vec![]),
        Call::JointMove { joints, speed, .. } => {
            state.joints = joints;
            state.last_speed = Some(speed);
            state.motion_count += 1;
            CallReply::ok(name, vec![])
        }
        Call::CartesianPtpMove {
            pose,
            posture,
            speed,
            ..
        }
        | Call::CartesianPtpMoveExt {
            pose,
            posture,
            speed,
            ..
        }
        | Call::CartesianLinearMove {
            pose,
            posture,
            speed,
            ..
        } => {
            state.pose = pose;
            state.posture = posture;
            state.last_speed = Some(speed);
            state.motion_count += 1;
            CallReply::ok(name, vec![])
        }
        // No kinematics here: the pose components come straight back as
        // joint angles, which is enough for round-trip assertions.
        Call::ToJoints { pose, .. } => {
            CallReply::ok(name, pose.iter().map(|v| json!(v)).collect())
        }
        Call::ToCartesian { joints } => {
            let mut values: Vec<Value> = joints.iter().map(|v| json!(v)).collect();
            values.push(json!(7));
            CallReply::ok(name, values)
        }
        Call::SetToolOffset { .. } => CallReply::ok(name, vec![]),
        Call::ChangeTool { id } => {
            state.tool = id;
            CallReply::ok(name, vec![])
        }
        Call::Mark => {
            let mut values: Vec<Value> = state.pose.iter().map(|v| json!(v)).collect();
            values.push(json!(state.posture));
            CallReply::ok(name, values)
        }
        Call::JointMark => CallReply::ok(name, state.joints.iter().map(|v| json!(v)).collect()),
        Call::AbortMotion => CallReply::ok(name, vec![json!(state.motion_count)]),
        Call::WaitMotion => CallReply::ok(name, vec![]),
        Call::SystemStatus { kind } => CallReply::ok(name, vec![json!(kind)]),
        Call::SetLookAhead { .. }
        | Call::SetPassThrough { .. }
        | Call::SetOverlap { .. }
        | Call::SetZone { .. }
        | Call::DisableOverride { .. } => CallReply::ok(name, vec![]),
        Call::ColumnIo {
            column,
            data_low,
            mask_low,
            data_high,
            mask_high,
        } => {
            let data = ((data_high as u64) << 32) | data_low as u64;
            let mask = ((mask_high as u64) << 32) | mask_low as u64;
            let (low, high) = state.column_io(column, data, mask);
            CallReply::ok(name, vec![json!(low), json!(high)])
        }
    }
}
