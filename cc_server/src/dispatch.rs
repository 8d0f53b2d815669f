//! Per-session command dispatcher.
//!
//! Looks up the handler for a command id, gates the operation-command
//! group behind the session's operation permission, merges request fields
//! with the session's cached motion defaults, and maps backend outcomes to
//! the client-facing reply codes.

use std::sync::Arc;

use arm_cc::backend::{value_f64, value_i64, BackendDriver, BackendFault, CallResult};
use arm_cc::commands::{
    AbortReply, AdcReply, AdcSet, CartesianTarget, IoRead, IoReadReply, IoWrite, JointTarget,
    OffsetData, PostureReply, PostureSet, SpeedSet, StatusQuery, StatusReply,
};
use arm_cc::packets::EMPTY_DATA;
use arm_cc::{
    CartesianPose, CcError, CommandId, JointPose, ReplyCode, IK_OPTION_DEFAULT, MULTI_TURN_UNUSED,
    POSTURE_UNSET,
};
use tracing::{debug, info, warn};

use crate::context::Shared;
use crate::motion::MotionMode;

pub const DEFAULT_LINEAR_SPEED: f64 = 8.0;
pub const DEFAULT_JOINT_SPEED: f64 = 2.0;
pub const DEFAULT_ACCEL_TIME: f64 = 0.4;
pub const DEFAULT_DECEL_TIME: f64 = 0.4;
pub const POSTURE_DEFAULT: i32 = 7;
pub const POSTURE_MAX: i32 = 7;
pub const TOOL_NONE: u8 = 0;
pub const TOOL_ACTIVE: u8 = 1;

const PTP_SPEED_MIN: f64 = 1.0;
const PTP_SPEED_MAX: f64 = 100.0;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Interp {
    Ptp,
    Linear,
}

type HandlerResult = Result<(ReplyCode, String), CcError>;

/// One dispatcher per session. Holds the session's cached motion defaults
/// and its operation-permission flag.
pub struct Dispatcher {
    session_id: u64,
    driver: Arc<BackendDriver>,
    ctx: Arc<Shared>,
    operation_permission: bool,
    linear_speed: f64,
    joint_speed: f64,
    accel_time: f64,
    decel_time: f64,
    active_tool: u8,
}

impl Dispatcher {
    pub fn new(session_id: u64, driver: Arc<BackendDriver>, ctx: Arc<Shared>) -> Self {
        Self {
            session_id,
            driver,
            ctx,
            operation_permission: false,
            linear_speed: DEFAULT_LINEAR_SPEED,
            joint_speed: DEFAULT_JOINT_SPEED,
            accel_time: DEFAULT_ACCEL_TIME,
            decel_time: DEFAULT_DECEL_TIME,
            active_tool: TOOL_NONE,
        }
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn has_operation_permission(&self) -> bool {
        self.operation_permission
    }

    /// Requests exclusive operation permission from the backend on behalf
    /// of this session (`DT = 3`). The backend's verdict is what counts;
    /// the local flag only caches it.
    pub async fn acquire_operation(&mut self) -> ReplyCode {
        match self.driver.acquire_permission().await {
            Ok(Ok(_)) => {
                self.operation_permission = true;
                info!("session {}: operation permission granted", self.session_id);
                ReplyCode::Success
            }
            Ok(Err(fault)) => {
                warn!(
                    "session {}: operation permission refused: {}",
                    self.session_id, fault
                );
                ReplyCode::OperationGetError
            }
            Err(e) => {
                warn!(
                    "session {}: operation permission request failed: {}",
                    self.session_id, e
                );
                ReplyCode::OperationGetError
            }
        }
    }

    pub(crate) fn drop_operation_permission(&mut self) {
        self.operation_permission = false;
    }

    pub(crate) fn driver(&self) -> &Arc<BackendDriver> {
        &self.driver
    }

    pub(crate) fn ctx(&self) -> &Arc<Shared> {
        &self.ctx
    }

    /// Entry point for `DT = 0` requests.
    pub async fn dispatch(&mut self, command: u16, data: &str) -> (ReplyCode, String) {
        let Ok(id) = CommandId::try_from(command) else {
            warn!("session {}: unknown command id {:#05x}", self.session_id, command);
            return (ReplyCode::CommandError, EMPTY_DATA.to_string());
        };
        if id.requires_operation() && !self.operation_permission {
            warn!(
                "session {}: {:?} rejected, operation permission not held",
                self.session_id, id
            );
            return (ReplyCode::OperationNoneError, EMPTY_DATA.to_string());
        }
        debug!("session {}: dispatching {:?}", self.session_id, id);
        match self.run(id, data).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("session {}: {:?} failed: {}", self.session_id, id, e);
                (ReplyCode::DataError, EMPTY_DATA.to_string())
            }
        }
    }

    async fn run(&mut self, id: CommandId, data: &str) -> HandlerResult {
        match id {
            CommandId::Home => self.cmd_home().await,
            CommandId::MovePtp => self.cmd_move(data, Interp::Ptp).await,
            CommandId::MoveLine => self.cmd_move(data, Interp::Linear).await,
            CommandId::JmovePtp => self.cmd_jmove(data, Interp::Ptp).await,
            CommandId::JmoveLine => self.cmd_jmove(data, Interp::Linear).await,
            CommandId::QjmovePtp => self.cmd_qjmove(data).await,
            CommandId::SpeedPtp => self.cmd_speed_ptp(data).await,
            CommandId::SpeedLine => self.cmd_speed_line(data).await,
            CommandId::Rtoj => self.cmd_to_joints(data).await,
            CommandId::SetTool => self.cmd_set_tool(data).await,
            CommandId::SetBase => self.cmd_set_base(data).await,
            CommandId::SetPosture => self.cmd_set_posture(data).await,
            CommandId::GetPosture => self.cmd_get_posture().await,
            CommandId::Mark => self.cmd_mark().await,
            CommandId::Jmark => self.cmd_jmark().await,
            CommandId::Abort => self.cmd_abort().await,
            CommandId::SysSts => self.cmd_status(data).await,
            CommandId::SetIo => self.cmd_set_io(data).await,
            CommandId::GetIo => self.cmd_get_io(data).await,
            CommandId::SetAdc => self.cmd_set_adc(data).await,
            CommandId::GetAdc => self.cmd_get_adc().await,
            // PROGRAM only exists as a DT=1 request
            CommandId::Program | CommandId::NoCommand => {
                Ok((ReplyCode::CommandError, EMPTY_DATA.to_string()))
            }
        }
    }

    /// Resets the session defaults, forces normal mode, waits out any
    /// in-flight motion, and drives every joint to zero.
    async fn cmd_home(&mut self) -> HandlerResult {
        self.reset_defaults();
        *self.ctx.posture.lock().await = POSTURE_DEFAULT;
        let _ = self.driver.wait_motion().await?;
        let _ = self.driver.change_tool(TOOL_NONE).await?;
        self.ctx
            .motion
            .force_switch(&self.driver, MotionMode::Normal, self.session_id)
            .await?;
        let outcome = self
            .driver
            .joint_move([0.0; 6], self.joint_speed, self.accel_time, self.decel_time)
            .await?;
        Ok(self.unit_reply(outcome))
    }

    async fn cmd_move(&mut self, data: &str, interp: Interp) -> HandlerResult {
        self.enter_mode(MotionMode::Normal).await?;
        let target: CartesianTarget = serde_json::from_str(data)?;
        if let Some(v) = target.accel_time {
            self.accel_time = v;
        }
        if let Some(v) = target.decel_time {
            self.decel_time = v;
        }
        let posture = self.resolve_posture(target.posture).await;
        let pose = target.pose();
        let outcome = match interp {
            Interp::Ptp => {
                if let Some(v) = target.speed {
                    self.joint_speed = v;
                }
                let multi_turn = target.multi_turn_value()?;
                if multi_turn != MULTI_TURN_UNUSED {
                    self.driver
                        .cartesian_ptp_move_ext(
                            pose,
                            posture,
                            multi_turn,
                            IK_OPTION_DEFAULT,
                            self.joint_speed,
                            self.accel_time,
                            self.decel_time,
                        )
                        .await?
                } else {
                    self.driver
                        .cartesian_ptp_move(
                            pose,
                            posture,
                            self.joint_speed,
                            self.accel_time,
                            self.decel_time,
                        )
                        .await?
                }
            }
            Interp::Linear => {
                if let Some(v) = target.speed {
                    self.linear_speed = v;
                }
                self.driver
                    .cartesian_linear_move(
                        pose,
                        posture,
                        self.linear_speed,
                        self.accel_time,
                        self.decel_time,
                    )
                    .await?
            }
        };
        Ok(self.unit_reply(outcome))
    }

    async fn cmd_jmove(&mut self, data: &str, interp: Interp) -> HandlerResult {
        self.enter_mode(MotionMode::Normal).await?;
        let target: JointTarget = serde_json::from_str(data)?;
        if let Some(v) = target.accel_time {
            self.accel_time = v;
        }
        if let Some(v) = target.decel_time {
            self.decel_time = v;
        }
        let outcome = match interp {
            Interp::Ptp => {
                if let Some(v) = target.speed {
                    self.joint_speed = v;
                }
                self.driver
                    .joint_move(
                        target.joints(),
                        self.joint_speed,
                        self.accel_time,
                        self.decel_time,
                    )
                    .await?
            }
            Interp::Linear => {
                if let Some(v) = target.speed {
                    self.linear_speed = v;
                }
                // linear interpolation needs a cartesian goal, so convert
                // the joint target first
                let converted = match self.driver.to_cartesian(target.joints()).await? {
                    Ok(values) => values,
                    Err(fault) => return Ok((self.fault_code(fault), EMPTY_DATA.to_string())),
                };
                let pose = [
                    value_f64(&converted, 0)?,
                    value_f64(&converted, 1)?,
                    value_f64(&converted, 2)?,
                    value_f64(&converted, 3)?,
                    value_f64(&converted, 4)?,
                    value_f64(&converted, 5)?,
                ];
                let posture = value_i64(&converted, 6)? as i32;
                self.driver
                    .cartesian_linear_move(
                        pose,
                        posture,
                        self.linear_speed,
                        self.accel_time,
                        self.decel_time,
                    )
                    .await?
            }
        };
        Ok(self.unit_reply(outcome))
    }

    /// Look-ahead joint move: successive targets are buffered and blended.
    async fn cmd_qjmove(&mut self, data: &str) -> HandlerResult {
        self.enter_mode(MotionMode::Continuous).await?;
        let target: JointTarget = serde_json::from_str(data)?;
        if let Some(v) = target.accel_time {
            self.accel_time = v;
        }
        if let Some(v) = target.decel_time {
            self.decel_time = v;
        }
        if let Some(v) = target.speed {
            self.joint_speed = v;
        }
        let outcome = self
            .driver
            .joint_move(
                target.joints(),
                self.joint_speed,
                self.accel_time,
                self.decel_time,
            )
            .await?;
        Ok(self.unit_reply(outcome))
    }

    async fn cmd_speed_ptp(&mut self, data: &str) -> HandlerResult {
        let request: SpeedSet = serde_json::from_str(data)?;
        if (PTP_SPEED_MIN..=PTP_SPEED_MAX).contains(&request.speed) {
            self.joint_speed = request.speed;
            Ok((ReplyCode::Success, EMPTY_DATA.to_string()))
        } else {
            warn!(
                "session {}: ptp speed {} outside [{}, {}]",
                self.session_id, request.speed, PTP_SPEED_MIN, PTP_SPEED_MAX
            );
            Ok((ReplyCode::DataError, EMPTY_DATA.to_string()))
        }
    }

    async fn cmd_speed_line(&mut self, data: &str) -> HandlerResult {
        let request: SpeedSet = serde_json::from_str(data)?;
        if request.speed > 0.0 {
            self.linear_speed = request.speed;
            Ok((ReplyCode::Success, EMPTY_DATA.to_string()))
        } else {
            warn!(
                "session {}: linear speed {} must be positive",
                self.session_id, request.speed
            );
            Ok((ReplyCode::DataError, EMPTY_DATA.to_string()))
        }
    }

    async fn cmd_to_joints(&mut self, data: &str) -> HandlerResult {
        let target: CartesianTarget = serde_json::from_str(data)?;
        let posture = self.resolve_posture(target.posture).await;
        let outcome = self
            .driver
            .to_joints(target.pose(), posture, MULTI_TURN_UNUSED, IK_OPTION_DEFAULT)
            .await?;
        match outcome {
            Ok(values) => {
                let joints = JointPose::new([
                    value_f64(&values, 0)?,
                    value_f64(&values, 1)?,
                    value_f64(&values, 2)?,
                    value_f64(&values, 3)?,
                    value_f64(&values, 4)?,
                    value_f64(&values, 5)?,
                ]);
                Ok((ReplyCode::Success, serde_json::to_string(&joints)?))
            }
            Err(fault) => Ok((self.fault_code(fault), EMPTY_DATA.to_string())),
        }
    }

    /// Three-step tool-offset change: clear the active offset, store the
    /// new one, activate it. A failed store puts the previously active
    /// tool back so backend state keeps matching what the session
    /// believes.
    async fn cmd_set_tool(&mut self, data: &str) -> HandlerResult {
        let offset: OffsetData = serde_json::from_str(data)?;
        if let Err(fault) = self.driver.change_tool(TOOL_NONE).await? {
            return Ok((self.fault_code(fault), EMPTY_DATA.to_string()));
        }
        let applied = match self
            .driver
            .set_tool_offset(TOOL_ACTIVE, offset.to_array())
            .await
        {
            Ok(result) => result,
            Err(e) => {
                let _ = self.driver.change_tool(self.active_tool).await;
                return Err(e);
            }
        };
        if let Err(fault) = applied {
            let _ = self.driver.change_tool(self.active_tool).await;
            return Ok((self.fault_code(fault), EMPTY_DATA.to_string()));
        }
        let _ = self.driver.change_tool(TOOL_ACTIVE).await?;
        self.active_tool = TOOL_ACTIVE;
        Ok((ReplyCode::Success, EMPTY_DATA.to_string()))
    }

    /// Accepts and validates a base offset. The backend has no base-offset
    /// call; the payload is only checked for shape.
    async fn cmd_set_base(&mut self, data: &str) -> HandlerResult {
        let offset: OffsetData = serde_json::from_str(data)?;
        debug!(
            "session {}: base offset accepted: {:?}",
            self.session_id, offset
        );
        Ok((ReplyCode::Success, EMPTY_DATA.to_string()))
    }

    async fn cmd_set_posture(&mut self, data: &str) -> HandlerResult {
        let request: PostureSet = serde_json::from_str(data)?;
        if (0..=POSTURE_MAX).contains(&request.posture) {
            *self.ctx.posture.lock().await = request.posture;
            Ok((ReplyCode::Success, EMPTY_DATA.to_string()))
        } else {
            warn!(
                "session {}: posture {} outside [0, {}]",
                self.session_id, request.posture, POSTURE_MAX
            );
            Ok((ReplyCode::DataError, EMPTY_DATA.to_string()))
        }
    }

    async fn cmd_get_posture(&mut self) -> HandlerResult {
        let posture = *self.ctx.posture.lock().await;
        let reply = PostureReply { posture };
        Ok((ReplyCode::Success, serde_json::to_string(&reply)?))
    }

    async fn cmd_mark(&mut self) -> HandlerResult {
        let outcome = self.driver.mark().await?;
        match outcome {
            Ok(values) => {
                let pose = CartesianPose::new(
                    [
                        value_f64(&values, 0)?,
                        value_f64(&values, 1)?,
                        value_f64(&values, 2)?,
                        value_f64(&values, 3)?,
                        value_f64(&values, 4)?,
                        value_f64(&values, 5)?,
                    ],
                    value_i64(&values, 6)? as i32,
                );
                Ok((ReplyCode::Success, serde_json::to_string(&pose)?))
            }
            Err(fault) => Ok((self.fault_code(fault), EMPTY_DATA.to_string())),
        }
    }

    async fn cmd_jmark(&mut self) -> HandlerResult {
        let outcome = self.driver.joint_mark().await?;
        match outcome {
            Ok(values) => {
                let joints = JointPose::new([
                    value_f64(&values, 0)?,
                    value_f64(&values, 1)?,
                    value_f64(&values, 2)?,
                    value_f64(&values, 3)?,
                    value_f64(&values, 4)?,
                    value_f64(&values, 5)?,
                ]);
                Ok((ReplyCode::Success, serde_json::to_string(&joints)?))
            }
            Err(fault) => Ok((self.fault_code(fault), EMPTY_DATA.to_string())),
        }
    }

    async fn cmd_abort(&mut self) -> HandlerResult {
        let outcome = self.driver.abort_motion().await?;
        match outcome {
            Ok(values) => {
                let reply = AbortReply {
                    motion_id: value_i64(&values, 0)?,
                };
                Ok((ReplyCode::Success, serde_json::to_string(&reply)?))
            }
            Err(fault) => Ok((self.fault_code(fault), EMPTY_DATA.to_string())),
        }
    }

    async fn cmd_status(&mut self, data: &str) -> HandlerResult {
        let query: StatusQuery = serde_json::from_str(data)?;
        let outcome = self.driver.system_status(query.kind).await?;
        match outcome {
            Ok(values) => {
                let value = values.into_iter().next().ok_or_else(|| {
                    CcError::Payload("status reply carried no value".to_string())
                })?;
                let reply = StatusReply { value };
                Ok((ReplyCode::Success, serde_json::to_string(&reply)?))
            }
            Err(fault) => Ok((self.fault_code(fault), EMPTY_DATA.to_string())),
        }
    }

    async fn cmd_set_io(&mut self, data: &str) -> HandlerResult {
        let request: IoWrite = serde_json::from_str(data)?;
        self.ctx
            .io
            .write_bits(&self.driver, request.address, &request.signal)
            .await?;
        Ok((ReplyCode::Success, EMPTY_DATA.to_string()))
    }

    async fn cmd_get_io(&mut self, data: &str) -> HandlerResult {
        let request: IoRead = serde_json::from_str(data)?;
        let signal = self
            .ctx
            .io
            .read_bits(&self.driver, request.start, request.end)
            .await?;
        let reply = IoReadReply { signal };
        Ok((ReplyCode::Success, serde_json::to_string(&reply)?))
    }

    async fn cmd_set_adc(&mut self, data: &str) -> HandlerResult {
        let request: AdcSet = serde_json::from_str(data)?;
        self.ctx
            .io
            .set_adc(&self.driver, request.channel, request.mode)
            .await?;
        Ok((ReplyCode::Success, EMPTY_DATA.to_string()))
    }

    async fn cmd_get_adc(&mut self) -> HandlerResult {
        let values = self.ctx.io.read_adc(&self.driver).await?;
        let reply = AdcReply { values };
        Ok((ReplyCode::Success, serde_json::to_string(&reply)?))
    }

    /// Flips the session's accel/decel defaults for the target mode and
    /// asks the shared state machine to reconfigure the backend if needed.
    async fn enter_mode(&mut self, mode: MotionMode) -> Result<(), CcError> {
        match mode {
            MotionMode::Normal => {
                self.accel_time = DEFAULT_ACCEL_TIME;
                self.decel_time = DEFAULT_DECEL_TIME;
            }
            MotionMode::Continuous => {
                self.accel_time = 0.0;
                self.decel_time = 0.0;
            }
        }
        self.ctx
            .motion
            .switch_to(&self.driver, mode, self.session_id)
            .await
    }

    async fn resolve_posture(&self, posture: i32) -> i32 {
        if posture == POSTURE_UNSET {
            *self.ctx.posture.lock().await
        } else {
            posture
        }
    }

    pub(crate) fn reset_defaults(&mut self) {
        self.linear_speed = DEFAULT_LINEAR_SPEED;
        self.joint_speed = DEFAULT_JOINT_SPEED;
        self.accel_time = DEFAULT_ACCEL_TIME;
        self.decel_time = DEFAULT_DECEL_TIME;
        self.active_tool = TOOL_NONE;
    }

    fn unit_reply(&self, outcome: CallResult) -> (ReplyCode, String) {
        match outcome {
            Ok(_) => (ReplyCode::Success, EMPTY_DATA.to_string()),
            Err(fault) => (self.fault_code(fault), EMPTY_DATA.to_string()),
        }
    }

    fn fault_code(&self, fault: BackendFault) -> ReplyCode {
        if fault.is_permission_denied() {
            warn!(
                "session {}: backend refused the call, operation permission lost",
                self.session_id
            );
            ReplyCode::OperationNoneError
        } else {
            warn!("session {}: {}", self.session_id, fault);
            ReplyCode::RobotError
        }
    }
}
