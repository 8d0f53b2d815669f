use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::ServerConfig;
use crate::dispatch::POSTURE_DEFAULT;
use crate::io::IoPort;
use crate::motion::MotionModeState;
use crate::robot::SharedRobot;

/// State shared by every session: the refcounted backend handle, the
/// process-wide motion-mode cache, the shared posture value, and the
/// digital I/O port. Injected into sessions at construction so the shared
/// pieces are visible rather than global.
pub struct Shared {
    pub config: ServerConfig,
    pub robot: SharedRobot,
    pub motion: MotionModeState,
    pub io: IoPort,
    pub posture: Mutex<i32>,
}

impl Shared {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            robot: SharedRobot::new(config.backend.clone()),
            motion: MotionModeState::new(),
            io: IoPort::new(),
            posture: Mutex::new(POSTURE_DEFAULT),
            config,
        })
    }
}
