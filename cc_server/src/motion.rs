use arm_cc::backend::BackendDriver;
use arm_cc::errors::CcError;
use tokio::sync::Mutex;
use tracing::info;

/// Overlap distance applied whenever the mode batch is pushed.
pub const DEFAULT_OVERLAP: u32 = 0;
/// Zone value applied whenever the mode batch is pushed.
pub const DEFAULT_ZONE: u32 = 20;
/// Manual-data-override mask covering every axis.
pub const MDO_ALL: u8 = 255;

/// Motion configuration of the manipulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionMode {
    /// Blocking per-call motion.
    Normal,
    /// Streaming look-ahead motion; moves are pre-buffered and blended.
    Continuous,
}

/// Process-wide cache of the last applied motion configuration.
///
/// The physical backend is one shared device, so its configuration is
/// global. Reconfiguring interrupts motion; the cache keeps redundant
/// batches off the wire. An owner change forces reconfiguration even for
/// the same mode label, because the owners' cached numeric defaults may
/// differ.
pub struct MotionModeState {
    last: Mutex<Option<(MotionMode, u64)>>,
}

impl MotionModeState {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(None),
        }
    }

    /// No-op when `(mode, owner)` matches the cache; otherwise waits for
    /// in-flight motion, pushes the configuration batch, and updates the
    /// cache. The lock is held across the batch so switches from different
    /// sessions cannot interleave.
    pub async fn switch_to(
        &self,
        driver: &BackendDriver,
        mode: MotionMode,
        owner: u64,
    ) -> Result<(), CcError> {
        let mut last = self.last.lock().await;
        if *last == Some((mode, owner)) {
            return Ok(());
        }
        let _ = driver.wait_motion().await?;
        let continuous = mode == MotionMode::Continuous;
        let _ = driver.set_look_ahead(continuous).await?;
        let _ = driver.set_pass_through(continuous).await?;
        let _ = driver.set_overlap(DEFAULT_OVERLAP).await?;
        let _ = driver.set_zone(DEFAULT_ZONE).await?;
        let _ = driver.disable_override(MDO_ALL).await?;
        info!("motion mode {:?} configured for session {}", mode, owner);
        *last = Some((mode, owner));
        Ok(())
    }

    /// Forgets the cached configuration, forcing the next switch to push
    /// the full batch. Used after anything that may have reconfigured the
    /// backend behind our back.
    pub async fn invalidate(&self) {
        *self.last.lock().await = None;
    }

    pub async fn force_switch(
        &self,
        driver: &BackendDriver,
        mode: MotionMode,
        owner: u64,
    ) -> Result<(), CcError> {
        self.invalidate().await;
        self.switch_to(driver, mode, owner).await
    }
}

impl Default for MotionModeState {
    fn default() -> Self {
        Self::new()
    }
}
