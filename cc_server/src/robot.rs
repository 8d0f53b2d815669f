use std::sync::Arc;

use arm_cc::backend::{BackendConfig, BackendDriver};
use arm_cc::errors::CcError;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

struct Inner {
    refcount: usize,
    driver: Option<Arc<BackendDriver>>,
}

/// Reference-counted shared connection to the motion backend.
///
/// The connection is opened and backend-level permission acquired on the
/// first acquire, and closed when the last session releases, no matter how
/// sessions interleave. `driver` is `Some` exactly while `refcount > 0`.
pub struct SharedRobot {
    config: BackendConfig,
    inner: Mutex<Inner>,
}

impl SharedRobot {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                refcount: 0,
                driver: None,
            }),
        }
    }

    /// Returns the shared driver, opening the backend connection if this
    /// is the first active session. A connect failure propagates without
    /// incrementing the count.
    pub async fn acquire(&self) -> Result<Arc<BackendDriver>, CcError> {
        let mut inner = self.inner.lock().await;
        let driver = match inner.driver.as_ref() {
            Some(driver) => Arc::clone(driver),
            None => {
                let driver = Arc::new(BackendDriver::connect(self.config.clone()).await?);
                match driver.acquire_permission().await? {
                    Ok(_) => {}
                    Err(fault) => {
                        warn!("backend permission not granted at open: {}", fault);
                    }
                }
                info!("backend connection opened");
                inner.driver = Some(Arc::clone(&driver));
                driver
            }
        };
        inner.refcount += 1;
        debug!("backend handle acquired ({} active)", inner.refcount);
        Ok(driver)
    }

    /// Drops one reference; the last release closes the backend
    /// connection.
    pub async fn release(&self) {
        let mut inner = self.inner.lock().await;
        match inner.refcount {
            0 => warn!("backend handle released without a matching acquire"),
            1 => {
                inner.refcount = 0;
                if let Some(driver) = inner.driver.take() {
                    if let Err(e) = driver.release_permission().await {
                        warn!("backend permission release failed: {}", e);
                    }
                }
                info!("backend connection closed");
            }
            n => {
                inner.refcount = n - 1;
                debug!("backend handle released ({} active)", inner.refcount);
            }
        }
    }

    pub async fn active_handles(&self) -> usize {
        self.inner.lock().await.refcount
    }
}
