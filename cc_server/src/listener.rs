//! Connection acceptor and session slot table.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::context::Shared;
use crate::session::Session;

/// Concurrent sessions that may hold a backend handle.
pub const SESSION_SLOTS: usize = 3;

pub struct Server {
    ctx: Arc<Shared>,
}

impl Server {
    pub fn new(ctx: Arc<Shared>) -> Self {
        Self { ctx }
    }

    pub async fn run(&self) -> Result<(), std::io::Error> {
        let addr = self.ctx.config.listen_addr();
        let listener = TcpListener::bind(&addr).await?;
        info!("listening on {}", addr);
        self.serve(listener).await
    }

    /// Accepts connections until a fatal listener error. Each connection
    /// takes a free slot when one exists; otherwise the session still runs
    /// so liveness checks get answered, but without connect permission.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), std::io::Error> {
        let mut slots: [Option<JoinHandle<()>>; SESSION_SLOTS] =
            std::array::from_fn(|_| None);
        let mut next_session: u64 = 0;

        loop {
            let (stream, peer) = listener.accept().await?;
            next_session += 1;

            // A slot is free when it was never used or its session task
            // has already finished.
            let slot = slots
                .iter()
                .position(|s| s.as_ref().map_or(true, |h| h.is_finished()));
            match slot {
                Some(index) => info!(
                    "session {} from {} takes slot {}",
                    next_session, peer, index
                ),
                None => warn!(
                    "session {} from {} denied connect permission, all slots busy",
                    next_session, peer
                ),
            }

            let session = Session::new(stream, slot, next_session, Arc::clone(&self.ctx));
            let handle = tokio::spawn(session.run());
            if let Some(index) = slot {
                slots[index] = Some(handle);
            }
        }
    }
}
