//! Per-connection session.
//!
//! Each accepted client gets one task that reads framed requests, runs
//! them through its dispatcher, and writes framed replies until the peer
//! goes away. Every decoded request is answered; only transport loss ends
//! the exchange without a reply.

use std::sync::Arc;

use arm_cc::framing::{Frame, MessageReader};
use arm_cc::packets::{DataType, Envelope, Reply};
use arm_cc::{CommandId, ReplyCode};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};

use crate::context::Shared;
use crate::dispatch::Dispatcher;

pub struct Session {
    stream: TcpStream,
    slot: Option<usize>,
    id: u64,
    ctx: Arc<Shared>,
}

impl Session {
    /// `slot` is the session's place in the listener's table; `None`
    /// means every slot was taken and the session runs without connect
    /// permission.
    pub fn new(stream: TcpStream, slot: Option<usize>, id: u64, ctx: Arc<Shared>) -> Self {
        Self {
            stream,
            slot,
            id,
            ctx,
        }
    }

    pub async fn run(self) {
        let Session { stream, slot, id, ctx } = self;

        // Connect permission is the right to hold a live backend handle at
        // all; denied sessions never touch the backend.
        let mut dispatcher = if slot.is_some() {
            match ctx.robot.acquire().await {
                Ok(driver) => Some(Dispatcher::new(id, driver, Arc::clone(&ctx))),
                Err(e) => {
                    error!("session {}: backend unavailable: {}", id, e);
                    return;
                }
            }
        } else {
            None
        };

        let (read_half, mut write_half) = stream.into_split();
        let mut reader = MessageReader::new(read_half);

        loop {
            let frame = match reader.read_message().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("session {}: peer closed", id);
                    break;
                }
                Err(e) => {
                    warn!("session {}: receive failed: {}", id, e);
                    break;
                }
            };
            let reply = handle_frame(id, frame, dispatcher.as_mut()).await;
            let bytes = match reply.encode() {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!("session {}: reply failed to encode: {}", id, e);
                    break;
                }
            };
            if let Err(e) = write_half.write_all(&bytes).await {
                warn!("session {}: send failed: {}", id, e);
                break;
            }
        }

        if dispatcher.is_some() {
            ctx.robot.release().await;
        }
        info!("session {} finished", id);
    }
}

/// Decodes one frame and produces the reply for it. Malformed traffic gets
/// a `DATA_ERROR` reply echoing `NOCOMMAND`; sessions without connect
/// permission get `PROCESS_ERROR` for everything.
async fn handle_frame(id: u64, frame: Frame, dispatcher: Option<&mut Dispatcher>) -> Reply {
    let bytes = frame.into_bytes();
    let envelope: Envelope = match serde_json::from_slice(&bytes) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("session {}: undecodable request: {}", id, e);
            return Reply::empty(u16::from(CommandId::NoCommand), ReplyCode::DataError);
        }
    };
    debug!(
        "session {}: request CD={:#05x} DT={} PR={}",
        id, envelope.command, envelope.data_type, envelope.process
    );

    let Some(dispatcher) = dispatcher else {
        return Reply::empty(envelope.command, ReplyCode::ProcessError);
    };

    match DataType::try_from(envelope.data_type) {
        Ok(DataType::Command) => {
            let (code, data) = dispatcher.dispatch(envelope.command, &envelope.data).await;
            Reply::new(envelope.command, code, data)
        }
        Ok(DataType::Program) if envelope.command == u16::from(CommandId::Program) => {
            let code = dispatcher.run_program(&envelope.data).await;
            Reply::empty(envelope.command, code)
        }
        Ok(DataType::ConnectCheck) => Reply::empty(envelope.command, ReplyCode::Success),
        Ok(DataType::OperationGet) => {
            let code = dispatcher.acquire_operation().await;
            Reply::empty(envelope.command, code)
        }
        _ => {
            warn!(
                "session {}: bad data type {} for CD={:#05x}",
                id, envelope.data_type, envelope.command
            );
            Reply::empty(envelope.command, ReplyCode::DataError)
        }
    }
}
