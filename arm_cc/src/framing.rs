//! Client-side message framing.
//!
//! Requests are single JSON objects with no length prefix, so the only way
//! to find a message boundary is to accumulate bytes and re-parse until the
//! document is complete. `serde_json` reports truncated input distinctly
//! from garbage input, which drives the retry/timeout logic below.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;

use crate::errors::CcError;

/// Bytes requested per read call.
pub const RECV_BUFFER_SIZE: usize = 4096;

/// Bound on continuation reads while the rest of a message is in flight.
/// The first read of a message is not bounded.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of one framed receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// The buffer parsed as one complete JSON document.
    Complete(Vec<u8>),
    /// The buffer stopped being parseable for a reason other than
    /// truncation, or timed out mid-message. The caller answers these with
    /// an error reply instead of dropping the connection.
    Malformed(Vec<u8>),
}

impl Frame {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Frame::Complete(bytes) | Frame::Malformed(bytes) => bytes,
        }
    }
}

enum Parse {
    Complete,
    Incomplete,
    Invalid,
}

fn classify(buf: &[u8]) -> Parse {
    match serde_json::from_slice::<serde_json::Value>(buf) {
        Ok(_) => Parse::Complete,
        Err(e) if e.is_eof() => Parse::Incomplete,
        Err(_) => Parse::Invalid,
    }
}

/// Accumulating reader for framed client requests.
pub struct MessageReader<R> {
    stream: R,
    recv_timeout: Duration,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(stream: R) -> Self {
        Self::with_timeout(stream, RECV_TIMEOUT)
    }

    pub fn with_timeout(stream: R, recv_timeout: Duration) -> Self {
        Self {
            stream,
            recv_timeout,
        }
    }

    /// Reads one framed message. `Ok(None)` is a clean peer close before
    /// any byte of a new message arrived; zero bytes mid-message is a
    /// connection error.
    pub async fn read_message(&mut self) -> Result<Option<Frame>, CcError> {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let mut msg: Vec<u8> = Vec::new();

        let n = self
            .stream
            .read(&mut buf)
            .await
            .map_err(|e| CcError::FailedToReceive(e.to_string()))?;
        if n == 0 {
            return Ok(None);
        }
        msg.extend_from_slice(&buf[..n]);

        loop {
            match classify(&msg) {
                Parse::Complete => return Ok(Some(Frame::Complete(msg))),
                Parse::Invalid => return Ok(Some(Frame::Malformed(msg))),
                Parse::Incomplete => {}
            }

            match timeout(self.recv_timeout, self.stream.read(&mut buf)).await {
                Err(_) => return Ok(Some(Frame::Malformed(msg))),
                Ok(Err(e)) => return Err(CcError::FailedToReceive(e.to_string())),
                Ok(Ok(0)) => return Err(CcError::Disconnected),
                Ok(Ok(n)) => msg.extend_from_slice(&buf[..n]),
            }
        }
    }
}
