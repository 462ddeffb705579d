//! Accepted connections and the greeting written to them.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Write the front end's greeting before the handoff
//! - Convert the connection into a handoff message, giving up local ownership

use std::io;
use std::net::SocketAddr;
use std::os::fd::OwnedFd;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::handoff::HandoffMessage;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is enough; only uniqueness is needed.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Text line identifying this front end process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    text: String,
}

impl Greeting {
    pub fn new(process_name: &str, pid: u32) -> Self {
        Self {
            text: format!("Hello from {} on PID ({})!\n", process_name, pid),
        }
    }

    /// Greeting for the current process.
    pub fn for_current_process(process_name: &str) -> Self {
        Self::new(process_name, std::process::id())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// A client connection between accept() and handoff.
///
/// Dropping it closes the local descriptor; [`into_handoff_message`] moves the
/// descriptor into a message instead, so it cannot be handed off twice.
///
/// [`into_handoff_message`]: AcceptedConnection::into_handoff_message
#[derive(Debug)]
pub struct AcceptedConnection {
    id: ConnectionId,
    stream: TcpStream,
    peer: SocketAddr,
}

impl AcceptedConnection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            id: ConnectionId::new(),
            stream,
            peer,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Write the greeting, giving up after `timeout`.
    pub async fn greet(&mut self, greeting: &Greeting, timeout: Duration) -> io::Result<()> {
        match tokio::time::timeout(timeout, self.stream.write_all(greeting.as_bytes())).await {
            Ok(written) => written,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "greeting not written in time",
            )),
        }
    }

    /// Detach the socket from the reactor and wrap it for transfer.
    ///
    /// The descriptor leaves in blocking mode. O_NONBLOCK is shared by every
    /// copy of the descriptor, so the reactor's setting would otherwise reach
    /// the worker.
    pub fn into_handoff_message(self) -> io::Result<HandoffMessage> {
        let std_stream = self.stream.into_std()?;
        std_stream.set_nonblocking(false)?;
        Ok(HandoffMessage::single(OwnedFd::from(std_stream)))
    }
}
