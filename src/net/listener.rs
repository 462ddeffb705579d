//! Public TCP listener.
//!
//! # Responsibilities
//! - Bind the configured address with address and port reuse enabled
//! - Listen with a bounded backlog
//! - Accept connections, separating transient failures from real ones
//!
//! A listener only exists while the worker channel is connected; it is
//! dropped (and the port released) whenever the channel goes away.

use std::io;
use std::net::{AddrParseError, SocketAddr};

use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::config::ListenerConfig;

/// Error type for listener setup. Every variant is fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("invalid bind address {address:?}: {source}")]
    Address {
        address: String,
        source: AddrParseError,
    },

    #[error("could not create socket: {0}")]
    Socket(io::Error),

    #[error("could not set {option}: {source}")]
    SetOption {
        option: &'static str,
        source: io::Error,
    },

    #[error("could not bind to {address}: {source}")]
    Bind { address: SocketAddr, source: io::Error },

    #[error("could not listen on {address}: {source}")]
    Listen { address: SocketAddr, source: io::Error },
}

/// Error type for a single accept() call.
#[derive(Debug, thiserror::Error)]
pub enum AcceptError {
    /// Interrupted or would-block: nothing to accept right now.
    #[error("transient accept failure: {0}")]
    Transient(io::Error),

    #[error("accept failed: {0}")]
    Other(io::Error),
}

impl From<io::Error> for AcceptError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock => AcceptError::Transient(e),
            _ => AcceptError::Other(e),
        }
    }
}

/// The public listening socket.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Create, configure, bind and listen. Must run inside a Tokio runtime.
    pub fn open(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let address: SocketAddr = config.bind_address.parse().map_err(|source| {
            ListenerError::Address {
                address: config.bind_address.clone(),
                source,
            }
        })?;

        let socket = if address.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(ListenerError::Socket)?;

        socket
            .set_reuseaddr(true)
            .map_err(|source| ListenerError::SetOption {
                option: "SO_REUSEADDR",
                source,
            })?;
        socket
            .set_reuseport(true)
            .map_err(|source| ListenerError::SetOption {
                option: "SO_REUSEPORT",
                source,
            })?;

        socket
            .bind(address)
            .map_err(|source| ListenerError::Bind { address, source })?;

        let inner = socket
            .listen(config.backlog)
            .map_err(|source| ListenerError::Listen { address, source })?;

        let local_addr = inner
            .local_addr()
            .map_err(|source| ListenerError::Listen { address, source })?;

        tracing::info!(
            address = %local_addr,
            backlog = config.backlog,
            "Listening"
        );

        Ok(Self { inner, local_addr })
    }

    /// Accept one pending connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), AcceptError> {
        self.inner.accept().await.map_err(AcceptError::from)
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        tracing::info!(address = %self.local_addr, "Listener closed");
    }
}
