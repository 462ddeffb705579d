//! The front end's single-threaded readiness loop.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;

use crate::config::FrontendConfig;
use crate::handoff::{send_handoff, HandoffError};
use crate::lifecycle::signals::{is_termination, signal_name, CancellationFlag};
use crate::net::{
    AcceptError, AcceptedConnection, ChannelManager, ConnectOutcome, Greeting, Listener,
    ListenerError,
};
use crate::observability::metrics;

/// Errors that end the loop. Everything else is handled in place.
#[derive(Debug, thiserror::Error)]
pub enum FrontendError {
    #[error("listener setup failed: {0}")]
    Listener(#[from] ListenerError),
}

/// What a readiness wait observed.
#[derive(Debug)]
enum Readiness {
    Accepted(Result<(TcpStream, SocketAddr), AcceptError>),
    ChannelClosed,
    Timeout,
}

/// Owns the channel, the listener and the loop that drives them.
pub struct Frontend {
    config: FrontendConfig,
    channel: ChannelManager,
    listener: Option<Listener>,
    greeting: Greeting,
    cancel: CancellationFlag,
}

impl Frontend {
    pub fn new(config: FrontendConfig, cancel: CancellationFlag) -> Self {
        let channel = ChannelManager::new(&config.channel);
        let greeting = Greeting::for_current_process(&config.greeting.process_name);
        Self {
            config,
            channel,
            listener: None,
            greeting,
            cancel,
        }
    }

    /// Run until a termination signal is observed or the listener cannot be set up.
    ///
    /// The channel and listener are closed before this returns, on both paths.
    pub async fn run(mut self) -> Result<(), FrontendError> {
        tracing::info!(
            pid = std::process::id(),
            channel = %self.channel.socket_path().display(),
            bind_address = %self.config.listener.bind_address,
            "Starting front end"
        );

        let result = self.drive().await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "Encountered fatal error");
        }
        self.shutdown();
        result
    }

    async fn drive(&mut self) -> Result<(), FrontendError> {
        let poll_timeout = self.config.event_loop.poll_timeout();

        loop {
            if let Some(signo) = self.cancel.take() {
                tracing::info!(signal = signal_name(signo), "Processing signal");
                if is_termination(signo) {
                    return Ok(());
                }
                continue;
            }

            if !self.channel.is_connected() {
                match self.channel.try_connect().await {
                    ConnectOutcome::Connected => self.open_listener()?,
                    ConnectOutcome::Wait(delay) => {
                        tokio::time::sleep(delay.min(poll_timeout)).await;
                    }
                }
                continue;
            }

            match self.wait_ready(poll_timeout).await {
                Readiness::Accepted(Ok((stream, peer))) => self.hand_off(stream, peer).await,
                Readiness::Accepted(Err(AcceptError::Transient(_))) => {}
                Readiness::Accepted(Err(AcceptError::Other(e))) => {
                    tracing::warn!(error = %e, "Could not accept connection");
                    metrics::record_accept_error();
                }
                Readiness::ChannelClosed => self.drop_channel(),
                Readiness::Timeout => {}
            }
        }
    }

    fn open_listener(&mut self) -> Result<(), ListenerError> {
        // A stale listener would keep the port bound and break the rebind.
        self.listener = None;
        self.listener = Some(Listener::open(&self.config.listener)?);
        Ok(())
    }

    /// Wait for the listener, then the channel, then the timeout, in that priority.
    async fn wait_ready(&self, timeout: Duration) -> Readiness {
        let Some(channel) = self.channel.stream() else {
            return Readiness::ChannelClosed;
        };

        tokio::select! {
            biased;
            accepted = accept_on(self.listener.as_ref()) => Readiness::Accepted(accepted),
            _ = channel.readable() => Readiness::ChannelClosed,
            _ = tokio::time::sleep(timeout) => Readiness::Timeout,
        }
    }

    /// Greet one accepted connection and transfer it to the worker.
    ///
    /// The connection is consumed here; whatever happens, no local copy
    /// outlives this call.
    ///
    /// The cancellation flag is not checked until this returns, which takes
    /// at most twice the handoff timeout (greeting plus send).
    async fn hand_off(&self, stream: TcpStream, peer: SocketAddr) {
        let mut connection = AcceptedConnection::new(stream, peer);
        let id = connection.id();
        let peer = connection.peer();
        let timeout = self.config.channel.handoff_timeout();
        metrics::record_accept();

        tracing::info!(connection_id = %id, peer = %peer, "Handling connection");

        if let Err(e) = connection.greet(&self.greeting, timeout).await {
            tracing::warn!(connection_id = %id, peer = %peer, error = %e, "Could not send greeting");
        }

        let outcome = match connection.into_handoff_message() {
            Ok(message) => match self.channel.stream() {
                Some(channel) => send_handoff(channel, message, timeout).await,
                None => Err(HandoffError::ChannelClosed),
            },
            Err(e) => Err(HandoffError::Io(e)),
        };

        match outcome {
            Ok(()) => {
                tracing::debug!(connection_id = %id, peer = %peer, "Connection handed off");
                metrics::record_handoff(true);
            }
            Err(e) => {
                tracing::error!(
                    connection_id = %id,
                    peer = %peer,
                    path = %self.channel.socket_path().display(),
                    error = %e,
                    "Could not hand off connection over worker channel"
                );
                metrics::record_handoff(false);
            }
        }

        tracing::info!(connection_id = %id, peer = %peer, "Closing connection");
    }

    fn drop_channel(&mut self) {
        self.listener = None;
        self.channel.disconnect();
    }

    fn shutdown(&mut self) {
        tracing::info!("Shutting down");
        self.listener = None;
        self.channel.close();
    }
}

async fn accept_on(
    listener: Option<&Listener>,
) -> Result<(TcpStream, SocketAddr), AcceptError> {
    match listener {
        Some(listener) => listener.accept().await,
        None => std::future::pending().await,
    }
}
