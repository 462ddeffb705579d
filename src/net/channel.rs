//! Worker channel state machine.
//!
//! # States
//! ```text
//! Disconnected ──connect ok──▶ Connected ──peer readiness──▶ Disconnected ...
//!      │  ▲
//!      └──┘ connect failed: wait one backoff interval, retry forever
//! ```
//!
//! # Design Decisions
//! - "Connecting" is announced once per cycle, not once per failed attempt
//! - The first attempt of every cycle runs immediately; later ones wait
//!   for the fixed backoff
//! - Waiting never blocks the caller; it reports how long to sleep so the
//!   event loop can keep checking for cancellation

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::net::UnixStream;

use crate::config::ChannelConfig;
use crate::observability::metrics;
use crate::resilience::FixedBackoff;

/// Connection state of the worker channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connected,
}

/// Result of one connect step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The channel is connected; the listener should be opened.
    Connected,
    /// Not connected; do not call again before this much time has passed.
    Wait(Duration),
}

/// Owns the channel socket and its reconnect cycle.
#[derive(Debug)]
pub struct ChannelManager {
    socket_path: PathBuf,
    backoff: FixedBackoff,
    stream: Option<UnixStream>,
    /// Set when a new connection cycle begins and the next step should announce it.
    announce: bool,
    next_attempt: Option<Instant>,
    attempts_in_cycle: u32,
}

impl ChannelManager {
    pub fn new(config: &ChannelConfig) -> Self {
        Self {
            socket_path: config.socket_path.clone(),
            backoff: FixedBackoff::new(config.reconnect_backoff()),
            stream: None,
            announce: true,
            next_attempt: None,
            attempts_in_cycle: 0,
        }
    }

    pub fn state(&self) -> ChannelState {
        if self.stream.is_some() {
            ChannelState::Connected
        } else {
            ChannelState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    /// The connected channel socket, if any.
    pub fn stream(&self) -> Option<&UnixStream> {
        self.stream.as_ref()
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Run one step of the Disconnected state.
    ///
    /// Makes at most one connect attempt, and only once the backoff interval
    /// since the previous failure has elapsed.
    pub async fn try_connect(&mut self) -> ConnectOutcome {
        if self.is_connected() {
            return ConnectOutcome::Connected;
        }

        if self.announce {
            tracing::info!(path = %self.socket_path.display(), "Connecting to worker channel");
            self.announce = false;
        }

        if let Some(at) = self.next_attempt {
            let now = Instant::now();
            if now < at {
                return ConnectOutcome::Wait(at - now);
            }
        }

        self.attempts_in_cycle += 1;
        match UnixStream::connect(&self.socket_path).await {
            Ok(stream) => {
                tracing::info!(
                    path = %self.socket_path.display(),
                    attempts = self.attempts_in_cycle,
                    "Connected to worker channel"
                );
                self.stream = Some(stream);
                self.announce = true;
                self.next_attempt = None;
                self.attempts_in_cycle = 0;
                metrics::record_channel_connected();
                ConnectOutcome::Connected
            }
            Err(e) => {
                tracing::trace!(
                    path = %self.socket_path.display(),
                    attempt = self.attempts_in_cycle,
                    error = %e,
                    "Worker channel unavailable"
                );
                self.next_attempt = Some(self.backoff.next_attempt(Instant::now()));
                ConnectOutcome::Wait(self.backoff.delay())
            }
        }
    }

    /// Tear down the channel after the peer went away.
    ///
    /// The next [`try_connect`](Self::try_connect) starts a new cycle and
    /// attempts immediately.
    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::info!(path = %self.socket_path.display(), "Connection closed on worker channel");
            metrics::record_channel_disconnected();
        }
        self.next_attempt = None;
        self.attempts_in_cycle = 0;
    }

    /// Close the channel during shutdown.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!(path = %self.socket_path.display(), "Worker channel closed");
            metrics::record_channel_disconnected();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::net::UnixListener;
    use tracing::field::{Field, Visit};
    use tracing::subscriber::DefaultGuard;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    const ANNOUNCE: &str = "Connecting to worker channel";
    const UNAVAILABLE: &str = "Worker channel unavailable";

    /// Records the message of every event emitted on this thread.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<String>>>);

    impl Captured {
        fn count(&self, message: &str) -> usize {
            self.0.lock().unwrap().iter().filter(|m| *m == message).count()
        }
    }

    struct MessageVisitor<'a>(&'a mut Option<String>);

    impl Visit for MessageVisitor<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                *self.0 = Some(format!("{:?}", value));
            }
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for Captured {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut message = None;
            event.record(&mut MessageVisitor(&mut message));
            if let Some(message) = message {
                self.0.lock().unwrap().push(message);
            }
        }
    }

    // The tokio test runtime is current-thread, so a thread-local default
    // subscriber sees everything the manager logs.
    fn capture_logs() -> (Captured, DefaultGuard) {
        let captured = Captured::default();
        let guard =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(captured.clone()));
        (captured, guard)
    }

    fn config(path: &Path, backoff_ms: u64) -> ChannelConfig {
        ChannelConfig {
            socket_path: path.to_path_buf(),
            reconnect_backoff_ms: backoff_ms,
            handoff_timeout_ms: 1000,
        }
    }

    #[tokio::test]
    async fn unavailable_worker_announces_once_per_cycle() {
        let (logs, _guard) = capture_logs();
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ChannelManager::new(&config(&dir.path().join("absent.sock"), 0));

        for _ in 0..3 {
            assert_eq!(manager.try_connect().await, ConnectOutcome::Wait(Duration::ZERO));
        }

        assert_eq!(manager.state(), ChannelState::Disconnected);
        assert_eq!(logs.count(UNAVAILABLE), 3);
        assert_eq!(logs.count(ANNOUNCE), 1);
    }

    #[tokio::test]
    async fn failed_attempt_waits_for_backoff() {
        let (logs, _guard) = capture_logs();
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ChannelManager::new(&config(&dir.path().join("absent.sock"), 10_000));

        assert_eq!(
            manager.try_connect().await,
            ConnectOutcome::Wait(Duration::from_secs(10))
        );
        assert_eq!(logs.count(UNAVAILABLE), 1);

        // Still inside the backoff window: no new attempt is made.
        match manager.try_connect().await {
            ConnectOutcome::Wait(remaining) => assert!(remaining > Duration::from_secs(9)),
            other => panic!("expected wait, got {:?}", other),
        }
        assert_eq!(logs.count(UNAVAILABLE), 1);
        assert_eq!(logs.count(ANNOUNCE), 1);
    }

    #[tokio::test]
    async fn reconnect_starts_new_cycle() {
        let (logs, _guard) = capture_logs();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.sock");
        let worker = UnixListener::bind(&path).unwrap();
        let mut manager = ChannelManager::new(&config(&path, 0));

        assert_eq!(manager.try_connect().await, ConnectOutcome::Connected);
        assert!(manager.is_connected());
        let _peer = worker.accept().await.unwrap();

        // Connected: further steps neither announce nor attempt.
        assert_eq!(manager.try_connect().await, ConnectOutcome::Connected);
        assert_eq!(logs.count(ANNOUNCE), 1);

        manager.disconnect();
        assert_eq!(manager.state(), ChannelState::Disconnected);

        assert_eq!(manager.try_connect().await, ConnectOutcome::Connected);
        assert_eq!(logs.count(ANNOUNCE), 2);
        assert_eq!(logs.count("Connected to worker channel"), 2);
    }
}
