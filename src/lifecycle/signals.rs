//! OS signal handling and the process-wide cancellation flag.
//!
//! # Responsibilities
//! - Register handlers for SIGINT, SIGQUIT and SIGTERM
//! - Record the received signal number in a [`CancellationFlag`]
//! - Leave every other signal at its default disposition
//!
//! # Design Decisions
//! - Uses Tokio's signal driver; the raw handler only writes a self-pipe
//! - The forwarder performs a single atomic store per delivery
//! - The event loop polls the flag once per iteration and never blocks on it

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};

/// Flag value meaning "no signal pending".
const NO_SIGNAL: i32 = 0;

/// Shared cancellation request, written by the signal path and read by the loop.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    signal: Arc<AtomicI32>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self {
            signal: Arc::new(AtomicI32::new(NO_SIGNAL)),
        }
    }

    /// Record `signo` as the pending cancellation request.
    pub fn raise(&self, signo: i32) {
        self.signal.store(signo, Ordering::SeqCst);
    }

    /// Observe and clear the pending signal, if any.
    pub fn take(&self) -> Option<i32> {
        match self.signal.swap(NO_SIGNAL, Ordering::SeqCst) {
            NO_SIGNAL => None,
            signo => Some(signo),
        }
    }

    /// Observe the pending signal without clearing it.
    pub fn peek(&self) -> Option<i32> {
        match self.signal.load(Ordering::SeqCst) {
            NO_SIGNAL => None,
            signo => Some(signo),
        }
    }
}

/// Whether `signo` requests a graceful shutdown.
pub fn is_termination(signo: i32) -> bool {
    matches!(signo, libc::SIGINT | libc::SIGQUIT | libc::SIGTERM)
}

/// Human-readable name for log lines.
pub fn signal_name(signo: i32) -> &'static str {
    match signo {
        libc::SIGINT => "SIGINT",
        libc::SIGQUIT => "SIGQUIT",
        libc::SIGTERM => "SIGTERM",
        libc::SIGHUP => "SIGHUP",
        _ => "unknown",
    }
}

/// Route SIGINT, SIGQUIT and SIGTERM into `flag`.
///
/// Must be called from within a Tokio runtime. Registration failures are
/// returned before any forwarder is spawned.
pub fn install_signal_handlers(flag: CancellationFlag) -> std::io::Result<()> {
    let kinds = [
        (SignalKind::interrupt(), libc::SIGINT),
        (SignalKind::quit(), libc::SIGQUIT),
        (SignalKind::terminate(), libc::SIGTERM),
    ];

    let mut streams = Vec::with_capacity(kinds.len());
    for (kind, signo) in kinds {
        streams.push((signal(kind)?, signo));
    }

    for (mut stream, signo) in streams {
        let flag = flag.clone();
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                flag.raise(signo);
            }
        });
    }

    tracing::debug!("Signal handlers installed for SIGINT, SIGQUIT, SIGTERM");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn take_clears_pending_signal() {
        let flag = CancellationFlag::new();
        assert_eq!(flag.take(), None);

        flag.raise(libc::SIGTERM);
        assert_eq!(flag.peek(), Some(libc::SIGTERM));
        assert_eq!(flag.take(), Some(libc::SIGTERM));
        assert_eq!(flag.take(), None);
    }

    #[test]
    fn clones_share_state() {
        let flag = CancellationFlag::new();
        let writer = flag.clone();
        writer.raise(libc::SIGINT);
        assert_eq!(flag.peek(), Some(libc::SIGINT));
    }

    #[test]
    fn termination_signals() {
        assert!(is_termination(libc::SIGINT));
        assert!(is_termination(libc::SIGQUIT));
        assert!(is_termination(libc::SIGTERM));
        assert!(!is_termination(libc::SIGHUP));
        assert_eq!(signal_name(libc::SIGQUIT), "SIGQUIT");
    }

    #[tokio::test]
    async fn delivered_signal_sets_flag() {
        let flag = CancellationFlag::new();
        install_signal_handlers(flag.clone()).unwrap();

        // SAFETY: raising SIGQUIT after a handler has been registered for it.
        unsafe {
            libc::raise(libc::SIGQUIT);
        }

        for _ in 0..50 {
            if flag.peek().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(flag.take(), Some(libc::SIGQUIT));
    }
}
