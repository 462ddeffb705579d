//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Parse CLI → Load config → Validate → Install signal handlers → Run loop
//!
//! Signals (signals.rs):
//!     SIGINT/SIGQUIT/SIGTERM → CancellationFlag → loop closes sockets → exit 0
//! ```
//!
//! # Design Decisions
//! - Cancellation is cooperative, bounded by the loop's poll timeout
//! - Setup failures are fatal and exit non-zero

pub mod signals;

pub use signals::{install_signal_handlers, CancellationFlag};
