//! Accept-and-forward event loop.
//!
//! # Data Flow
//! ```text
//! loop:
//!     cancellation flag set?        → close channel + listener, return
//!     channel disconnected?         → connect step (backoff), open listener on success
//!     wait ≤ poll timeout on {listener, channel}:
//!         listener ready            → accept → greet → handoff → close local copy
//!         channel ready             → peer closed: drop listener + channel
//!         timeout                   → next iteration
//! ```
//!
//! # Design Decisions
//! - Single thread, one accepted connection at a time, in readiness order
//! - The listener is checked before the channel when both are ready
//! - Only listener setup failures end the loop with an error

pub mod event_loop;

pub use event_loop::{Frontend, FrontendError};
