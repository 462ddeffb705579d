//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Channel connect fails:
//!     → backoff.rs (fixed interval until the next attempt)
//!     → channel manager retries, forever, until connected or shut down
//! ```
//!
//! # Design Decisions
//! - Constant interval; the worker is local, so growth and jitter buy nothing
//! - No retry cap: the front end has no useful work without a worker

pub mod backoff;

pub use backoff::FixedBackoff;
