//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! channel / listener / event loop produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stdout via tracing-subscriber
//!     → optional Prometheus scrape endpoint
//! ```

pub mod logging;
pub mod metrics;
