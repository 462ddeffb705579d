//! Connection-handoff front end.
//!
//! Accepts TCP connections and transfers each accepted socket to a worker
//! process over a Unix domain socket with `SCM_RIGHTS`. The front end never
//! speaks the application protocol; it greets, hands off and closes.

pub mod config;
pub mod frontend;
pub mod handoff;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;

pub use config::FrontendConfig;
pub use frontend::{Frontend, FrontendError};
pub use lifecycle::CancellationFlag;
