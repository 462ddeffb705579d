//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or built-in defaults
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → FrontendConfig (validated, immutable)
//!     → handed by value to the event loop at startup
//! ```
//!
//! # Design Decisions
//! - Config is read once; the front end keeps no state across restarts
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::ChannelConfig;
pub use schema::EventLoopConfig;
pub use schema::FrontendConfig;
pub use schema::GreetingConfig;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
