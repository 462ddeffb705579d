//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: FrontendConfig → Result<(), Vec<ValidationError>>
//! - Runs before the config is handed to the event loop

use std::fmt;
use std::net::SocketAddr;
use std::os::unix::net::SocketAddr as UnixSocketAddr;

use crate::config::schema::FrontendConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration for values the front end cannot run with.
pub fn validate_config(config: &FrontendConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = config.listener.bind_address.parse::<SocketAddr>() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("invalid socket address {:?}: {}", config.listener.bind_address, e),
        ));
    }

    if config.listener.backlog == 0 {
        errors.push(ValidationError::new("listener.backlog", "must be greater than 0"));
    }

    if config.channel.socket_path.as_os_str().is_empty() {
        errors.push(ValidationError::new("channel.socket_path", "must not be empty"));
    } else if let Err(e) = UnixSocketAddr::from_pathname(&config.channel.socket_path) {
        errors.push(ValidationError::new(
            "channel.socket_path",
            format!("not usable as a unix socket address: {}", e),
        ));
    }

    if config.channel.handoff_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "channel.handoff_timeout_ms",
            "must be greater than 0",
        ));
    }

    if config.event_loop.poll_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "event_loop.poll_timeout_ms",
            "must be greater than 0",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address {:?}", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
