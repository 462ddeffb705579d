//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! channel.rs (worker channel connected)
//!     → listener.rs (bind + listen, reuse options on)
//!     → accept → connection.rs (greeting, conversion to a handoff message)
//!     → crate::handoff (descriptor sent over the channel)
//!
//! Channel States:
//!     Disconnected → Connected → Disconnected → ...
//! ```
//!
//! # Design Decisions
//! - A listener exists only while the channel is connected
//! - Accepted sockets are owned values; dropping one closes it
//! - Accept errors never take the listener down

pub mod channel;
pub mod connection;
pub mod listener;

pub use channel::{ChannelManager, ChannelState, ConnectOutcome};
pub use connection::{AcceptedConnection, ConnectionId, Greeting};
pub use listener::{AcceptError, Listener, ListenerError};
