//! Descriptor handoff protocol.
//!
//! # Wire Format
//! ```text
//! one sendmsg() on the channel (SOCK_STREAM, AF_UNIX):
//!     iov[0]   = [count: u8]            (always 1 from the front end)
//!     control  = SOL_SOCKET / SCM_RIGHTS carrying `count` descriptors
//! ```
//!
//! The explicit count lets the receiver detect ancillary data that arrived
//! partially or out of step with the payload byte.
//!
//! # Ownership
//! - The sender gives up its descriptor on every path: the message is
//!   consumed by [`send_handoff`] and dropped whether or not the send worked
//! - The receiver wraps every received descriptor in `OwnedFd` before
//!   validating, so rejected messages do not leak

pub mod message;
pub mod unix;

pub use message::{HandoffError, HandoffMessage, HANDOFF_FD_COUNT};
pub use unix::{recv_handoff, send_handoff};
