//! Handoff message and its validation rules.

use std::io;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::time::Duration;

/// Number of descriptors carried by every message the front end sends.
pub const HANDOFF_FD_COUNT: u8 = 1;

/// Descriptor slots reserved on receive; more than one lets over-delivery show up as a mismatch.
pub const MAX_RECEIVED_FDS: usize = 4;

/// Error type for handoff operations.
#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    #[error("channel I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("channel not writable within {0:?}")]
    Timeout(Duration),

    #[error("channel closed by peer")]
    ChannelClosed,

    #[error("ancillary data truncated by the kernel")]
    Truncated,

    #[error("expected {expected} descriptors but received {received}")]
    CountMismatch { expected: u8, received: usize },

    #[error("message declares {0} descriptors, only single-descriptor handoffs are accepted")]
    UnexpectedCount(u8),
}

/// A count byte plus the descriptors it describes.
///
/// The count is derived from the descriptors held, so a message built here
/// can never disagree with its own ancillary payload.
#[derive(Debug)]
pub struct HandoffMessage {
    fds: Vec<OwnedFd>,
}

impl HandoffMessage {
    /// Message transferring exactly one descriptor.
    pub fn single(fd: OwnedFd) -> Self {
        Self { fds: vec![fd] }
    }

    /// Rebuild a received message, rejecting a count that disagrees with the descriptors.
    pub fn from_received(count: u8, fds: Vec<OwnedFd>) -> Result<Self, HandoffError> {
        if usize::from(count) != fds.len() {
            return Err(HandoffError::CountMismatch {
                expected: count,
                received: fds.len(),
            });
        }
        Ok(Self { fds })
    }

    /// Value of the ordinary payload byte.
    pub fn count(&self) -> u8 {
        // fds.len() never exceeds MAX_RECEIVED_FDS or 1 on the send side.
        self.fds.len() as u8
    }

    pub fn borrowed_fds(&self) -> Vec<BorrowedFd<'_>> {
        self.fds.iter().map(AsFd::as_fd).collect()
    }

    /// Extract the only descriptor of a single-descriptor message.
    pub fn into_single(mut self) -> Result<OwnedFd, HandoffError> {
        if self.fds.len() != usize::from(HANDOFF_FD_COUNT) {
            return Err(HandoffError::UnexpectedCount(self.count()));
        }
        self.fds.pop().ok_or(HandoffError::UnexpectedCount(0))
    }
}
