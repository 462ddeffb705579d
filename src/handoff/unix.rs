//! SCM_RIGHTS transport for handoff messages over a Unix stream.

use std::io::{self, ErrorKind};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

use tokio::io::Interest;
use tokio::net::UnixStream;

use crate::handoff::message::{HandoffError, HandoffMessage, MAX_RECEIVED_FDS};

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: libc::c_int = 0;

#[cfg(any(target_os = "linux", target_os = "android"))]
const RECV_FLAGS: libc::c_int = libc::MSG_CMSG_CLOEXEC;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const RECV_FLAGS: libc::c_int = 0;

/// Send `message` over `channel` as one sendmsg() call, then close the local copy.
///
/// No acknowledgment is read back. The message is dropped before returning on
/// every path, so the caller never keeps a descriptor it tried to hand off.
pub async fn send_handoff(
    channel: &UnixStream,
    message: HandoffMessage,
    timeout: Duration,
) -> Result<(), HandoffError> {
    let count = message.count();
    let fds: Vec<RawFd> = message
        .borrowed_fds()
        .iter()
        .map(|fd| fd.as_raw_fd())
        .collect();

    let result = match tokio::time::timeout(timeout, send_when_writable(channel, count, &fds)).await {
        Ok(sent) => sent.map_err(HandoffError::from),
        Err(_) => Err(HandoffError::Timeout(timeout)),
    };

    drop(message);
    result
}

/// Receive one handoff message and return its only descriptor.
pub async fn recv_handoff(channel: &UnixStream) -> Result<OwnedFd, HandoffError> {
    recv_message(channel).await?.into_single()
}

/// Receive one handoff message, validating its count against the ancillary payload.
pub async fn recv_message(channel: &UnixStream) -> Result<HandoffMessage, HandoffError> {
    let raw = recv_when_readable(channel).await?;

    if raw.bytes == 0 && raw.fds.is_empty() {
        return Err(HandoffError::ChannelClosed);
    }
    if raw.truncated {
        return Err(HandoffError::Truncated);
    }

    let count = if raw.bytes == 0 { 0 } else { raw.count };
    HandoffMessage::from_received(count, raw.fds)
}

async fn send_when_writable(channel: &UnixStream, count: u8, fds: &[RawFd]) -> io::Result<()> {
    loop {
        channel.writable().await?;
        match channel.try_io(Interest::WRITABLE, || {
            send_raw(channel.as_raw_fd(), count, fds)
        }) {
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => continue,
            other => return other,
        }
    }
}

async fn recv_when_readable(channel: &UnixStream) -> io::Result<RawMessage> {
    loop {
        channel.readable().await?;
        match channel.try_io(Interest::READABLE, || recv_raw(channel.as_raw_fd())) {
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => continue,
            other => return other,
        }
    }
}

/// What a single recvmsg() produced, before any validation.
#[derive(Debug)]
pub(crate) struct RawMessage {
    pub bytes: usize,
    pub count: u8,
    pub fds: Vec<OwnedFd>,
    pub truncated: bool,
}

/// Control buffer sized for `fd_count` descriptors, aligned for `cmsghdr`.
fn control_buffer(fd_count: usize) -> (Vec<u64>, usize) {
    let data_len = fd_count * std::mem::size_of::<RawFd>();
    // SAFETY: CMSG_SPACE is pure arithmetic on its argument.
    let space = unsafe { libc::CMSG_SPACE(data_len as u32) } as usize;
    (vec![0u64; space.div_ceil(8)], space)
}

/// Write `[count]` with `fds` attached as SCM_RIGHTS in one sendmsg().
///
/// `count` is written as given, which lets tests forge inconsistent messages.
pub(crate) fn send_raw(sock: RawFd, count: u8, fds: &[RawFd]) -> io::Result<()> {
    let payload = [count];
    let mut iov = libc::iovec {
        iov_base: payload.as_ptr() as *mut libc::c_void,
        iov_len: payload.len(),
    };

    // SAFETY: zeroed msghdr is valid before assigning pointers.
    let mut msghdr: libc::msghdr = unsafe { std::mem::zeroed() };
    msghdr.msg_iov = &mut iov;
    msghdr.msg_iovlen = 1;

    let (mut control, space) = control_buffer(fds.len());
    if !fds.is_empty() {
        msghdr.msg_control = control.as_mut_ptr().cast();
        msghdr.msg_controllen = space as _;

        // SAFETY: msghdr points at `control`, which holds CMSG_SPACE bytes.
        let cmsg = unsafe { libc::CMSG_FIRSTHDR(&msghdr) };
        if cmsg.is_null() {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                "failed to build SCM_RIGHTS header",
            ));
        }

        let data_len = std::mem::size_of_val(fds);
        // SAFETY: cmsg points into `control`, which has room for `fds.len()` descriptors.
        unsafe {
            (*cmsg).cmsg_level = libc::SOL_SOCKET;
            (*cmsg).cmsg_type = libc::SCM_RIGHTS;
            (*cmsg).cmsg_len = libc::CMSG_LEN(data_len as u32) as _;
            std::ptr::copy_nonoverlapping(
                fds.as_ptr(),
                libc::CMSG_DATA(cmsg).cast::<RawFd>(),
                fds.len(),
            );
        }
    }

    // SAFETY: msghdr points to live iov and control buffers.
    let n = unsafe { libc::sendmsg(sock, &msghdr, SEND_FLAGS) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    if n == 0 {
        return Err(io::Error::new(ErrorKind::WriteZero, "sendmsg wrote 0 bytes"));
    }
    Ok(())
}

/// Read one count byte plus any SCM_RIGHTS descriptors in one recvmsg().
pub(crate) fn recv_raw(sock: RawFd) -> io::Result<RawMessage> {
    let mut payload = [0u8; 1];
    let mut iov = libc::iovec {
        iov_base: payload.as_mut_ptr().cast(),
        iov_len: payload.len(),
    };

    let (mut control, space) = control_buffer(MAX_RECEIVED_FDS);

    // SAFETY: zeroed msghdr is valid before assigning pointers.
    let mut msghdr: libc::msghdr = unsafe { std::mem::zeroed() };
    msghdr.msg_iov = &mut iov;
    msghdr.msg_iovlen = 1;
    msghdr.msg_control = control.as_mut_ptr().cast();
    msghdr.msg_controllen = space as _;

    // SAFETY: msghdr points to live iov and control buffers.
    let n = unsafe { libc::recvmsg(sock, &mut msghdr, RECV_FLAGS) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }

    let mut fds = Vec::new();
    // SAFETY: the kernel filled `control` and updated msg_controllen to match.
    unsafe {
        let mut cmsg = libc::CMSG_FIRSTHDR(&msghdr);
        while !cmsg.is_null() {
            if (*cmsg).cmsg_level == libc::SOL_SOCKET && (*cmsg).cmsg_type == libc::SCM_RIGHTS {
                let base_len = libc::CMSG_LEN(0) as usize;
                let data_len = ((*cmsg).cmsg_len as usize).saturating_sub(base_len);
                let received = data_len / std::mem::size_of::<RawFd>();
                let data = libc::CMSG_DATA(cmsg).cast::<RawFd>();
                for i in 0..received {
                    let raw = std::ptr::read_unaligned(data.add(i));
                    fds.push(OwnedFd::from_raw_fd(raw));
                }
            }
            cmsg = libc::CMSG_NXTHDR(&msghdr, cmsg);
        }
    }

    Ok(RawMessage {
        bytes: n as usize,
        count: payload[0],
        fds,
        truncated: msghdr.msg_flags & libc::MSG_CTRUNC != 0,
    })
}
