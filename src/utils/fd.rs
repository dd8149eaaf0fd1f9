//! File descriptor helpers.

use std::io;
use std::os::fd::RawFd;

/// Switch a file descriptor between blocking and non-blocking mode.
pub(crate) fn set_block_mode(fd: RawFd, blocking: bool) -> io::Result<()> {
    // SAFETY: FFI; `fcntl` with `F_GETFL` does not touch memory.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }

    let flags = if blocking {
        flags & !libc::O_NONBLOCK
    } else {
        flags | libc::O_NONBLOCK
    };

    // SAFETY: FFI; `fcntl` with `F_SETFL` does not touch memory.
    let ret = unsafe { libc::fcntl(fd, libc::F_SETFL, flags) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
