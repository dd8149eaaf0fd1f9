//! Interoperability with C-style verbs error codes.

use std::io;

/// Explain the errno returned by a rejected `post_send`/`post_recv` call.
///
/// Return `None` if the error does not carry an errno that verbs documents
/// for posting.
#[inline]
pub(crate) fn explain_post_error(err: &io::Error) -> Option<&'static str> {
    match err.raw_os_error()? {
        libc::EINVAL => Some("invalid work request"),
        libc::ENOMEM => Some("queue is full, or not enough resources to complete this operation"),
        libc::EFAULT => Some("invalid QP"),
        _ => None,
    }
}

/// Determine whether an error indicates that the device is no longer
/// reachable (`EIO`), in which case polling it again is pointless.
#[inline]
pub(crate) fn is_device_io_error(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EIO)
}
