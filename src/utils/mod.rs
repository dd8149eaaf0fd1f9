/// Provide interoperability with C-style verbs error codes.
pub(crate) mod interop;

/// Provide file descriptor mode switching.
pub(crate) mod fd;

/// Warn about drain loops that spin for too long.
pub(crate) mod spin;
