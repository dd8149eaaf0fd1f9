use std::fmt;

/// Queue pair state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QpState {
    /// Reset.
    Reset,

    /// Initialized.
    Init,

    /// Ready To Receive.
    Rtr,

    /// Ready To Send.
    Rts,

    /// Error. Outstanding work requests are flushed.
    Error,

    /// Unknown.
    Unknown,
}

impl QpState {
    /// Determine whether the QP has been moved past INIT towards RTS.
    #[inline]
    pub const fn is_past_init(self) -> bool {
        matches!(self, Self::Rtr | Self::Rts)
    }
}

impl fmt::Display for QpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Reset => "RESET",
            Self::Init => "INIT",
            Self::Rtr => "RTR",
            Self::Rts => "RTS",
            Self::Error => "ERR",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// A requested queue pair state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QpTransition {
    /// Move to INIT, bound to the given physical port. Valid from RESET and
    /// ERR for raw packet QPs.
    ToInit {
        /// Physical port number.
        port: u8,
    },

    /// Move from INIT to RTR.
    ToRtr,

    /// Move from RTR to RTS.
    ToRts,

    /// Move to ERR from any state.
    ToError,
}

impl QpTransition {
    /// The state the QP is in after this transition succeeds.
    pub const fn target(self) -> QpState {
        match self {
            Self::ToInit { .. } => QpState::Init,
            Self::ToRtr => QpState::Rtr,
            Self::ToRts => QpState::Rts,
            Self::ToError => QpState::Error,
        }
    }
}
