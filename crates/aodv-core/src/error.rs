//! Wire format error types.

/// Errors produced while parsing control messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("empty datagram")]
    Empty,

    #[error("unknown message type: {0:#04x}")]
    UnknownType(u8),

    #[error("message truncated: need {min} bytes, got {actual}")]
    Truncated { min: usize, actual: usize },

    #[error("route error message lists no destinations")]
    EmptyErrorMessage,

    #[error("route error message lists too many destinations: {0}")]
    TooManyDestinations(usize),
}
