use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    TooLarge { len: usize, max: usize },

    #[error("payload truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("{remaining} trailing bytes after the last field")]
    TrailingBytes { remaining: usize },

    #[error("{0} is not valid UTF-8")]
    InvalidUtf8(&'static str),

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("exactly one of the direct and group recipients must be set")]
    InvalidRecipient,

    #[error("timed out waiting for a frame")]
    Timeout,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// Whether the failure came from the transport rather than the bytes.
    /// Transport failures end the connection; decode failures are answered
    /// with a bad-request status.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout)
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
