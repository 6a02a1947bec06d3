use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("channel count must be at least 1, got {0}")]
    InvalidChannelCount(u32),

    #[error("channel index {index} out of range for {count} channels")]
    ChannelOutOfRange { index: u32, count: u32 },

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
}
