use thiserror::Error;

/// Errors from frame encoding and scanning.
///
/// Every variant carries the byte offset it was detected at so corruption
/// can be diagnosed offline. None of them are recoverable by retrying.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("record length {length} exceeds the representable range")]
    LengthOverflow { length: u64 },

    #[error("zero-length record at offset {offset}")]
    ZeroLengthRecord { offset: usize },

    #[error("entity record at offset {offset} has invalid length {length}")]
    InvalidEntityLength { offset: usize, length: i64 },

    #[error("gap at offset {offset} has invalid length {length}")]
    InvalidGapLength { offset: usize, length: u64 },

    #[error("record at offset {offset} spans {length} bytes but only {available} remain")]
    Truncated {
        offset: usize,
        length: u64,
        available: usize,
    },

    #[error("access at offset {offset} needs {needed} bytes but only {available} are available")]
    OutOfBounds {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("payload read at offset {offset} needs {needed} bytes but only {available} remain")]
    PayloadUnderflow {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("malformed list at offset {offset}: {reason}")]
    MalformedList { offset: usize, reason: String },

    #[error("invalid UTF-8 text at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("invalid boolean byte {value:#04x} at offset {offset}")]
    InvalidBool { offset: usize, value: u8 },

    #[error("frame at offset {offset} is a gap, expected an entity")]
    NotAnEntity { offset: usize },

    #[error("expected exactly one record of {expected} bytes, got {actual} bytes")]
    TrailingBytes { expected: u64, actual: usize },
}

pub type FrameResult<T> = Result<T, FrameError>;
