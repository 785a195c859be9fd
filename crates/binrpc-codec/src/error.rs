/// Errors that can occur while encoding or decoding binrpc payloads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// A codec limit is below the accepted floor.
    #[error("invalid codec limit {field} = {value} (min {min})")]
    InvalidLimits {
        field: &'static str,
        value: usize,
        min: usize,
    },

    /// The encoded data would exceed the configured data ceiling.
    #[error("data overflow ({required} bytes, max {max})")]
    Overflow { required: usize, max: usize },

    /// A string length exceeds the configured string ceiling.
    #[error("string overflow ({len} bytes, max {max})")]
    StringOverflow { len: usize, max: usize },

    /// An array count exceeds the configured array ceiling.
    #[error("array overflow ({len} elements, max {max})")]
    ArrayOverflow { len: usize, max: usize },

    /// Not enough input bytes remain for the requested read.
    #[error("truncated input at {pos}: need {needed} bytes, {available} available")]
    Truncated {
        pos: usize,
        needed: usize,
        available: usize,
    },

    /// A positioned write falls outside the bytes written so far.
    #[error("write at {pos} (+{len}) is outside written range {written}")]
    OutOfRange {
        pos: usize,
        len: usize,
        written: usize,
    },

    /// Decoding was attempted over an empty input.
    #[error("empty input buffer")]
    EmptyBuffer,

    /// String content is not valid UTF-8.
    #[error("string at {pos} is not valid utf-8")]
    InvalidUtf8 { pos: usize },
}

impl CodecError {
    /// True for errors caused by a configured ceiling being exceeded.
    pub fn is_overflow(&self) -> bool {
        matches!(
            self,
            Self::Overflow { .. } | Self::StringOverflow { .. } | Self::ArrayOverflow { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
