//! Error taxonomy for the WAV codec.

use std::io;

/// Errors produced while reading, writing or patching WAV streams.
#[derive(Debug, thiserror::Error)]
pub enum WavError {
    /// The outer `RIFF`/`WAVE` tags are missing or wrong.
    #[error("malformed RIFF/WAVE container: {0}")]
    MalformedContainer(String),

    /// The format chunk declares an encoding other than PCM (1) or IEEE float (3).
    #[error("unsupported format code: {0}")]
    UnsupportedFormat(u16),

    /// The stream (or requested writer) uses a bit depth outside 8/16/24/32.
    #[error("unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),

    /// Only mono and stereo layouts are handled.
    #[error("unsupported channel count: {0}")]
    UnsupportedChannelCount(u16),

    /// A mandatory sub-chunk was never seen.
    #[error("missing '{0}' chunk")]
    MissingChunk(&'static str),

    /// A chunk is shorter than its fixed layout requires.
    #[error("truncated '{tag}' chunk: need {declared} bytes, {available} available")]
    TruncatedChunk {
        tag: String,
        declared: u32,
        available: u64,
    },

    /// Underlying stream failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The writer reached the ceiling of the 32-bit length field.
    #[error("writer capacity exceeded ({limit} bytes)")]
    CapacityExceeded { limit: u32 },

    /// The sink cannot seek back to rewrite the header.
    #[error("output stream cannot seek back to rewrite the header")]
    NotSeekable,

    /// The writer hit an earlier failure and refuses further writes.
    #[error("writer disabled after an earlier failure")]
    WriterFailed,

    /// Caller supplied inconsistent arguments.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Convenience result type for codec operations.
pub type Result<T> = std::result::Result<T, WavError>;
