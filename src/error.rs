//! error taxonomy
use std::{fmt, path::PathBuf};

/// Stream kind a codec applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    Video,
    Audio,
    Subtitle,
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => "video".fmt(f),
            Self::Audio => "audio".fmt(f),
            Self::Subtitle => "subtitle".fmt(f),
        }
    }
}

/// Direction of a codec operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecOp {
    Encode,
    Decode,
}

impl fmt::Display for CodecOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode => "encode".fmt(f),
            Self::Decode => "decode".fmt(f),
        }
    }
}

/// Direction of a container operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatOp {
    Mux,
    Demux,
}

impl fmt::Display for FormatOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mux => "mux".fmt(f),
            Self::Demux => "demux".fmt(f),
        }
    }
}

/// Everything that can go wrong driving the external executables.
///
/// `Cancelled` is deliberately distinct from `ExecutionFailed`: callers must
/// be able to tell "I stopped it" from "it broke".
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The executable did not answer a `-version` check.
    #[error("{tool} not found at `{}`", path.display())]
    ToolNotFound { tool: &'static str, path: PathBuf },

    /// The process exited non-zero or failed to spawn.
    #[error("ffmpeg failed ({detail}): `{command}`")]
    ExecutionFailed {
        command: String,
        detail: String,
        /// Full accumulated diagnostic output for postmortem.
        stderr: String,
    },

    /// The conversion was cancelled by the caller.
    #[error("conversion cancelled: `{command}`")]
    Cancelled { command: String },

    #[error("codec `{codec}` is not supported to {op} {kind}")]
    CodecUnsupported {
        codec: String,
        kind: CodecKind,
        op: CodecOp,
    },

    #[error("format `{format}` is not supported to {op}")]
    FormatUnsupported { format: String, op: FormatOp },

    /// A hardware encoder was required but no mapping exists for the codec
    /// under the requested acceleration class.
    #[error("no `{accel}` hardware encoder for codec `{codec}`")]
    HardwareAccelerationUnavailable { codec: String, accel: String },

    /// Pre-flight validation failures, all of them at once.
    #[error("invalid configuration: {}", errors.join(", "))]
    InvalidConfiguration { errors: Vec<String> },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("invalid output: {reason}")]
    InvalidOutput { reason: String },
}
