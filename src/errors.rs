use thiserror::Error;

///
/// Errors surfaced to callers of the grid core. Internal consistency
/// violations (a sweep resolving a point that must exist but does not) are
/// not represented here; they panic where they are detected.
///
#[derive(Debug, Error)]
pub enum SGError
{
    #[error("grid point {0} is already stored")]
    DuplicatePoint(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("coefficient vector has length {actual} but the grid has {expected} points")]
    CoefficientLengthMismatch { expected: usize, actual: usize },

    #[error("invalid level/index pair ({level}, {index})")]
    InvalidLevelIndex { level: u32, index: u32 },

    #[error("invalid sequence number {0}")]
    InvalidSequenceNumber(usize),

    #[error("storage is empty")]
    EmptyStorage,

    #[error("malformed grid description: {0}")]
    MalformedStream(String),

    #[error("serialized grid version {found} is newer than the supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("serialization failed")]
    SerializationFailed,

    #[error("deserialization failed")]
    DeserializationFailed,

    #[error("LZ4 decompression failed")]
    LZ4DecompressionFailed,

    #[error("I/O error: {0}")]
    FileIOError(#[from] std::io::Error),
}
