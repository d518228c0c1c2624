//! Error type shared by every part of the engine.

use crate::family::CodeFamily;
use crate::params::CodeParameters;

/// Errors reported by code construction, size checks and decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A family specific constraint on `(k, m, w, packet_size, buffer_size)`
    /// was violated. Raised before any matrix is built.
    #[error("invalid parameters for {family}: {reason}")]
    InvalidCodeParameters {
        family: CodeFamily,
        reason: String,
    },

    /// Field arithmetic was requested for a word size outside `1..=32`.
    #[error("unsupported field width w={w}, expected 1..=32")]
    UnsupportedFieldWidth { w: usize },

    /// The buffer size is not a multiple of the alignment unit.
    #[error("buffer size {buffer_size} is not aligned to the coding parameters, suggested buffer size: {suggested}")]
    MisalignedBuffer { buffer_size: u64, suggested: u64 },

    /// Aligning the buffer size would make it larger than the input.
    #[error("coding parameters need a buffer of {suggested} bytes but the input only has {total_size}, try a smaller packet size")]
    BufferExceedsInput { suggested: u64, total_size: u64 },

    /// The total size is not a multiple of the buffer size.
    #[error("total size {total_size} is not a multiple of buffer size {buffer_size}, suggested total size: {suggested}")]
    MisalignedFile {
        total_size: u64,
        buffer_size: u64,
        suggested: u64,
    },

    /// A size derived from the parameters does not fit a `u64`.
    #[error("stripe sizes overflow for {params}")]
    SizeOverflow { params: CodeParameters },

    /// More blocks are missing than there are coding blocks.
    #[error("{} erasures but only {m} coding blocks (k={k}, erased={erased:?})", .erased.len())]
    TooManyErasures {
        k: usize,
        m: usize,
        erased: Vec<usize>,
    },

    /// The erasure list has an index out of range, a duplicate or a
    /// malformed sentinel.
    #[error("invalid erasure set: {reason}")]
    InvalidErasureSet { reason: String },

    /// The surviving blocks do not form an invertible system.
    ///
    /// This can only happen for a broken code construction.
    #[error("no invertible decoding matrix (k={k}, m={m}, erased={erased:?})")]
    SingularSubmatrix {
        k: usize,
        m: usize,
        erased: Vec<usize>,
    },

    /// An operand is not below `2^w`.
    #[error("{value} is not an element of GF(2^{w})")]
    InvalidFieldElement { value: u32, w: usize },

    #[error("division by zero in GF(2^{w})")]
    DivideByZero { w: usize },

    /// The supplied stripe buffers do not match the code.
    #[error("invalid buffers: {reason}")]
    InvalidBuffers { reason: String },

    /// A decode plan was replayed on a code it was not built for.
    #[error("decode plan belongs to a different code")]
    PlanMismatch,

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid(family: CodeFamily, reason: impl Into<String>) -> Self {
        Error::InvalidCodeParameters {
            family,
            reason: reason.into(),
        }
    }

    pub(crate) fn buffers(reason: impl Into<String>) -> Self {
        Error::InvalidBuffers {
            reason: reason.into(),
        }
    }
}
