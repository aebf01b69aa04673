use thiserror::Error;

/// Errors raised by the metering primitives.
///
/// A proof or signature that does not verify is *not* an error: verifiers
/// return `bool` (or a [`crate::schnorr::BatchVerification`] report). The
/// variants below cover malformed inputs, aborted protocol stages and bounded
/// searches that ran out of room.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeteringError {
    #[error("Length mismatch in {context}: expected {expected}, got {actual}")]
    LengthMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Empty input: {0}")]
    EmptyInput(&'static str),

    #[error("Threshold combine needs exactly {expected} share holders, got {actual}")]
    ShareCountMismatch { expected: usize, actual: usize },

    #[error("Share index {0} appears more than once")]
    DuplicateShareIndex(u64),

    #[error("Share index {index} outside 1..={parties}")]
    InvalidShareIndex { index: u64, parties: usize },

    #[error("Partial decryptions from one holder carry index {found}, expected {expected}")]
    InconsistentShareIndex { expected: u64, found: u64 },

    #[error("Invalid threshold parameters: t={threshold}, n={parties}")]
    InvalidThreshold { threshold: usize, parties: usize },

    #[error("Mapping of size {size} is not a permutation")]
    InvalidPermutation { size: usize },

    #[error("Value needs {bits} bits, limit is {limit}")]
    ValueTooLarge { bits: usize, limit: usize },

    #[error("Bit ciphertext {index} does not decrypt to 0 or 1")]
    InvalidBitEncoding { index: usize },

    #[error("Consistency failure in {stage}: accompanying proof rejected")]
    ConsistencyFailure { stage: &'static str },

    #[error("Discrete log not found within bound {bound}")]
    DiscreteLogNotFound { bound: u64 },

    #[error("Discrete log bound {bound} exceeds the supported limit {limit}")]
    DiscreteLogBoundTooLarge { bound: u64, limit: u64 },

    #[error("Could not derive independent generator {index}")]
    GeneratorDerivation { index: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MeteringError {
    pub(crate) fn length_mismatch(context: &'static str, expected: usize, actual: usize) -> Self {
        Self::LengthMismatch {
            context,
            expected,
            actual,
        }
    }

    /// Malformed-input errors are local faults in the caller's data; everything
    /// else signals that a protocol stage must be aborted.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::LengthMismatch { .. }
                | Self::EmptyInput(_)
                | Self::ShareCountMismatch { .. }
                | Self::DuplicateShareIndex(_)
                | Self::InvalidShareIndex { .. }
                | Self::InconsistentShareIndex { .. }
                | Self::InvalidThreshold { .. }
                | Self::InvalidPermutation { .. }
                | Self::ValueTooLarge { .. }
                | Self::InvalidBitEncoding { .. }
                | Self::DiscreteLogBoundTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MeteringError>;
