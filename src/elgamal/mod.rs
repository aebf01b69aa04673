//! Additive ElGamal over a prime-order group, in single-ciphertext and
//! bit-by-bit form, plus threshold decryption.

pub mod data_structures;
pub mod encryption;
pub mod threshold;

pub use data_structures::{BitwiseCiphertext, ElGamalCiphertext, ElGamalKeys};
pub use encryption::{
    bit_decompose, bits_to_u64, bounded_discrete_log, decode_bit_points, decrypt_bitwise,
    decrypt_single, encrypt_bitwise, encrypt_single, encrypt_single_with, keygen,
    DiscreteLogTable, MAX_DECRYPTABLE_BITS, MAX_DISCRETE_LOG_BOUND,
};
pub use threshold::{
    combine_points, combine_single, combine_threshold, keygen_threshold,
    lagrange_coefficients_at_zero, PartialDecryption, ThresholdKeyShare, ThresholdSetup,
};
