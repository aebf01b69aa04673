use std::collections::HashMap;

use ark_ec::CurveGroup;
use ark_ff::Zero;
use ark_std::rand::{CryptoRng, Rng};
use tracing::{instrument, trace};

use super::data_structures::{BitwiseCiphertext, ElGamalCiphertext, ElGamalKeys};
use crate::error::{MeteringError, Result};
use crate::group::PublicParameters;

const LOG_TARGET: &str = "zk_metering::elgamal";

/// Widest value a bitwise ciphertext can decrypt into.
pub const MAX_DECRYPTABLE_BITS: usize = u64::BITS as usize;

/// Largest `bound` accepted by [`DiscreteLogTable::new`] and [`bounded_discrete_log`].
pub const MAX_DISCRETE_LOG_BOUND: u64 = 1 << 24;

fn check_discrete_log_bound(bound: u64) -> Result<()> {
    if bound > MAX_DISCRETE_LOG_BOUND {
        return Err(MeteringError::DiscreteLogBoundTooLarge {
            bound,
            limit: MAX_DISCRETE_LOG_BOUND,
        });
    }
    Ok(())
}

pub fn keygen<C, R>(params: &PublicParameters<C>, rng: &mut R) -> ElGamalKeys<C>
where
    C: CurveGroup,
    R: Rng + CryptoRng,
{
    ElGamalKeys::generate(params, rng)
}

/// Encrypt `m·G` under `public_key` with fresh randomness.
pub fn encrypt_single<C, R>(
    params: &PublicParameters<C>,
    public_key: &C,
    message: u64,
    rng: &mut R,
) -> ElGamalCiphertext<C>
where
    C: CurveGroup,
    R: Rng + CryptoRng,
{
    let randomness = params.random_scalar(rng);
    encrypt_single_with(params, public_key, message, &randomness)
}

/// Deterministic variant of [`encrypt_single`] for a caller-chosen `r`.
pub fn encrypt_single_with<C: CurveGroup>(
    params: &PublicParameters<C>,
    public_key: &C,
    message: u64,
    randomness: &C::ScalarField,
) -> ElGamalCiphertext<C> {
    ElGamalCiphertext::encrypt(
        params.generator,
        params.encode_message(message),
        *randomness,
        *public_key,
    )
}

/// Most-significant-bit-first binary expansion. Zero expands to `[false]`.
pub fn bit_decompose(value: u64) -> Vec<bool> {
    if value == 0 {
        return vec![false];
    }
    let width = MAX_DECRYPTABLE_BITS - value.leading_zeros() as usize;
    (0..width).rev().map(|shift| (value >> shift) & 1 == 1).collect()
}

/// Inverse of [`bit_decompose`].
pub fn bits_to_u64(bits: &[bool]) -> Result<u64> {
    if bits.len() > MAX_DECRYPTABLE_BITS {
        return Err(MeteringError::ValueTooLarge {
            bits: bits.len(),
            limit: MAX_DECRYPTABLE_BITS,
        });
    }
    Ok(bits.iter().fold(0u64, |acc, bit| (acc << 1) | u64::from(*bit)))
}

/// Encrypt each bit of `value` separately, MSB first.
///
/// When `randomness` is given it is reused for every bit, which makes the
/// output deterministic: two callers encrypting the same value under the same
/// `r` obtain identical ciphertexts. Otherwise each bit draws its own `r`.
#[instrument(target = LOG_TARGET, skip_all, fields(value_bits = tracing::field::Empty))]
pub fn encrypt_bitwise<C, R>(
    params: &PublicParameters<C>,
    public_key: &C,
    value: u64,
    randomness: Option<&C::ScalarField>,
    rng: &mut R,
) -> BitwiseCiphertext<C>
where
    C: CurveGroup,
    R: Rng + CryptoRng,
{
    let bits = bit_decompose(value);
    tracing::Span::current().record("value_bits", bits.len());

    let ciphertexts = bits
        .into_iter()
        .map(|bit| {
            let r = match randomness {
                Some(r) => *r,
                None => params.random_scalar(rng),
            };
            encrypt_single_with(params, public_key, u64::from(bit), &r)
        })
        .collect();
    BitwiseCiphertext::new(ciphertexts)
}

/// Recover the message point `M = C2 - sk·C1`.
pub fn decrypt_single<C: CurveGroup>(secret_key: &C::ScalarField, ciphertext: &ElGamalCiphertext<C>) -> C {
    ciphertext.c2 - ciphertext.c1 * secret_key
}

/// Map a decrypted bit point to its value: identity is 0, G is 1.
pub(crate) fn point_to_bit<C: CurveGroup>(
    params: &PublicParameters<C>,
    point: &C,
    index: usize,
) -> Result<bool> {
    if point.is_zero() {
        Ok(false)
    } else if *point == params.generator {
        Ok(true)
    } else {
        Err(MeteringError::InvalidBitEncoding { index })
    }
}

/// Decode a sequence of decrypted bit points into an integer.
pub fn decode_bit_points<C: CurveGroup>(params: &PublicParameters<C>, points: &[C]) -> Result<u64> {
    if points.is_empty() {
        return Err(MeteringError::EmptyInput("bitwise ciphertext"));
    }
    let bits = points
        .iter()
        .enumerate()
        .map(|(index, point)| point_to_bit(params, point, index))
        .collect::<Result<Vec<_>>>()?;
    bits_to_u64(&bits)
}

/// Decrypt every bit and reassemble the integer. Fails with
/// [`MeteringError::InvalidBitEncoding`] if any bit decrypts to neither 0 nor G.
pub fn decrypt_bitwise<C: CurveGroup>(
    params: &PublicParameters<C>,
    secret_key: &C::ScalarField,
    ciphertext: &BitwiseCiphertext<C>,
) -> Result<u64> {
    let points: Vec<C> = ciphertext
        .bits
        .iter()
        .map(|bit| decrypt_single(secret_key, bit))
        .collect();
    decode_bit_points(params, &points)
}

/// Precomputed `k·G -> k` for `k` in `0..=bound`.
#[derive(Clone, Debug)]
pub struct DiscreteLogTable<C: CurveGroup> {
    bound: u64,
    table: HashMap<C::Affine, u64>,
}

impl<C: CurveGroup> DiscreteLogTable<C> {
    #[instrument(target = LOG_TARGET, skip(params))]
    pub fn new(params: &PublicParameters<C>, bound: u64) -> Result<Self> {
        check_discrete_log_bound(bound)?;
        let mut table = HashMap::with_capacity(bound as usize + 1);
        let mut acc = C::zero();
        for k in 0..=bound {
            table.insert(acc.into_affine(), k);
            acc += params.generator;
        }
        trace!(target: LOG_TARGET, entries = table.len(), "built discrete log table");
        Ok(Self { bound, table })
    }

    pub fn bound(&self) -> u64 {
        self.bound
    }

    pub fn lookup(&self, point: &C) -> Result<u64> {
        self.table
            .get(&point.into_affine())
            .copied()
            .ok_or(MeteringError::DiscreteLogNotFound { bound: self.bound })
    }
}

/// Linear search for `k` in `0..=bound` with `k·G == point`.
pub fn bounded_discrete_log<C: CurveGroup>(
    params: &PublicParameters<C>,
    point: &C,
    bound: u64,
) -> Result<u64> {
    check_discrete_log_bound(bound)?;
    let mut acc = C::zero();
    for k in 0..=bound {
        if acc == *point {
            return Ok(k);
        }
        acc += params.generator;
    }
    Err(MeteringError::DiscreteLogNotFound { bound })
}
