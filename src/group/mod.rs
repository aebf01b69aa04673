//! Group arithmetic shared by every primitive in the crate.
//!
//! [`PublicParameters`] names the curve, its generator G and the prime order q
//! of the scalar field. It is immutable and passed by reference; nothing in the
//! crate keeps group state in globals.

mod transcript;

pub use transcript::{hash_to_scalar, ChallengeTranscript, HashItem};

use ark_ec::CurveGroup;
use ark_ff::{BigInteger, PrimeField, UniformRand, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};

/// Curve descriptor, generator and (implicitly, through `C::ScalarField`) order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "C: CanonicalSerialize",
    deserialize = "C: CanonicalDeserialize"
))]
pub struct PublicParameters<C: CurveGroup> {
    pub group_label: String,
    #[serde(with = "crate::crypto_serde::curve")]
    pub generator: C,
}

impl<C: CurveGroup> PublicParameters<C> {
    pub fn new(group_label: impl Into<String>) -> Self {
        Self {
            group_label: group_label.into(),
            generator: C::generator(),
        }
    }

    /// The prime order q of the group.
    pub fn order(&self) -> <C::ScalarField as PrimeField>::BigInt {
        C::ScalarField::MODULUS
    }

    pub fn add(&self, lhs: &C, rhs: &C) -> C {
        *lhs + rhs
    }

    pub fn negate(&self, point: &C) -> C {
        -*point
    }

    pub fn scalar_mul(&self, scalar: &C::ScalarField, point: &C) -> C {
        *point * scalar
    }

    /// k·G
    pub fn base_mul(&self, scalar: &C::ScalarField) -> C {
        self.generator * scalar
    }

    /// m·G for a small integer message.
    pub fn encode_message(&self, message: u64) -> C {
        self.generator * C::ScalarField::from(message)
    }

    /// Uniform scalar in [1, q-1].
    pub fn random_scalar<R: Rng + CryptoRng>(&self, rng: &mut R) -> C::ScalarField {
        random_nonzero_scalar::<C::ScalarField, R>(rng)
    }
}

impl<C> PublicParameters<C>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    /// Fresh Fiat–Shamir transcript bound to these parameters.
    pub fn transcript(&self, label: &'static str) -> ChallengeTranscript<C> {
        let mut transcript = ChallengeTranscript::new(label);
        transcript
            .append_str(&self.group_label)
            .append_point(&self.generator);
        transcript
    }

    /// Hash an ordered list of mixed items to a scalar mod q.
    pub fn hash_to_scalar(&self, label: &'static str, items: &[HashItem<'_, C>]) -> C::ScalarField {
        let mut transcript = self.transcript(label);
        for item in items {
            transcript.append(item);
        }
        transcript.challenge_scalar()
    }
}

pub(crate) fn random_nonzero_scalar<F, R>(rng: &mut R) -> F
where
    F: PrimeField,
    R: Rng + CryptoRng,
{
    loop {
        let candidate = F::rand(rng);
        if !candidate.is_zero() {
            return candidate;
        }
    }
}

/// Number of bytes needed for a fixed-width big-endian encoding of `F`.
pub fn field_byte_len<F: PrimeField>() -> usize {
    (F::MODULUS_BIT_SIZE as usize + 7) / 8
}

/// Fixed-width big-endian encoding of a prime-field element.
pub fn encode_field_be<F: PrimeField>(value: &F) -> Vec<u8> {
    let width = field_byte_len::<F>();
    let bytes = value.into_bigint().to_bytes_be();
    // limbs can be wider than the modulus; the surplus leading bytes are zero
    bytes[bytes.len() - width..].to_vec()
}

/// Fixed-width point encoding: `marker ‖ x ‖ y`.
///
/// The marker is 1 for affine points and 0 for the identity, whose coordinate
/// bytes are all zero. Every point of a given curve encodes to the same length.
pub fn encode_point<C>(point: &C) -> Vec<u8>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    use ark_ec::AffineRepr;

    let width = field_byte_len::<C::BaseField>();
    let mut out = Vec::with_capacity(1 + 2 * width);
    match point.into_affine().xy() {
        Some((x, y)) => {
            out.push(1);
            out.extend_from_slice(&encode_field_be(&x));
            out.extend_from_slice(&encode_field_be(&y));
        }
        None => {
            out.push(0);
            out.resize(1 + 2 * width, 0);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{bn254_params, grumpkin_params, test_rng, Curve, Scalar};

    #[test]
    fn point_encoding_is_fixed_width() {
        let params = grumpkin_params();
        let width = field_byte_len::<<Curve as CurveGroup>::BaseField>();

        let small = params.encode_message(1);
        let large = params.base_mul(&-Scalar::from(1u64));
        let identity = Curve::zero();

        assert_eq!(encode_point(&small).len(), 1 + 2 * width);
        assert_eq!(encode_point(&large).len(), 1 + 2 * width);
        assert_eq!(encode_point(&identity).len(), 1 + 2 * width);
        assert_ne!(encode_point(&identity), encode_point(&small));
    }

    #[test]
    fn scalar_encoding_is_fixed_width_big_endian() {
        let encoded = encode_field_be(&Scalar::from(258u64));
        assert_eq!(encoded.len(), field_byte_len::<Scalar>());
        assert_eq!(&encoded[encoded.len() - 2..], &[1, 2]);
        assert!(encoded[..encoded.len() - 2].iter().all(|b| *b == 0));
    }

    #[test]
    fn group_operations_agree() {
        let mut rng = test_rng();
        let params = grumpkin_params();
        let a = params.random_scalar(&mut rng);
        let b = params.random_scalar(&mut rng);

        let pa = params.base_mul(&a);
        let pb = params.base_mul(&b);
        assert_eq!(params.add(&pa, &pb), params.base_mul(&(a + b)));
        assert_eq!(params.add(&pa, &params.negate(&pa)), Curve::zero());
        assert_eq!(params.scalar_mul(&b, &pa), params.base_mul(&(a * b)));
    }

    #[test]
    fn negative_scalars_are_field_negations() {
        let params = grumpkin_params();
        let minus_three = -Scalar::from(3u64);
        assert_eq!(
            params.add(&params.base_mul(&minus_three), &params.encode_message(3)),
            Curve::zero()
        );
    }

    #[test]
    fn random_scalars_are_nonzero_and_distinct() {
        let mut rng = test_rng();
        let params = grumpkin_params();
        let a = params.random_scalar(&mut rng);
        let b = params.random_scalar(&mut rng);
        assert!(!a.is_zero());
        assert_ne!(a, b);
    }

    #[test]
    fn works_over_bn254_too() {
        let params = bn254_params();
        let two = params.encode_message(2);
        assert_eq!(params.add(&params.generator, &params.generator), two);
        assert_eq!(encode_point(&two).len(), 65);
    }
}
