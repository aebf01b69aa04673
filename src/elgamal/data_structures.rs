use ark_ec::CurveGroup;
use ark_ff::{PrimeField, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{self, MeteringError};
use crate::group::PublicParameters;
use crate::signing::{append_curve_point, Signable, TranscriptBuilder};

/// Additive ElGamal ciphertext `(C1, C2) = (r·G, r·pk + M)`.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    CanonicalSerialize,
    CanonicalDeserialize,
)]
#[serde(bound(
    serialize = "C: CanonicalSerialize",
    deserialize = "C: CanonicalDeserialize"
))]
pub struct ElGamalCiphertext<C: CurveGroup> {
    #[serde(with = "crate::crypto_serde::curve")]
    pub c1: C,
    #[serde(with = "crate::crypto_serde::curve")]
    pub c2: C,
}

impl<C: CurveGroup> ElGamalCiphertext<C> {
    pub fn new(c1: C, c2: C) -> Self {
        Self { c1, c2 }
    }

    /// `(0, 0)`, the encryption of the identity under zero randomness.
    pub fn identity() -> Self {
        Self::new(C::zero(), C::zero())
    }

    /// Encrypt a message point: `(r·G, M + r·pk)`.
    pub fn encrypt(generator: C, message: C, randomness: C::ScalarField, public_key: C) -> Self {
        Self::new(C::zero(), message).add_encryption_layer(generator, randomness, public_key)
    }

    pub fn add_encryption_layer(&self, generator: C, randomness: C::ScalarField, public_key: C) -> Self {
        Self {
            c1: self.c1 + generator * randomness,
            c2: self.c2 + public_key * randomness,
        }
    }

    /// Component-wise sum: encrypts the sum of the messages.
    pub fn add(&self, other: &Self) -> Self {
        Self::new(self.c1 + other.c1, self.c2 + other.c2)
    }

    /// Component-wise difference: encrypts the difference of the messages.
    pub fn sub(&self, other: &Self) -> Self {
        Self::new(self.c1 - other.c1, self.c2 - other.c2)
    }

    /// Multiplies both components by `k`.
    pub fn scale(&self, k: &C::ScalarField) -> Self {
        Self::new(self.c1 * k, self.c2 * k)
    }

    pub fn is_identity(&self) -> bool {
        self.c1.is_zero() && self.c2.is_zero()
    }
}

impl<C> Signable for ElGamalCiphertext<C>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    fn domain_kind(&self) -> &'static str {
        "elgamal/ciphertext_v1"
    }

    fn write_transcript(&self, builder: &mut TranscriptBuilder) {
        append_curve_point(builder, &self.c1);
        append_curve_point(builder, &self.c2);
    }
}

/// Bitwise encryption of an integer: one ciphertext per bit, most significant
/// bit first. Zero is encoded as the single bit `[0]`.
#[derive(
    Clone, Debug, PartialEq, Eq, Serialize, Deserialize, CanonicalSerialize, CanonicalDeserialize,
)]
#[serde(bound(
    serialize = "C: CanonicalSerialize",
    deserialize = "C: CanonicalDeserialize"
))]
pub struct BitwiseCiphertext<C: CurveGroup> {
    pub bits: Vec<ElGamalCiphertext<C>>,
}

impl<C: CurveGroup> BitwiseCiphertext<C> {
    pub fn new(bits: Vec<ElGamalCiphertext<C>>) -> Self {
        Self { bits }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Bit-by-bit homomorphic difference. Operands must have the same bit length.
    pub fn sub(&self, other: &Self) -> error::Result<Self> {
        if self.len() != other.len() {
            return Err(MeteringError::length_mismatch(
                "bitwise subtraction",
                self.len(),
                other.len(),
            ));
        }
        Ok(Self::new(
            self.bits
                .iter()
                .zip(&other.bits)
                .map(|(lhs, rhs)| lhs.sub(rhs))
                .collect(),
        ))
    }

    /// Fold the bits into one additive ciphertext of `m·G` (Horner over the
    /// MSB-first bits), so bitwise reports can be summed homomorphically.
    pub fn to_additive(&self) -> error::Result<ElGamalCiphertext<C>> {
        if self.is_empty() {
            return Err(MeteringError::EmptyInput("bitwise ciphertext"));
        }
        Ok(self.bits.iter().fold(ElGamalCiphertext::identity(), |acc, bit| {
            acc.add(&acc).add(bit)
        }))
    }
}

impl<C> Signable for BitwiseCiphertext<C>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    fn domain_kind(&self) -> &'static str {
        "elgamal/bitwise_ciphertext_v1"
    }

    fn write_transcript(&self, builder: &mut TranscriptBuilder) {
        builder.append_u64(self.bits.len() as u64);
        for bit in &self.bits {
            bit.write_transcript(builder);
        }
    }
}

/// Single-party key pair. The secret scalar is wiped on drop.
#[derive(Clone, Debug, Zeroize, ZeroizeOnDrop)]
pub struct ElGamalKeys<C: CurveGroup> {
    pub private_key: C::ScalarField,
    #[zeroize(skip)]
    pub public_key: C,
}

impl<C: CurveGroup> ElGamalKeys<C> {
    pub fn new(params: &PublicParameters<C>, private_key: C::ScalarField) -> Self {
        Self {
            private_key,
            public_key: params.base_mul(&private_key),
        }
    }

    /// `sk` uniform in [1, q-1], `pk = sk·G`.
    pub fn generate<R: Rng + CryptoRng>(params: &PublicParameters<C>, rng: &mut R) -> Self {
        Self::new(params, params.random_scalar(rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{grumpkin_params, test_rng, Curve, Scalar};
    use ark_std::UniformRand;

    fn sample_ciphertext() -> ElGamalCiphertext<Curve> {
        let params = grumpkin_params();
        ElGamalCiphertext::new(params.encode_message(5), params.encode_message(5))
    }

    #[test]
    fn ciphertext_signing_bytes_are_deterministic() {
        let cipher_a = sample_ciphertext();
        let cipher_b = cipher_a;
        assert_eq!(cipher_a.to_signing_bytes(), cipher_b.to_signing_bytes());

        let params = grumpkin_params();
        let different = ElGamalCiphertext::new(params.encode_message(7), params.encode_message(11));
        assert_ne!(cipher_a.to_signing_bytes(), different.to_signing_bytes());
    }

    #[test]
    fn homomorphic_add_and_sub_track_messages() {
        let mut rng = test_rng();
        let params = grumpkin_params();
        let keys = ElGamalKeys::generate(&params, &mut rng);
        let g = params.generator;

        let a = ElGamalCiphertext::encrypt(g, params.encode_message(9), Scalar::rand(&mut rng), keys.public_key);
        let b = ElGamalCiphertext::encrypt(g, params.encode_message(4), Scalar::rand(&mut rng), keys.public_key);

        let sum = a.add(&b);
        assert_eq!(sum.c2 - sum.c1 * keys.private_key, params.encode_message(13));

        let diff = a.sub(&b);
        assert_eq!(diff.c2 - diff.c1 * keys.private_key, params.encode_message(5));
    }

    #[test]
    fn bitwise_sub_rejects_mismatched_lengths() {
        let short = BitwiseCiphertext::new(vec![sample_ciphertext()]);
        let long = BitwiseCiphertext::new(vec![sample_ciphertext(); 3]);
        let err = short.sub(&long).unwrap_err();
        assert_eq!(
            err,
            MeteringError::LengthMismatch {
                context: "bitwise subtraction",
                expected: 1,
                actual: 3
            }
        );
    }

    #[test]
    fn to_additive_weights_bits_msb_first() {
        let params = grumpkin_params();
        let one = ElGamalCiphertext::new(Curve::zero(), params.generator);
        let zero = ElGamalCiphertext::<Curve>::identity();
        // 0b110 = 6
        let bitwise = BitwiseCiphertext::new(vec![one, one, zero]);
        let folded = bitwise.to_additive().unwrap();
        assert_eq!(folded.c2, params.encode_message(6));

        assert!(BitwiseCiphertext::<Curve>::new(vec![]).to_additive().is_err());
    }

    #[test]
    fn ciphertext_round_trips_with_serde() {
        crate::test_utils::serde::assert_round_trip_eq(&sample_ciphertext());
        crate::test_utils::serde::assert_round_trip_eq(&BitwiseCiphertext::new(vec![
            sample_ciphertext();
            2
        ]));
    }

    #[test]
    fn ciphertexts_round_trip_canonically() {
        let ct = sample_ciphertext();
        let mut bytes = Vec::new();
        ct.serialize_compressed(&mut bytes).unwrap();
        assert_eq!(ElGamalCiphertext::<Curve>::deserialize_compressed(&bytes[..]).unwrap(), ct);

        let bitwise = BitwiseCiphertext::new(vec![ct, ElGamalCiphertext::identity()]);
        let mut bytes = Vec::new();
        bitwise.serialize_compressed(&mut bytes).unwrap();
        assert_eq!(
            BitwiseCiphertext::<Curve>::deserialize_compressed(&bytes[..]).unwrap(),
            bitwise
        );
    }

    #[test]
    fn zeroize_wipes_the_private_key_only() {
        let mut rng = test_rng();
        let params = grumpkin_params();
        let mut keys = ElGamalKeys::generate(&params, &mut rng);
        let public_key = keys.public_key;

        keys.zeroize();
        assert!(keys.private_key.is_zero());
        assert_eq!(keys.public_key, public_key);
    }
}
