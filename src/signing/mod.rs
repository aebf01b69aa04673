use ark_ec::CurveGroup;
use ark_ff::PrimeField;
use ark_std::rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};

use crate::group::{encode_point, PublicParameters};
use crate::schnorr::SchnorrSignature;

const DOMAIN_TAG: &[u8] = b"zkmetering/v1";

/// Builder for canonical, length-prefixed transcripts.
///
/// Used both for the bytes a meter signs and, through
/// [`crate::group::ChallengeTranscript`], for Fiat–Shamir inputs.
#[derive(Clone, Debug)]
pub struct TranscriptBuilder {
    buffer: Vec<u8>,
}

impl TranscriptBuilder {
    pub fn new(kind: &'static str) -> Self {
        let mut buffer = Vec::with_capacity(128);
        buffer.extend_from_slice(DOMAIN_TAG);
        buffer.extend_from_slice(&(kind.len() as u16).to_be_bytes());
        buffer.extend_from_slice(kind.as_bytes());
        Self { buffer }
    }

    pub fn append_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn append_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.buffer
            .extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        self.buffer.extend_from_slice(bytes);
    }

    pub fn append_str(&mut self, value: &str) {
        self.append_bytes(value.as_bytes());
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }
}

/// Appends a curve point in its fixed-width `marker ‖ x ‖ y` form.
pub fn append_curve_point<C>(builder: &mut TranscriptBuilder, point: &C)
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    builder.append_bytes(&encode_point(point));
}

/// Values that can be signed into a canonical transcript.
pub trait Signable {
    /// Logical kind string used for domain separation.
    fn domain_kind(&self) -> &'static str;

    /// Append this value's canonical representation into the transcript builder.
    fn write_transcript(&self, builder: &mut TranscriptBuilder);

    /// Obtain canonical signing bytes.
    fn to_signing_bytes(&self) -> Vec<u8> {
        let mut builder = TranscriptBuilder::new(self.domain_kind());
        self.write_transcript(&mut builder);
        builder.finish()
    }
}

/// A signed envelope carrying a signable value, its Schnorr signature, and the
/// exact transcript bytes that were signed.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound(
    serialize = "T: Serialize, C: ark_serialize::CanonicalSerialize",
    deserialize = "T: Deserialize<'de>, C: ark_serialize::CanonicalDeserialize"
))]
pub struct WithSignature<C, T>
where
    C: CurveGroup,
    T: Signable,
{
    pub value: T,
    pub signature: SchnorrSignature<C>,
    /// Canonical bytes used for signing/verification.
    #[serde(with = "hex_bytes")]
    pub transcript: Vec<u8>,
}

impl<C, T> WithSignature<C, T>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
    T: Signable,
{
    /// Sign `value` under `secret_key`; the transcript is the value's
    /// `to_signing_bytes`.
    pub fn new<R: Rng + CryptoRng>(
        params: &PublicParameters<C>,
        value: T,
        secret_key: &C::ScalarField,
        rng: &mut R,
    ) -> Self {
        let transcript = value.to_signing_bytes();
        let signature = crate::schnorr::sign(params, secret_key, &transcript, rng);
        Self {
            value,
            signature,
            transcript,
        }
    }

    /// Check the signature, and that the carried transcript really is the
    /// canonical encoding of the carried value.
    pub fn verify(&self, params: &PublicParameters<C>, public_key: &C) -> bool {
        if self.transcript != self.value.to_signing_bytes() {
            return false;
        }
        crate::schnorr::verify(params, public_key, &self.transcript, &self.signature)
    }
}

mod hex_bytes {
    use serde::de::Error as DeError;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(DeError::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{grumpkin_params, test_rng, Curve, Scalar};
    use ark_std::UniformRand;

    #[derive(Clone, Debug)]
    struct Reading(u64);

    impl Signable for Reading {
        fn domain_kind(&self) -> &'static str {
            "test/reading_v1"
        }

        fn write_transcript(&self, builder: &mut TranscriptBuilder) {
            builder.append_u64(self.0);
        }
    }

    struct Tariff(u64);

    impl Signable for Tariff {
        fn domain_kind(&self) -> &'static str {
            "test/tariff_v1"
        }

        fn write_transcript(&self, builder: &mut TranscriptBuilder) {
            builder.append_u64(self.0);
        }
    }

    #[test]
    fn length_prefix_keeps_split_strings_apart() {
        let mut left = TranscriptBuilder::new("test");
        left.append_str("1");
        left.append_str("23");

        let mut right = TranscriptBuilder::new("test");
        right.append_str("12");
        right.append_str("3");

        assert_ne!(left.finish(), right.finish());
    }

    #[test]
    fn kind_is_part_of_the_transcript() {
        assert_ne!(Reading(7).to_signing_bytes(), Tariff(7).to_signing_bytes());
        assert_eq!(Reading(7).to_signing_bytes(), Reading(7).to_signing_bytes());
    }

    #[test]
    fn signed_envelope_verifies_and_rejects_swapped_value() {
        let mut rng = test_rng();
        let params = grumpkin_params();
        let sk = Scalar::rand(&mut rng);
        let pk: Curve = params.generator * sk;

        let envelope = WithSignature::new(&params, Reading(42), &sk, &mut rng);
        assert!(envelope.verify(&params, &pk));

        let mut forged = envelope.clone();
        forged.value = Reading(43);
        assert!(!forged.verify(&params, &pk));

        let other_pk = params.generator * Scalar::rand(&mut rng);
        assert!(!envelope.verify(&params, &other_pk));
    }
}
