//! Chaum–Pedersen discrete-log equality proofs and the two decryption proofs
//! built on them.

use ark_ec::CurveGroup;
use ark_ff::PrimeField;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::elgamal::{ElGamalCiphertext, PartialDecryption, ThresholdKeyShare, ThresholdSetup};
use crate::error;
use crate::group::{ChallengeTranscript, PublicParameters};

const LOG_TARGET: &str = "zk_metering::chaum_pedersen";

const CORRECT_DECRYPTION_LABEL: &str = "decryption/correct_v1";
const PARTIAL_SHARE_LABEL: &str = "decryption/partial_share_v1";

/// Proof that `α = x·g` and `β = x·h` for one secret `x`.
#[derive(
    Clone, Debug, PartialEq, Eq, Serialize, Deserialize, CanonicalSerialize, CanonicalDeserialize,
)]
#[serde(bound(
    serialize = "C: CanonicalSerialize",
    deserialize = "C: CanonicalDeserialize"
))]
pub struct ChaumPedersenProof<C: CurveGroup> {
    /// `T_g = w·g`
    #[serde(with = "crate::crypto_serde::curve")]
    pub t_g: C,
    /// `T_h = w·h`
    #[serde(with = "crate::crypto_serde::curve")]
    pub t_h: C,
    /// `z = w + c·x`
    #[serde(with = "crate::crypto_serde::field")]
    pub z: C::ScalarField,
}

impl<C> ChaumPedersenProof<C>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    /// Prove `log_g(α) = log_h(β)`.
    ///
    /// `transcript` carries the caller's context; the statement and the
    /// commitments are appended here before the challenge is drawn.
    pub fn prove<R: Rng + CryptoRng>(
        params: &PublicParameters<C>,
        transcript: ChallengeTranscript<C>,
        secret: &C::ScalarField,
        g: C,
        h: C,
        rng: &mut R,
    ) -> Self {
        let w = params.random_scalar(rng);
        let t_g = g * w;
        let t_h = h * w;

        let alpha = g * secret;
        let beta = h * secret;
        let challenge = Self::compute_challenge(transcript, &[g, h, alpha, beta], &t_g, &t_h);
        debug!(target: LOG_TARGET, "generated Chaum-Pedersen challenge");

        Self {
            t_g,
            t_h,
            z: w + challenge * secret,
        }
    }

    /// Checks `z·g == T_g + c·α` and `z·h == T_h + c·β`.
    pub fn verify(&self, transcript: ChallengeTranscript<C>, g: C, h: C, alpha: C, beta: C) -> bool {
        let challenge = Self::compute_challenge(transcript, &[g, h, alpha, beta], &self.t_g, &self.t_h);

        let check_g = g * self.z == self.t_g + alpha * challenge;
        let check_h = h * self.z == self.t_h + beta * challenge;
        debug!(target: LOG_TARGET, check_g, check_h, "Chaum-Pedersen verification");
        check_g && check_h
    }

    fn compute_challenge(
        mut transcript: ChallengeTranscript<C>,
        statement: &[C],
        t_g: &C,
        t_h: &C,
    ) -> C::ScalarField {
        transcript
            .append_points(statement)
            .append_point(t_g)
            .append_point(t_h);
        transcript.challenge_scalar()
    }
}

/// Proof that `ciphertext` decrypts to `message` under the key behind `pk`.
#[derive(
    Clone, Debug, PartialEq, Eq, Serialize, Deserialize, CanonicalSerialize, CanonicalDeserialize,
)]
#[serde(bound(
    serialize = "C: CanonicalSerialize",
    deserialize = "C: CanonicalDeserialize"
))]
pub struct CorrectDecryptionProof<C: CurveGroup> {
    #[serde(with = "crate::crypto_serde::curve")]
    pub message: C,
    pub ciphertext: ElGamalCiphertext<C>,
    pub proof: ChaumPedersenProof<C>,
}

fn correct_decryption_transcript<C>(
    params: &PublicParameters<C>,
    ciphertext: &ElGamalCiphertext<C>,
    message: &C,
) -> ChallengeTranscript<C>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    let mut transcript = params.transcript(CORRECT_DECRYPTION_LABEL);
    transcript
        .append_point(&ciphertext.c2)
        .append_point(message);
    transcript
}

/// Chaum–Pedersen proof over bases `(G, C1)` that `pk = sk·G` and
/// `C2 - M = sk·C1`.
pub fn prove_correct_decryption<C, R>(
    params: &PublicParameters<C>,
    message: &C,
    secret_key: &C::ScalarField,
    ciphertext: &ElGamalCiphertext<C>,
    rng: &mut R,
) -> CorrectDecryptionProof<C>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
    R: Rng + CryptoRng,
{
    let transcript = correct_decryption_transcript(params, ciphertext, message);
    let proof = ChaumPedersenProof::prove(
        params,
        transcript,
        secret_key,
        params.generator,
        ciphertext.c1,
        rng,
    );
    CorrectDecryptionProof {
        message: *message,
        ciphertext: *ciphertext,
        proof,
    }
}

pub fn verify_correct_decryption<C>(
    params: &PublicParameters<C>,
    public_key: &C,
    proof: &CorrectDecryptionProof<C>,
) -> bool
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    let transcript = correct_decryption_transcript(params, &proof.ciphertext, &proof.message);
    let valid = proof.proof.verify(
        transcript,
        params.generator,
        proof.ciphertext.c1,
        *public_key,
        proof.ciphertext.c2 - proof.message,
    );
    if !valid {
        warn!(target: LOG_TARGET, "correct-decryption proof rejected");
    }
    valid
}

/// Proof that a partial decryption `D_i = y_i·C1` used the same `y_i` as the
/// holder's verification key `y_i·G`.
#[derive(
    Clone, Debug, PartialEq, Eq, Serialize, Deserialize, CanonicalSerialize, CanonicalDeserialize,
)]
#[serde(bound(
    serialize = "C: CanonicalSerialize",
    deserialize = "C: CanonicalDeserialize"
))]
pub struct PartialShareProof<C: CurveGroup> {
    pub partial: PartialDecryption<C>,
    #[serde(with = "crate::crypto_serde::curve")]
    pub verification_key: C,
    pub proof: ChaumPedersenProof<C>,
}

fn partial_share_transcript<C>(params: &PublicParameters<C>, index: u64) -> ChallengeTranscript<C>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    let mut transcript = params.transcript(PARTIAL_SHARE_LABEL);
    transcript.append_u64(index);
    transcript
}

/// Partial decryption of `ciphertext` together with its DLEQ proof.
pub fn prove_partial_share<C, R>(
    params: &PublicParameters<C>,
    ciphertext: &ElGamalCiphertext<C>,
    share: &ThresholdKeyShare<C>,
    rng: &mut R,
) -> PartialShareProof<C>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
    R: Rng + CryptoRng,
{
    let partial = share.partial_decrypt_single(ciphertext);
    let proof = ChaumPedersenProof::prove(
        params,
        partial_share_transcript(params, share.index),
        share.secret(),
        params.generator,
        ciphertext.c1,
        rng,
    );
    PartialShareProof {
        partial,
        verification_key: share.verification_key,
        proof,
    }
}

/// Checks the proof against the verification key it carries.
pub fn verify_partial_share<C>(
    params: &PublicParameters<C>,
    ciphertext: &ElGamalCiphertext<C>,
    proof: &PartialShareProof<C>,
) -> bool
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    let valid = proof.proof.verify(
        partial_share_transcript(params, proof.partial.index),
        params.generator,
        ciphertext.c1,
        proof.verification_key,
        proof.partial.value,
    );
    if !valid {
        warn!(target: LOG_TARGET, index = proof.partial.index, "partial-share proof rejected");
    }
    valid
}

/// As [`verify_partial_share`], and additionally requires the carried
/// verification key to be the one `setup` published for that index.
pub fn verify_partial_share_for<C>(
    params: &PublicParameters<C>,
    setup: &ThresholdSetup<C>,
    ciphertext: &ElGamalCiphertext<C>,
    proof: &PartialShareProof<C>,
) -> error::Result<bool>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    let registered = setup.verification_key(proof.partial.index)?;
    if *registered != proof.verification_key {
        warn!(
            target: LOG_TARGET,
            index = proof.partial.index,
            "partial share carries an unregistered verification key"
        );
        return Ok(false);
    }
    Ok(verify_partial_share(params, ciphertext, proof))
}
