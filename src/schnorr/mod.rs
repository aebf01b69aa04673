//! Schnorr signatures and the key-ownership proof (NIZK proof of knowledge of a
//! discrete logarithm).

use ark_ec::CurveGroup;
use ark_ff::PrimeField;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::error::{self, MeteringError};
use crate::group::PublicParameters;

const LOG_TARGET: &str = "zk_metering::schnorr";

const SIGNATURE_LABEL: &str = "schnorr/signature_v1";
const KNOWLEDGE_LABEL: &str = "schnorr/key_ownership_v1";

/// Schnorr signature `(R, s)` with `s·G = R + e·pk`.
#[derive(
    Clone, Debug, PartialEq, Eq, Serialize, Deserialize, CanonicalSerialize, CanonicalDeserialize,
)]
#[serde(bound(
    serialize = "C: CanonicalSerialize",
    deserialize = "C: CanonicalDeserialize"
))]
pub struct SchnorrSignature<C: CurveGroup> {
    #[serde(with = "crate::crypto_serde::curve")]
    pub r: C,
    #[serde(with = "crate::crypto_serde::field")]
    pub s: C::ScalarField,
}

/// Proof that the holder knows `sk` with `pk = sk·G`, bound to a context message.
#[derive(
    Clone, Debug, PartialEq, Eq, Serialize, Deserialize, CanonicalSerialize, CanonicalDeserialize,
)]
#[serde(bound(
    serialize = "C: CanonicalSerialize",
    deserialize = "C: CanonicalDeserialize"
))]
pub struct KeyOwnershipProof<C: CurveGroup> {
    #[serde(with = "crate::crypto_serde::field")]
    pub challenge: C::ScalarField,
    #[serde(with = "crate::crypto_serde::field")]
    pub response: C::ScalarField,
    #[serde(with = "crate::crypto_serde::curve")]
    pub commitment: C,
}

/// Outcome of verifying many signatures under one key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchVerification {
    pub total: usize,
    /// Indices whose signature did not verify, ascending.
    pub failed: Vec<usize>,
}

impl BatchVerification {
    /// The batch passes only if every element passed.
    pub fn is_valid(&self) -> bool {
        self.failed.is_empty()
    }
}

fn signature_challenge<C>(params: &PublicParameters<C>, r: &C, message: &[u8]) -> C::ScalarField
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    let mut transcript = params.transcript(SIGNATURE_LABEL);
    transcript.append_point(r).append_bytes(message);
    transcript.challenge_scalar()
}

fn knowledge_challenge<C>(
    params: &PublicParameters<C>,
    public_key: &C,
    commitment: &C,
    message: &[u8],
) -> C::ScalarField
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    let mut transcript = params.transcript(KNOWLEDGE_LABEL);
    transcript
        .append_point(&params.generator)
        .append_point(public_key)
        .append_point(commitment)
        .append_bytes(message);
    transcript.challenge_scalar()
}

/// `R = k·G`, `e = H(R, msg)`, `s = k + sk·e`.
pub fn sign<C, R>(
    params: &PublicParameters<C>,
    secret_key: &C::ScalarField,
    message: &[u8],
    rng: &mut R,
) -> SchnorrSignature<C>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
    R: Rng + CryptoRng,
{
    let nonce = params.random_scalar(rng);
    let r = params.base_mul(&nonce);
    let e = signature_challenge(params, &r, message);
    SchnorrSignature {
        r,
        s: nonce + *secret_key * e,
    }
}

/// Checks `s·G == R + H(R, msg)·pk`.
pub fn verify<C>(
    params: &PublicParameters<C>,
    public_key: &C,
    message: &[u8],
    signature: &SchnorrSignature<C>,
) -> bool
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    let e = signature_challenge(params, &signature.r, message);
    params.base_mul(&signature.s) == signature.r + *public_key * e
}

/// Sign every message independently with fresh nonces.
#[instrument(target = LOG_TARGET, skip_all, fields(count = messages.len()))]
pub fn sign_batch<C, M, R>(
    params: &PublicParameters<C>,
    secret_key: &C::ScalarField,
    messages: &[M],
    rng: &mut R,
) -> Vec<SchnorrSignature<C>>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
    M: AsRef<[u8]>,
    R: Rng + CryptoRng,
{
    messages
        .iter()
        .map(|message| sign(params, secret_key, message.as_ref(), rng))
        .collect()
}

/// Verify a batch under one key, reporting each failing index.
///
/// Mismatched message/signature counts are malformed input, not a failed check.
#[instrument(target = LOG_TARGET, skip_all, fields(count = messages.len()))]
pub fn verify_batch<C, M>(
    params: &PublicParameters<C>,
    public_key: &C,
    messages: &[M],
    signatures: &[SchnorrSignature<C>],
) -> error::Result<BatchVerification>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
    M: AsRef<[u8]>,
{
    if messages.len() != signatures.len() {
        return Err(MeteringError::length_mismatch(
            "signature batch",
            messages.len(),
            signatures.len(),
        ));
    }

    let failed: Vec<usize> = messages
        .iter()
        .zip(signatures)
        .enumerate()
        .filter(|(_, (message, signature))| {
            !verify(params, public_key, message.as_ref(), signature)
        })
        .map(|(index, _)| index)
        .collect();

    if !failed.is_empty() {
        warn!(target: LOG_TARGET, ?failed, "signature batch has failing entries");
    }

    Ok(BatchVerification {
        total: messages.len(),
        failed,
    })
}

/// `W = r·G`, `c = H(G, pk, W, msg)`, `s = r − c·sk`.
pub fn prove_knowledge<C, R>(
    params: &PublicParameters<C>,
    secret_key: &C::ScalarField,
    public_key: &C,
    message: &[u8],
    rng: &mut R,
) -> KeyOwnershipProof<C>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
    R: Rng + CryptoRng,
{
    let nonce = params.random_scalar(rng);
    let commitment = params.base_mul(&nonce);
    let challenge = knowledge_challenge(params, public_key, &commitment, message);
    KeyOwnershipProof {
        challenge,
        response: nonce - challenge * secret_key,
        commitment,
    }
}

/// Recomputes `W' = s·G + c·pk` and accepts iff `W' == W` and the challenge
/// recomputed from `W'` equals `c`.
pub fn verify_knowledge<C>(
    params: &PublicParameters<C>,
    public_key: &C,
    proof: &KeyOwnershipProof<C>,
    message: &[u8],
) -> bool
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    let recomputed = params.base_mul(&proof.response) + *public_key * proof.challenge;
    if recomputed != proof.commitment {
        return false;
    }
    knowledge_challenge(params, public_key, &recomputed, message) == proof.challenge
}
