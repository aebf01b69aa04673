//! Terelius–Wikström proof of shuffle for lists of group elements.
//!
//! Statement: `outputs[ψ(i)] = inputs[i] + r_i·G` for a secret permutation ψ
//! and secret scalars `r_i`. Writing `e_i` for the Fiat–Shamir challenges and
//! `e'_k = e_{ψ⁻¹(k)}`, the prover commits to ψ with
//! `u_i = c_i·g + h_{ψ(i)}`, builds the chain
//! `B_0 = h_0`, `B_k = b_k·g + e'_k·B_{k-1}`, and proves knowledge of openings
//! for five relations:
//!
//! - `A = Σ e_i·u_i = a·g + Σ e'_k·h_k`
//! - `B_k = b_k·g + e'_k·B_{k-1}` for every `k`
//! - `C = Σ u_i - Σ h_k = c·g`
//! - `D = B_N - (Π e_i)·h_0 = d·g`
//! - `F = Σ e_i·inputs_i = Σ e'_k·outputs_k - f·G`
//!
//! with one Schnorr-style response per witness under a single challenge `v`.

use ark_ec::CurveGroup;
use ark_ff::{One, PrimeField, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::generators::derive_generators;
use super::ShuffleWitness;
use crate::error::{self, MeteringError};
use crate::group::{ChallengeTranscript, PublicParameters};

const LOG_TARGET: &str = "zk_metering::shuffling::proof";

const SHUFFLE_LABEL: &str = "shuffle/proof_v1";

#[derive(
    Clone, Debug, PartialEq, Eq, Serialize, Deserialize, CanonicalSerialize, CanonicalDeserialize,
)]
#[serde(bound(
    serialize = "C: CanonicalSerialize",
    deserialize = "C: CanonicalDeserialize"
))]
pub struct ShuffleProof<C: CurveGroup> {
    /// `h_0..h_{N-1}`, re-derived and compared by the verifier.
    #[serde(with = "crate::crypto_serde::curve_vec")]
    pub generators: Vec<C>,
    /// `u_i`, Pedersen commitments to the permutation.
    #[serde(with = "crate::crypto_serde::curve_vec")]
    pub permutation_commitments: Vec<C>,
    /// `B_1..B_N`
    #[serde(with = "crate::crypto_serde::curve_vec")]
    pub chain_commitments: Vec<C>,
    #[serde(with = "crate::crypto_serde::curve")]
    pub t_a: C,
    #[serde(with = "crate::crypto_serde::curve_vec")]
    pub t_chain: Vec<C>,
    #[serde(with = "crate::crypto_serde::curve")]
    pub t_c: C,
    #[serde(with = "crate::crypto_serde::curve")]
    pub t_d: C,
    #[serde(with = "crate::crypto_serde::curve")]
    pub t_f: C,
    #[serde(with = "crate::crypto_serde::field")]
    pub s_a: C::ScalarField,
    #[serde(with = "crate::crypto_serde::field")]
    pub s_c: C::ScalarField,
    #[serde(with = "crate::crypto_serde::field")]
    pub s_d: C::ScalarField,
    #[serde(with = "crate::crypto_serde::field")]
    pub s_f: C::ScalarField,
    /// Responses for the chain openings `b_k`.
    #[serde(with = "crate::crypto_serde::field_vec")]
    pub s_chain: Vec<C::ScalarField>,
    /// Responses for the permuted challenges `e'_k`.
    #[serde(with = "crate::crypto_serde::field_vec")]
    pub s_permuted: Vec<C::ScalarField>,
}

/// Transcript shared by the per-index challenges `e_i` and the final `v`.
fn statement_transcript<C>(
    params: &PublicParameters<C>,
    aux: &[u8],
    generators: &[C],
    inputs: &[C],
    outputs: &[C],
    permutation_commitments: &[C],
) -> ChallengeTranscript<C>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    let mut transcript = params.transcript(SHUFFLE_LABEL);
    transcript
        .append_bytes(aux)
        .append_points(generators)
        .append_points(inputs)
        .append_points(outputs)
        .append_points(permutation_commitments);
    transcript
}

#[allow(clippy::too_many_arguments)]
fn final_challenge<C>(
    statement: &ChallengeTranscript<C>,
    chain_commitments: &[C],
    t_a: &C,
    t_chain: &[C],
    t_c: &C,
    t_d: &C,
    t_f: &C,
) -> C::ScalarField
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    let mut transcript = statement.clone();
    transcript
        .append_points(chain_commitments)
        .append_point(t_a)
        .append_points(t_chain)
        .append_point(t_c)
        .append_point(t_d)
        .append_point(t_f);
    transcript.challenge_scalar()
}

fn inner_product<C: CurveGroup>(scalars: &[C::ScalarField], points: &[C]) -> C {
    scalars
        .iter()
        .zip(points)
        .fold(C::zero(), |acc, (scalar, point)| acc + *point * scalar)
}

/// Prove that `outputs` is a shuffle of `inputs` under `witness`, binding `aux`.
#[instrument(target = LOG_TARGET, skip_all, fields(size = inputs.len()))]
pub fn gen_proof<C, R>(
    params: &PublicParameters<C>,
    inputs: &[C],
    outputs: &[C],
    witness: &ShuffleWitness<C>,
    aux: &[u8],
    rng: &mut R,
) -> error::Result<ShuffleProof<C>>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
    R: Rng + CryptoRng,
{
    let n = inputs.len();
    if n == 0 {
        return Err(MeteringError::EmptyInput("shuffle inputs"));
    }
    if outputs.len() != n {
        return Err(MeteringError::length_mismatch("shuffle outputs", n, outputs.len()));
    }
    if witness.len() != n {
        return Err(MeteringError::length_mismatch("shuffle witness", n, witness.len()));
    }
    let permutation = &witness.permutation;
    let g = params.generator;
    let generators = derive_generators(params, aux, n)?;

    // commit to ψ
    let commitment_openings: Vec<C::ScalarField> = (0..n).map(|_| params.random_scalar(rng)).collect();
    let permutation_commitments: Vec<C> = (0..n)
        .map(|i| g * commitment_openings[i] + generators[permutation.image(i)])
        .collect();

    let statement = statement_transcript(params, aux, &generators, inputs, outputs, &permutation_commitments);
    let challenges: Vec<C::ScalarField> = (0..n).map(|i| statement.indexed_challenge(i as u64)).collect();
    let permuted: Vec<C::ScalarField> = (0..n).map(|k| challenges[permutation.preimage(k)]).collect();

    // chain B_k = b_k·g + e'_k·B_{k-1}, with d tracking the g-coefficient of B_N
    let chain_openings: Vec<C::ScalarField> = (0..n).map(|_| params.random_scalar(rng)).collect();
    let mut chain_commitments = Vec::with_capacity(n);
    let mut previous = generators[0];
    let mut d = C::ScalarField::zero();
    for k in 0..n {
        let link = g * chain_openings[k] + previous * permuted[k];
        chain_commitments.push(link);
        previous = link;
        d = chain_openings[k] + permuted[k] * d;
    }

    let a: C::ScalarField = commitment_openings.iter().zip(&challenges).map(|(c, e)| *c * e).sum();
    let c: C::ScalarField = commitment_openings.iter().sum();
    let f: C::ScalarField = witness.randomness.iter().zip(&challenges).map(|(r, e)| *r * e).sum();

    // commitments
    let alpha = params.random_scalar(rng);
    let gamma = params.random_scalar(rng);
    let delta = params.random_scalar(rng);
    let phi = params.random_scalar(rng);
    let betas: Vec<C::ScalarField> = (0..n).map(|_| params.random_scalar(rng)).collect();
    let epsilons: Vec<C::ScalarField> = (0..n).map(|_| params.random_scalar(rng)).collect();

    let t_a = g * alpha + inner_product(&epsilons, &generators);
    let t_chain: Vec<C> = (0..n)
        .map(|k| {
            let prior = if k == 0 { generators[0] } else { chain_commitments[k - 1] };
            g * betas[k] + prior * epsilons[k]
        })
        .collect();
    let t_c = g * gamma;
    let t_d = g * delta;
    let t_f = inner_product(&epsilons, outputs) - g * phi;

    let v = final_challenge(&statement, &chain_commitments, &t_a, &t_chain, &t_c, &t_d, &t_f);
    debug!(target: LOG_TARGET, "derived shuffle challenge");

    Ok(ShuffleProof {
        generators,
        permutation_commitments,
        chain_commitments,
        t_a,
        t_chain,
        t_c,
        t_d,
        t_f,
        s_a: v * a + alpha,
        s_c: v * c + gamma,
        s_d: v * d + delta,
        s_f: v * f + phi,
        s_chain: chain_openings.iter().zip(&betas).map(|(b, beta)| v * b + beta).collect(),
        s_permuted: permuted.iter().zip(&epsilons).map(|(e, eps)| v * e + eps).collect(),
    })
}

/// Verify a shuffle proof. Returns `Ok(false)` for a proof that does not
/// verify and `Err` only when the proof or statement is malformed.
#[instrument(target = LOG_TARGET, skip_all, fields(size = inputs.len()))]
pub fn verify_proof<C>(
    params: &PublicParameters<C>,
    proof: &ShuffleProof<C>,
    inputs: &[C],
    outputs: &[C],
    aux: &[u8],
) -> error::Result<bool>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    let n = inputs.len();
    if n == 0 {
        return Err(MeteringError::EmptyInput("shuffle inputs"));
    }
    for (context, actual) in [
        ("shuffle outputs", outputs.len()),
        ("shuffle proof generators", proof.generators.len()),
        ("shuffle proof permutation commitments", proof.permutation_commitments.len()),
        ("shuffle proof chain commitments", proof.chain_commitments.len()),
        ("shuffle proof chain nonces", proof.t_chain.len()),
        ("shuffle proof chain responses", proof.s_chain.len()),
        ("shuffle proof permuted responses", proof.s_permuted.len()),
    ] {
        if actual != n {
            return Err(MeteringError::length_mismatch(context, n, actual));
        }
    }

    let generators = derive_generators(params, aux, n)?;
    if generators != proof.generators {
        warn!(target: LOG_TARGET, "shuffle proof carries foreign generators");
        return Ok(false);
    }

    let g = params.generator;
    let statement = statement_transcript(
        params,
        aux,
        &generators,
        inputs,
        outputs,
        &proof.permutation_commitments,
    );
    let challenges: Vec<C::ScalarField> = (0..n).map(|i| statement.indexed_challenge(i as u64)).collect();
    let v = final_challenge(
        &statement,
        &proof.chain_commitments,
        &proof.t_a,
        &proof.t_chain,
        &proof.t_c,
        &proof.t_d,
        &proof.t_f,
    );

    let a = inner_product(&challenges, &proof.permutation_commitments);
    let c = proof.permutation_commitments.iter().copied().sum::<C>() - generators.iter().copied().sum::<C>();
    let challenge_product: C::ScalarField = challenges.iter().fold(C::ScalarField::one(), |acc, e| acc * e);
    let d = proof.chain_commitments[n - 1] - generators[0] * challenge_product;
    let f = inner_product(&challenges, inputs);

    let permutation_check = a * v + proof.t_a == g * proof.s_a + inner_product(&proof.s_permuted, &generators);
    let chain_check = (0..n).all(|k| {
        let prior = if k == 0 { generators[0] } else { proof.chain_commitments[k - 1] };
        proof.chain_commitments[k] * v + proof.t_chain[k]
            == g * proof.s_chain[k] + prior * proof.s_permuted[k]
    });
    let sum_check = c * v + proof.t_c == g * proof.s_c;
    let product_check = d * v + proof.t_d == g * proof.s_d;
    let rerandomization_check =
        f * v + proof.t_f == inner_product(&proof.s_permuted, outputs) - g * proof.s_f;

    let valid = permutation_check && chain_check && sum_check && product_check && rerandomization_check;
    if !valid {
        warn!(
            target: LOG_TARGET,
            permutation_check,
            chain_check,
            sum_check,
            product_check,
            rerandomization_check,
            "shuffle proof rejected"
        );
    }
    Ok(valid)
}
