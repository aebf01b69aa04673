//! Verifiable re-randomizing shuffle of group elements.
//!
//! [`shuffle`] permutes and re-randomizes a list of points, [`gen_proof`]
//! proves it was done honestly without revealing the permutation or the
//! randomness, and [`verify_proof`] checks the proof against the public lists.

mod generators;
mod permutation;
mod proof;

pub use generators::derive_generators;
pub use permutation::{gen_permutation, Permutation};
pub use proof::{gen_proof, verify_proof, ShuffleProof};

use ark_ec::CurveGroup;
use ark_std::rand::{CryptoRng, Rng};
use tracing::instrument;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{MeteringError, Result};
use crate::group::PublicParameters;

const LOG_TARGET: &str = "zk_metering::shuffling";

/// The shuffler's secrets for one shuffle: ψ and the `r_i`.
#[derive(Clone, Debug, Zeroize, ZeroizeOnDrop)]
pub struct ShuffleWitness<C: CurveGroup> {
    pub permutation: Permutation,
    pub randomness: Vec<C::ScalarField>,
}

impl<C: CurveGroup> ShuffleWitness<C> {
    pub fn len(&self) -> usize {
        self.randomness.len()
    }

    pub fn is_empty(&self) -> bool {
        self.randomness.is_empty()
    }
}

/// `outputs[ψ(i)] = inputs[i] + r_i·G` for a fresh ψ and fresh `r_i`.
#[instrument(target = LOG_TARGET, skip_all, fields(size = inputs.len()))]
pub fn shuffle<C, R>(
    params: &PublicParameters<C>,
    inputs: &[C],
    rng: &mut R,
) -> Result<(Vec<C>, ShuffleWitness<C>)>
where
    C: CurveGroup,
    R: Rng + CryptoRng,
{
    if inputs.is_empty() {
        return Err(MeteringError::EmptyInput("shuffle inputs"));
    }
    let permutation = gen_permutation(inputs.len(), rng);
    let randomness: Vec<C::ScalarField> = (0..inputs.len()).map(|_| params.random_scalar(rng)).collect();

    let rerandomized: Vec<C> = inputs
        .iter()
        .zip(&randomness)
        .map(|(point, r)| *point + params.base_mul(r))
        .collect();
    let outputs = permutation.apply(&rerandomized)?;

    Ok((
        outputs,
        ShuffleWitness {
            permutation,
            randomness,
        },
    ))
}
