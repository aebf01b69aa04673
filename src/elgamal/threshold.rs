//! Shamir-shared ElGamal keys and threshold decryption.
//!
//! A trusted dealer samples a degree `t-1` polynomial `f` with `f(0) = sk` and
//! hands `y_i = f(i)` to holder `i` for `i = 1..=n`. Each holder publishes its
//! verification key `y_i·G` alongside the joint key `sk·G`. Decryption takes
//! exactly `t` partial decryptions `y_i·C1` and interpolates them at zero.

use std::collections::HashSet;

use ark_ec::CurveGroup;
use ark_ff::Field;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::data_structures::{BitwiseCiphertext, ElGamalCiphertext};
use super::encryption::decode_bit_points;
use crate::error::{self, MeteringError};
use crate::group::PublicParameters;

const LOG_TARGET: &str = "zk_metering::elgamal::threshold";

/// Public output of the dealer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "C: CanonicalSerialize",
    deserialize = "C: CanonicalDeserialize"
))]
pub struct ThresholdSetup<C: CurveGroup> {
    #[serde(with = "crate::crypto_serde::curve")]
    pub public_key: C,
    pub threshold: usize,
    pub parties: usize,
    /// `y_i·G` for holder `i`, stored at position `i - 1`.
    #[serde(with = "crate::crypto_serde::curve_vec")]
    pub verification_keys: Vec<C>,
}

impl<C: CurveGroup> ThresholdSetup<C> {
    pub fn verification_key(&self, index: u64) -> error::Result<&C> {
        self.check_index(index)?;
        // index is in 1..=parties
        Ok(&self.verification_keys[(index - 1) as usize])
    }

    fn check_index(&self, index: u64) -> error::Result<()> {
        if index == 0 || index > self.parties as u64 {
            return Err(MeteringError::InvalidShareIndex {
                index,
                parties: self.parties,
            });
        }
        Ok(())
    }

    /// Lagrange weights for a set of holders, after checking that exactly
    /// `threshold` distinct, in-range indices are present.
    pub fn interpolation_weights(&self, indices: &[u64]) -> error::Result<Vec<C::ScalarField>> {
        if indices.len() != self.threshold {
            return Err(MeteringError::ShareCountMismatch {
                expected: self.threshold,
                actual: indices.len(),
            });
        }
        let mut seen = HashSet::with_capacity(indices.len());
        for &index in indices {
            self.check_index(index)?;
            if !seen.insert(index) {
                return Err(MeteringError::DuplicateShareIndex(index));
            }
        }
        Ok(lagrange_coefficients_at_zero(indices))
    }
}

/// One holder's Shamir share of the decryption key.
#[derive(Clone, Debug, Zeroize, ZeroizeOnDrop)]
pub struct ThresholdKeyShare<C: CurveGroup> {
    #[zeroize(skip)]
    pub index: u64,
    secret: C::ScalarField,
    #[zeroize(skip)]
    pub verification_key: C,
}

impl<C: CurveGroup> ThresholdKeyShare<C> {
    pub(crate) fn secret(&self) -> &C::ScalarField {
        &self.secret
    }

    /// `D_i = y_i·C1` for a single ciphertext.
    pub fn partial_decrypt_single(&self, ciphertext: &ElGamalCiphertext<C>) -> PartialDecryption<C> {
        PartialDecryption {
            index: self.index,
            value: ciphertext.c1 * self.secret,
        }
    }

    /// One partial decryption per bit of `ciphertext`.
    pub fn partial_decrypt(&self, ciphertext: &BitwiseCiphertext<C>) -> Vec<PartialDecryption<C>> {
        ciphertext
            .bits
            .iter()
            .map(|bit| self.partial_decrypt_single(bit))
            .collect()
    }
}

/// `y_i·C1` tagged with the holder index.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, CanonicalSerialize, CanonicalDeserialize,
)]
#[serde(bound(
    serialize = "C: CanonicalSerialize",
    deserialize = "C: CanonicalDeserialize"
))]
pub struct PartialDecryption<C: CurveGroup> {
    pub index: u64,
    #[serde(with = "crate::crypto_serde::curve")]
    pub value: C,
}

/// Deal a fresh `threshold`-of-`parties` key.
#[instrument(target = LOG_TARGET, skip(params, rng))]
pub fn keygen_threshold<C, R>(
    params: &PublicParameters<C>,
    threshold: usize,
    parties: usize,
    rng: &mut R,
) -> error::Result<(ThresholdSetup<C>, Vec<ThresholdKeyShare<C>>)>
where
    C: CurveGroup,
    R: Rng + CryptoRng,
{
    if threshold == 0 || threshold > parties {
        return Err(MeteringError::InvalidThreshold { threshold, parties });
    }

    let mut coefficients: Vec<C::ScalarField> =
        (0..threshold).map(|_| params.random_scalar(rng)).collect();
    let public_key = params.base_mul(&coefficients[0]);

    let shares: Vec<ThresholdKeyShare<C>> = (1..=parties as u64)
        .map(|index| {
            let secret = evaluate_polynomial(&coefficients, C::ScalarField::from(index));
            ThresholdKeyShare {
                index,
                secret,
                verification_key: params.base_mul(&secret),
            }
        })
        .collect();
    coefficients.zeroize();

    debug!(target: LOG_TARGET, threshold, parties, "dealt threshold key");

    let setup = ThresholdSetup {
        public_key,
        threshold,
        parties,
        verification_keys: shares.iter().map(|share| share.verification_key).collect(),
    };
    Ok((setup, shares))
}

fn evaluate_polynomial<F: Field>(coefficients: &[F], x: F) -> F {
    coefficients
        .iter()
        .rev()
        .fold(F::zero(), |acc, coefficient| acc * x + coefficient)
}

/// `λ_i = Π_{j≠i} x_j / (x_j - x_i)` for interpolation at zero.
///
/// Indices must be distinct and nonzero.
pub fn lagrange_coefficients_at_zero<F: Field>(indices: &[u64]) -> Vec<F> {
    indices
        .iter()
        .map(|&i| {
            let xi = F::from(i);
            let (numerator, denominator) = indices.iter().filter(|&&j| j != i).fold(
                (F::one(), F::one()),
                |(num, den), &j| {
                    let xj = F::from(j);
                    (num * xj, den * (xj - xi))
                },
            );
            // distinct indices keep every denominator nonzero
            numerator * denominator.inverse().unwrap_or_else(F::zero)
        })
        .collect()
}

/// Recover the message point of a single ciphertext from `t` partials.
pub fn combine_single<C: CurveGroup>(
    setup: &ThresholdSetup<C>,
    partials: &[PartialDecryption<C>],
    ciphertext: &ElGamalCiphertext<C>,
) -> error::Result<C> {
    let indices: Vec<u64> = partials.iter().map(|partial| partial.index).collect();
    let weights = setup.interpolation_weights(&indices)?;
    let combined = partials
        .iter()
        .zip(&weights)
        .fold(C::zero(), |acc, (partial, weight)| acc + partial.value * weight);
    Ok(ciphertext.c2 - combined)
}

/// Recover every bit point of a bitwise ciphertext.
///
/// `partials[h]` holds holder `h`'s partial decryptions for all bits, in bit
/// order, all under one index.
#[instrument(target = LOG_TARGET, skip_all, fields(holders = partials.len(), bits = ciphertext.len()))]
pub fn combine_points<C: CurveGroup>(
    setup: &ThresholdSetup<C>,
    partials: &[Vec<PartialDecryption<C>>],
    ciphertext: &BitwiseCiphertext<C>,
) -> error::Result<Vec<C>> {
    if ciphertext.is_empty() {
        return Err(MeteringError::EmptyInput("bitwise ciphertext"));
    }
    if partials.len() != setup.threshold {
        warn!(
            target: LOG_TARGET,
            expected = setup.threshold,
            actual = partials.len(),
            "refusing to combine with the wrong number of holders"
        );
        return Err(MeteringError::ShareCountMismatch {
            expected: setup.threshold,
            actual: partials.len(),
        });
    }

    let mut indices = Vec::with_capacity(partials.len());
    for holder in partials {
        if holder.len() != ciphertext.len() {
            return Err(MeteringError::length_mismatch(
                "partial decryptions per holder",
                ciphertext.len(),
                holder.len(),
            ));
        }
        let index = holder[0].index;
        if let Some(stray) = holder.iter().find(|partial| partial.index != index) {
            return Err(MeteringError::InconsistentShareIndex {
                expected: index,
                found: stray.index,
            });
        }
        indices.push(index);
    }
    let weights = setup.interpolation_weights(&indices)?;

    Ok(ciphertext
        .bits
        .iter()
        .enumerate()
        .map(|(bit, ct)| {
            let combined = partials
                .iter()
                .zip(&weights)
                .fold(C::zero(), |acc, (holder, weight)| acc + holder[bit].value * weight);
            ct.c2 - combined
        })
        .collect())
}

/// Threshold counterpart of `decrypt_bitwise`.
pub fn combine_threshold<C: CurveGroup>(
    params: &PublicParameters<C>,
    setup: &ThresholdSetup<C>,
    partials: &[Vec<PartialDecryption<C>>],
    ciphertext: &BitwiseCiphertext<C>,
) -> error::Result<u64> {
    let points = combine_points(setup, partials, ciphertext)?;
    decode_bit_points(params, &points)
}

/// Interpolate the joint secret from `t` shares. Test-only helper; the dealer
/// never reconstructs the key in the protocol.
#[cfg(test)]
pub(crate) fn reconstruct_secret<C: CurveGroup>(shares: &[&ThresholdKeyShare<C>]) -> C::ScalarField {
    let indices: Vec<u64> = shares.iter().map(|share| share.index).collect();
    lagrange_coefficients_at_zero::<C::ScalarField>(&indices)
        .into_iter()
        .zip(shares)
        .fold(<C::ScalarField as ark_ff::Zero>::zero(), |acc, (weight, share)| acc + weight * share.secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elgamal::{decrypt_bitwise, decrypt_single, encrypt_bitwise, encrypt_single};
    use crate::test_utils::{test_rng, threshold_fixture, Scalar};
    use ark_ff::{One, Zero};

    #[test]
    fn lagrange_weights_sum_to_one() {
        let weights = lagrange_coefficients_at_zero::<Scalar>(&[1, 3, 4]);
        let sum: Scalar = weights.iter().sum();
        assert!(sum.is_one());
    }

    #[test]
    fn shares_interpolate_to_the_joint_key() {
        let mut rng = test_rng();
        let (params, setup, shares) = threshold_fixture(3, 5, &mut rng);
        let sk = reconstruct_secret(&[&shares[0], &shares[2], &shares[4]]);
        assert_eq!(params.base_mul(&sk), setup.public_key);
        assert_eq!(reconstruct_secret(&[&shares[1], &shares[3], &shares[4]]), sk);
        assert_eq!(
            *setup.verification_key(2).unwrap(),
            params.base_mul(shares[1].secret())
        );
    }

    #[test]
    fn zeroize_wipes_the_share_secret_only() {
        let mut rng = test_rng();
        let (_, setup, mut shares) = threshold_fixture(2, 3, &mut rng);
        let share = &mut shares[1];

        share.zeroize();
        assert!(share.secret().is_zero());
        assert_eq!(share.index, 2);
        assert_eq!(share.verification_key, *setup.verification_key(2).unwrap());
    }

    #[test]
    fn two_of_two_matches_single_key_decryption() {
        let mut rng = test_rng();
        let (params, setup, shares) = threshold_fixture(2, 2, &mut rng);
        let sk = reconstruct_secret(&[&shares[0], &shares[1]]);

        let ct = encrypt_bitwise(&params, &setup.public_key, 117, None, &mut rng);
        let partials: Vec<_> = shares.iter().map(|share| share.partial_decrypt(&ct)).collect();
        assert_eq!(combine_threshold(&params, &setup, &partials, &ct).unwrap(), 117);
        assert_eq!(decrypt_bitwise(&params, &sk, &ct).unwrap(), 117);

        let single = encrypt_single(&params, &setup.public_key, 9, &mut rng);
        let single_partials: Vec<_> = shares
            .iter()
            .map(|share| share.partial_decrypt_single(&single))
            .collect();
        assert_eq!(
            combine_single(&setup, &single_partials, &single).unwrap(),
            decrypt_single(&sk, &single)
        );
    }

    #[test]
    fn any_qualified_subset_decrypts() {
        let mut rng = test_rng();
        let (params, setup, shares) = threshold_fixture(2, 3, &mut rng);
        let ct = encrypt_bitwise(&params, &setup.public_key, 42, None, &mut rng);

        for (a, b) in [(0, 1), (0, 2), (1, 2)] {
            let partials = vec![shares[a].partial_decrypt(&ct), shares[b].partial_decrypt(&ct)];
            assert_eq!(combine_threshold(&params, &setup, &partials, &ct).unwrap(), 42);
        }
    }

    #[test]
    fn wrong_holder_count_is_rejected() {
        let mut rng = test_rng();
        let (params, setup, shares) = threshold_fixture(2, 3, &mut rng);
        let ct = encrypt_bitwise(&params, &setup.public_key, 5, None, &mut rng);

        let too_few = vec![shares[0].partial_decrypt(&ct)];
        assert_eq!(
            combine_threshold(&params, &setup, &too_few, &ct).unwrap_err(),
            MeteringError::ShareCountMismatch { expected: 2, actual: 1 }
        );

        let too_many: Vec<_> = shares.iter().map(|share| share.partial_decrypt(&ct)).collect();
        assert_eq!(
            combine_threshold(&params, &setup, &too_many, &ct).unwrap_err(),
            MeteringError::ShareCountMismatch { expected: 2, actual: 3 }
        );
    }

    #[test]
    fn malformed_partials_are_rejected() {
        let mut rng = test_rng();
        let (params, setup, shares) = threshold_fixture(2, 2, &mut rng);
        let ct = encrypt_bitwise(&params, &setup.public_key, 5, None, &mut rng);

        let duplicated = vec![shares[0].partial_decrypt(&ct), shares[0].partial_decrypt(&ct)];
        assert_eq!(
            combine_threshold(&params, &setup, &duplicated, &ct).unwrap_err(),
            MeteringError::DuplicateShareIndex(1)
        );

        let mut truncated = vec![shares[0].partial_decrypt(&ct), shares[1].partial_decrypt(&ct)];
        truncated[1].pop();
        assert!(matches!(
            combine_threshold(&params, &setup, &truncated, &ct).unwrap_err(),
            MeteringError::LengthMismatch { .. }
        ));

        let mut mixed = vec![shares[0].partial_decrypt(&ct), shares[1].partial_decrypt(&ct)];
        mixed[1][0].index = 1;
        assert_eq!(
            combine_threshold(&params, &setup, &mixed, &ct).unwrap_err(),
            MeteringError::InconsistentShareIndex { expected: 1, found: 2 }
        );

        let mut out_of_range = vec![shares[0].partial_decrypt(&ct), shares[1].partial_decrypt(&ct)];
        for partial in out_of_range[1].iter_mut() {
            partial.index = 7;
        }
        assert_eq!(
            combine_threshold(&params, &setup, &out_of_range, &ct).unwrap_err(),
            MeteringError::InvalidShareIndex { index: 7, parties: 2 }
        );
    }

    #[test]
    fn invalid_threshold_parameters_are_rejected() {
        let mut rng = test_rng();
        let params = crate::test_utils::grumpkin_params();
        assert!(keygen_threshold(&params, 0, 2, &mut rng).is_err());
        assert_eq!(
            keygen_threshold(&params, 3, 2, &mut rng).unwrap_err(),
            MeteringError::InvalidThreshold { threshold: 3, parties: 2 }
        );
    }
}
