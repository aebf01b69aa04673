//! Private equality test over additive ElGamal ciphertexts.
//!
//! `epet` blinds each difference `sum - target_i` with one shared random
//! scalar `r`, so a zero difference stays an encryption of the identity and
//! any other difference becomes an encryption of an unpredictable point. The
//! accompanying [`EqualityProof`] shows the same `r` was applied to every
//! target. Threshold decryption of the blinded ciphertexts then reveals only
//! "equal" or "not equal".

use ark_ec::CurveGroup;
use ark_ff::{PrimeField, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::chaum_pedersen::{verify_partial_share_for, PartialShareProof};
use crate::elgamal::{combine_single, ElGamalCiphertext, PartialDecryption, ThresholdSetup};
use crate::error::{self, MeteringError};
use crate::group::{ChallengeTranscript, PublicParameters};

const LOG_TARGET: &str = "zk_metering::pet";

const EQUALITY_LABEL: &str = "pet/equality_v1";

/// Homomorphic difference `(C1a - C1b, C2a - C2b)`.
pub fn sub<C: CurveGroup>(lhs: &ElGamalCiphertext<C>, rhs: &ElGamalCiphertext<C>) -> ElGamalCiphertext<C> {
    lhs.sub(rhs)
}

/// Homomorphic sum of all ciphertexts.
pub fn aggregate<C: CurveGroup>(ciphertexts: &[ElGamalCiphertext<C>]) -> error::Result<ElGamalCiphertext<C>> {
    if ciphertexts.is_empty() {
        return Err(MeteringError::EmptyInput("aggregate"));
    }
    Ok(ciphertexts
        .iter()
        .fold(ElGamalCiphertext::identity(), |acc, ct| acc.add(ct)))
}

/// Proof that every `eq_i = r·diff_i` for one secret `r`.
///
/// Commitments `A_i = k·diff_i`, challenge `c = H(diffs, eqs, A)`, response
/// `s = k + c·r`.
#[derive(
    Clone, Debug, PartialEq, Eq, Serialize, Deserialize, CanonicalSerialize, CanonicalDeserialize,
)]
#[serde(bound(
    serialize = "C: CanonicalSerialize",
    deserialize = "C: CanonicalDeserialize"
))]
pub struct EqualityProof<C: CurveGroup> {
    pub commitments: Vec<ElGamalCiphertext<C>>,
    #[serde(with = "crate::crypto_serde::field")]
    pub challenge: C::ScalarField,
    #[serde(with = "crate::crypto_serde::field")]
    pub response: C::ScalarField,
}

fn equality_challenge<C>(
    params: &PublicParameters<C>,
    diffs: &[ElGamalCiphertext<C>],
    blinded: &[ElGamalCiphertext<C>],
    commitments: &[ElGamalCiphertext<C>],
) -> C::ScalarField
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    let mut transcript: ChallengeTranscript<C> = params.transcript(EQUALITY_LABEL);
    transcript.append_u64(diffs.len() as u64);
    for ((diff, eq), commitment) in diffs.iter().zip(blinded).zip(commitments) {
        transcript
            .append_point(&diff.c1)
            .append_point(&diff.c2)
            .append_point(&eq.c1)
            .append_point(&eq.c2)
            .append_point(&commitment.c1)
            .append_point(&commitment.c2);
    }
    transcript.challenge_scalar()
}

fn differences<C: CurveGroup>(
    sum: &ElGamalCiphertext<C>,
    targets: &[ElGamalCiphertext<C>],
) -> Vec<ElGamalCiphertext<C>> {
    targets.iter().map(|target| sub(sum, target)).collect()
}

/// Blind `sum - target_i` for every target with one fresh `r` and prove it.
#[instrument(target = LOG_TARGET, skip_all, fields(targets = targets.len()))]
pub fn epet<C, R>(
    params: &PublicParameters<C>,
    sum: &ElGamalCiphertext<C>,
    targets: &[ElGamalCiphertext<C>],
    rng: &mut R,
) -> error::Result<(Vec<ElGamalCiphertext<C>>, EqualityProof<C>)>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
    R: Rng + CryptoRng,
{
    if targets.is_empty() {
        return Err(MeteringError::EmptyInput("pet targets"));
    }
    let diffs = differences(sum, targets);

    let r = params.random_scalar(rng);
    let k = params.random_scalar(rng);
    let blinded: Vec<_> = diffs.iter().map(|diff| diff.scale(&r)).collect();
    let commitments: Vec<_> = diffs.iter().map(|diff| diff.scale(&k)).collect();

    let challenge = equality_challenge(params, &diffs, &blinded, &commitments);
    debug!(target: LOG_TARGET, "computed PET blinding proof");

    Ok((
        blinded,
        EqualityProof {
            commitments,
            challenge,
            response: k + challenge * r,
        },
    ))
}

/// Check that `blinded` was formed from `sum` and `targets` with a single
/// nonzero `r`. Shape mismatches are errors; a failing proof is `Ok(false)`.
pub fn verify_r<C>(
    params: &PublicParameters<C>,
    sum: &ElGamalCiphertext<C>,
    targets: &[ElGamalCiphertext<C>],
    blinded: &[ElGamalCiphertext<C>],
    proof: &EqualityProof<C>,
) -> error::Result<bool>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    if targets.is_empty() {
        return Err(MeteringError::EmptyInput("pet targets"));
    }
    if blinded.len() != targets.len() {
        return Err(MeteringError::length_mismatch("pet blinded ciphertexts", targets.len(), blinded.len()));
    }
    if proof.commitments.len() != targets.len() {
        return Err(MeteringError::length_mismatch(
            "pet proof commitments",
            targets.len(),
            proof.commitments.len(),
        ));
    }
    let diffs = differences(sum, targets);

    let challenge = equality_challenge(params, &diffs, blinded, &proof.commitments);
    if challenge != proof.challenge {
        warn!(target: LOG_TARGET, "PET proof challenge mismatch");
        return Ok(false);
    }

    for (index, ((diff, eq), commitment)) in diffs.iter().zip(blinded).zip(&proof.commitments).enumerate() {
        // r = 0 would turn every difference into an encryption of the identity
        if eq.is_identity() && !diff.is_identity() {
            warn!(target: LOG_TARGET, index, "PET blinding collapsed a nonzero difference");
            return Ok(false);
        }
        let expected = commitment.add(&eq.scale(&challenge));
        if diff.scale(&proof.response) != expected {
            warn!(target: LOG_TARGET, index, "PET proof relation failed");
            return Ok(false);
        }
    }
    Ok(true)
}

/// Threshold-decrypt every blinded ciphertext and test it against the identity.
///
/// `partials[h][j]` is holder `h`'s partial decryption of `blinded[j]`.
#[instrument(target = LOG_TARGET, skip_all, fields(targets = blinded.len()))]
pub fn combine_and_check<C: CurveGroup>(
    setup: &ThresholdSetup<C>,
    partials: &[Vec<PartialDecryption<C>>],
    blinded: &[ElGamalCiphertext<C>],
) -> error::Result<Vec<bool>> {
    if blinded.is_empty() {
        return Err(MeteringError::EmptyInput("pet blinded ciphertexts"));
    }
    for holder in partials {
        if holder.len() != blinded.len() {
            return Err(MeteringError::length_mismatch(
                "pet partial decryptions per holder",
                blinded.len(),
                holder.len(),
            ));
        }
    }

    blinded
        .iter()
        .enumerate()
        .map(|(j, ct)| {
            let column: Vec<PartialDecryption<C>> = partials.iter().map(|holder| holder[j]).collect();
            Ok(combine_single(setup, &column, ct)?.is_zero())
        })
        .collect()
}

/// Published outcome of one `epet` call, ready for the guarded decision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "C: CanonicalSerialize",
    deserialize = "C: CanonicalDeserialize"
))]
pub struct PetEvaluation<C: CurveGroup> {
    pub sum: ElGamalCiphertext<C>,
    pub targets: Vec<ElGamalCiphertext<C>>,
    pub blinded: Vec<ElGamalCiphertext<C>>,
    pub proof: EqualityProof<C>,
}

impl<C> PetEvaluation<C>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    pub fn evaluate<R: Rng + CryptoRng>(
        params: &PublicParameters<C>,
        sum: ElGamalCiphertext<C>,
        targets: Vec<ElGamalCiphertext<C>>,
        rng: &mut R,
    ) -> error::Result<Self> {
        let (blinded, proof) = epet(params, &sum, &targets, rng)?;
        Ok(Self {
            sum,
            targets,
            blinded,
            proof,
        })
    }

    /// Verify `proof_r` and every holder's partial-share proofs, then decide.
    ///
    /// Any rejected proof aborts the whole batch with
    /// [`MeteringError::ConsistencyFailure`]; nothing is decrypted.
    #[instrument(target = LOG_TARGET, skip_all, fields(targets = self.targets.len()))]
    pub fn decide(
        &self,
        params: &PublicParameters<C>,
        setup: &ThresholdSetup<C>,
        share_proofs: &[Vec<PartialShareProof<C>>],
    ) -> error::Result<Vec<bool>> {
        if !verify_r(params, &self.sum, &self.targets, &self.blinded, &self.proof)? {
            return Err(MeteringError::ConsistencyFailure { stage: "pet blinding proof" });
        }

        let mut partials = Vec::with_capacity(share_proofs.len());
        for holder in share_proofs {
            if holder.len() != self.blinded.len() {
                return Err(MeteringError::length_mismatch(
                    "pet partial-share proofs per holder",
                    self.blinded.len(),
                    holder.len(),
                ));
            }
            for (ct, share_proof) in self.blinded.iter().zip(holder) {
                if !verify_partial_share_for(params, setup, ct, share_proof)? {
                    return Err(MeteringError::ConsistencyFailure {
                        stage: "pet partial decryption",
                    });
                }
            }
            partials.push(holder.iter().map(|share_proof| share_proof.partial).collect::<Vec<_>>());
        }

        let outcome = combine_and_check(setup, &partials, &self.blinded)?;
        info!(target: LOG_TARGET, matches = outcome.iter().filter(|m| **m).count(), "PET decided");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chaum_pedersen::prove_partial_share;
    use crate::elgamal::{decrypt_single, encrypt_single, keygen, ThresholdKeyShare};
    use crate::test_utils::{grumpkin_params, test_rng, threshold_fixture, Curve, Scalar};
    use ark_ff::One;

    fn partials_for(
        shares: &[ThresholdKeyShare<Curve>],
        blinded: &[ElGamalCiphertext<Curve>],
    ) -> Vec<Vec<PartialDecryption<Curve>>> {
        shares
            .iter()
            .map(|share| blinded.iter().map(|ct| share.partial_decrypt_single(ct)).collect())
            .collect()
    }

    #[test]
    fn sub_and_aggregate_are_homomorphic() {
        let mut rng = test_rng();
        let params = grumpkin_params();
        let keys = keygen(&params, &mut rng);
        let cts: Vec<_> = [3u64, 5, 9]
            .iter()
            .map(|m| encrypt_single(&params, &keys.public_key, *m, &mut rng))
            .collect();

        let total = aggregate(&cts).unwrap();
        assert_eq!(decrypt_single(&keys.private_key, &total), params.encode_message(17));

        let reversed: Vec<_> = cts.iter().rev().copied().collect();
        assert_eq!(aggregate(&reversed).unwrap(), total);

        let diff = sub(&cts[2], &cts[0]);
        assert_eq!(decrypt_single(&keys.private_key, &diff), params.encode_message(6));

        assert!(aggregate::<Curve>(&[]).is_err());
    }

    #[test]
    fn equal_target_matches_and_unequal_does_not() {
        let mut rng = test_rng();
        let (params, setup, shares) = threshold_fixture(2, 2, &mut rng);
        let sum = encrypt_single(&params, &setup.public_key, 100, &mut rng);
        let targets = vec![
            encrypt_single(&params, &setup.public_key, 100, &mut rng),
            encrypt_single(&params, &setup.public_key, 101, &mut rng),
        ];

        let (blinded, proof) = epet(&params, &sum, &targets, &mut rng).unwrap();
        assert!(verify_r(&params, &sum, &targets, &blinded, &proof).unwrap());

        let partials = partials_for(&shares, &blinded);
        assert_eq!(combine_and_check(&setup, &partials, &blinded).unwrap(), vec![true, false]);
    }

    #[test]
    fn tampered_response_fails_verify_r() {
        let mut rng = test_rng();
        let (params, setup, _) = threshold_fixture(2, 2, &mut rng);
        let sum = encrypt_single(&params, &setup.public_key, 7, &mut rng);
        let targets = vec![encrypt_single(&params, &setup.public_key, 7, &mut rng)];
        let (blinded, proof) = epet(&params, &sum, &targets, &mut rng).unwrap();

        let mut tampered = proof.clone();
        tampered.response += Scalar::one();
        assert!(!verify_r(&params, &sum, &targets, &blinded, &tampered).unwrap());

        let mut substituted = blinded.clone();
        substituted[0] = ElGamalCiphertext::identity();
        assert!(!verify_r(&params, &sum, &targets, &substituted, &proof).unwrap());

        assert!(verify_r(&params, &sum, &targets, &blinded[..0], &proof).is_err());
    }

    #[test]
    fn inconsistent_blinding_is_rejected() {
        let mut rng = test_rng();
        let (params, setup, _) = threshold_fixture(2, 2, &mut rng);
        let sum = encrypt_single(&params, &setup.public_key, 10, &mut rng);
        let targets = vec![
            encrypt_single(&params, &setup.public_key, 3, &mut rng),
            encrypt_single(&params, &setup.public_key, 4, &mut rng),
        ];
        let (mut blinded, proof) = epet(&params, &sum, &targets, &mut rng).unwrap();
        // re-blind the second target with a different scalar
        blinded[1] = sub(&sum, &targets[1]).scale(&Scalar::from(5u64));
        assert!(!verify_r(&params, &sum, &targets, &blinded, &proof).unwrap());
    }

    #[test]
    fn decide_runs_the_guarded_pipeline() {
        let mut rng = test_rng();
        let (params, setup, shares) = threshold_fixture(2, 2, &mut rng);
        let sum = encrypt_single(&params, &setup.public_key, 100, &mut rng);
        let targets = vec![
            encrypt_single(&params, &setup.public_key, 99, &mut rng),
            encrypt_single(&params, &setup.public_key, 100, &mut rng),
        ];
        let evaluation = PetEvaluation::evaluate(&params, sum, targets, &mut rng).unwrap();

        let share_proofs: Vec<Vec<_>> = shares
            .iter()
            .map(|share| {
                evaluation
                    .blinded
                    .iter()
                    .map(|ct| prove_partial_share(&params, ct, share, &mut rng))
                    .collect()
            })
            .collect();
        assert_eq!(evaluation.decide(&params, &setup, &share_proofs).unwrap(), vec![false, true]);

        let mut forged_share = share_proofs.clone();
        forged_share[1][0].partial.value += params.generator;
        assert_eq!(
            evaluation.decide(&params, &setup, &forged_share).unwrap_err(),
            MeteringError::ConsistencyFailure { stage: "pet partial decryption" }
        );

        let mut forged = evaluation.clone();
        forged.proof.response += Scalar::one();
        assert_eq!(
            forged.decide(&params, &setup, &share_proofs).unwrap_err(),
            MeteringError::ConsistencyFailure { stage: "pet blinding proof" }
        );

        crate::test_utils::serde::assert_round_trip_eq(&evaluation);
    }
}
