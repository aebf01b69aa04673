use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{PrimeField, Zero};
use sha2::{Digest, Sha512};
use tracing::{instrument, trace};

use crate::error::{MeteringError, Result};
use crate::group::PublicParameters;
use crate::signing::TranscriptBuilder;

const LOG_TARGET: &str = "zk_metering::shuffling::generators";

const GENERATOR_LABEL: &str = "shuffle/generators_v1";
const MAX_ATTEMPTS: u64 = 256;

/// Hash-derived commitment generators `h_0..h_{count-1}`.
///
/// Each candidate is SHA-512 over `(group label, aux, count, index, counter)`
/// interpreted as a compressed point; invalid encodings and the identity are
/// skipped by bumping the counter. Nobody knows a discrete log of the result
/// with respect to G or to another generator.
#[instrument(target = LOG_TARGET, skip(params, aux))]
pub fn derive_generators<C>(params: &PublicParameters<C>, aux: &[u8], count: usize) -> Result<Vec<C>>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    (0..count)
        .map(|index| derive_generator(params, aux, count, index))
        .collect()
}

fn derive_generator<C>(params: &PublicParameters<C>, aux: &[u8], count: usize, index: usize) -> Result<C>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    for counter in 0..MAX_ATTEMPTS {
        let mut builder = TranscriptBuilder::new(GENERATOR_LABEL);
        builder.append_str(&params.group_label);
        builder.append_bytes(aux);
        builder.append_u64(count as u64);
        builder.append_u64(index as u64);
        builder.append_u64(counter);
        let digest = Sha512::digest(builder.as_bytes());

        if let Some(candidate) = C::Affine::from_random_bytes(&digest) {
            let point = candidate.mul_by_cofactor_to_group();
            if !point.is_zero() {
                trace!(target: LOG_TARGET, index, counter, "derived generator");
                return Ok(point);
            }
        }
    }
    Err(MeteringError::GeneratorDerivation { index })
}
