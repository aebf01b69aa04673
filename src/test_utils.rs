//! Common fixtures for unit tests.

use ark_ec::PrimeGroup;
use ark_std::rand::{CryptoRng, Rng};
use rand::{rngs::StdRng, SeedableRng};

use crate::elgamal::{keygen_threshold, ThresholdKeyShare, ThresholdSetup};
use crate::group::PublicParameters;

pub type Curve = ark_grumpkin::Projective;
pub type Scalar = <Curve as PrimeGroup>::ScalarField;

/// Deterministic CSPRNG so failures reproduce.
pub fn test_rng() -> StdRng {
    StdRng::seed_from_u64(0x6d65_7465_7269_6e67)
}

pub fn grumpkin_params() -> PublicParameters<Curve> {
    PublicParameters::new("grumpkin")
}

pub fn bn254_params() -> PublicParameters<ark_bn254::G1Projective> {
    PublicParameters::new("bn254-g1")
}

/// Dealer output for a t-of-n committee over Grumpkin.
pub fn threshold_fixture<R: Rng + CryptoRng>(
    threshold: usize,
    parties: usize,
    rng: &mut R,
) -> (
    PublicParameters<Curve>,
    ThresholdSetup<Curve>,
    Vec<ThresholdKeyShare<Curve>>,
) {
    let params = grumpkin_params();
    let (setup, shares) =
        keygen_threshold(&params, threshold, parties, rng).expect("valid threshold parameters");
    (params, setup, shares)
}

/// Helpers shared across test modules.
pub mod serde {
    use std::fmt::Debug;

    /// Assert that a value survives a serde_json round-trip using structural equality.
    pub fn assert_round_trip_eq<T>(value: &T)
    where
        T: ::serde::Serialize + ::serde::de::DeserializeOwned + PartialEq + Debug,
    {
        let json = serde_json::to_string(value)
            .expect("serialization should succeed during round-trip testing");
        let restored: T = serde_json::from_str(&json)
            .expect("deserialization should succeed during round-trip testing");
        assert_eq!(restored, *value, "serde_json round-trip altered the value");
    }

    /// Assert that serde_json emits the same payload before and after round-tripping.
    pub fn assert_round_trip_json<T>(value: &T)
    where
        T: ::serde::Serialize + ::serde::de::DeserializeOwned,
    {
        let json = serde_json::to_value(value)
            .expect("serialization to value should succeed during round-trip testing");
        let restored: T = serde_json::from_value(json.clone())
            .expect("deserialization from value should succeed during round-trip testing");
        let json_after = serde_json::to_value(restored)
            .expect("re-serialization should succeed during round-trip testing");
        assert_eq!(json_after, json, "serde_json round-trip altered the payload");
    }
}
