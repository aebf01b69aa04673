//! Thin, state-free glue between meters, aggregators and the bulletin board.
//!
//! Nothing here keeps state between calls: registrations, reports and board
//! contents are values owned by the caller and passed in explicitly.

use ark_ec::CurveGroup;
use ark_ff::PrimeField;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::ProtocolConfig;
use crate::elgamal::{encrypt_bitwise, BitwiseCiphertext, ElGamalCiphertext, ElGamalKeys};
use crate::error;
use crate::group::PublicParameters;
use crate::pet::aggregate;
use crate::schnorr::{prove_knowledge, verify_knowledge, BatchVerification, KeyOwnershipProof};
use crate::shuffling::{gen_proof, shuffle, verify_proof, ShuffleProof};
use crate::signing::{Signable, TranscriptBuilder, WithSignature};

const LOG_TARGET: &str = "zk_metering::protocol";

/// A participant's long-lived key pair.
pub type KeyPair<C> = ElGamalKeys<C>;

/// Identity registration: a public key plus proof of owning it, bound to `id`.
#[derive(
    Clone, Debug, PartialEq, Eq, Serialize, Deserialize, CanonicalSerialize, CanonicalDeserialize,
)]
#[serde(bound(
    serialize = "C: CanonicalSerialize",
    deserialize = "C: CanonicalDeserialize"
))]
pub struct Registration<C: CurveGroup> {
    pub id: String,
    #[serde(with = "crate::crypto_serde::curve")]
    pub public_key: C,
    pub proof: KeyOwnershipProof<C>,
}

impl<C> Registration<C>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    pub fn new<R: Rng + CryptoRng>(
        params: &PublicParameters<C>,
        id: impl Into<String>,
        keys: &KeyPair<C>,
        rng: &mut R,
    ) -> Self {
        let id = id.into();
        let proof = prove_knowledge(params, &keys.private_key, &keys.public_key, id.as_bytes(), rng);
        Self {
            id,
            public_key: keys.public_key,
            proof,
        }
    }

    pub fn verify(&self, params: &PublicParameters<C>) -> bool {
        verify_knowledge(params, &self.public_key, &self.proof, self.id.as_bytes())
    }
}

/// One meter reading: a timestamp and the bitwise-encrypted value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "C: CanonicalSerialize",
    deserialize = "C: CanonicalDeserialize"
))]
pub struct MeterReport<C: CurveGroup> {
    pub timestamp: u64,
    pub ciphertext: BitwiseCiphertext<C>,
}

impl<C> Signable for MeterReport<C>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    fn domain_kind(&self) -> &'static str {
        "metering/report_v1"
    }

    fn write_transcript(&self, builder: &mut TranscriptBuilder) {
        builder.append_u64(self.timestamp);
        self.ciphertext.write_transcript(builder);
    }
}

/// `(public key, (timestamp, ciphertext, signature))` as published by a meter.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound(
    serialize = "C: CanonicalSerialize",
    deserialize = "C: CanonicalDeserialize"
))]
pub struct SignedReport<C: CurveGroup>
where
    C::BaseField: PrimeField,
{
    #[serde(with = "crate::crypto_serde::curve")]
    pub public_key: C,
    pub report: WithSignature<C, MeterReport<C>>,
}

impl<C> SignedReport<C>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    /// Encrypt `value` under the joint key and sign the report with the
    /// meter's own key.
    #[instrument(target = LOG_TARGET, skip_all, fields(timestamp = timestamp))]
    pub fn create<R: Rng + CryptoRng>(
        params: &PublicParameters<C>,
        config: &ProtocolConfig,
        meter: &KeyPair<C>,
        joint_key: &C,
        timestamp: u64,
        value: u64,
        rng: &mut R,
    ) -> error::Result<Self> {
        config.check_report_value(value)?;
        let ciphertext = encrypt_bitwise(params, joint_key, value, None, rng);
        let report = MeterReport { timestamp, ciphertext };
        Ok(Self {
            public_key: meter.public_key,
            report: WithSignature::new(params, report, &meter.private_key, rng),
        })
    }

    pub fn verify(&self, params: &PublicParameters<C>) -> bool {
        self.report.verify(params, &self.public_key)
    }
}

/// Append-only log of published artifacts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulletinBoard<T> {
    context: String,
    entries: Vec<T>,
}

impl<T> BulletinBoard<T> {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            entries: Vec::new(),
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    /// Appends `entry` and returns its position.
    pub fn publish(&mut self, entry: T) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of shuffling the registered identity keys.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "C: CanonicalSerialize",
    deserialize = "C: CanonicalDeserialize"
))]
pub struct AnonymizedIdentities<C: CurveGroup> {
    #[serde(with = "crate::crypto_serde::curve_vec")]
    pub inputs: Vec<C>,
    #[serde(with = "crate::crypto_serde::curve_vec")]
    pub outputs: Vec<C>,
    pub proof: ShuffleProof<C>,
    /// Positions of registrations whose key-ownership proof failed; their keys
    /// are not part of the shuffle.
    pub rejected: Vec<usize>,
}

impl<C> AnonymizedIdentities<C>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    pub fn verify(&self, params: &PublicParameters<C>, config: &ProtocolConfig) -> error::Result<bool> {
        verify_proof(
            params,
            &self.proof,
            &self.inputs,
            &self.outputs,
            config.shuffle_context.as_bytes(),
        )
    }
}

/// Verify every registration, then shuffle the accepted keys with a proof
/// bound to the run's shuffle context.
#[instrument(target = LOG_TARGET, skip_all, fields(registrations = registrations.len()))]
pub fn anonymize_identities<C, R>(
    params: &PublicParameters<C>,
    config: &ProtocolConfig,
    registrations: &[Registration<C>],
    rng: &mut R,
) -> error::Result<AnonymizedIdentities<C>>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
    R: Rng + CryptoRng,
{
    let mut inputs = Vec::with_capacity(registrations.len());
    let mut rejected = Vec::new();
    for (index, registration) in registrations.iter().enumerate() {
        if registration.verify(params) {
            inputs.push(registration.public_key);
        } else {
            warn!(target: LOG_TARGET, index, id = %registration.id, "registration proof rejected");
            rejected.push(index);
        }
    }

    let (outputs, witness) = shuffle(params, &inputs, rng)?;
    let proof = gen_proof(
        params,
        &inputs,
        &outputs,
        &witness,
        config.shuffle_context.as_bytes(),
        rng,
    )?;
    info!(target: LOG_TARGET, accepted = inputs.len(), rejected = rejected.len(), "identities anonymized");

    Ok(AnonymizedIdentities {
        inputs,
        outputs,
        proof,
        rejected,
    })
}

/// Check each report's signature under its own key.
pub fn verify_reports<C>(params: &PublicParameters<C>, reports: &[SignedReport<C>]) -> BatchVerification
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    let failed: Vec<usize> = reports
        .iter()
        .enumerate()
        .filter(|(_, report)| !report.verify(params))
        .map(|(index, _)| index)
        .collect();
    if !failed.is_empty() {
        warn!(target: LOG_TARGET, ?failed, "report signatures rejected");
    }
    BatchVerification {
        total: reports.len(),
        failed,
    }
}

/// Homomorphic total of all reports, as one additive ciphertext.
pub fn aggregate_reports<C>(reports: &[SignedReport<C>]) -> error::Result<ElGamalCiphertext<C>>
where
    C: CurveGroup,
    C::BaseField: PrimeField,
{
    let additive = reports
        .iter()
        .map(|report| report.report.value.ciphertext.to_additive())
        .collect::<error::Result<Vec<_>>>()?;
    aggregate(&additive)
}

/// Whether `consumption` is below `baseline`.
///
/// Compares plaintexts obtained after full decryption. This is a stand-in for
/// a secure comparison protocol and reveals both values to whoever runs it.
pub fn ord_comparison(consumption: u64, baseline: u64) -> bool {
    consumption < baseline
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elgamal::{combine_single, decrypt_bitwise, keygen, DiscreteLogTable};
    use crate::test_utils::{grumpkin_params, test_rng, threshold_fixture, Curve};

    #[test]
    fn registration_binds_id_and_key() {
        let mut rng = test_rng();
        let params = grumpkin_params();
        let keys = keygen(&params, &mut rng);
        let registration = Registration::new(&params, "meter-7", &keys, &mut rng);
        assert!(registration.verify(&params));

        let mut renamed = registration.clone();
        renamed.id = "meter-8".to_string();
        assert!(!renamed.verify(&params));

        let mut rekeyed = registration;
        rekeyed.public_key = keygen(&params, &mut rng).public_key;
        assert!(!rekeyed.verify(&params));
    }

    #[test]
    fn anonymization_excludes_bad_registrations() {
        let mut rng = test_rng();
        let params = grumpkin_params();
        let config = ProtocolConfig::default();
        let mut registrations: Vec<_> = (0..4)
            .map(|i| {
                let keys = keygen(&params, &mut rng);
                Registration::new(&params, format!("meter-{i}"), &keys, &mut rng)
            })
            .collect();
        registrations[2].id = "impostor".to_string();

        let anonymized = anonymize_identities(&params, &config, &registrations, &mut rng).unwrap();
        assert_eq!(anonymized.rejected, vec![2]);
        assert_eq!(anonymized.outputs.len(), 3);
        assert!(anonymized.verify(&params, &config).unwrap());

        let other_context = ProtocolConfig {
            shuffle_context: "other".to_string(),
            ..config
        };
        assert!(!anonymized.verify(&params, &other_context).unwrap());
    }

    #[test]
    fn reports_are_signed_encrypted_and_batch_checked() {
        let mut rng = test_rng();
        let (params, setup, shares) = threshold_fixture(2, 2, &mut rng);
        let config = ProtocolConfig::default();
        let meters: Vec<KeyPair<Curve>> = (0..3).map(|_| keygen(&params, &mut rng)).collect();

        let mut reports: Vec<_> = meters
            .iter()
            .zip([10u64, 20, 30])
            .map(|(meter, value)| {
                SignedReport::create(&params, &config, meter, &setup.public_key, 1_700_000_000, value, &mut rng)
                    .unwrap()
            })
            .collect();
        assert!(verify_reports(&params, &reports).is_valid());

        let total = aggregate_reports(&reports).unwrap();
        let partials: Vec<_> = shares.iter().map(|share| share.partial_decrypt_single(&total)).collect();
        let point = combine_single(&setup, &partials, &total).unwrap();
        let table = DiscreteLogTable::new(&params, 1024).unwrap();
        assert_eq!(table.lookup(&point).unwrap(), 60);

        reports[1].report.value.timestamp += 1;
        let outcome = verify_reports(&params, &reports);
        assert_eq!(outcome.failed, vec![1]);
        assert_eq!(outcome.total, 3);
    }

    #[test]
    fn oversized_reports_are_refused() {
        let mut rng = test_rng();
        let params = grumpkin_params();
        let config = ProtocolConfig {
            max_report_bits: 4,
            ..ProtocolConfig::default()
        };
        let meter = keygen(&params, &mut rng);
        let joint = keygen(&params, &mut rng);
        assert!(SignedReport::create(&params, &config, &meter, &joint.public_key, 0, 16, &mut rng).is_err());

        let ok = SignedReport::create(&params, &config, &meter, &joint.public_key, 0, 15, &mut rng).unwrap();
        assert_eq!(decrypt_bitwise(&params, &joint.private_key, &ok.report.value.ciphertext).unwrap(), 15);
    }

    #[test]
    fn bulletin_board_is_append_only() {
        let mut board = BulletinBoard::new("run-1");
        assert!(board.is_empty());
        assert_eq!(board.publish("a"), 0);
        assert_eq!(board.publish("b"), 1);
        assert_eq!(board.entries(), &["a", "b"]);
        assert_eq!(board.get(1), Some(&"b"));
        assert_eq!(board.context(), "run-1");
    }

    #[test]
    fn ord_comparison_is_strict() {
        assert!(ord_comparison(99, 100));
        assert!(!ord_comparison(100, 100));
    }
}
