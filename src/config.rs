use ark_ec::CurveGroup;
use serde::{Deserialize, Serialize};

use crate::elgamal::{MAX_DECRYPTABLE_BITS, MAX_DISCRETE_LOG_BOUND};
use crate::error::{MeteringError, Result};
use crate::group::PublicParameters;

pub const DEFAULT_THRESHOLD: usize = 2;
pub const DEFAULT_PARTIES: usize = 2;
pub const DEFAULT_DISCRETE_LOG_BOUND: u64 = 1 << 20;
pub const DEFAULT_MAX_REPORT_BITS: usize = 32;

/// Parameters of one protocol run. Built once by the orchestration layer and
/// passed by reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub group_label: String,
    /// Holders needed to decrypt.
    pub threshold: usize,
    /// Key-share holders in total.
    pub parties: usize,
    /// Upper bound for discrete-log recovery of single-value plaintexts, at
    /// most [`MAX_DISCRETE_LOG_BOUND`].
    pub discrete_log_bound: u64,
    /// Widest report a meter may submit.
    pub max_report_bits: usize,
    /// Bound into every shuffle proof of this run.
    pub shuffle_context: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            group_label: "grumpkin".to_string(),
            threshold: DEFAULT_THRESHOLD,
            parties: DEFAULT_PARTIES,
            discrete_log_bound: DEFAULT_DISCRETE_LOG_BOUND,
            max_report_bits: DEFAULT_MAX_REPORT_BITS,
            shuffle_context: "zk-metering/anonymize".to_string(),
        }
    }
}

impl ProtocolConfig {
    pub fn validate(&self) -> Result<()> {
        if self.threshold == 0 || self.threshold > self.parties {
            return Err(MeteringError::InvalidThreshold {
                threshold: self.threshold,
                parties: self.parties,
            });
        }
        if self.max_report_bits == 0 || self.max_report_bits > MAX_DECRYPTABLE_BITS {
            return Err(MeteringError::ValueTooLarge {
                bits: self.max_report_bits,
                limit: MAX_DECRYPTABLE_BITS,
            });
        }
        if self.discrete_log_bound > MAX_DISCRETE_LOG_BOUND {
            return Err(MeteringError::DiscreteLogBoundTooLarge {
                bound: self.discrete_log_bound,
                limit: MAX_DISCRETE_LOG_BOUND,
            });
        }
        Ok(())
    }

    /// Parse and validate a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|err| MeteringError::Serialization(format!("invalid protocol config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn public_parameters<C: CurveGroup>(&self) -> PublicParameters<C> {
        PublicParameters::new(self.group_label.clone())
    }

    /// Rejects report values wider than `max_report_bits`.
    pub fn check_report_value(&self, value: u64) -> Result<()> {
        let bits = (u64::BITS - value.leading_zeros()) as usize;
        if bits > self.max_report_bits {
            return Err(MeteringError::ValueTooLarge {
                bits,
                limit: self.max_report_bits,
            });
        }
        Ok(())
    }
}
