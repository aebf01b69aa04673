pub mod chaum_pedersen;
pub mod config;
pub mod crypto_serde;
pub mod elgamal;
pub mod error;
pub mod group;
pub mod pet;
pub mod protocol;
pub mod schnorr;
pub mod shuffling;
pub mod signing;

#[cfg(test)]
pub mod test_utils;

pub use config::ProtocolConfig;
pub use error::{MeteringError, Result};
pub use group::PublicParameters;
