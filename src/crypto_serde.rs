use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use serde::de::Error as DeError;
use serde::ser::Error as SerError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{MeteringError, Result};

/// Canonically serializes any arkworks type into a compressed byte vector.
pub fn canonical_serialize_bytes<T>(value: &T) -> Result<Vec<u8>>
where
    T: CanonicalSerialize,
{
    let mut buf = Vec::new();
    value
        .serialize_compressed(&mut buf)
        .map_err(|err| MeteringError::Serialization(format!("canonical serialize failed: {err}")))?;
    Ok(buf)
}

/// Canonically serializes any arkworks type into a `0x`-prefixed lowercase hex string.
pub fn canonical_serialize_hex<T>(value: &T) -> Result<String>
where
    T: CanonicalSerialize,
{
    canonical_serialize_bytes(value).map(|bytes| format!("0x{}", hex::encode(bytes)))
}

/// Inverse of [`canonical_serialize_hex`]; the `0x` prefix is optional.
pub fn canonical_deserialize_hex<T>(value: &str) -> Result<T>
where
    T: CanonicalDeserialize,
{
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(trimmed)
        .map_err(|err| MeteringError::Serialization(format!("invalid hex: {err}")))?;
    T::deserialize_compressed(&mut &bytes[..])
        .map_err(|err| MeteringError::Serialization(format!("canonical deserialize failed: {err}")))
}

/// Serde helpers for encoding curve points as 0x-prefixed hex strings.
pub mod curve {
    use super::*;

    pub fn serialize<C, S>(value: &C, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        C: CanonicalSerialize,
        S: Serializer,
    {
        let hex = canonical_serialize_hex(value).map_err(SerError::custom)?;
        serializer.serialize_str(&hex)
    }

    pub fn deserialize<'de, C, D>(deserializer: D) -> std::result::Result<C, D::Error>
    where
        C: CanonicalDeserialize,
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        canonical_deserialize_hex(&s).map_err(DeError::custom)
    }
}

/// Serde helpers for field elements.
pub mod field {
    pub use super::curve::{deserialize, serialize};
}

/// Serde helpers for vectors of arkworks values (points or scalars).
pub mod canonical_vec {
    use super::*;

    pub fn serialize<T, S>(value: &[T], serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        T: CanonicalSerialize,
        S: Serializer,
    {
        let hexes: Vec<String> = value
            .iter()
            .map(|item| canonical_serialize_hex(item).map_err(SerError::custom))
            .collect::<std::result::Result<_, _>>()?;
        hexes.serialize(serializer)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
    where
        T: CanonicalDeserialize,
        D: Deserializer<'de>,
    {
        let hexes = Vec::<String>::deserialize(deserializer)?;
        hexes
            .into_iter()
            .map(|value| canonical_deserialize_hex(&value).map_err(DeError::custom))
            .collect()
    }
}

pub mod curve_vec {
    pub use super::canonical_vec::{deserialize, serialize};
}

pub mod field_vec {
    pub use super::canonical_vec::{deserialize, serialize};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{grumpkin_params, Curve, Scalar};

    #[test]
    fn hex_round_trip_for_points_and_scalars() {
        let params = grumpkin_params();
        let point: Curve = params.encode_message(9);
        let hex = canonical_serialize_hex(&point).unwrap();
        assert!(hex.starts_with("0x"));
        assert_eq!(canonical_deserialize_hex::<Curve>(&hex).unwrap(), point);

        let scalar = Scalar::from(123u64);
        let hex = canonical_serialize_hex(&scalar).unwrap();
        assert_eq!(canonical_deserialize_hex::<Scalar>(&hex).unwrap(), scalar);
    }

    #[test]
    fn garbage_hex_is_a_serialization_error() {
        let err = canonical_deserialize_hex::<Scalar>("0xzz").unwrap_err();
        assert!(matches!(err, MeteringError::Serialization(_)));
    }
}
