//! `#[serde(with = ...)]` helpers for the beacon API JSON conventions:
//! integers are quoted decimal strings and byte strings are 0x-prefixed hex.

use serde::{Deserialize, Deserializer, Serializer};

fn decode_hex(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
}

fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub mod quoted_u64 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

pub mod quoted_u64_list {
    use super::*;
    use serde::ser::SerializeSeq;
    use ssz_types::{typenum::Unsigned, VariableList};

    pub fn serialize<S: Serializer, N: Unsigned>(
        values: &VariableList<u64, N>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for value in values.iter() {
            seq.serialize_element(&value.to_string())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>, N: Unsigned>(
        deserializer: D,
    ) -> Result<VariableList<u64, N>, D::Error> {
        let values = Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| s.parse().map_err(serde::de::Error::custom))
            .collect::<Result<Vec<u64>, _>>()?;
        VariableList::new(values).map_err(list_error)
    }
}

pub mod hex_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_hex(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        decode_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// SSZ `ByteVector[N]` as one hex string.
pub mod hex_byte_vector {
    use super::*;
    use ssz_types::{typenum::Unsigned, FixedVector};

    pub fn serialize<S: Serializer, N: Unsigned>(
        bytes: &FixedVector<u8, N>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_hex(&bytes[..]))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, N: Unsigned>(
        deserializer: D,
    ) -> Result<FixedVector<u8, N>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = decode_hex(&s).map_err(serde::de::Error::custom)?;
        FixedVector::new(bytes).map_err(list_error)
    }
}

/// SSZ `ByteList[N]` as one hex string.
pub mod hex_byte_list {
    use super::*;
    use ssz_types::{typenum::Unsigned, VariableList};

    pub fn serialize<S: Serializer, N: Unsigned>(
        bytes: &VariableList<u8, N>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_hex(&bytes[..]))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, N: Unsigned>(
        deserializer: D,
    ) -> Result<VariableList<u8, N>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = decode_hex(&s).map_err(serde::de::Error::custom)?;
        VariableList::new(bytes).map_err(list_error)
    }
}

/// `List[ByteList[N], M]` (transactions) as an array of hex strings.
pub mod hex_byte_lists {
    use super::*;
    use serde::ser::SerializeSeq;
    use ssz_types::{typenum::Unsigned, VariableList};

    pub fn serialize<S: Serializer, N: Unsigned, M: Unsigned>(
        items: &VariableList<VariableList<u8, N>, M>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for item in items.iter() {
            seq.serialize_element(&encode_hex(&item[..]))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>, N: Unsigned, M: Unsigned>(
        deserializer: D,
    ) -> Result<VariableList<VariableList<u8, N>, M>, D::Error> {
        let items = Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| {
                let bytes = decode_hex(s).map_err(serde::de::Error::custom)?;
                VariableList::new(bytes).map_err(list_error)
            })
            .collect::<Result<Vec<_>, D::Error>>()?;
        VariableList::new(items).map_err(list_error)
    }
}

fn list_error<E: serde::de::Error>(err: ssz_types::Error) -> E {
    E::custom(format!("invalid SSZ list: {err:?}"))
}

fn to_array<const N: usize, E: serde::de::Error>(bytes: Vec<u8>) -> Result<[u8; N], E> {
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| E::custom(format!("expected {N} bytes, got {len}")))
}

pub mod hex_fixed {
    use super::*;

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_hex(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = decode_hex(&s).map_err(serde::de::Error::custom)?;
        to_array(bytes)
    }
}

pub mod hex_fixed_vec {
    use super::*;
    use serde::ser::SerializeSeq;

    pub fn serialize<S: Serializer, const N: usize>(
        items: &[[u8; N]],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for item in items {
            seq.serialize_element(&encode_hex(item))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<Vec<[u8; N]>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| {
                let bytes = decode_hex(s).map_err(serde::de::Error::custom)?;
                to_array(bytes)
            })
            .collect()
    }
}

/// `uint256` values arrive as decimal strings.
pub mod decimal_u256 {
    use super::*;
    use ethereum_types::U256;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_dec_str(&s).map_err(|e| serde::de::Error::custom(format!("{e:?}")))
    }
}

#[cfg(test)]
mod tests {
    use ethereum_types::U256;
    use serde::{Deserialize, Serialize};
    use ssz_types::typenum::{U2, U4};
    use ssz_types::{FixedVector, VariableList};

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Sample {
        #[serde(with = "super::quoted_u64")]
        number: u64,
        #[serde(with = "super::hex_fixed")]
        address: [u8; 4],
        #[serde(with = "super::hex_byte_lists")]
        blobs: VariableList<VariableList<u8, U4>, U2>,
        #[serde(with = "super::quoted_u64_list")]
        indices: VariableList<u64, U4>,
        #[serde(with = "super::hex_byte_vector")]
        bloom: FixedVector<u8, U2>,
        #[serde(with = "super::decimal_u256")]
        fee: U256,
    }

    #[test]
    fn test_beacon_api_conventions() {
        let json = r#"{"number":"12345","address":"0xdeadbeef","blobs":["0x01","0x"],"indices":["1","2"],"bloom":"0xaabb","fee":"7000000000"}"#;
        let sample: Sample = serde_json::from_str(json).unwrap();
        assert_eq!(sample.number, 12345);
        assert_eq!(sample.address, [0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(sample.blobs.len(), 2);
        assert_eq!(sample.blobs[0][..], [1u8]);
        assert_eq!(sample.indices[..], [1, 2]);
        assert_eq!(sample.bloom[..], [0xaa, 0xbb]);
        assert_eq!(sample.fee, U256::from(7_000_000_000u64));
        assert_eq!(serde_json::to_string(&sample).unwrap(), json);
    }

    #[test]
    fn test_fixed_length_is_enforced() {
        let json = r#"{"number":"1","address":"0xdead","blobs":[],"indices":[],"bloom":"0xaabb","fee":"0"}"#;
        let err = serde_json::from_str::<Sample>(json).unwrap_err();
        assert!(err.to_string().contains("expected 4 bytes"));

        let json = r#"{"number":"1","address":"0xdeadbeef","blobs":[],"indices":[],"bloom":"0xaa","fee":"0"}"#;
        assert!(serde_json::from_str::<Sample>(json).is_err());
    }

    #[test]
    fn test_list_limits_are_enforced() {
        let json = r#"{"number":"1","address":"0xdeadbeef","blobs":["0x0102030405"],"indices":[],"bloom":"0xaabb","fee":"0"}"#;
        assert!(serde_json::from_str::<Sample>(json).is_err());

        let json = r#"{"number":"1","address":"0xdeadbeef","blobs":[],"indices":["1","2","3","4","5"],"bloom":"0xaabb","fee":"0"}"#;
        let err = serde_json::from_str::<Sample>(json).unwrap_err();
        assert!(err.to_string().contains("invalid SSZ list"));
    }
}
