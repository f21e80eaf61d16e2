//! Antelope public key and signature string formats.
//!
//! Keys come back from the snap as `PUB_K1_...` strings; the account index
//! service wants the legacy `EOS...` form. Both encodings are base58 of the
//! raw bytes followed by a 4-byte RIPEMD-160 checksum. The modern form mixes
//! the curve name into the checksum, the legacy form does not.

use std::fmt;
use std::str::FromStr;

use ripemd::{Digest, Ripemd160};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

const PUBLIC_KEY_LEN: usize = 33;
const SIGNATURE_LEN: usize = 65;
const CHECKSUM_LEN: usize = 4;
const LEGACY_PREFIX: &str = "EOS";

/// Curve a key or signature was produced on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    K1,
    R1,
}

impl KeyType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::K1 => "K1",
            Self::R1 => "R1",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "K1" => Some(Self::K1),
            "R1" => Some(Self::R1),
            _ => None,
        }
    }
}

fn checksum(data: &[u8], suffix: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.update(suffix);
    let digest = hasher.finalize();
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    out
}

fn encode_checked(data: &[u8], suffix: &[u8]) -> String {
    let mut bytes = data.to_vec();
    bytes.extend_from_slice(&checksum(data, suffix));
    bs58::encode(bytes).into_string()
}

fn decode_checked(encoded: &str, expected_len: usize, suffix: &[u8]) -> Result<Vec<u8>, String> {
    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| format!("invalid base58: {e}"))?;
    if bytes.len() != expected_len + CHECKSUM_LEN {
        return Err(format!(
            "expected {} bytes, got {}",
            expected_len + CHECKSUM_LEN,
            bytes.len()
        ));
    }
    let (data, check) = bytes.split_at(expected_len);
    if checksum(data, suffix) != check {
        return Err("checksum mismatch".to_string());
    }
    Ok(data.to_vec())
}

/// Splits `PREFIX_TYPE_DATA` into its curve and payload.
fn split_prefixed<'a>(raw: &'a str, prefix: &str) -> Option<(KeyType, &'a str)> {
    let rest = raw.strip_prefix(prefix)?.strip_prefix('_')?;
    let (kind, data) = rest.split_once('_')?;
    Some((KeyType::parse(kind)?, data))
}

/// A compressed public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    key_type: KeyType,
    data: Vec<u8>,
}

impl PublicKey {
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Legacy `EOS...` rendering. Only K1 keys have one.
    pub fn to_legacy_string(&self) -> Result<String, Error> {
        if self.key_type != KeyType::K1 {
            return Err(Error::InvalidKey(format!(
                "{} keys have no legacy format",
                self.key_type.as_str()
            )));
        }
        Ok(format!("{LEGACY_PREFIX}{}", encode_checked(&self.data, b"")))
    }
}

impl FromStr for PublicKey {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if let Some((key_type, data)) = split_prefixed(raw, "PUB") {
            let data = decode_checked(data, PUBLIC_KEY_LEN, key_type.as_str().as_bytes())
                .map_err(|e| Error::InvalidKey(format!("{raw}: {e}")))?;
            return Ok(Self { key_type, data });
        }
        if let Some(data) = raw.strip_prefix(LEGACY_PREFIX) {
            let data = decode_checked(data, PUBLIC_KEY_LEN, b"")
                .map_err(|e| Error::InvalidKey(format!("{raw}: {e}")))?;
            return Ok(Self {
                key_type: KeyType::K1,
                data,
            });
        }
        Err(Error::InvalidKey(format!("unrecognized key format: {raw}")))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.key_type.as_str();
        write!(
            f,
            "PUB_{kind}_{}",
            encode_checked(&self.data, kind.as_bytes())
        )
    }
}

/// A recoverable signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    key_type: KeyType,
    data: Vec<u8>,
}

impl Signature {
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl FromStr for Signature {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let (key_type, data) = split_prefixed(raw, "SIG")
            .ok_or_else(|| Error::InvalidSignature(format!("unrecognized format: {raw}")))?;
        let data = decode_checked(data, SIGNATURE_LEN, key_type.as_str().as_bytes())
            .map_err(|e| Error::InvalidSignature(format!("{raw}: {e}")))?;
        Ok(Self { key_type, data })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.key_type.as_str();
        write!(
            f,
            "SIG_{kind}_{}",
            encode_checked(&self.data, kind.as_bytes())
        )
    }
}

macro_rules! string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(PublicKey);
string_serde!(Signature);
