use std::fmt;
use std::io::Read;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{DigestHasher, Hasher, Result, Sha256Hasher, VerifyError};

/// Hash algorithms a payload may be identified by.
///
/// Names follow the IANA hash function textual names used on the wire.
/// Only the SHA-2 family can be computed locally; the rest are carried
/// through from remote descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Algorithm {
    Sha1,
    Sha256,
    Sha512,
    Sha3_256,
    Sha3_512,
    Blake2b256,
    Blake2b512,
}

impl Algorithm {
    /// The algorithm every locally created item is addressed by.
    pub const ITEM: Algorithm = Algorithm::Sha256;

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Sha1 => "sha-1",
            Algorithm::Sha256 => "sha-256",
            Algorithm::Sha512 => "sha-512",
            Algorithm::Sha3_256 => "sha3-256",
            Algorithm::Sha3_512 => "sha3-512",
            Algorithm::Blake2b256 => "blake2b-256",
            Algorithm::Blake2b512 => "blake2b-512",
        }
    }

    /// Output size in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            Algorithm::Sha1 => 20,
            Algorithm::Sha256 | Algorithm::Sha3_256 | Algorithm::Blake2b256 => 32,
            Algorithm::Sha512 | Algorithm::Sha3_512 | Algorithm::Blake2b512 => 64,
        }
    }

    pub fn is_computable(&self) -> bool { matches!(self, Algorithm::Sha256 | Algorithm::Sha512) }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Algorithm {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha-1" => Ok(Algorithm::Sha1),
            "sha-256" => Ok(Algorithm::Sha256),
            "sha-512" => Ok(Algorithm::Sha512),
            "sha3-256" => Ok(Algorithm::Sha3_256),
            "sha3-512" => Ok(Algorithm::Sha3_512),
            "blake2b-256" => Ok(Algorithm::Blake2b256),
            "blake2b-512" => Ok(Algorithm::Blake2b512),
            other => Err(VerifyError::UnknownAlgorithm(other.to_string())),
        }
    }
}

impl Serialize for Algorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Algorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A content digest: algorithm plus raw output bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest {
    pub algorithm: Algorithm,
    #[serde(with = "hex_bytes")]
    pub value: Vec<u8>,
}

impl Digest {
    pub fn new(algorithm: Algorithm, value: Vec<u8>) -> Result<Self> {
        if value.len() != algorithm.output_len() {
            return Err(VerifyError::MalformedValue(hex::encode(&value)));
        }
        Ok(Self { algorithm, value })
    }

    pub fn from_hex(algorithm: Algorithm, s: &str) -> Result<Self> {
        let value = hex::decode(s.trim()).map_err(|_| VerifyError::MalformedValue(s.to_string()))?;
        Self::new(algorithm, value)
    }

    /// Digest an in-memory buffer with the item algorithm.
    pub fn of_bytes(data: &[u8]) -> Self {
        Self { algorithm: Algorithm::ITEM, value: Sha256Hasher::digest(data) }
    }

    /// Digest everything `reader` yields with the item algorithm.
    pub fn of_reader(reader: impl Read) -> Result<Self> {
        let value = hash_reader(reader, Sha256Hasher::new())?;
        Ok(Self { algorithm: Algorithm::ITEM, value })
    }

    /// Digest with an explicit algorithm, when it can be computed locally.
    pub fn compute(algorithm: Algorithm, data: &[u8]) -> Option<Self> {
        let value = match algorithm {
            Algorithm::Sha256 => Sha256Hasher::digest(data),
            Algorithm::Sha512 => {
                let mut hasher = DigestHasher::<sha2::Sha512>::new();
                hasher.update(data);
                hasher.finalize()
            }
            _ => return None,
        };
        Some(Self { algorithm, value })
    }

    pub fn to_hex(&self) -> String { hex::encode(&self.value) }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

/// Ordered set of digests for one payload, at most one per algorithm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DigestSet(Vec<Digest>);

impl DigestSet {
    pub fn new() -> Self { Self(Vec::new()) }

    /// Insert a digest, replacing any digest with the same algorithm in place.
    pub fn insert(&mut self, digest: Digest) {
        match self.0.iter_mut().find(|d| d.algorithm == digest.algorithm) {
            Some(slot) => *slot = digest,
            None => self.0.push(digest),
        }
    }

    pub fn get(&self, algorithm: Algorithm) -> Option<&Digest> {
        self.0.iter().find(|d| d.algorithm == algorithm)
    }

    pub fn first(&self) -> Option<&Digest> { self.0.first() }

    pub fn iter(&self) -> std::slice::Iter<'_, Digest> { self.0.iter() }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// True when both sets share a digest.
    pub fn intersects(&self, other: &DigestSet) -> bool {
        self.0.iter().any(|d| other.0.contains(d))
    }
}

impl From<Digest> for DigestSet {
    fn from(digest: Digest) -> Self { Self(vec![digest]) }
}

impl FromIterator<Digest> for DigestSet {
    fn from_iter<I: IntoIterator<Item = Digest>>(iter: I) -> Self {
        let mut set = DigestSet::new();
        for digest in iter {
            set.insert(digest);
        }
        set
    }
}

impl<'a> IntoIterator for &'a DigestSet {
    type Item = &'a Digest;
    type IntoIter = std::slice::Iter<'a, Digest>;

    fn into_iter(self) -> Self::IntoIter { self.0.iter() }
}

/// Stream `reader` through `hasher` in fixed-size blocks.
pub fn hash_reader<H: Hasher>(mut reader: impl Read, mut hasher: H) -> Result<Vec<u8>> {
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
