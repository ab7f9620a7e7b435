//! Content digests for shared payloads.
//!
//! A payload is identified by one or more digests, at most one per
//! algorithm. Locally created payloads are always addressed by
//! [`Algorithm::ITEM`]; digests of other algorithms arrive from remote
//! descriptors and are carried through untouched.
//!
//! # Example
//!
//! ```
//! use fileshare_verify::{Digest, Sha256Hasher, VerifiedReader};
//!
//! let expected = Digest::of_bytes(b"hello world");
//! let mut reader = VerifiedReader::new(&b"hello world"[..], Sha256Hasher::new());
//! std::io::copy(&mut reader, &mut std::io::sink()).unwrap();
//! reader.finish(&expected).unwrap();
//! ```

pub use self::digest::{Algorithm, Digest, DigestSet, hash_reader};
pub use self::error::{Result, VerifyError};
pub use self::hasher::{DigestHasher, Hasher, Sha256Hasher};
pub use self::reader::{VerifiedReader, verify_reader};

mod digest;
mod error;
mod hasher;
mod reader;
