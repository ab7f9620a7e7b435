use std::io::{self, Read};

use crate::{Algorithm, Digest, DigestHasher, Hasher, Result, Sha256Hasher, VerifyError};

/// Reader that hashes data as it passes through.
pub struct VerifiedReader<R, H> {
    reader: R,
    hasher: H,
    bytes:  u64,
}

impl<R, H> VerifiedReader<R, H> {
    pub fn new(reader: R, hasher: H) -> Self { Self { reader, hasher, bytes: 0 } }

    /// Bytes hashed so far.
    pub fn bytes_read(&self) -> u64 { self.bytes }
}

impl<R: Read, H: Hasher> Read for VerifiedReader<R, H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
            self.bytes += n as u64;
        }
        Ok(n)
    }
}

impl<R: Read, H: Hasher> VerifiedReader<R, H> {
    /// Compare the accumulated hash against `expected`.
    pub fn finish(self, expected: &Digest) -> Result<()> {
        let actual = self.hasher.finalize();
        if actual == expected.value {
            Ok(())
        } else {
            Err(VerifyError::Mismatch {
                expected: expected.to_hex(),
                actual:   hex::encode(actual),
            })
        }
    }
}

/// Hash everything `reader` yields with `expected`'s algorithm and compare.
///
/// Returns the number of bytes checked. Fails with
/// [`VerifyError::UnknownAlgorithm`] when the algorithm cannot be computed
/// locally.
pub fn verify_reader(reader: impl Read, expected: &Digest) -> Result<u64> {
    match expected.algorithm {
        Algorithm::Sha256 => drain(VerifiedReader::new(reader, Sha256Hasher::new()), expected),
        Algorithm::Sha512 => drain(VerifiedReader::new(reader, DigestHasher::<sha2::Sha512>::new()), expected),
        other => Err(VerifyError::UnknownAlgorithm(other.to_string())),
    }
}

fn drain<R: Read, H: Hasher>(mut reader: VerifiedReader<R, H>, expected: &Digest) -> Result<u64> {
    io::copy(&mut reader, &mut io::sink())?;
    let bytes = reader.bytes_read();
    reader.finish(expected)?;
    Ok(bytes)
}
