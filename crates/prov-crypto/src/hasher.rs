use std::io::{self, Read};

use prov_types::Digest;
use sha2::{Digest as _, Sha256};

/// SHA-256 content hasher.
///
/// Every digest that is later compared (log dedup, Merkle nodes, signatures)
/// comes from here, so there is exactly one hash function in play. No domain
/// prefix is mixed in: ledger-side verifiers recompute roots from raw bytes.
pub struct ContentHasher;

impl ContentHasher {
    /// Hash raw bytes. Empty input is valid.
    pub fn hash(data: &[u8]) -> Digest {
        Digest::from_hash(Sha256::digest(data).into())
    }

    /// Hash the concatenation `left ++ right` of two raw digests.
    pub fn hash_pair(left: &Digest, right: &Digest) -> Digest {
        let mut hasher = Sha256::new();
        hasher.update(left.as_bytes());
        hasher.update(right.as_bytes());
        Digest::from_hash(hasher.finalize().into())
    }

    /// Stream a reader to completion and hash everything it yields.
    pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<Digest> {
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Digest::from_hash(hasher.finalize().into()))
    }

    /// Verify that data produces the expected digest.
    pub fn verify(data: &[u8], expected: &Digest) -> bool {
        Self::hash(data) == *expected
    }
}
