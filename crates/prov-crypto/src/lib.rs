//! Cryptographic primitives for provenance anchoring.
//!
//! Provides SHA-256 content hashing, the ordered binary Merkle tree used for
//! anchoring (with inclusion proofs), P-256 key lifecycle management, and
//! ECDSA signing/verification.
//!
//! One curve and one hash function throughout. All crypto operations wrap
//! established libraries.

pub mod error;
pub mod hasher;
pub mod keys;
pub mod merkle;
pub mod signer;

pub use error::{CryptoError, CryptoResult};
pub use hasher::ContentHasher;
pub use keys::{derive_public_pem, KeyManager, KeyPair, KeyPolicy, PublicKey};
pub use merkle::{merkle_root, MerkleProof, MerkleTree, ProofStep, Side};
pub use signer::{verify_with_public_pem, Signature, Signer, Verifier};
