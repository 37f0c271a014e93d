use std::sync::Arc;

use prov_types::Digest;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::{KeyManager, PublicKey};

/// DER-encoded ECDSA P-256 signature.
///
/// Opaque until verification: constructing one never inspects the bytes.
/// Serializes as lowercase hex.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Decode hex text. Fails only if the text is not hex.
    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        hex::decode(s.trim())
            .map(Self)
            .map_err(|e| CryptoError::MalformedSignature(e.to_string()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown = &self.0[..self.0.len().min(8)];
        write!(f, "Signature({}...)", hex::encode(shown))
    }
}

impl TryFrom<String> for Signature {
    type Error = CryptoError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<Signature> for String {
    fn from(sig: Signature) -> Self {
        sig.to_hex()
    }
}

/// Signs digests with the key held by a [`KeyManager`].
#[derive(Clone, Debug)]
pub struct Signer {
    keys: Arc<KeyManager>,
}

impl Signer {
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self { keys }
    }

    /// Sign arbitrary bytes, loading or generating the key on first use.
    pub fn sign(&self, message: &[u8]) -> CryptoResult<Signature> {
        self.keys.ensure_key()?.sign(message)
    }

    /// Sign the raw 32 bytes of a digest.
    pub fn sign_digest(&self, digest: &Digest) -> CryptoResult<Signature> {
        self.sign(digest.as_bytes())
    }
}

/// Checks signatures against the public half of a [`KeyManager`]'s key.
///
/// Fails closed: every failure, including a missing key file, is `false`.
/// Never generates a key.
#[derive(Clone, Debug)]
pub struct Verifier {
    keys: Arc<KeyManager>,
}

impl Verifier {
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self { keys }
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let key = match self.keys.public_key() {
            Ok(key) => key,
            Err(e) => {
                debug!(error = %e, "verification key unavailable");
                return false;
            }
        };
        check(&key, message, signature)
    }

    pub fn verify_digest(&self, digest: &Digest, signature: &Signature) -> bool {
        self.verify(digest.as_bytes(), signature)
    }
}

/// Verify against a distributed public-key PEM, for auditors who never see
/// the key file. Same fail-closed contract as [`Verifier::verify`].
pub fn verify_with_public_pem(public_pem: &str, message: &[u8], signature: &Signature) -> bool {
    match PublicKey::from_pem(public_pem) {
        Ok(key) => check(&key, message, signature),
        Err(e) => {
            debug!(error = %e, "unparsable public key");
            false
        }
    }
}

fn check(key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
    match key.verify(message, signature) {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, "signature rejected");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::ContentHasher;
    use crate::keys::{KeyPair, KeyPolicy};

    fn manager(dir: &tempfile::TempDir) -> Arc<KeyManager> {
        Arc::new(KeyManager::new(
            dir.path().join("prov.pem"),
            KeyPolicy::GenerateIfMissing,
        ))
    }

    #[test]
    fn sign_and_verify_digest() {
        let dir = tempfile::tempdir().unwrap();
        let keys = manager(&dir);
        let (signer, verifier) = (Signer::new(keys.clone()), Verifier::new(keys));
        let d = ContentHasher::hash(b"agent output");
        let sig = signer.sign_digest(&d).unwrap();
        assert!(verifier.verify_digest(&d, &sig));
    }

    #[test]
    fn verify_fails_on_other_digest() {
        let dir = tempfile::tempdir().unwrap();
        let keys = manager(&dir);
        let (signer, verifier) = (Signer::new(keys.clone()), Verifier::new(keys));
        let sig = signer.sign_digest(&ContentHasher::hash(b"one")).unwrap();
        assert!(!verifier.verify_digest(&ContentHasher::hash(b"two"), &sig));
    }

    #[test]
    fn verify_fails_with_foreign_key() {
        let dir = tempfile::tempdir().unwrap();
        let keys = manager(&dir);
        Signer::new(keys.clone()).sign(b"warm up").unwrap();
        let foreign = KeyPair::generate().sign(b"message").unwrap();
        assert!(!Verifier::new(keys).verify(b"message", &foreign));
    }

    #[test]
    fn verify_without_key_file_is_false() {
        let dir = tempfile::tempdir().unwrap();
        let keys = manager(&dir);
        let sig = KeyPair::generate().sign(b"m").unwrap();
        assert!(!Verifier::new(keys.clone()).verify(b"m", &sig));
        assert!(!keys.path().exists(), "verification must not generate a key");
    }

    #[test]
    fn malformed_signature_bytes_are_false() {
        let dir = tempfile::tempdir().unwrap();
        let keys = manager(&dir);
        Signer::new(keys.clone()).sign(b"m").unwrap();
        let verifier = Verifier::new(keys);
        assert!(!verifier.verify(b"m", &Signature::from_bytes(vec![])));
        assert!(!verifier.verify(b"m", &Signature::from_bytes(vec![0x30, 0x02, 0xff])));
    }

    #[test]
    fn public_pem_verification() {
        let key = KeyPair::generate();
        let pem = key.public_key().to_pem().unwrap();
        let sig = key.sign(b"payload").unwrap();
        assert!(verify_with_public_pem(&pem, b"payload", &sig));
        assert!(!verify_with_public_pem(&pem, b"other", &sig));
        assert!(!verify_with_public_pem("not a pem", b"payload", &sig));
    }

    #[test]
    fn signature_hex_roundtrip() {
        let sig = KeyPair::generate().sign(b"x").unwrap();
        let parsed = Signature::from_hex(&sig.to_hex()).unwrap();
        assert_eq!(sig, parsed);
        // DER sequence tag.
        assert_eq!(sig.as_bytes()[0], 0x30);
    }

    #[test]
    fn non_hex_signature_text_is_rejected() {
        assert!(matches!(
            Signature::from_hex("not-hex"),
            Err(CryptoError::MalformedSignature(_))
        ));
    }

    #[test]
    fn signature_serde_as_hex() {
        let sig = Signature::from_bytes(vec![0xde, 0xad]);
        assert_eq!(serde_json::to_string(&sig).unwrap(), "\"dead\"");
        let parsed: Signature = serde_json::from_str("\"dead\"").unwrap();
        assert_eq!(parsed, sig);
    }
}
