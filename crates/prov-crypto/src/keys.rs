use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use p256::SecretKey;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CryptoError, CryptoResult};
use crate::signer::Signature;

/// What [`KeyManager::ensure_key`] does when no key file exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPolicy {
    /// Generate a P-256 key and write it, unencrypted, to the key path.
    ///
    /// Development convenience only. Production deployments provision the
    /// key out of band and use [`KeyPolicy::RequireExisting`].
    #[default]
    GenerateIfMissing,
    /// Fail with [`CryptoError::KeyNotFound`] when the key file is missing.
    RequireExisting,
}

/// P-256 signing keypair. The private scalar never leaves this type.
pub struct KeyPair {
    secret: SecretKey,
}

impl KeyPair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        Self {
            secret: SecretKey::random(&mut rand::rngs::OsRng),
        }
    }

    /// Parse a PEM private key, PKCS#8 (`BEGIN PRIVATE KEY`) or SEC1
    /// (`BEGIN EC PRIVATE KEY`).
    pub fn from_pem(pem: &str) -> CryptoResult<Self> {
        let secret = SecretKey::from_pkcs8_pem(pem)
            .or_else(|_| SecretKey::from_sec1_pem(pem))
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self { secret })
    }

    /// The public half.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.secret.public_key())
    }

    /// ECDSA/SHA-256 signature over `message`, DER-encoded.
    pub fn sign(&self, message: &[u8]) -> CryptoResult<Signature> {
        use p256::ecdsa::signature::Signer as _;
        let signing_key = p256::ecdsa::SigningKey::from(&self.secret);
        let sig: p256::ecdsa::Signature = signing_key
            .try_sign(message)
            .map_err(|e| CryptoError::Signing(e.to_string()))?;
        Ok(Signature::from_bytes(sig.to_der().as_bytes().to_vec()))
    }

    fn write_pkcs8(&self, path: &Path) -> CryptoResult<()> {
        let pem = self
            .secret
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let persist_err = |source: io::Error| CryptoError::KeyPersist {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(persist_err)?;
        }

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path).map_err(persist_err)?;
        file.write_all(pem.as_bytes()).map_err(persist_err)?;
        file.sync_all().map_err(persist_err)?;
        Ok(())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair(<redacted>)")
    }
}

/// P-256 public key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(p256::PublicKey);

impl PublicKey {
    /// Parse a SubjectPublicKeyInfo PEM (`BEGIN PUBLIC KEY`).
    pub fn from_pem(pem: &str) -> CryptoResult<Self> {
        p256::PublicKey::from_public_key_pem(pem)
            .map(Self)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// SubjectPublicKeyInfo PEM encoding.
    pub fn to_pem(&self) -> CryptoResult<String> {
        self.0
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// Verify a DER signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> CryptoResult<()> {
        use p256::ecdsa::signature::Verifier as _;
        let sig = p256::ecdsa::Signature::from_der(signature.as_bytes())
            .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
        p256::ecdsa::VerifyingKey::from(&self.0)
            .verify(message, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sec1 = self.0.to_sec1_bytes();
        write!(f, "PublicKey({}...)", hex::encode(&sec1[..9]))
    }
}

/// Owns the lifecycle of the process's single signing key.
///
/// The key is loaded (or generated, per [`KeyPolicy`]) on first use and then
/// cached read-only while its file exists. Deleting the file externally ends
/// the cached key; the next call behaves as if nothing had been loaded.
/// Rotating a key means constructing a new manager.
pub struct KeyManager {
    path: PathBuf,
    policy: KeyPolicy,
    cached: Mutex<Option<Arc<KeyPair>>>,
}

impl KeyManager {
    pub fn new(path: impl Into<PathBuf>, policy: KeyPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
            cached: Mutex::new(None),
        }
    }

    /// The key file this manager is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> KeyPolicy {
        self.policy
    }

    /// Load the key, generating and persisting one if the policy allows.
    pub fn ensure_key(&self) -> CryptoResult<Arc<KeyPair>> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(key) = self.still_on_disk(&mut cached) {
            return Ok(key);
        }

        let key = match (load_key_file(&self.path), self.policy) {
            (Ok(key), _) => key,
            (Err(LoadError::Missing), KeyPolicy::GenerateIfMissing) => self.generate()?,
            (Err(err), _) => return Err(err.into_crypto(&self.path)),
        };
        let key = Arc::new(key);
        *cached = Some(Arc::clone(&key));
        Ok(key)
    }

    /// Load the key without ever generating one.
    ///
    /// A missing, unreadable, or unparsable key file is
    /// [`CryptoError::KeyNotFound`].
    pub fn load_existing(&self) -> CryptoResult<Arc<KeyPair>> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(key) = self.still_on_disk(&mut cached) {
            return Ok(key);
        }
        let key = load_key_file(&self.path).map_err(|e| e.into_key_not_found(&self.path))?;
        let key = Arc::new(key);
        *cached = Some(Arc::clone(&key));
        Ok(key)
    }

    /// Public key of the existing key file. Never generates.
    pub fn public_key(&self) -> CryptoResult<PublicKey> {
        Ok(self.load_existing()?.public_key())
    }

    /// PEM of the existing key's public half. Never generates.
    pub fn public_key_pem(&self) -> CryptoResult<String> {
        self.public_key()?.to_pem()
    }

    /// The cached key, if its file is still present. Drops the cache entry
    /// once the file is gone.
    fn still_on_disk(&self, cached: &mut Option<Arc<KeyPair>>) -> Option<Arc<KeyPair>> {
        if cached.is_some() && !self.path.exists() {
            debug!(path = %self.path.display(), "key file removed; dropping cached key");
            *cached = None;
        }
        cached.clone()
    }

    fn generate(&self) -> CryptoResult<KeyPair> {
        let key = KeyPair::generate();
        match key.write_pkcs8(&self.path) {
            Ok(()) => {
                warn!(
                    path = %self.path.display(),
                    "generated unencrypted development signing key; provision a key for production"
                );
                Ok(key)
            }
            // Another process created the file between our load and write.
            Err(CryptoError::KeyPersist { source, .. })
                if source.kind() == io::ErrorKind::AlreadyExists =>
            {
                debug!(path = %self.path.display(), "key file appeared concurrently; loading it");
                load_key_file(&self.path).map_err(|e| e.into_crypto(&self.path))
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("path", &self.path)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Derive the public-key PEM from the private key stored at `path`.
///
/// Only public material is ever returned; any failure to read or parse the
/// private key is [`CryptoError::KeyNotFound`].
pub fn derive_public_pem(path: &Path) -> CryptoResult<String> {
    let key = load_key_file(path).map_err(|e| e.into_key_not_found(path))?;
    key.public_key().to_pem()
}

enum LoadError {
    Missing,
    Unreadable(io::Error),
    Invalid(String),
}

impl LoadError {
    fn into_crypto(self, path: &Path) -> CryptoError {
        match self {
            Self::Invalid(reason) => CryptoError::InvalidKey(reason),
            other => other.into_key_not_found(path),
        }
    }

    fn into_key_not_found(self, path: &Path) -> CryptoError {
        let reason = match self {
            Self::Missing => "no such file".to_string(),
            Self::Unreadable(e) => e.to_string(),
            Self::Invalid(reason) => format!("not a valid private key: {reason}"),
        };
        CryptoError::KeyNotFound {
            path: path.to_path_buf(),
            reason,
        }
    }
}

fn load_key_file(path: &Path) -> Result<KeyPair, LoadError> {
    let pem = match fs::read_to_string(path) {
        Ok(pem) => pem,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(LoadError::Missing),
        Err(e) => return Err(LoadError::Unreadable(e)),
    };
    KeyPair::from_pem(&pem).map_err(|e| LoadError::Invalid(e.to_string()))
}
