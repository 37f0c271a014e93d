use std::path::PathBuf;

/// Errors from key management and signing.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("signing key not found at {}: {reason}", path.display())]
    KeyNotFound { path: PathBuf, reason: String },

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("signature verification failed")]
    VerificationFailed,

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("failed to persist key to {}: {source}", path.display())]
    KeyPersist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
