use prov_crypto::CryptoError;
use prov_ledger::LedgerError;
use prov_store::LogError;
use prov_types::TypeError;

/// Errors surfaced by the provenance service.
///
/// Ledger failures during a submission are not errors; they come back as a
/// [`LedgerWriteResult`](prov_ledger::LedgerWriteResult).
#[derive(Debug, thiserror::Error)]
pub enum AnchorError {
    /// Malformed digest, signature text, or batch id.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    KeyNotFound(CryptoError),

    #[error("crypto error: {0}")]
    Crypto(CryptoError),

    #[error("hash log error: {0}")]
    Log(#[from] LogError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<CryptoError> for AnchorError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::KeyNotFound { .. } => Self::KeyNotFound(e),
            CryptoError::MalformedSignature(reason) => Self::InvalidInput(reason),
            other => Self::Crypto(other),
        }
    }
}

impl From<TypeError> for AnchorError {
    fn from(e: TypeError) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

pub type AnchorResult<T> = Result<T, AnchorError>;
