use async_trait::async_trait;

use crate::config::LedgerTarget;
use crate::encoding::EncodedCall;
use crate::error::LedgerResult;

/// One attempt at delivering an encoded call to the ledger.
///
/// Implementations perform exactly one network round trip per call and do
/// not retry; retry policy lives in [`LedgerClient`](crate::LedgerClient).
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    async fn call(&self, target: &LedgerTarget, call: &EncodedCall) -> LedgerResult<serde_json::Value>;
}
