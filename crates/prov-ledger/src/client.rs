use std::sync::Arc;

use prov_types::AnchorBatch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ConfigSource, LedgerConfigState};
use crate::encoding::LedgerCall;
use crate::error::LedgerResult;
use crate::http::HttpTransport;
use crate::result::{FailureKind, LedgerWriteResult, SubmissionState};
use crate::traits::LedgerTransport;

/// Submits calls to the external ledger.
///
/// Configuration is resolved on every submission. Unconfigured means an
/// immediate dry run with zero attempts and no I/O. Configured means up to
/// `max_retries + 1` sequential attempts with exponential backoff between
/// them; the backoff wait is aborted by the cancellation token.
#[derive(Clone)]
pub struct LedgerClient {
    config: Arc<dyn ConfigSource>,
    transport: Arc<dyn LedgerTransport>,
}

impl LedgerClient {
    pub fn new(config: Arc<dyn ConfigSource>, transport: Arc<dyn LedgerTransport>) -> Self {
        Self { config, transport }
    }

    /// Client over the default [`HttpTransport`].
    pub fn http(config: Arc<dyn ConfigSource>) -> LedgerResult<Self> {
        Ok(Self::new(config, Arc::new(HttpTransport::new()?)))
    }

    /// Current configuration state, freshly resolved.
    pub fn config_state(&self) -> LedgerResult<LedgerConfigState> {
        self.config.resolve()
    }

    /// Commit a batch root: `anchor_root(root_hex, batch_id)`.
    pub async fn anchor_root(&self, batch: &AnchorBatch, cancel: &CancellationToken) -> LedgerWriteResult {
        info!(batch_id = %batch.batch_id, root = %batch.root, leaves = batch.leaf_count(), "anchoring root");
        self.submit(&LedgerCall::anchor_root(&batch.root, &batch.batch_id), cancel)
            .await
    }

    /// Publish the verification key: `set_pubkey(public_pem)`.
    pub async fn publish_public_key(&self, public_pem: &str, cancel: &CancellationToken) -> LedgerWriteResult {
        self.submit(&LedgerCall::set_pubkey(public_pem), cancel).await
    }

    /// Submit one call, producing exactly one result.
    pub async fn submit(&self, call: &LedgerCall, cancel: &CancellationToken) -> LedgerWriteResult {
        let method = call.method();

        let target = match self.config.resolve() {
            Ok(LedgerConfigState::Unconfigured) => {
                info!(method, "ledger not configured, dry run");
                return LedgerWriteResult::dry_run();
            }
            Ok(LedgerConfigState::Configured(target)) => target,
            Err(e) => {
                warn!(method, error = %e, "ledger submission rejected before sending");
                return LedgerWriteResult::precondition(e);
            }
        };

        let encoded = match call.encode() {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(method, error = %e, "ledger submission rejected before sending");
                return LedgerWriteResult::precondition(e);
            }
        };

        let policy = target.retry;
        let mut state = SubmissionState::Idle;
        loop {
            if cancel.is_cancelled() {
                info!(method, attempts = state.attempts(), "ledger submission cancelled");
                return LedgerWriteResult::failed(
                    FailureKind::Cancelled,
                    "cancelled before next attempt",
                    state.attempts(),
                );
            }

            state = state.next_attempt();
            let attempt = state.attempts();
            debug!(method, attempt, state = %state, "ledger attempt");

            let error = match self.transport.call(&target, &encoded).await {
                Ok(raw) => {
                    if attempt > 1 {
                        info!(method, attempt, "ledger call succeeded after retry");
                    }
                    return LedgerWriteResult::success(raw, attempt);
                }
                Err(e) => e,
            };

            if attempt > policy.max_retries {
                warn!(method, attempts = attempt, error = %error, "ledger retries exhausted");
                return LedgerWriteResult::failed(FailureKind::Exhausted, error, attempt);
            }

            let delay = policy.delay_for(attempt);
            warn!(
                method,
                attempt,
                max_attempts = policy.max_retries + 1,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "ledger attempt failed, backing off"
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(method, attempts = attempt, "ledger backoff cancelled");
                    return LedgerWriteResult::failed(
                        FailureKind::Cancelled,
                        format!("cancelled during backoff; last error: {error}"),
                        attempt,
                    );
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

impl std::fmt::Debug for LedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
