use std::sync::Arc;

use prov_crypto::merkle_root;
use prov_ledger::{CancellationToken, LedgerClient, LedgerWriteResult};
use prov_store::HashLog;
use prov_types::{AnchorBatch, BatchId, Digest};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AnchorResult;

/// What was anchored in one cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: BatchId,
    pub root: Digest,
    pub leaf_count: usize,
}

impl From<&AnchorBatch> for BatchSummary {
    fn from(batch: &AnchorBatch) -> Self {
        Self {
            batch_id: batch.batch_id.clone(),
            root: batch.root,
            leaf_count: batch.leaf_count(),
        }
    }
}

/// Outcome of one anchoring cycle. `batch` is `None` when the log was empty
/// and nothing was submitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnchorReport {
    pub batch: Option<BatchSummary>,
    pub result: LedgerWriteResult,
}

/// Runs one anchoring cycle: load log, compute root, submit.
///
/// Never mutates the log. Running twice over an unchanged log builds two
/// batches with the same root and fresh ids.
#[derive(Clone)]
pub struct AnchorCoordinator {
    log: Arc<dyn HashLog>,
    ledger: LedgerClient,
}

impl AnchorCoordinator {
    pub fn new(log: Arc<dyn HashLog>, ledger: LedgerClient) -> Self {
        Self { log, ledger }
    }

    /// One cycle with a generated batch id.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> AnchorResult<AnchorReport> {
        self.run_cycle_with_batch(None, cancel).await
    }

    pub async fn run_cycle_with_batch(
        &self,
        batch_id: Option<BatchId>,
        cancel: &CancellationToken,
    ) -> AnchorResult<AnchorReport> {
        let leaves = self.log.load()?;
        let Some(root) = merkle_root(&leaves) else {
            info!("hash log empty, nothing to anchor");
            return Ok(AnchorReport {
                batch: None,
                result: LedgerWriteResult::dry_run(),
            });
        };

        let batch = AnchorBatch::new(batch_id.unwrap_or_else(BatchId::generate), root, leaves);
        let result = self.ledger.anchor_root(&batch, cancel).await;
        info!(batch_id = %batch.batch_id, root = %root, result = %result, "anchor cycle complete");

        Ok(AnchorReport {
            batch: Some(BatchSummary::from(&batch)),
            result,
        })
    }
}

impl std::fmt::Debug for AnchorCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnchorCoordinator")
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use prov_crypto::ContentHasher;
    use prov_ledger::{
        EncodedCall, FailureKind, LedgerResult, LedgerSettings, LedgerTarget, LedgerTransport,
        StaticConfig,
    };
    use prov_store::InMemoryHashLog;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<serde_json::Value>>);

    #[async_trait]
    impl LedgerTransport for Recording {
        async fn call(&self, _: &LedgerTarget, call: &EncodedCall) -> LedgerResult<serde_json::Value> {
            let body: serde_json::Value = serde_json::from_slice(call.body()).unwrap();
            self.0.lock().unwrap().push(body);
            Ok(serde_json::json!("ok"))
        }
    }

    fn configured() -> Arc<StaticConfig> {
        Arc::new(StaticConfig(LedgerSettings {
            endpoint: Some("http://127.0.0.1:4943".into()),
            canister_id: Some("abc".into()),
            max_retries: 0,
            ..LedgerSettings::default()
        }))
    }

    #[tokio::test]
    async fn empty_log_submits_nothing() {
        let transport = Arc::new(Recording::default());
        let coordinator = AnchorCoordinator::new(
            Arc::new(InMemoryHashLog::new()),
            LedgerClient::new(configured(), transport.clone()),
        );
        let report = coordinator.run_cycle(&CancellationToken::new()).await.unwrap();
        assert!(report.batch.is_none());
        assert!(report.result.is_dry_run());
        assert_eq!(report.result.attempts, 0);
        assert!(transport.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn submits_root_and_batch_id() {
        let (a, b, c) = (
            ContentHasher::hash(b"a"),
            ContentHasher::hash(b"b"),
            ContentHasher::hash(b"c"),
        );
        let transport = Arc::new(Recording::default());
        let coordinator = AnchorCoordinator::new(
            Arc::new(InMemoryHashLog::with_entries([a, b, c])),
            LedgerClient::new(configured(), transport.clone()),
        );

        let batch_id = BatchId::new("nightly-42").unwrap();
        let report = coordinator
            .run_cycle_with_batch(Some(batch_id.clone()), &CancellationToken::new())
            .await
            .unwrap();

        let batch = report.batch.unwrap();
        assert_eq!(batch.batch_id, batch_id);
        assert_eq!(batch.leaf_count, 3);
        assert_eq!(Some(batch.root), merkle_root(&[a, b, c]));
        assert!(report.result.is_success());

        let calls = transport.0.lock().unwrap();
        assert_eq!(
            calls[0],
            serde_json::json!({ "method": "anchor_root", "args": [batch.root.to_hex(), "nightly-42"] })
        );
    }

    #[tokio::test]
    async fn generated_batch_ids_are_fresh() {
        let coordinator = AnchorCoordinator::new(
            Arc::new(InMemoryHashLog::with_entries([ContentHasher::hash(b"x")])),
            LedgerClient::new(configured(), Arc::new(Recording::default())),
        );
        let cancel = CancellationToken::new();
        let first = coordinator.run_cycle(&cancel).await.unwrap().batch.unwrap();
        let second = coordinator.run_cycle(&cancel).await.unwrap().batch.unwrap();
        assert_eq!(first.root, second.root);
        assert_ne!(first.batch_id, second.batch_id);
    }

    #[tokio::test]
    async fn unconfigured_ledger_reports_batch_with_dry_run() {
        let coordinator = AnchorCoordinator::new(
            Arc::new(InMemoryHashLog::with_entries([ContentHasher::hash(b"x")])),
            LedgerClient::new(
                Arc::new(StaticConfig::unconfigured()),
                Arc::new(Recording::default()),
            ),
        );
        let report = coordinator.run_cycle(&CancellationToken::new()).await.unwrap();
        assert!(report.batch.is_some());
        assert!(report.result.is_dry_run());
        assert_ne!(report.result.failure_kind(), Some(FailureKind::Exhausted));
    }
}
