use std::sync::Arc;

use chrono::{DateTime, Utc};
use prov_crypto::{ContentHasher, KeyManager, MerkleProof, MerkleTree, Signature, Signer, Verifier};
use prov_ledger::{CancellationToken, LedgerClient, LedgerWriteResult};
use prov_store::{FileHashLog, HashLog};
use prov_types::{BatchId, Digest};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ServiceConfig;
use crate::coordinator::{AnchorCoordinator, AnchorReport};
use crate::error::{AnchorError, AnchorResult};

/// A digest with its signature and signing time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedDigest {
    pub digest: Digest,
    pub signature: Signature,
    pub signed_at: DateTime<Utc>,
}

/// Result of [`ProvenanceService::record_content`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub digest: Digest,
    pub signature: Signature,
    pub signed_at: DateTime<Utc>,
    /// `false` if the digest was already logged.
    pub appended: bool,
}

/// Result of [`ProvenanceService::publish_public_key`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublishReport {
    pub public_pem: String,
    /// `true` only when the ledger accepted the key.
    pub published: bool,
    pub result: LedgerWriteResult,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootSummary {
    pub root: Option<Digest>,
    pub leaf_count: usize,
}

/// The provenance operations over one key, one hash log, and one ledger.
#[derive(Clone)]
pub struct ProvenanceService {
    keys: Arc<KeyManager>,
    signer: Signer,
    verifier: Verifier,
    log: Arc<dyn HashLog>,
    ledger: LedgerClient,
    coordinator: Arc<AnchorCoordinator>,
}

impl ProvenanceService {
    /// Wire the service from configuration: file-backed key and log, HTTP
    /// ledger transport, ledger settings from [`ServiceConfig::ledger_source`].
    ///
    /// Touches no files; the key is loaded or generated on first use.
    pub fn from_config(config: &ServiceConfig) -> AnchorResult<Self> {
        let keys = Arc::new(KeyManager::new(&config.key_path, config.key_policy));
        let log = Arc::new(FileHashLog::new(&config.hash_log_path));
        let ledger = LedgerClient::http(config.ledger_source())?;
        info!(
            key_path = %config.key_path.display(),
            hash_log = %config.hash_log_path.display(),
            key_policy = ?config.key_policy,
            "provenance service configured"
        );
        Ok(Self::new(keys, log, ledger))
    }

    pub fn new(keys: Arc<KeyManager>, log: Arc<dyn HashLog>, ledger: LedgerClient) -> Self {
        let coordinator = Arc::new(AnchorCoordinator::new(log.clone(), ledger.clone()));
        Self {
            signer: Signer::new(keys.clone()),
            verifier: Verifier::new(keys.clone()),
            keys,
            log,
            ledger,
            coordinator,
        }
    }

    pub fn coordinator(&self) -> Arc<AnchorCoordinator> {
        self.coordinator.clone()
    }

    /// Sign a hex digest. Generates the key on first use if policy allows.
    pub fn sign(&self, digest_hex: &str) -> AnchorResult<SignedDigest> {
        let digest = parse_digest(digest_hex)?;
        let signature = self.signer.sign_digest(&digest)?;
        debug!(digest = %digest, "digest signed");
        Ok(SignedDigest {
            digest,
            signature,
            signed_at: Utc::now(),
        })
    }

    /// Check a hex signature over a hex digest.
    ///
    /// Malformed hex is [`AnchorError::InvalidInput`]. Every other failure,
    /// including a missing key or non-DER signature bytes, is `Ok(false)`.
    pub fn verify(&self, digest_hex: &str, signature_hex: &str) -> AnchorResult<bool> {
        let digest = parse_digest(digest_hex)?;
        let signature = Signature::from_hex(signature_hex)?;
        Ok(self.verifier.verify_digest(&digest, &signature))
    }

    /// Public key PEM. Never generates a key.
    pub fn public_key(&self) -> AnchorResult<String> {
        Ok(self.keys.public_key_pem()?)
    }

    /// Submit `set_pubkey(pem)` to the ledger.
    pub async fn publish_public_key(&self, cancel: &CancellationToken) -> AnchorResult<PublishReport> {
        let public_pem = self.public_key()?;
        let result = self.ledger.publish_public_key(&public_pem, cancel).await;
        info!(result = %result, "public key publication");
        Ok(PublishReport {
            published: result.is_success(),
            public_pem,
            result,
        })
    }

    /// Run one anchoring cycle, optionally under a caller-chosen batch id.
    pub async fn anchor(&self, batch_id: Option<&str>, cancel: &CancellationToken) -> AnchorResult<AnchorReport> {
        let batch_id = batch_id.map(BatchId::new).transpose()?;
        self.coordinator.run_cycle_with_batch(batch_id, cancel).await
    }

    /// Append a hex digest to the log. Returns whether it was new.
    pub fn ingest_content_hash(&self, digest_hex: &str) -> AnchorResult<bool> {
        self.ingest_digest(parse_digest(digest_hex)?)
    }

    /// Append an already-parsed digest to the log. Returns whether it was new.
    pub fn ingest_digest(&self, digest: Digest) -> AnchorResult<bool> {
        Ok(self.log.append_if_absent(digest)?)
    }

    /// Hash content, sign the digest, and log it.
    ///
    /// The log is only touched once the signature exists, so a signing
    /// failure leaves it unchanged.
    pub fn record_content(&self, content: &[u8]) -> AnchorResult<ProvenanceRecord> {
        let digest = ContentHasher::hash(content);
        let signature = self.signer.sign_digest(&digest)?;
        let appended = self.log.append_if_absent(digest)?;
        Ok(ProvenanceRecord {
            digest,
            signature,
            signed_at: Utc::now(),
            appended,
        })
    }

    /// Inclusion proof for a logged digest against the current root.
    pub fn inclusion_proof(&self, digest_hex: &str) -> AnchorResult<Option<MerkleProof>> {
        let digest = parse_digest(digest_hex)?;
        let tree = MerkleTree::from_leaves(self.log.load()?);
        Ok(tree.proof_for(&digest))
    }

    pub fn current_root(&self) -> AnchorResult<RootSummary> {
        let tree = MerkleTree::from_leaves(self.log.load()?);
        Ok(RootSummary {
            root: tree.root(),
            leaf_count: tree.leaf_count(),
        })
    }
}

fn parse_digest(hex: &str) -> AnchorResult<Digest> {
    Digest::from_hex(hex).map_err(|e| AnchorError::InvalidInput(format!("digest: {e}")))
}

impl std::fmt::Debug for ProvenanceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvenanceService")
            .field("keys", &self.keys)
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use prov_crypto::{merkle_root, verify_with_public_pem, KeyPolicy};
    use prov_ledger::{
        EncodedCall, LedgerError, LedgerResult, LedgerSettings, LedgerTarget, LedgerTransport,
        StaticConfig,
    };
    use std::sync::atomic::{AtomicU32, Ordering};

    const H1: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const H2: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    struct Fixed {
        ok: bool,
        calls: AtomicU32,
    }

    #[async_trait]
    impl LedgerTransport for Fixed {
        async fn call(&self, _: &LedgerTarget, _: &EncodedCall) -> LedgerResult<serde_json::Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.ok {
                Ok(serde_json::json!({ "accepted": true }))
            } else {
                Err(LedgerError::Rejected {
                    status: 500,
                    body: "boom".into(),
                })
            }
        }
    }

    fn unconfigured_service(dir: &tempfile::TempDir) -> ProvenanceService {
        let config = ServiceConfig {
            key_path: dir.path().join("provenance_key.pem"),
            hash_log_path: dir.path().join("data").join("hashes.json"),
            ..ServiceConfig::default()
        };
        let keys = Arc::new(KeyManager::new(&config.key_path, config.key_policy));
        let log = Arc::new(FileHashLog::new(&config.hash_log_path));
        let ledger = LedgerClient::new(
            Arc::new(StaticConfig::unconfigured()),
            Arc::new(Fixed {
                ok: true,
                calls: AtomicU32::new(0),
            }),
        );
        ProvenanceService::new(keys, log, ledger)
    }

    fn configured_service(dir: &tempfile::TempDir, ok: bool) -> (ProvenanceService, Arc<Fixed>) {
        let transport = Arc::new(Fixed {
            ok,
            calls: AtomicU32::new(0),
        });
        let config = Arc::new(StaticConfig(LedgerSettings {
            endpoint: Some("http://127.0.0.1:4943".into()),
            canister_id: Some("abc".into()),
            max_retries: 1,
            backoff_base_ms: 1,
            ..LedgerSettings::default()
        }));
        let service = ProvenanceService::new(
            Arc::new(KeyManager::new(
                dir.path().join("key.pem"),
                KeyPolicy::GenerateIfMissing,
            )),
            Arc::new(FileHashLog::new(dir.path().join("hashes.json"))),
            LedgerClient::new(config, transport.clone()),
        );
        (service, transport)
    }

    #[tokio::test]
    async fn end_to_end_without_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let service = unconfigured_service(&dir);
        let cancel = CancellationToken::new();

        assert!(service.ingest_content_hash(H1).unwrap());
        assert!(service.ingest_content_hash(H2).unwrap());

        let mut concat = vec![0xaa; 32];
        concat.extend_from_slice(&[0xbb; 32]);
        let expected_root = ContentHasher::hash(&concat);
        let summary = service.current_root().unwrap();
        assert_eq!(summary.root, Some(expected_root));
        assert_eq!(summary.leaf_count, 2);

        let signed = service.sign(&expected_root.to_hex()).unwrap();
        assert!(service
            .verify(&expected_root.to_hex(), &signed.signature.to_hex())
            .unwrap());

        let report = service.anchor(None, &cancel).await.unwrap();
        assert!(report.result.is_dry_run());
        assert_eq!(report.result.attempts, 0);
        assert_eq!(report.batch.unwrap().root, expected_root);
    }

    #[test]
    fn duplicate_ingest_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let service = unconfigured_service(&dir);
        service.ingest_content_hash(H1).unwrap();
        service.ingest_content_hash(H2).unwrap();
        let before = service.current_root().unwrap();

        assert!(!service.ingest_content_hash(&H1.to_uppercase()).unwrap());
        assert_eq!(service.current_root().unwrap(), before);
    }

    #[test]
    fn malformed_digests_are_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let service = unconfigured_service(&dir);
        let bad_inputs = [String::new(), "abc".into(), "zz".repeat(32), "aa".repeat(31)];
        for bad in &bad_inputs {
            assert!(matches!(service.sign(bad), Err(AnchorError::InvalidInput(_))));
            assert!(matches!(
                service.ingest_content_hash(bad),
                Err(AnchorError::InvalidInput(_))
            ));
        }
        assert!(!dir.path().join("provenance_key.pem").exists());
    }

    #[test]
    fn verify_input_rules() {
        let dir = tempfile::tempdir().unwrap();
        let service = unconfigured_service(&dir);
        assert!(matches!(
            service.verify(H1, "not-hex"),
            Err(AnchorError::InvalidInput(_))
        ));
        // Well-formed hex but no key yet: fail closed.
        assert!(!service.verify(H1, "3006020101020101").unwrap());
        service.sign(H1).unwrap();
        // Key exists, bytes are not a valid signature.
        assert!(!service.verify(H1, "00").unwrap());
    }

    #[test]
    fn tampered_digest_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let service = unconfigured_service(&dir);
        let signed = service.sign(H1).unwrap();
        assert!(!service.verify(H2, &signed.signature.to_hex()).unwrap());
    }

    #[test]
    fn public_key_never_generates() {
        let dir = tempfile::tempdir().unwrap();
        let service = unconfigured_service(&dir);
        assert!(matches!(service.public_key(), Err(AnchorError::KeyNotFound(_))));

        let signed = service.sign(H1).unwrap();
        let pem = service.public_key().unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));
        assert!(!pem.contains("PRIVATE"));
        let digest = Digest::from_hex(H1).unwrap();
        assert!(verify_with_public_pem(&pem, digest.as_bytes(), &signed.signature));
    }

    #[test]
    fn record_content_logs_and_signs() {
        let dir = tempfile::tempdir().unwrap();
        let service = unconfigured_service(&dir);
        let record = service.record_content(b"agent output").unwrap();
        assert!(record.appended);
        assert_eq!(record.digest, ContentHasher::hash(b"agent output"));
        assert!(service
            .verify(&record.digest.to_hex(), &record.signature.to_hex())
            .unwrap());

        let again = service.record_content(b"agent output").unwrap();
        assert!(!again.appended);
        assert_eq!(service.current_root().unwrap().leaf_count, 1);
    }

    #[test]
    fn inclusion_proofs_verify_against_current_root() {
        let dir = tempfile::tempdir().unwrap();
        let service = unconfigured_service(&dir);
        let digests: Vec<Digest> = (0..5u8).map(|i| ContentHasher::hash(&[i])).collect();
        for d in &digests {
            service.ingest_content_hash(&d.to_hex()).unwrap();
        }
        let root = service.current_root().unwrap().root.unwrap();
        assert_eq!(Some(root), merkle_root(&digests));

        for d in &digests {
            let proof = service.inclusion_proof(&d.to_hex()).unwrap().unwrap();
            assert!(proof.verify_against(&root));
        }
        assert!(service.inclusion_proof(H1).unwrap().is_none());
    }

    #[tokio::test]
    async fn publish_without_ledger_is_not_published() {
        let dir = tempfile::tempdir().unwrap();
        let service = unconfigured_service(&dir);
        let cancel = CancellationToken::new();
        assert!(matches!(
            service.publish_public_key(&cancel).await,
            Err(AnchorError::KeyNotFound(_))
        ));

        service.sign(H1).unwrap();
        let report = service.publish_public_key(&cancel).await.unwrap();
        assert!(!report.published);
        assert!(report.result.is_dry_run());
        assert_eq!(report.public_pem, service.public_key().unwrap());
    }

    #[tokio::test]
    async fn publish_with_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let (service, transport) = configured_service(&dir, true);
        service.sign(H1).unwrap();
        let report = service
            .publish_public_key(&CancellationToken::new())
            .await
            .unwrap();
        assert!(report.published);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn anchor_failure_is_data_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let (service, transport) = configured_service(&dir, false);
        service.ingest_content_hash(H1).unwrap();
        let report = service
            .anchor(Some("manual-1"), &CancellationToken::new())
            .await
            .unwrap();
        assert!(report.result.is_failed());
        assert_eq!(report.result.attempts, 2);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert!(report.result.error().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn invalid_batch_id_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let service = unconfigured_service(&dir);
        assert!(matches!(
            service.anchor(Some("has space"), &CancellationToken::new()).await,
            Err(AnchorError::InvalidInput(_))
        ));
    }

    fn require_existing_service(dir: &tempfile::TempDir) -> ProvenanceService {
        ProvenanceService::new(
            Arc::new(KeyManager::new(
                dir.path().join("missing.pem"),
                KeyPolicy::RequireExisting,
            )),
            Arc::new(FileHashLog::new(dir.path().join("h.json"))),
            LedgerClient::new(
                Arc::new(StaticConfig::unconfigured()),
                Arc::new(Fixed {
                    ok: true,
                    calls: AtomicU32::new(0),
                }),
            ),
        )
    }

    #[test]
    fn require_existing_policy_refuses_to_sign() {
        let dir = tempfile::tempdir().unwrap();
        let service = require_existing_service(&dir);
        assert!(matches!(service.sign(H1), Err(AnchorError::KeyNotFound(_))));
    }

    #[test]
    fn failed_record_leaves_log_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let service = require_existing_service(&dir);
        assert!(matches!(
            service.record_content(b"agent output"),
            Err(AnchorError::KeyNotFound(_))
        ));
        let summary = service.current_root().unwrap();
        assert_eq!(summary.leaf_count, 0);
        assert_eq!(summary.root, None);
        assert!(!dir.path().join("h.json").exists());
    }

    #[test]
    fn deleted_key_file_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let service = unconfigured_service(&dir);
        let signed = service.sign(H1).unwrap();
        let sig_hex = signed.signature.to_hex();
        assert!(service.verify(H1, &sig_hex).unwrap());

        std::fs::remove_file(dir.path().join("provenance_key.pem")).unwrap();

        assert!(!service.verify(H1, &sig_hex).unwrap());
        assert!(matches!(service.public_key(), Err(AnchorError::KeyNotFound(_))));
    }

    #[test]
    fn ingest_digest_matches_hex_ingest() {
        let dir = tempfile::tempdir().unwrap();
        let service = unconfigured_service(&dir);
        let digest = Digest::from_hex(H1).unwrap();
        assert!(service.ingest_digest(digest).unwrap());
        assert!(!service.ingest_content_hash(H1).unwrap());
    }
}
