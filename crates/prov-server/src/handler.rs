use axum::extract::{Path, State};
use axum::response::Json;
use prov_anchor::{AnchorReport, ProvenanceService, PublishReport, RootSummary, SignedDigest};
use prov_crypto::MerkleProof;
use prov_types::Digest;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::error::{ServerError, ServerResult};

/// Shared handler state.
#[derive(Clone, Debug)]
pub struct AppState {
    pub service: ProvenanceService,
    /// Cancelled on shutdown; aborts pending ledger retry waits.
    pub shutdown: CancellationToken,
}

#[derive(Debug, Deserialize)]
pub struct SignRequest {
    #[serde(alias = "content_hash")]
    pub digest: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(alias = "content_hash")]
    pub digest: String,
    pub signature: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PublicKeyResponse {
    pub public_pem: String,
}

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    #[serde(alias = "content_hash")]
    pub digest: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub digest: Digest,
    pub appended: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnchorRequest {
    pub batch_id: Option<String>,
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "name": "prov-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn sign_handler(
    State(state): State<AppState>,
    Json(req): Json<SignRequest>,
) -> ServerResult<Json<SignedDigest>> {
    Ok(Json(state.service.sign(&req.digest)?))
}

pub async fn verify_handler(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> ServerResult<Json<VerifyResponse>> {
    let valid = state.service.verify(&req.digest, &req.signature)?;
    Ok(Json(VerifyResponse { valid }))
}

pub async fn pubkey_handler(State(state): State<AppState>) -> ServerResult<Json<PublicKeyResponse>> {
    let public_pem = state.service.public_key()?;
    Ok(Json(PublicKeyResponse { public_pem }))
}

pub async fn publish_pubkey_handler(State(state): State<AppState>) -> ServerResult<Json<PublishReport>> {
    Ok(Json(state.service.publish_public_key(&state.shutdown).await?))
}

pub async fn ingest_handler(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> ServerResult<Json<IngestResponse>> {
    let digest = Digest::from_hex(&req.digest).map_err(|e| ServerError::InvalidInput(format!("digest: {e}")))?;
    let appended = state.service.ingest_digest(digest)?;
    Ok(Json(IngestResponse { digest, appended }))
}

pub async fn proof_handler(
    State(state): State<AppState>,
    Path(digest): Path<String>,
) -> ServerResult<Json<MerkleProof>> {
    state
        .service
        .inclusion_proof(&digest)?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("digest {digest} is not in the hash log")))
}

pub async fn root_handler(State(state): State<AppState>) -> ServerResult<Json<RootSummary>> {
    Ok(Json(state.service.current_root()?))
}

/// Body is optional; an absent or empty body anchors under a generated id.
pub async fn anchor_handler(
    State(state): State<AppState>,
    body: Option<Json<AnchorRequest>>,
) -> ServerResult<Json<AnchorReport>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let report = state
        .service
        .anchor(req.batch_id.as_deref(), &state.shutdown)
        .await?;
    Ok(Json(report))
}
