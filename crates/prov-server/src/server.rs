use prov_anchor::ProvenanceService;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// Provenance HTTP server.
pub struct ProvServer {
    config: ServerConfig,
    service: ProvenanceService,
}

impl ProvServer {
    pub fn new(config: ServerConfig, service: ProvenanceService) -> Self {
        Self { config, service }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self, shutdown: CancellationToken) -> axum::Router {
        build_router(AppState {
            service: self.service.clone(),
            shutdown,
        })
    }

    /// Serve until `shutdown` is cancelled, then drain in-flight requests.
    pub async fn serve(self, shutdown: CancellationToken) -> ServerResult<()> {
        let app = self.router(shutdown.clone());
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "provenance server listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prov_anchor::ServiceConfig;

    #[test]
    fn server_construction() {
        let service = ProvenanceService::from_config(&ServiceConfig::default()).unwrap();
        let server = ProvServer::new(ServerConfig::default(), service);
        assert_eq!(server.config().bind_addr.port(), 9001);
        let _router = server.router(CancellationToken::new());
    }

    #[tokio::test]
    async fn serve_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let service = ProvenanceService::from_config(&ServiceConfig {
            key_path: dir.path().join("k.pem"),
            hash_log_path: dir.path().join("h.json"),
            ..ServiceConfig::default()
        })
        .unwrap();
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
        };
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(ProvServer::new(config, service).serve(shutdown.clone()));
        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }
}
