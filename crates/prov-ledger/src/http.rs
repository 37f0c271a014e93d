use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::debug;

use crate::config::LedgerTarget;
use crate::encoding::EncodedCall;
use crate::error::{LedgerError, LedgerResult};
use crate::traits::LedgerTransport;

/// Ledger transport over HTTP(S).
///
/// POSTs the encoded call to [`LedgerTarget::call_url`] with the target's
/// request timeout and, when configured, a bearer credential. A non-2xx
/// status is [`LedgerError::Rejected`].
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> LedgerResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("prov-ledger/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LedgerError::Transport(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LedgerTransport for HttpTransport {
    async fn call(&self, target: &LedgerTarget, call: &EncodedCall) -> LedgerResult<serde_json::Value> {
        let url = target.call_url();
        debug!(url = %url, method = call.method(), "ledger call");

        let mut request = self
            .client
            .post(&url)
            .timeout(target.request_timeout)
            .header(CONTENT_TYPE, "application/json")
            .body(call.body().to_vec());
        if let Some(token) = &target.credential {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LedgerError::Response(e.to_string()))?;

        if !status.is_success() {
            return Err(LedgerError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body)))
    }
}
