use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

pub const ENV_URL: &str = "PROV_LEDGER_URL";
pub const ENV_CANISTER: &str = "PROV_LEDGER_CANISTER";
pub const ENV_CREDENTIAL: &str = "PROV_LEDGER_CREDENTIAL";
pub const ENV_MAX_RETRIES: &str = "PROV_LEDGER_MAX_RETRIES";
pub const ENV_BACKOFF_MS: &str = "PROV_LEDGER_BACKOFF_MS";
pub const ENV_TIMEOUT_MS: &str = "PROV_LEDGER_TIMEOUT_MS";

/// Raw ledger settings, as written by an operator.
///
/// Nothing here is validated until [`LedgerSettings::resolve`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// Base URL of the ledger gateway. Absent or blank means dry-run.
    pub endpoint: Option<String>,
    /// Identifier of the ledger object receiving calls.
    pub canister_id: Option<String>,
    /// File holding a bearer credential for ledger calls.
    pub credential_path: Option<PathBuf>,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            canister_id: None,
            credential_path: None,
            max_retries: 3,
            backoff_base_ms: 500,
            request_timeout_ms: 10_000,
        }
    }
}

impl LedgerSettings {
    /// Validate into a tagged configuration state.
    ///
    /// A blank endpoint is [`LedgerConfigState::Unconfigured`]. Anything else
    /// that is wrong (bad URL, non-http scheme, missing or malformed object
    /// id, unreadable credential file) is [`LedgerError::InvalidConfig`].
    pub fn resolve(&self) -> LedgerResult<LedgerConfigState> {
        let endpoint = match self.endpoint.as_deref().map(str::trim) {
            None | Some("") => return Ok(LedgerConfigState::Unconfigured),
            Some(raw) => parse_endpoint(raw)?,
        };

        let canister_id = match self.canister_id.as_deref().map(str::trim) {
            None | Some("") => {
                return Err(LedgerError::InvalidConfig(
                    "ledger endpoint is set but no canister id is configured".into(),
                ))
            }
            Some(id) => validate_canister_id(id)?,
        };

        let credential = match &self.credential_path {
            Some(path) => read_credential(path)?,
            None => None,
        };

        Ok(LedgerConfigState::Configured(LedgerTarget {
            endpoint,
            canister_id,
            credential,
            retry: RetryPolicy {
                max_retries: self.max_retries,
                backoff_base: Duration::from_millis(self.backoff_base_ms),
            },
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }))
    }
}

fn parse_endpoint(raw: &str) -> LedgerResult<Url> {
    let url = Url::parse(raw)
        .map_err(|e| LedgerError::InvalidConfig(format!("malformed ledger URL {raw:?}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(LedgerError::InvalidConfig(format!(
            "ledger URL scheme must be http or https, got {other:?}"
        ))),
    }
}

fn validate_canister_id(id: &str) -> LedgerResult<String> {
    let ok = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(id.to_string())
    } else {
        Err(LedgerError::InvalidConfig(format!(
            "canister id {id:?} may only contain ASCII letters, digits, '-' and '_'"
        )))
    }
}

fn read_credential(path: &Path) -> LedgerResult<Option<String>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        LedgerError::InvalidConfig(format!(
            "cannot read ledger credential {}: {e}",
            path.display()
        ))
    })?;
    let token = text.trim();
    Ok((!token.is_empty()).then(|| token.to_string()))
}

/// Result of resolving ledger settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerConfigState {
    /// No endpoint configured: submissions are dry runs.
    Unconfigured,
    Configured(LedgerTarget),
}

/// A validated ledger destination plus the retry budget for calls to it.
#[derive(Clone, PartialEq, Eq)]
pub struct LedgerTarget {
    pub endpoint: Url,
    pub canister_id: String,
    pub credential: Option<String>,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
}

impl LedgerTarget {
    /// `{endpoint}/canisters/{canister_id}/call`
    pub fn call_url(&self) -> String {
        format!(
            "{}/canisters/{}/call",
            self.endpoint.as_str().trim_end_matches('/'),
            self.canister_id
        )
    }
}

impl fmt::Debug for LedgerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerTarget")
            .field("endpoint", &self.endpoint.as_str())
            .field("canister_id", &self.canister_id)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("retry", &self.retry)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Bounded exponential backoff.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts are at most `max_retries + 1`.
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    /// Wait after the `attempt`-th failed attempt (1-based): `base * 2^(attempt-1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor)
    }
}

/// Where ledger settings come from. Consulted on every submission so
/// operators can reconfigure without a restart.
pub trait ConfigSource: Send + Sync + fmt::Debug {
    fn settings(&self) -> LedgerResult<LedgerSettings>;

    fn resolve(&self) -> LedgerResult<LedgerConfigState> {
        self.settings()?.resolve()
    }
}

/// Settings from `PROV_LEDGER_*` environment variables.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvConfig;

impl EnvConfig {
    pub fn new() -> Self {
        Self
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn settings_from(lookup: impl Fn(&str) -> Option<String>) -> LedgerResult<LedgerSettings> {
        let defaults = LedgerSettings::default();
        Ok(LedgerSettings {
            endpoint: lookup(ENV_URL),
            canister_id: lookup(ENV_CANISTER),
            credential_path: lookup(ENV_CREDENTIAL)
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            max_retries: parse_var(&lookup, ENV_MAX_RETRIES, defaults.max_retries)?,
            backoff_base_ms: parse_var(&lookup, ENV_BACKOFF_MS, defaults.backoff_base_ms)?,
            request_timeout_ms: parse_var(&lookup, ENV_TIMEOUT_MS, defaults.request_timeout_ms)?,
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> LedgerResult<T>
where
    T::Err: fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| LedgerError::InvalidConfig(format!("{name}={raw:?}: {e}"))),
    }
}

impl ConfigSource for EnvConfig {
    fn settings(&self) -> LedgerResult<LedgerSettings> {
        Self::settings_from(|name| std::env::var(name).ok())
    }
}

/// Settings from the `[ledger]` table of a TOML file, re-read on every call.
///
/// A missing file means unconfigured. Other keys in the file are ignored, so
/// the same file can carry the service configuration.
#[derive(Clone, Debug)]
pub struct TomlFileConfig {
    path: PathBuf,
}

#[derive(Deserialize)]
struct LedgerFile {
    #[serde(default)]
    ledger: LedgerSettings,
}

impl TomlFileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for TomlFileConfig {
    fn settings(&self) -> LedgerResult<LedgerSettings> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LedgerSettings::default()),
            Err(e) => {
                return Err(LedgerError::InvalidConfig(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )))
            }
        };
        let file: LedgerFile = toml::from_str(&text).map_err(|e| {
            LedgerError::InvalidConfig(format!("cannot parse {}: {e}", self.path.display()))
        })?;
        Ok(file.ledger)
    }
}

/// Fixed settings.
#[derive(Clone, Debug, Default)]
pub struct StaticConfig(pub LedgerSettings);

impl StaticConfig {
    pub fn unconfigured() -> Self {
        Self(LedgerSettings::default())
    }
}

impl ConfigSource for StaticConfig {
    fn settings(&self) -> LedgerResult<LedgerSettings> {
        Ok(self.0.clone())
    }
}
