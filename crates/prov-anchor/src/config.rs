use std::path::{Path, PathBuf};
use std::sync::Arc;

use prov_crypto::KeyPolicy;
use prov_ledger::{ConfigSource, EnvConfig, TomlFileConfig};
use serde::{Deserialize, Serialize};

use crate::error::{AnchorError, AnchorResult};

pub const ENV_KEY_PATH: &str = "PROV_KEY_PATH";
pub const ENV_HASH_LOG: &str = "PROV_HASH_LOG";

/// Service configuration.
///
/// Loadable from the top level of a TOML file whose `[ledger]` table holds
/// the ledger settings; see [`ServiceConfig::from_toml_file`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// PEM private key. Generated on first signing under
    /// [`KeyPolicy::GenerateIfMissing`], which is a development convenience;
    /// production deployments provision the key and set `require_existing`.
    pub key_path: PathBuf,
    /// JSON array of hex digests.
    pub hash_log_path: PathBuf,
    pub key_policy: KeyPolicy,
    /// TOML file re-read on every ledger call. `None` reads `PROV_LEDGER_*`
    /// from the environment instead.
    #[serde(skip)]
    pub ledger_config: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            key_path: PathBuf::from("provenance_key.pem"),
            hash_log_path: PathBuf::from("data/hashes.json"),
            key_policy: KeyPolicy::GenerateIfMissing,
            ledger_config: None,
        }
    }
}

impl ServiceConfig {
    /// Load from a TOML file, which also becomes the ledger config source.
    pub fn from_toml_file(path: impl AsRef<Path>) -> AnchorResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| AnchorError::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config: Self = toml::from_str(&text)
            .map_err(|e| AnchorError::Config(format!("cannot parse {}: {e}", path.display())))?;
        config.ledger_config = Some(path.to_path_buf());
        Ok(config)
    }

    /// Override paths from `PROV_KEY_PATH` / `PROV_HASH_LOG` when set.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = lookup(ENV_KEY_PATH).filter(|p| !p.trim().is_empty()) {
            self.key_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(ENV_HASH_LOG).filter(|p| !p.trim().is_empty()) {
            self.hash_log_path = PathBuf::from(path);
        }
        self
    }

    /// The ledger configuration source this service resolves on each call.
    pub fn ledger_source(&self) -> Arc<dyn ConfigSource> {
        match &self.ledger_config {
            Some(path) => Arc::new(TomlFileConfig::new(path)),
            None => Arc::new(EnvConfig::new()),
        }
    }
}
