use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 9001)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:9001".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn bind_addr_from_toml() {
        let c: ServerConfig = toml::from_str("bind_addr = \"0.0.0.0:8080\"").unwrap();
        assert_eq!(c.bind_addr.port(), 8080);

        let c: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(c.bind_addr.port(), 9001);
    }
}
