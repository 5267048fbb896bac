//! Engine endpoint configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use dockerpty_core::{PtyError, PtyResult};

/// Socket the engine listens on when `DOCKER_HOST` is unset.
pub const DEFAULT_HOST: &str = "unix:///var/run/docker.sock";

/// Port assumed for `tcp://` hosts that do not name one.
const DEFAULT_TCP_PORT: u16 = 2375;

/// Connection settings for [`DockerEngine`](crate::DockerEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// `unix:///path/to/socket` or `tcp://host[:port]`.
    #[serde(default = "default_host")]
    pub host: String,

    /// Pin requests to an API version, e.g. `1.41`. Unversioned when unset.
    #[serde(default)]
    pub api_version: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            api_version: None,
        }
    }
}

fn default_host() -> String {
    std::env::var("DOCKER_HOST")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| DEFAULT_HOST.to_string())
}

/// A parsed engine address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    /// `host:port`
    Tcp(String),
}

impl Endpoint {
    pub fn parse(host: &str) -> PtyResult<Self> {
        let host = host.trim();
        if let Some(path) = host.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(PtyError::Config(format!("empty socket path in '{host}'")));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        if host.starts_with('/') {
            return Ok(Self::Unix(PathBuf::from(host)));
        }

        let rest = host
            .strip_prefix("tcp://")
            .or_else(|| host.strip_prefix("http://"))
            .ok_or_else(|| {
                PtyError::Config(format!(
                    "unsupported engine host '{host}' (expected unix:// or tcp://)"
                ))
            })?;
        let authority = rest.split('/').next().unwrap_or(rest);
        if authority.is_empty() {
            return Err(PtyError::Config(format!("empty address in '{host}'")));
        }

        let addr = if authority.contains(':') {
            authority.to_string()
        } else {
            format!("{authority}:{DEFAULT_TCP_PORT}")
        };
        Ok(Self::Tcp(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_unix_socket() {
        assert_eq!(
            Endpoint::parse("unix:///var/run/docker.sock").unwrap(),
            Endpoint::Unix(PathBuf::from("/var/run/docker.sock"))
        );
        assert_eq!(
            Endpoint::parse("/run/user/1000/docker.sock").unwrap(),
            Endpoint::Unix(PathBuf::from("/run/user/1000/docker.sock"))
        );
    }

    #[test]
    fn parse_tcp() {
        assert_eq!(
            Endpoint::parse("tcp://10.0.0.5:2376").unwrap(),
            Endpoint::Tcp("10.0.0.5:2376".into())
        );
        assert_eq!(
            Endpoint::parse("tcp://docker.internal").unwrap(),
            Endpoint::Tcp("docker.internal:2375".into())
        );
        assert_eq!(
            Endpoint::parse("http://localhost:2375/").unwrap(),
            Endpoint::Tcp("localhost:2375".into())
        );
    }

    #[test]
    fn parse_rejects_unknown() {
        assert!(Endpoint::parse("ssh://user@host").is_err());
        assert!(Endpoint::parse("unix://").is_err());
        assert!(Endpoint::parse("tcp://").is_err());
        assert!(Endpoint::parse("").is_err());
    }

    #[test]
    fn config_defaults_api_version() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"host": "tcp://a:1"}"#).unwrap();
        assert_eq!(cfg.host, "tcp://a:1");
        assert_eq!(cfg.api_version, None);
    }
}
