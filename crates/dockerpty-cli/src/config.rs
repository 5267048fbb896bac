//! Client configuration at `~/.dockerpty/config.toml`.
//!
//! Provides the engine endpoint and session tunables.
//! CLI flags always override config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use dockerpty::{ResizeMode, SessionOptions};
use dockerpty_core::StartOptions;
use dockerpty_engine::EngineConfig;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub session: SessionSection,
}

/// Where the engine lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineSection {
    /// Engine address. Falls back to `DOCKER_HOST`, then the local socket.
    #[serde(default)]
    pub host: Option<String>,

    /// Pin requests to an API version, e.g. `1.41`.
    #[serde(default)]
    pub api_version: Option<String>,
}

/// Session tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    /// Terminal size poll interval when signals are unavailable.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Delay before the first resize of an exec instance.
    #[serde(default = "default_exec_resize_delay_ms")]
    pub exec_resize_delay_ms: u64,

    /// "auto", "signal", or "poll".
    #[serde(default = "default_resize")]
    pub resize: String,

    /// Detach sequence passed to the container start call.
    #[serde(default)]
    pub detach_keys: Option<String>,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            exec_resize_delay_ms: default_exec_resize_delay_ms(),
            resize: default_resize(),
            detach_keys: None,
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_exec_resize_delay_ms() -> u64 {
    50
}

fn default_resize() -> String {
    "auto".to_string()
}

/// `~/.dockerpty/config.toml`
pub fn default_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".dockerpty")
        .join("config.toml")
}

impl Config {
    /// Load configuration from a TOML file, returning defaults if the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Engine settings with `host_flag` taking precedence over the file.
    pub fn engine_config(&self, host_flag: Option<&str>) -> EngineConfig {
        let mut cfg = EngineConfig::default();
        if let Some(host) = host_flag.or(self.engine.host.as_deref()) {
            cfg.host = host.to_string();
        }
        cfg.api_version = self.engine.api_version.clone();
        cfg
    }

    pub fn session_options(&self) -> Result<SessionOptions> {
        let s = &self.session;
        if s.poll_interval_ms == 0 {
            bail!("session.poll_interval_ms must be greater than zero");
        }
        Ok(SessionOptions {
            start: StartOptions {
                detach_keys: s.detach_keys.clone(),
            },
            resize_mode: parse_resize_mode(&s.resize)?,
            poll_interval: Duration::from_millis(s.poll_interval_ms),
            exec_resize_delay: Duration::from_millis(s.exec_resize_delay_ms),
            ..SessionOptions::default()
        })
    }
}

fn parse_resize_mode(s: &str) -> Result<ResizeMode> {
    match s {
        "auto" => Ok(ResizeMode::Auto),
        "signal" => Ok(ResizeMode::Signal),
        "poll" => Ok(ResizeMode::Poll),
        other => bail!("unknown resize mode '{other}' (expected auto, signal or poll)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = Config::default();
        assert!(cfg.engine.host.is_none());
        assert_eq!(cfg.session.poll_interval_ms, 250);
        assert_eq!(cfg.session.exec_resize_delay_ms, 50);
        assert_eq!(cfg.session.resize, "auto");

        let opts = cfg.session_options().unwrap();
        assert_eq!(opts.resize_mode, ResizeMode::Auto);
        assert_eq!(opts.poll_interval, Duration::from_millis(250));
        assert!(opts.start.detach_keys.is_none());
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[engine]
host = "tcp://10.0.0.5:2375"
api_version = "1.41"

[session]
poll_interval_ms = 100
exec_resize_delay_ms = 0
resize = "poll"
detach_keys = "ctrl-p,ctrl-q"
"#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.engine.host.as_deref(), Some("tcp://10.0.0.5:2375"));

        let opts = cfg.session_options().unwrap();
        assert_eq!(opts.resize_mode, ResizeMode::Poll);
        assert_eq!(opts.poll_interval, Duration::from_millis(100));
        assert_eq!(opts.exec_resize_delay, Duration::ZERO);
        assert_eq!(opts.start.detach_keys.as_deref(), Some("ctrl-p,ctrl-q"));

        let engine = cfg.engine_config(None);
        assert_eq!(engine.host, "tcp://10.0.0.5:2375");
        assert_eq!(engine.api_version.as_deref(), Some("1.41"));
    }

    #[test]
    fn parse_partial_toml_config() {
        let toml_str = r#"
[session]
resize = "signal"
"#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.session.poll_interval_ms, 250); // default
        assert_eq!(cfg.session_options().unwrap().resize_mode, ResizeMode::Signal);
    }

    #[test]
    fn host_flag_overrides_file() {
        let mut cfg = Config::default();
        cfg.engine.host = Some("unix:///from/file.sock".into());
        assert_eq!(cfg.engine_config(Some("tcp://flag:1")).host, "tcp://flag:1");
        assert_eq!(cfg.engine_config(None).host, "unix:///from/file.sock");
    }

    #[test]
    fn rejects_bad_session_values() {
        let mut cfg = Config::default();
        cfg.session.resize = "sometimes".into();
        assert!(cfg.session_options().is_err());

        let mut cfg = Config::default();
        cfg.session.poll_interval_ms = 0;
        assert!(cfg.session_options().is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.session.resize, "auto");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[session\nresize = ").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
