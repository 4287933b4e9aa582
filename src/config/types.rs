//! Configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::DEFAULT_BINARY;
use crate::messenger::{MessengerConfig, DEFAULT_MAX_OUTPUT_BYTES};

/// Default address the HTTP server binds to.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 5080;

/// Top-level configuration loaded from TOML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// HTTP server settings.
    pub server: ServerSettings,
    /// Claude CLI settings.
    pub claude: ClaudeSettings,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Origins allowed by CORS in addition to the local front-end ones.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            allowed_origins: Vec::new(),
        }
    }
}

/// Claude CLI settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaudeSettings {
    /// Executable to launch, looked up on `PATH` unless it is a path.
    pub binary: String,
    /// Deadline for requests that do not carry one.
    pub default_timeout_ms: u64,
    /// Time between SIGTERM and SIGKILL when a call is aborted.
    pub terminate_grace_ms: u64,
    /// Bytes kept from each output stream of a call.
    pub max_output_bytes: usize,
}

impl Default for ClaudeSettings {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            default_timeout_ms: 30_000,
            terminate_grace_ms: 2_000,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl RelayConfig {
    /// Apply `PORT` and `HOST` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `PORT` and `HOST` overrides read through `lookup`.
    ///
    /// An unparsable `PORT` is ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(e) => tracing::warn!(value = %port, error = %e, "Ignoring invalid PORT"),
            }
        }

        if let Some(host) = lookup("HOST").filter(|h| !h.trim().is_empty()) {
            self.server.host = host.trim().to_string();
        }
    }

    /// Settings for the messenger.
    #[must_use]
    pub fn messenger_config(&self) -> MessengerConfig {
        MessengerConfig {
            binary: self.claude.binary.clone(),
            default_timeout: Duration::from_millis(self.claude.default_timeout_ms),
            terminate_grace: Duration::from_millis(self.claude.terminate_grace_ms),
            max_output_bytes: self.claude.max_output_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 5080);
        assert!(config.server.allowed_origins.is_empty());
        assert_eq!(config.claude.binary, "claude");
        assert_eq!(config.claude.default_timeout_ms, 30_000);
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml_str = r#"
            [server]
            port = 8080

            [claude]
            binary = "/opt/claude/bin/claude"
        "#;

        let config: RelayConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.claude.binary, "/opt/claude/bin/claude");
        assert_eq!(config.claude.terminate_grace_ms, 2_000);
        assert_eq!(config.claude.max_output_bytes, 16 * 1024 * 1024);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RelayConfig::default();
        config.apply_env_overrides(env(&[("PORT", "9000"), ("HOST", "0.0.0.0")]));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_invalid_port_ignored() {
        let mut config = RelayConfig::default();
        config.apply_env_overrides(env(&[("PORT", "not-a-port"), ("HOST", "  ")]));
        assert_eq!(config.server.port, 5080);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_messenger_config() {
        let mut config = RelayConfig::default();
        config.claude.default_timeout_ms = 1500;
        config.claude.terminate_grace_ms = 250;
        config.claude.max_output_bytes = 1024;

        let messenger = config.messenger_config();
        assert_eq!(messenger.binary, "claude");
        assert_eq!(messenger.default_timeout, Duration::from_millis(1500));
        assert_eq!(messenger.terminate_grace, Duration::from_millis(250));
        assert_eq!(messenger.max_output_bytes, 1024);
    }
}
