//! Configuration management for regauth
//!
//! This module handles loading, parsing, and validating application
//! configuration from YAML files, with `${VAR}` environment expansion.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Credential store configuration
    #[serde(default)]
    pub vault: VaultConfig,

    /// Token issuance configuration
    #[serde(default)]
    pub token: TokenConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(yaml);
        let config: Config = serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants a running service depends on
    fn validate(&self) -> Result<(), ConfigError> {
        if self.token.certificate.is_empty() || self.token.key.is_empty() {
            return Err(ConfigError::MissingRequired(
                "token.certificate and token.key".to_string(),
            ));
        }
        if self.token.issuer.is_empty() {
            return Err(ConfigError::MissingRequired("token.issuer".to_string()));
        }
        if self.token.expiration_secs <= 0 {
            return Err(ConfigError::InvalidValue(
                "token.expiration_secs must be positive".to_string(),
            ));
        }
        if self.vault.host.is_empty() {
            return Err(ConfigError::MissingRequired("vault.host".to_string()));
        }
        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-request handler deadline in seconds
    #[serde(default = "default_handler_timeout")]
    pub timeout_secs: u64,
}

impl ServerConfig {
    /// Handler deadline as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_secs: default_handler_timeout(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5002
}

fn default_handler_timeout() -> u64 {
    5
}

/// Credential store (Vault) configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VaultConfig {
    /// URL scheme to reach the store with
    #[serde(default = "default_vault_proto")]
    pub proto: String,

    /// Store host
    #[serde(default)]
    pub host: String,

    /// Store port
    #[serde(default = "default_vault_port")]
    pub port: u16,

    /// Bearer credential sent as X-Vault-Token
    #[serde(default)]
    pub auth_token: String,

    /// Per-lookup timeout in seconds
    #[serde(default = "default_vault_timeout")]
    pub timeout_secs: u64,
}

impl VaultConfig {
    /// Base URL of the store, `proto://host:port`
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.proto, self.host, self.port)
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            proto: default_vault_proto(),
            host: String::new(),
            port: default_vault_port(),
            auth_token: String::new(),
            timeout_secs: default_vault_timeout(),
        }
    }
}

fn default_vault_proto() -> String {
    "http".to_string()
}

fn default_vault_port() -> u16 {
    8200
}

fn default_vault_timeout() -> u64 {
    3
}

/// Token issuance configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenConfig {
    /// Value of the `iss` claim
    #[serde(default)]
    pub issuer: String,

    /// Token lifetime in seconds
    #[serde(default = "default_expiration")]
    pub expiration_secs: i64,

    /// Path to the PEM certificate the key identifier is derived from
    #[serde(default)]
    pub certificate: String,

    /// Path to the PEM private signing key
    #[serde(default)]
    pub key: String,

    /// Signing algorithm name, checked against the supported set at startup
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            issuer: String::new(),
            expiration_secs: default_expiration(),
            certificate: String::new(),
            key: String::new(),
            algorithm: default_algorithm(),
        }
    }
}

fn default_expiration() -> i64 {
    900
}

fn default_algorithm() -> String {
    "RS256".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_YAML: &str = r#"
server:
  host: "127.0.0.1"
  port: 5002
  timeout_secs: 5

vault:
  proto: "http"
  host: "127.0.0.1"
  port: 8200
  auth_token: "vault-registry-token"
  timeout_secs: 3

token:
  issuer: "Token"
  expiration_secs: 900
  certificate: "/certs/server.pem"
  key: "/certs/server.key"
  algorithm: "RS256"

logging:
  level: "debug"
"#;

    // Test 1: Parse complete configuration from YAML
    #[test]
    fn test_parse_complete_yaml_config() {
        let config = Config::from_yaml(VALID_YAML).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 5002);
        assert_eq!(config.server.timeout_secs, 5);

        assert_eq!(config.vault.proto, "http");
        assert_eq!(config.vault.host, "127.0.0.1");
        assert_eq!(config.vault.port, 8200);
        assert_eq!(config.vault.auth_token, "vault-registry-token");
        assert_eq!(config.vault.timeout_secs, 3);

        assert_eq!(config.token.issuer, "Token");
        assert_eq!(config.token.expiration_secs, 900);
        assert_eq!(config.token.certificate, "/certs/server.pem");
        assert_eq!(config.token.key, "/certs/server.key");
        assert_eq!(config.token.algorithm, "RS256");

        assert_eq!(config.logging.level, "debug");
    }

    // Test 2: Default values are applied for missing fields
    #[test]
    fn test_default_values_applied() {
        let yaml = r#"
vault:
  host: "vault.internal"
  auth_token: "t"

token:
  issuer: "Token"
  certificate: "/certs/server.pem"
  key: "/certs/server.key"
"#;
        let config = Config::from_yaml(yaml).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5002);
        assert_eq!(config.server.timeout_secs, 5);
        assert_eq!(config.server.timeout(), Duration::from_secs(5));

        assert_eq!(config.vault.proto, "http");
        assert_eq!(config.vault.port, 8200);
        assert_eq!(config.vault.timeout_secs, 3);

        assert_eq!(config.token.expiration_secs, 900);
        assert_eq!(config.token.algorithm, "RS256");

        assert_eq!(config.logging.level, "info");
    }

    // Test 3: Base URL assembly
    #[test]
    fn test_vault_base_url() {
        let config = Config::from_yaml(VALID_YAML).unwrap();
        assert_eq!(config.vault.base_url(), "http://127.0.0.1:8200");
    }

    // Test 4: Missing key material is rejected
    #[test]
    fn test_missing_key_material() {
        let yaml = r#"
vault:
  host: "vault.internal"

token:
  issuer: "Token"
"#;
        let result = Config::from_yaml(yaml);
        assert!(matches!(result, Err(ConfigError::MissingRequired(_))));
    }

    // Test 5: Missing vault host is rejected
    #[test]
    fn test_missing_vault_host() {
        let yaml = r#"
token:
  issuer: "Token"
  certificate: "/certs/server.pem"
  key: "/certs/server.key"
"#;
        let result = Config::from_yaml(yaml);
        assert_eq!(
            result,
            Err(ConfigError::MissingRequired("vault.host".to_string()))
        );
    }

    // Test 6: Non-positive expiration is rejected
    #[test]
    fn test_invalid_expiration() {
        let yaml = r#"
vault:
  host: "vault.internal"

token:
  issuer: "Token"
  certificate: "/certs/server.pem"
  key: "/certs/server.key"
  expiration_secs: 0
"#;
        let result = Config::from_yaml(yaml);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    // Test 7: Environment variable expansion
    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("REGAUTH_TEST_VAULT_TOKEN", "env_secret");

        let yaml = r#"
vault:
  host: "vault.internal"
  auth_token: "${REGAUTH_TEST_VAULT_TOKEN}"

token:
  issuer: "Token"
  certificate: "/certs/server.pem"
  key: "/certs/server.key"
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.vault.auth_token, "env_secret");

        std::env::remove_var("REGAUTH_TEST_VAULT_TOKEN");
    }

    // Test 8: Unset environment variables are left as-is
    #[test]
    fn test_env_var_unset_kept_verbatim() {
        let expanded = expand_env_vars("token: ${REGAUTH_TEST_DOES_NOT_EXIST}");
        assert_eq!(expanded, "token: ${REGAUTH_TEST_DOES_NOT_EXIST}");
    }

    // Test 9: Malformed YAML reports a parse error
    #[test]
    fn test_malformed_yaml() {
        let result = Config::from_yaml("server: [not a mapping");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    // Test 10: Reading a missing file reports a read error
    #[test]
    fn test_missing_file() {
        let result = Config::from_file("/does/not/exist.yaml");
        assert!(matches!(result, Err(ConfigError::FileRead(_))));
    }

    // Test 11: Round trip through a file on disk
    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, VALID_YAML).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.vault.base_url(), "http://127.0.0.1:8200");
        assert_eq!(config.token.issuer, "Token");
    }
}
