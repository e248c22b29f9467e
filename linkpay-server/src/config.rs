//! Server configuration.
//!
//! Loads configuration from a TOML file with support for environment variable
//! expansion in string values. Variables use `$VAR` or `${VAR}` syntax.
//!
//! # Example Configuration
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 4021
//! database_url = "sqlite://data/linkpay.db"
//! max_connections = 5
//! deployment = "multichain"
//! evm_proof = "signature"
//! networks = ["base", "solana"]
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to configuration file (default: `config.toml`)
//! - `HOST` - Override server bind address
//! - `PORT` - Override server port
//! - `DATABASE_URL` - Override the ledger database

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use linkpay::Network;
use linkpay_ledger::EvmProofPolicy;
use serde::{Deserialize, Serialize};

/// Which payment paths the server accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Deployment {
    /// x402 on Base and direct transfers on Base and Solana.
    #[default]
    Multichain,
    /// Direct Solana transfers only.
    SolanaOnly,
}

/// Top-level server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (default: `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Server port (default: `4021`).
    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite URL of the ledger (default: `sqlite://data/linkpay.db`).
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Connection pool size (default: `5`).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Accepted payment paths.
    #[serde(default)]
    pub deployment: Deployment,

    /// How x402 payloads are checked.
    #[serde(default)]
    pub evm_proof: EvmProofPolicy,

    /// Networks payments are accepted on (default: Base and Solana
    /// mainnets). Testnets must be listed explicitly.
    #[serde(default = "default_networks")]
    pub networks: Vec<Network>,
}

/// Failure loading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path of the file.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid configuration TOML.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Path of the file.
        path: String,
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
}

const fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

const fn default_port() -> u16 {
    4021
}

fn default_database_url() -> String {
    "sqlite://data/linkpay.db".to_owned()
}

const fn default_max_connections() -> u32 {
    5
}

fn default_networks() -> Vec<Network> {
    Network::MAINNETS.to_vec()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_url: default_database_url(),
            max_connections: default_max_connections(),
            deployment: Deployment::default(),
            evm_proof: EvmProofPolicy::default(),
            networks: default_networks(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from `path`, or from defaults if the file does
    /// not exist.
    ///
    /// After loading, all string values with `$VAR` / `${VAR}` references
    /// are expanded from the process environment. `HOST`, `PORT` and
    /// `DATABASE_URL` env vars override the file values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let content = if Path::new(path).exists() {
            std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_owned(),
                source,
            })?
        } else {
            String::new()
        };
        let env = |name: &str| std::env::var(name).ok();
        let mut config = Self::parse(&content, env).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;
        config.apply_overrides(env);
        Ok(config)
    }

    fn parse(
        content: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, toml::de::Error> {
        toml::from_str(&expand_env_vars(content, lookup))
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("HOST").and_then(|h| h.parse().ok()) {
            self.host = addr;
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.port = port;
        }
        if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
            self.database_url = url;
        }
    }
}

/// Expands `$VAR` and `${VAR}` patterns in a string using `lookup`.
///
/// Unresolved variables are left as-is.
fn expand_env_vars(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }
        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }

        let mut var_name = String::new();
        while let Some(&c) = chars.peek() {
            if braced {
                if c == '}' {
                    chars.next();
                    break;
                }
            } else if !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            var_name.push(c);
            chars.next();
        }

        match lookup(&var_name) {
            Some(val) if !var_name.is_empty() => result.push_str(&val),
            _ => {
                result.push('$');
                if braced {
                    result.push('{');
                }
                result.push_str(&var_name);
                if braced && !var_name.is_empty() {
                    result.push('}');
                }
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(name: &str) -> Option<String> {
        match name {
            "DB" => Some("sqlite://tmp/x.db".to_owned()),
            "PORT" => Some("8080".to_owned()),
            _ => None,
        }
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = ServerConfig::parse("", vars).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.port, 4021);
        assert_eq!(config.deployment, Deployment::Multichain);
        assert_eq!(config.evm_proof, EvmProofPolicy::Signature);
        assert_eq!(config.networks, vec![Network::Base, Network::Solana]);
    }

    #[test]
    fn variables_are_expanded() {
        assert_eq!(expand_env_vars("url = \"$DB\"", vars), "url = \"sqlite://tmp/x.db\"");
        assert_eq!(expand_env_vars("${DB}/", vars), "sqlite://tmp/x.db/");
        assert_eq!(expand_env_vars("$MISSING and ${MISSING}", vars), "$MISSING and ${MISSING}");
        assert_eq!(expand_env_vars("cost: 5$", vars), "cost: 5$");
    }

    #[test]
    fn file_values_and_overrides() {
        let toml = r#"
            port = 9000
            database_url = "$DB"
            deployment = "solana_only"
            evm_proof = "trust"
        "#;
        let mut config = ServerConfig::parse(toml, vars).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.database_url, "sqlite://tmp/x.db");
        assert_eq!(config.deployment, Deployment::SolanaOnly);
        assert_eq!(config.evm_proof, EvmProofPolicy::Trust);

        config.apply_overrides(vars);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn testnets_are_opt_in() {
        let config =
            ServerConfig::parse(r#"networks = ["base-sepolia", "solana-devnet"]"#, vars).unwrap();
        assert_eq!(config.networks, vec![Network::BaseSepolia, Network::SolanaDevnet]);
        assert!(ServerConfig::parse(r#"networks = ["ethereum"]"#, vars).is_err());
    }

    #[test]
    fn unknown_deployment_is_rejected() {
        assert!(ServerConfig::parse("deployment = \"evm_only\"", vars).is_err());
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = ServerConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(config.max_connections, 5);
    }
}
