//! Process configuration read from the environment.

use crate::auth::BasicAuth;
use crate::errors::OwtError;
use serde::{Deserialize, Serialize};

/// Variable holding the bind address.
pub const ADDRESS_VAR: &str = "OWT_ADDRESS";
/// Variable holding the port.
pub const PORT_VAR: &str = "OWT_PORT";
/// Variable holding a single `username:password_sha256` credential.
pub const AUTH_VAR: &str = "OWT_AUTH";
/// Variable switching log output to JSON.
pub const JSON_LOGS_VAR: &str = "OWT_JSON_LOGS";

/// Configuration for a hosting process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwtConfig {
    /// Address to serve from (`0.0.0.0` accepts all connections).
    #[serde(default = "default_address")]
    pub address: String,
    /// Port to serve from.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Single-user basic auth credential, `username:password_sha256`.
    #[serde(default)]
    pub auth: Option<String>,
    /// Whether logs are emitted as JSON lines.
    #[serde(default)]
    pub json_logs: bool,
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9876
}

impl Default for OwtConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            auth: None,
            json_logs: false,
        }
    }
}

impl OwtConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the configuration from process environment variables.
    pub fn from_env() -> Result<Self, OwtError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through an arbitrary variable lookup.
    ///
    /// Unset or empty variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, OwtError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(address) = read(ADDRESS_VAR) {
            config.address = address;
        }
        if let Some(port) = read(PORT_VAR) {
            config.port = port
                .trim()
                .parse()
                .map_err(|e| OwtError::Config(format!("{PORT_VAR}={port}: {e}")))?;
        }
        config.auth = read(AUTH_VAR);
        if let Some(flag) = read(JSON_LOGS_VAR) {
            config.json_logs = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        Ok(config)
    }

    /// Sets the bind address.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Sets the port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the single-user credential.
    #[must_use]
    pub fn with_auth(mut self, auth: impl Into<String>) -> Self {
        self.auth = Some(auth.into());
        self
    }

    /// Returns `address:port`.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Builds the authenticator described by `auth`, if any.
    pub fn basic_auth(&self) -> Result<Option<BasicAuth>, OwtError> {
        BasicAuth::maybe_single_user(self.auth.as_deref())
    }
}
