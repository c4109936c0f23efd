//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the authentication relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// The origin server whose challenges the relay answers.
    pub origin: OriginConfig,

    /// Scheme selection and credentials.
    pub auth: AuthConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Size limits on buffered messages.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address; port 0 picks an ephemeral port.
    pub bind_address: String,

    /// Maximum concurrent client connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:0".to_string(),
            max_connections: 256,
        }
    }
}

/// Origin server identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Public hostname of the protected site.
    pub hostname: String,

    /// Loopback alias that also reaches the origin.
    pub loopback_name: String,

    pub port: u16,

    /// Fixed upstream `host:port`. When unset, each request's authority is dialled.
    pub address: Option<String>,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            hostname: "www.seleniumhq-test.test".to_string(),
            loopback_name: "localhost".to_string(),
            port: 5000,
            address: None,
        }
    }
}

/// Which scheme the relay drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchemeKind {
    #[default]
    Digest,
    Ntlm,
}

impl SchemeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemeKind::Digest => "digest",
            SchemeKind::Ntlm => "ntlm",
        }
    }

    /// Protected resource served by the origin for this scheme.
    pub fn probe_path(&self) -> &'static str {
        match self {
            SchemeKind::Digest => "/api/auth/digest",
            SchemeKind::Ntlm => "/api/auth/ntlm",
        }
    }
}

impl std::fmt::Display for SchemeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SchemeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "digest" => Ok(SchemeKind::Digest),
            "ntlm" => Ok(SchemeKind::Ntlm),
            other => Err(format!("unknown scheme '{}' (expected digest or ntlm)", other)),
        }
    }
}

/// Authentication settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub scheme: SchemeKind,
    pub digest: DigestConfig,
    pub ntlm: NtlmConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DigestConfig {
    pub username: String,
    pub password: String,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            username: "leela".to_string(),
            password: "Nibbler".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NtlmConfig {
    pub username: String,
    pub password: String,
    /// Domain sent in the authenticate message (empty by default).
    pub domain: String,
    pub workstation: String,
}

impl Default for NtlmConfig {
    fn default() -> Self {
        Self {
            username: "NtlmAuthTestUser".to_string(),
            password: "NtlmAuthTestP@ssw0rd!".to_string(),
            domain: String::new(),
            workstation: String::new(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Origin connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Per-operation origin read/write timeout once a request is intercepted.
    pub intercept_secs: u64,

    /// How long shutdown waits for active connections to finish.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            intercept_secs: 5,
            shutdown_grace_secs: 10,
        }
    }
}

/// Message size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_header_bytes: usize,

    /// Largest request body buffered for replay.
    pub max_body_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_header_bytes: 64 * 1024,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: RelayConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:0");
        assert_eq!(config.origin.port, 5000);
        assert_eq!(config.auth.scheme, SchemeKind::Digest);
        assert_eq!(config.timeouts.intercept_secs, 5);
        assert!(config.origin.address.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: RelayConfig = toml::from_str(
            r#"
            [auth]
            scheme = "ntlm"

            [auth.ntlm]
            domain = "TESTDOMAIN"

            [origin]
            address = "127.0.0.1:5000"
            "#,
        )
        .unwrap();
        assert_eq!(config.auth.scheme, SchemeKind::Ntlm);
        assert_eq!(config.auth.ntlm.domain, "TESTDOMAIN");
        assert_eq!(config.auth.ntlm.username, "NtlmAuthTestUser");
        assert_eq!(config.origin.address.as_deref(), Some("127.0.0.1:5000"));
        assert_eq!(config.origin.hostname, "www.seleniumhq-test.test");
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        assert!(toml::from_str::<RelayConfig>("[auth]\nscheme = \"basic\"").is_err());
        assert_eq!("NTLM".parse::<SchemeKind>(), Ok(SchemeKind::Ntlm));
        assert!("kerberos".parse::<SchemeKind>().is_err());
    }
}
