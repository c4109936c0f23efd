//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the selected scheme has credentials
//! - Validate value ranges (timeouts > 0, ports valid, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::{RelayConfig, SchemeKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field}: required when auth.scheme = \"{scheme}\"")]
    Missing { field: &'static str, scheme: SchemeKind },

    #[error("origin.address: '{0}' is not in host:port form")]
    InvalidOrigin(String),
}

/// Check a deserialized configuration.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero {
            field: "listener.max_connections",
        });
    }

    if let Some(address) = &config.origin.address {
        let valid = address
            .rsplit_once(':')
            .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
        if !valid {
            errors.push(ValidationError::InvalidOrigin(address.clone()));
        }
    }

    let scheme = config.auth.scheme;
    match scheme {
        SchemeKind::Digest => {
            if config.auth.digest.username.is_empty() {
                errors.push(ValidationError::Missing {
                    field: "auth.digest.username",
                    scheme,
                });
            }
        }
        SchemeKind::Ntlm => {
            if config.auth.ntlm.username.is_empty() {
                errors.push(ValidationError::Missing {
                    field: "auth.ntlm.username",
                    scheme,
                });
            }
            if config.origin.hostname.is_empty() {
                errors.push(ValidationError::Missing {
                    field: "origin.hostname",
                    scheme,
                });
            }
            if config.origin.loopback_name.is_empty() {
                errors.push(ValidationError::Missing {
                    field: "origin.loopback_name",
                    scheme,
                });
            }
            if config.origin.port == 0 {
                errors.push(ValidationError::Zero { field: "origin.port" });
            }
        }
    }

    for (field, value) in [
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.intercept_secs", config.timeouts.intercept_secs),
        ("limits.max_body_bytes", config.limits.max_body_bytes),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }
    if config.limits.max_header_bytes == 0 {
        errors.push(ValidationError::Zero {
            field: "limits.max_header_bytes",
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
