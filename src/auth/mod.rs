//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! origin response (401)
//!     → policy.rs (should the relay intervene?)
//!     → challenge.rs (pick the scheme's line out of WWW-Authenticate)
//!     → digest.rs            single round: one Authorization value
//!       ntlm.rs+handshake.rs multi round: negotiate, then authenticate
//!     → relay replays the request with the produced value(s)
//! ```
//!
//! # Design Decisions
//! - The scheme is chosen once, at configuration time, as an [`AuthScheme`] variant
//! - Credentials live inside the variant; nothing is global
//! - A handshake that cannot proceed is a named state, not an error

pub mod challenge;
pub mod digest;
pub mod handshake;
pub mod ntlm;
pub mod policy;

use thiserror::Error;

use crate::config::schema::{AuthConfig, OriginConfig, SchemeKind};
use crate::http::{RequestHeader, ResponseHeader};

pub use handshake::{HandshakeState, NtlmHandshake};
pub use ntlm::NtlmCredentials;
pub use policy::Decision;

#[derive(Debug, Error)]
pub enum AuthError {
    /// The origin did not offer the scheme the relay is configured to drive.
    #[error("could not find expected authentication scheme '{marker}' in WWW-Authenticate header ('{offered}')")]
    SchemeNotOffered { marker: String, offered: String },

    #[error("malformed {scheme} challenge: {reason}")]
    MalformedChallenge { scheme: &'static str, reason: String },

    #[error("handshake step attempted in state {0:?}")]
    HandshakeOutOfOrder(HandshakeState),
}

/// Username and password for the single-round scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct DigestScheme {
    pub credentials: Credentials,
}

#[derive(Debug, Clone)]
pub struct NtlmScheme {
    pub credentials: NtlmCredentials,
    /// `Host` values the relay answers NTLM challenges for.
    pub allowed_hosts: Vec<String>,
}

/// The scheme a relay instance drives, with its credentials.
#[derive(Debug, Clone)]
pub enum AuthScheme {
    Digest(DigestScheme),
    Ntlm(NtlmScheme),
}

impl AuthScheme {
    pub fn from_config(auth: &AuthConfig, origin: &OriginConfig) -> Self {
        match auth.scheme {
            SchemeKind::Digest => AuthScheme::Digest(DigestScheme {
                credentials: Credentials {
                    username: auth.digest.username.clone(),
                    password: auth.digest.password.clone(),
                },
            }),
            SchemeKind::Ntlm => AuthScheme::Ntlm(NtlmScheme {
                credentials: NtlmCredentials {
                    username: auth.ntlm.username.clone(),
                    password: auth.ntlm.password.clone(),
                    domain: auth.ntlm.domain.clone(),
                    workstation: auth.ntlm.workstation.clone(),
                },
                allowed_hosts: policy::allowed_hosts(&origin.loopback_name, &origin.hostname, origin.port),
            }),
        }
    }

    pub fn kind(&self) -> SchemeKind {
        match self {
            AuthScheme::Digest(_) => SchemeKind::Digest,
            AuthScheme::Ntlm(_) => SchemeKind::Ntlm,
        }
    }

    /// Literal scheme name that starts this scheme's challenge lines.
    pub fn marker(&self) -> &'static str {
        match self {
            AuthScheme::Digest(_) => digest::MARKER,
            AuthScheme::Ntlm(_) => ntlm::MARKER,
        }
    }

    /// Whether the relay should take over handling of `response`.
    pub fn decide(&self, request: &RequestHeader, response: Option<&ResponseHeader>) -> Decision {
        match self {
            AuthScheme::Digest(_) => policy::single_round(response),
            AuthScheme::Ntlm(scheme) => policy::multi_round(request, response, &scheme.allowed_hosts, ntlm::MARKER),
        }
    }

    /// Path of the protected resource the probe navigates to.
    pub fn probe_path(&self) -> &'static str {
        self.kind().probe_path()
    }
}
