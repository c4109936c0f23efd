//! Proxy relay subsystem.
//!
//! # Data Flow
//! ```text
//! client connection
//!     → server.rs (accept, one task per connection)
//!     → session.rs (read request, forward verbatim, read response)
//!     → auth::AuthScheme::decide
//!         Continue       → stream response back unchanged
//!         StopProcessing → intercept.rs (drain 401, replay 1-2 times)
//!                        → deliver final response exactly once
//! ```
//!
//! # Design Decisions
//! - A session owns its client stream and at most one origin stream
//! - Requests and replays on a connection are strictly sequential
//! - Errors end the connection; nothing is retried

pub mod intercept;
pub mod server;
pub mod session;

use std::io;

use thiserror::Error;

use crate::auth::AuthError;
use crate::config::SchemeKind;
use crate::http::CodecError;

pub use intercept::{Interception, Interceptor};
pub use server::ProxyServer;
pub use session::Session;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("client I/O error: {0}")]
    ClientIo(#[source] io::Error),

    #[error("origin I/O error: {0}")]
    OriginIo(#[source] io::Error),

    #[error("invalid message from client: {0}")]
    ClientCodec(#[source] CodecError),

    #[error("invalid message from origin: {0}")]
    OriginCodec(#[source] CodecError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("failed to connect to origin {authority}: {source}")]
    Connect {
        authority: String,
        #[source]
        source: io::Error,
    },

    /// A request the relay cannot service; the client was told before closing.
    #[error("unsupported request: {0}")]
    Unsupported(String),
}

impl RelayError {
    /// Classify a codec failure on the origin stream.
    pub(crate) fn origin(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => RelayError::OriginIo(e),
            other => RelayError::OriginCodec(other),
        }
    }

    /// Classify a codec failure on the client stream.
    pub(crate) fn client(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => RelayError::ClientIo(e),
            other => RelayError::ClientCodec(other),
        }
    }

    /// Whether the origin failed to answer in time.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            RelayError::OriginIo(e) | RelayError::Connect { source: e, .. } if e.kind() == io::ErrorKind::TimedOut
        )
    }
}

/// How an intercepted handshake ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeOutcome {
    Completed,
    /// The origin did not continue the multi-round exchange; its answer to
    /// the last replay was delivered as is.
    AbortedSilently,
}

impl HandshakeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandshakeOutcome::Completed => "completed",
            HandshakeOutcome::AbortedSilently => "aborted",
        }
    }
}

/// What happened to one client request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Forwarded,
    Intercepted {
        scheme: SchemeKind,
        replays: u32,
        handshake: HandshakeOutcome,
    },
}
