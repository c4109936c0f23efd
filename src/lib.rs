//! Authentication-intercepting forward proxy.
//!
//! The relay sits between a client and an origin server, answers HTTP
//! authentication challenges (Digest, NTLM) on the client's behalf, and
//! delivers only the final, authorized response.

pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod relay;
pub mod resilience;

pub use auth::{AuthError, AuthScheme};
pub use config::RelayConfig;
pub use lifecycle::Shutdown;
pub use relay::{ProxyServer, RelayError};
