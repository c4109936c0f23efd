//! Interception policy.
//!
//! Decides, per origin response, whether the relay takes over. The two schemes
//! use different triggers: Digest intervenes on any 401, NTLM only for the
//! configured hosts and only when the origin actually offers NTLM.

use crate::http::{RequestHeader, ResponseHeader};

/// What the relay does with a response after the policy has looked at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Default handling: deliver the response to the client unchanged.
    Continue,
    /// The relay intercepted; no further default handling of this response.
    StopProcessing,
}

const UNAUTHORIZED: u16 = 401;

/// Trigger for single-round schemes: a response exists and it is a 401.
pub fn single_round(response: Option<&ResponseHeader>) -> Decision {
    match response {
        Some(r) if r.status() == UNAUTHORIZED => Decision::StopProcessing,
        _ => Decision::Continue,
    }
}

/// Trigger for multi-round schemes.
///
/// Requires a 401, a `Host` exactly matching one of `allowed_hosts`, and a
/// challenge value containing `marker`.
pub fn multi_round(
    request: &RequestHeader,
    response: Option<&ResponseHeader>,
    allowed_hosts: &[String],
    marker: &str,
) -> Decision {
    let Some(response) = response else {
        return Decision::Continue;
    };
    if response.status() != UNAUTHORIZED {
        return Decision::Continue;
    }
    let host_allowed = request
        .host()
        .is_some_and(|host| allowed_hosts.iter().any(|allowed| allowed == host));
    if !host_allowed {
        return Decision::Continue;
    }
    match response.www_authenticate() {
        Some(composite) if composite.contains(marker) => Decision::StopProcessing,
        _ => Decision::Continue,
    }
}

/// `{loopback_name}:{port}` and `{hostname}:{port}`.
pub fn allowed_hosts(loopback_name: &str, hostname: &str, port: u16) -> Vec<String> {
    vec![format!("{}:{}", loopback_name, port), format!("{}:{}", hostname, port)]
}
