//! Spans for relay operations.
//!
//! A connection span wraps everything a session does; each request inside it
//! gets its own span keyed by a fresh UUID v4.

use std::net::SocketAddr;

use tracing::Span;
use uuid::Uuid;

use crate::net::ConnectionId;

pub fn connection_span(id: ConnectionId, peer: SocketAddr) -> Span {
    tracing::info_span!("connection", connection_id = %id, peer_addr = %peer)
}

/// Span for one client request, and the request ID recorded on it.
pub fn request_span(method: &str, target: &str) -> (Span, Uuid) {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        target = %target,
    );
    (span, request_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_unique() {
        let (_, a) = request_span("GET", "/");
        let (_, b) = request_span("GET", "/");
        assert_ne!(a, b);
        assert_eq!(a.get_version_num(), 4);
    }
}
