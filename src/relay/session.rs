//! Per-connection relay loop.
//!
//! # Responsibilities
//! - Read client requests one at a time and forward them to the origin verbatim
//! - Ask the configured scheme whether to intercept each response
//! - Deliver exactly one response per client request
//! - Keep the origin connection across requests while both sides allow it
//!
//! # Data Flow
//! ```text
//! Idle → Forwarding → (Intercepting → Replaying) → Delivering → Idle
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::auth::{AuthScheme, Decision};
use crate::config::RelayConfig;
use crate::http::{codec, BodyFraming, HeaderList, RequestHeader, ResponseHeader};
use crate::observability::{metrics, spans};
use crate::relay::{Interceptor, RelayError, RequestOutcome};
use crate::resilience::timeouts::{self, IoTimeout};

/// An open connection to the origin, keyed by the authority it was dialled for.
struct OriginLink {
    authority: String,
    stream: BufReader<IoTimeout<TcpStream>>,
}

/// One client connection and the origin connection serving it.
pub struct Session {
    client: BufReader<TcpStream>,
    origin: Option<OriginLink>,
    config: Arc<RelayConfig>,
    scheme: Arc<AuthScheme>,
}

impl Session {
    pub fn new(client: TcpStream, config: Arc<RelayConfig>, scheme: Arc<AuthScheme>) -> Self {
        Self {
            client: BufReader::new(client),
            origin: None,
            config,
            scheme,
        }
    }

    /// Serve requests until the client leaves, an error occurs, or shutdown
    /// is signalled while the connection is idle.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), RelayError> {
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::debug!("Shutdown signalled; closing idle connection");
                    return Ok(());
                }
                next = codec::read_request_header(&mut self.client, self.config.limits.max_header_bytes) => next,
            };
            let Some(request) = next.map_err(RelayError::client)? else {
                tracing::debug!("Client closed connection");
                return Ok(());
            };

            let (span, _request_id) = spans::request_span(request.method(), request.target());
            let keep_alive = match self.handle(request).instrument(span).await {
                Ok(keep_alive) => keep_alive,
                Err(e) => {
                    metrics::record_request("failed");
                    return Err(e);
                }
            };
            if !keep_alive {
                return Ok(());
            }
        }
    }

    /// Relay one request. Returns whether the client connection stays open.
    async fn handle(&mut self, mut request: RequestHeader) -> Result<bool, RelayError> {
        if request.method().eq_ignore_ascii_case("CONNECT") {
            self.reject(501, "Not Implemented").await?;
            return Err(RelayError::Unsupported(format!("CONNECT {}", request.target())));
        }

        let Some(authority) = self.config.origin.address.clone().or_else(|| request.authority()) else {
            self.reject(400, "Bad Request").await?;
            return Err(RelayError::Unsupported(format!(
                "no origin authority for {}",
                request.target()
            )));
        };

        let body = codec::read_body(&mut self.client, request.framing(), self.config.limits.max_body_bytes)
            .await
            .map_err(RelayError::client)?;

        let connect_timeout = Duration::from_secs(self.config.timeouts.connect_secs);
        let max_header_bytes = self.config.limits.max_header_bytes;
        let origin = connect_origin(&mut self.origin, &authority, connect_timeout).await?;

        codec::write_request(&mut origin.stream, &request, &body)
            .await
            .map_err(RelayError::OriginIo)?;
        let response = codec::read_response_header(&mut origin.stream, max_header_bytes)
            .await
            .map_err(RelayError::origin)?;

        let (response, outcome) = match self.scheme.decide(&request, Some(&response)) {
            Decision::Continue => (response, RequestOutcome::Forwarded),
            Decision::StopProcessing => {
                tracing::info!(
                    status = response.status(),
                    reason = response.reason(),
                    scheme = %self.scheme.kind(),
                    "Authentication challenge intercepted"
                );
                origin
                    .stream
                    .get_mut()
                    .set_timeout(Some(Duration::from_secs(self.config.timeouts.intercept_secs)));
                let interception = Interceptor::new(&self.scheme, max_header_bytes)
                    .intercept(&mut origin.stream, &mut request, &body, response)
                    .await?;
                let outcome = RequestOutcome::Intercepted {
                    scheme: self.scheme.kind(),
                    replays: interception.replays,
                    handshake: interception.handshake,
                };
                (interception.response, outcome)
            }
        };

        // Delivering
        let framing = response.framing(request.method());
        codec::write_response_header(&mut self.client, &response)
            .await
            .map_err(RelayError::ClientIo)?;
        codec::copy_body(&mut origin.stream, &mut self.client, framing)
            .await
            .map_err(RelayError::origin)?;
        self.client.flush().await.map_err(RelayError::ClientIo)?;
        origin.stream.get_mut().set_timeout(None);

        record(&outcome, response.status());

        let origin_done = response.wants_close() || framing == BodyFraming::UntilClose;
        if origin_done {
            self.origin = None;
        }
        Ok(!(origin_done || request.wants_close()))
    }

    /// Tell the client its request cannot be served.
    async fn reject(&mut self, status: u16, reason: &str) -> Result<(), RelayError> {
        let body = format!("{} {}\n", status, reason);
        let headers: HeaderList = [
            ("Content-Type", "text/plain".to_string()),
            ("Content-Length", body.len().to_string()),
            ("Connection", "close".to_string()),
        ]
        .into_iter()
        .collect();
        let response = ResponseHeader::synthetic(status, reason, headers);
        codec::write_response(&mut self.client, &response, body.as_bytes())
            .await
            .map_err(RelayError::ClientIo)
    }
}

/// Reuse the open origin connection if it serves `authority`, otherwise dial a new one.
async fn connect_origin<'a>(
    slot: &'a mut Option<OriginLink>,
    authority: &str,
    limit: Duration,
) -> Result<&'a mut OriginLink, RelayError> {
    let link = match slot.take() {
        Some(link) if link.authority == authority => link,
        previous => {
            if let Some(previous) = previous {
                tracing::debug!(from = %previous.authority, to = %authority, "Origin changed; reconnecting");
            }
            let stream = timeouts::connect(authority, limit)
                .await
                .map_err(|source| RelayError::Connect {
                    authority: authority.to_string(),
                    source,
                })?;
            stream.set_nodelay(true).map_err(RelayError::OriginIo)?;
            tracing::debug!(origin = %authority, "Origin connected");
            OriginLink {
                authority: authority.to_string(),
                stream: BufReader::new(IoTimeout::new(stream)),
            }
        }
    };
    Ok(slot.insert(link))
}

fn record(outcome: &RequestOutcome, status: u16) {
    match *outcome {
        RequestOutcome::Forwarded => {
            metrics::record_request("forwarded");
            tracing::debug!(status, "Response forwarded");
        }
        RequestOutcome::Intercepted {
            scheme,
            replays,
            handshake,
        } => {
            metrics::record_request("intercepted");
            metrics::record_replays(scheme, replays);
            metrics::record_handshake(scheme, handshake.as_str());
            tracing::info!(
                status,
                replays,
                handshake = handshake.as_str(),
                "Intercepted response delivered"
            );
        }
    }
}
