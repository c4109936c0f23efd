//! Challenge interception and replay.
//!
//! # Responsibilities
//! - Discard the challenged response's body (it never reaches the client)
//! - Select the challenge line and run the configured scheme's driver
//! - Replay the request on the same origin connection with each produced
//!   `Authorization` value
//! - Hand back the one response that will be delivered
//!
//! # Design Decisions
//! - Generic over the origin stream so the exchange can be driven over
//!   in-memory pipes in tests
//! - Deadlines are the caller's concern; see `resilience::timeouts`

use tokio::io::{AsyncBufRead, AsyncWrite};

use crate::auth::handshake::NtlmHandshake;
use crate::auth::{challenge, digest, ntlm, AuthScheme, DigestScheme, NtlmScheme};
use crate::http::{codec, origin_form, RequestHeader, ResponseHeader};
use crate::relay::{HandshakeOutcome, RelayError};

/// Result of one interception.
#[derive(Debug)]
pub struct Interception {
    /// Header of the response to deliver. Its body is still unread on the origin stream.
    pub response: ResponseHeader,
    pub replays: u32,
    pub handshake: HandshakeOutcome,
}

/// Drives one scheme's replays against an origin stream.
#[derive(Debug, Clone, Copy)]
pub struct Interceptor<'a> {
    scheme: &'a AuthScheme,
    max_header_bytes: usize,
}

impl<'a> Interceptor<'a> {
    pub fn new(scheme: &'a AuthScheme, max_header_bytes: usize) -> Self {
        Self {
            scheme,
            max_header_bytes,
        }
    }

    /// Answer `challenged` on the client's behalf.
    ///
    /// `request` is mutated in place (its `Authorization` header is replaced)
    /// and re-sent with `body` for every replay.
    pub async fn intercept<O>(
        &self,
        origin: &mut O,
        request: &mut RequestHeader,
        body: &[u8],
        challenged: ResponseHeader,
    ) -> Result<Interception, RelayError>
    where
        O: AsyncBufRead + AsyncWrite + Unpin,
    {
        codec::drain_body(origin, challenged.framing(request.method()))
            .await
            .map_err(RelayError::origin)?;

        let composite = challenged.www_authenticate().unwrap_or_default();
        let line = challenge::select(&composite, self.scheme.marker())?;
        tracing::debug!(challenge = %line, "Challenge selected");

        match self.scheme {
            AuthScheme::Digest(scheme) => self.digest(scheme, origin, request, body, &line).await,
            AuthScheme::Ntlm(scheme) => self.ntlm(scheme, origin, request, body).await,
        }
    }

    async fn digest<O>(
        &self,
        scheme: &DigestScheme,
        origin: &mut O,
        request: &mut RequestHeader,
        body: &[u8],
        line: &str,
    ) -> Result<Interception, RelayError>
    where
        O: AsyncBufRead + AsyncWrite + Unpin,
    {
        let value = digest::authorization(
            &scheme.credentials.username,
            &scheme.credentials.password,
            request.method(),
            origin_form(request.target()),
            line,
        )?;
        request.set_authorization(value);

        let response = self.replay(origin, request, body, 1).await?;
        Ok(Interception {
            response,
            replays: 1,
            handshake: HandshakeOutcome::Completed,
        })
    }

    async fn ntlm<O>(
        &self,
        scheme: &NtlmScheme,
        origin: &mut O,
        request: &mut RequestHeader,
        body: &[u8],
    ) -> Result<Interception, RelayError>
    where
        O: AsyncBufRead + AsyncWrite + Unpin,
    {
        let mut handshake = NtlmHandshake::new(&scheme.credentials);

        request.set_authorization(handshake.negotiate()?);
        let intermediate = self.replay(origin, request, body, 1).await?;

        let Some(authenticate) = handshake.authenticate(&intermediate)? else {
            tracing::info!(
                status = intermediate.status(),
                "{} handshake not continued by origin; delivering its response",
                ntlm::MARKER
            );
            return Ok(Interception {
                response: intermediate,
                replays: 1,
                handshake: HandshakeOutcome::AbortedSilently,
            });
        };

        codec::drain_body(origin, intermediate.framing(request.method()))
            .await
            .map_err(RelayError::origin)?;

        request.set_authorization(authenticate);
        let response = self.replay(origin, request, body, 2).await?;
        Ok(Interception {
            response,
            replays: 2,
            handshake: HandshakeOutcome::Completed,
        })
    }

    /// Re-send the request and read back the response header.
    async fn replay<O>(
        &self,
        origin: &mut O,
        request: &RequestHeader,
        body: &[u8],
        round: u32,
    ) -> Result<ResponseHeader, RelayError>
    where
        O: AsyncBufRead + AsyncWrite + Unpin,
    {
        codec::write_request(origin, request, body)
            .await
            .map_err(RelayError::OriginIo)?;
        let response = codec::read_response_header(origin, self.max_header_bytes)
            .await
            .map_err(RelayError::origin)?;

        tracing::info!(
            round,
            status = response.status(),
            scheme = %self.scheme.kind(),
            "Replay answered"
        );
        Ok(response)
    }
}
