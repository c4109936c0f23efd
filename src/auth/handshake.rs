//! Multi-round NTLM handshake state machine.
//!
//! ```text
//! Start ──negotiate()──▶ Negotiated ──authenticate(401 + "NTLM <token>")──▶ Authenticated
//!                             │
//!                             └──authenticate(anything else)──▶ Aborted
//! ```
//!
//! `Aborted` is silent: the relay delivers whatever the origin answered to the
//! negotiate replay and sends no third request.

use crate::auth::challenge;
use crate::auth::ntlm::{self, ChallengeMessage, NtlmCredentials, DEFAULT_NEGOTIATE_FLAGS};
use crate::auth::AuthError;
use crate::http::ResponseHeader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Start,
    Negotiated,
    Authenticated,
    Aborted,
}

/// One NTLM handshake, scoped to a single intercepted request.
#[derive(Debug)]
pub struct NtlmHandshake<'a> {
    credentials: &'a NtlmCredentials,
    state: HandshakeState,
    flags: u32,
}

impl<'a> NtlmHandshake<'a> {
    pub fn new(credentials: &'a NtlmCredentials) -> Self {
        Self {
            credentials,
            state: HandshakeState::Start,
            flags: DEFAULT_NEGOTIATE_FLAGS,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Start → Negotiated. Returns the Type 1 `Authorization` value.
    pub fn negotiate(&mut self) -> Result<String, AuthError> {
        if self.state != HandshakeState::Start {
            return Err(AuthError::HandshakeOutOfOrder(self.state));
        }
        self.state = HandshakeState::Negotiated;
        Ok(ntlm::header_value(&ntlm::negotiate_message(self.flags)))
    }

    /// Negotiated → Authenticated, or → Aborted.
    ///
    /// `response` is the origin's answer to the negotiate replay. Returns the
    /// Type 3 value when it carries an NTLM challenge, `None` when the handshake
    /// aborted silently.
    pub fn authenticate(&mut self, response: &ResponseHeader) -> Result<Option<String>, AuthError> {
        self.authenticate_with(response, rand::random(), None)
    }

    fn authenticate_with(
        &mut self,
        response: &ResponseHeader,
        client_challenge: [u8; 8],
        timestamp: Option<u64>,
    ) -> Result<Option<String>, AuthError> {
        if self.state != HandshakeState::Negotiated {
            return Err(AuthError::HandshakeOutOfOrder(self.state));
        }

        let composite = response.www_authenticate();
        let token = composite
            .as_deref()
            .filter(|_| response.status() == 401)
            .and_then(|c| challenge::token(c, ntlm::MARKER));
        let Some(token) = token else {
            self.state = HandshakeState::Aborted;
            return Ok(None);
        };

        let message = match ChallengeMessage::from_token(token) {
            Ok(message) => message,
            Err(e) => {
                self.state = HandshakeState::Aborted;
                return Err(e);
            }
        };
        tracing::debug!(
            target_name = %message.target_name,
            flags = format_args!("{:#010x}", message.flags),
            "NTLM challenge received"
        );

        let timestamp = timestamp
            .or_else(|| message.timestamp())
            .unwrap_or_else(ntlm::filetime_now);
        let authenticate = match ntlm::authenticate_message(&message, self.credentials, client_challenge, timestamp) {
            Ok(authenticate) => authenticate,
            Err(e) => {
                self.state = HandshakeState::Aborted;
                return Err(e);
            }
        };

        self.state = HandshakeState::Authenticated;
        Ok(Some(ntlm::header_value(&authenticate)))
    }
}
