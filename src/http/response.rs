//! Response header model.
//!
//! # Responsibilities
//! - Hold the parsed status line and header fields, immutable after parse
//! - Keep the original bytes so pass-through delivery is byte-identical
//! - Expose every `WWW-Authenticate` value as one composite, CRLF-joined value

use crate::http::codec::BodyFraming;
use crate::http::headers::HeaderList;

/// A parsed HTTP/1.x response header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHeader {
    version: u8,
    status: u16,
    reason: String,
    headers: HeaderList,
    raw: Vec<u8>,
}

impl ResponseHeader {
    pub(crate) fn from_wire(
        version: u8,
        status: u16,
        reason: String,
        headers: HeaderList,
        raw: Vec<u8>,
    ) -> Self {
        Self {
            version,
            status,
            reason,
            headers,
            raw,
        }
    }

    /// Build a response header that did not come from an origin.
    pub fn synthetic(status: u16, reason: &str, headers: HeaderList) -> Self {
        let mut raw = format!("HTTP/1.1 {} {}\r\n", status, reason);
        for (name, value) in headers.iter() {
            raw.push_str(name);
            raw.push_str(": ");
            raw.push_str(value);
            raw.push_str("\r\n");
        }
        raw.push_str("\r\n");
        Self {
            version: 1,
            status,
            reason: reason.to_string(),
            headers,
            raw: raw.into_bytes(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn headers(&self) -> &HeaderList {
        &self.headers
    }

    /// The header block exactly as received, including the blank line.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// All `WWW-Authenticate` values joined by CRLF, or `None` when absent.
    pub fn www_authenticate(&self) -> Option<String> {
        let values: Vec<&str> = self.headers.get_all("WWW-Authenticate").collect();
        if values.is_empty() {
            None
        } else {
            Some(values.join("\r\n"))
        }
    }

    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get("Content-Length")
            .and_then(|v| v.trim().parse().ok())
    }

    /// How the body following this header is delimited.
    ///
    /// `request_method` matters because responses to `HEAD` never carry a body.
    pub fn framing(&self, request_method: &str) -> BodyFraming {
        if request_method.eq_ignore_ascii_case("HEAD")
            || (100..200).contains(&self.status)
            || self.status == 204
            || self.status == 304
        {
            return BodyFraming::Empty;
        }
        if self.headers.has_token("Transfer-Encoding", "chunked") {
            return BodyFraming::Chunked;
        }
        match self.content_length() {
            Some(0) => BodyFraming::Empty,
            Some(len) => BodyFraming::Length(len),
            None => BodyFraming::UntilClose,
        }
    }

    /// Whether the origin will close the connection after this response.
    pub fn wants_close(&self) -> bool {
        if self.headers.has_token("Connection", "close") {
            return true;
        }
        self.version == 0 && !self.headers.has_token("Connection", "keep-alive")
    }
}
