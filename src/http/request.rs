//! Request header model.
//!
//! # Responsibilities
//! - Hold the parsed request line and header fields
//! - Keep the bytes exactly as received so untouched requests are forwarded verbatim
//! - Allow the relay to inject `Authorization` before a replay
//! - Work out which origin authority a request is addressed to

use std::borrow::Cow;

use url::Url;

use crate::http::codec::BodyFraming;
use crate::http::headers::HeaderList;

/// A parsed HTTP/1.x request header.
///
/// While unmodified, [`RequestHeader::to_bytes`] returns the original wire bytes.
/// Any mutation drops them and the header is re-serialized on the next write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    method: String,
    target: String,
    /// Minor HTTP version (`1` for HTTP/1.1).
    version: u8,
    headers: HeaderList,
    raw: Option<Vec<u8>>,
}

impl RequestHeader {
    /// Build a request header from scratch (HTTP/1.1).
    pub fn new(method: impl Into<String>, target: impl Into<String>, headers: HeaderList) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            version: 1,
            headers,
            raw: None,
        }
    }

    pub(crate) fn from_wire(
        method: String,
        target: String,
        version: u8,
        headers: HeaderList,
        raw: Vec<u8>,
    ) -> Self {
        Self {
            method,
            target,
            version,
            headers,
            raw: Some(raw),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request target exactly as sent by the client (absolute-form for proxied requests).
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn headers(&self) -> &HeaderList {
        &self.headers
    }

    /// Value of the `Host` header.
    pub fn host(&self) -> Option<&str> {
        self.headers.get("Host")
    }

    pub fn authorization(&self) -> Option<&str> {
        self.headers.get("Authorization")
    }

    /// Replace the `Authorization` header.
    pub fn set_authorization(&mut self, value: impl Into<String>) {
        self.headers.set("Authorization", value);
        self.raw = None;
    }

    /// Whether the header differs from what was read off the wire.
    pub fn is_modified(&self) -> bool {
        self.raw.is_none()
    }

    /// Wire representation of the header block, including the terminating blank line.
    pub fn to_bytes(&self) -> Cow<'_, [u8]> {
        if let Some(raw) = &self.raw {
            return Cow::Borrowed(raw);
        }
        let mut out = format!("{} {} HTTP/1.{}\r\n", self.method, self.target, self.version);
        for (name, value) in self.headers.iter() {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        Cow::Owned(out.into_bytes())
    }

    /// How the request body is delimited on the wire.
    pub fn framing(&self) -> BodyFraming {
        if self.headers.has_token("Transfer-Encoding", "chunked") {
            return BodyFraming::Chunked;
        }
        match self
            .headers
            .get("Content-Length")
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            Some(0) | None => BodyFraming::Empty,
            Some(len) => BodyFraming::Length(len),
        }
    }

    /// Whether the client asked for the connection to be closed after this exchange.
    pub fn wants_close(&self) -> bool {
        if self.headers.has_token("Connection", "close")
            || self.headers.has_token("Proxy-Connection", "close")
        {
            return true;
        }
        self.version == 0
            && !self.headers.has_token("Connection", "keep-alive")
            && !self.headers.has_token("Proxy-Connection", "keep-alive")
    }

    /// `host:port` of the origin this request is addressed to.
    ///
    /// Taken from an absolute-form target when present, otherwise from `Host`.
    /// The port defaults to 80.
    pub fn authority(&self) -> Option<String> {
        if self.target.contains("://") {
            let url = Url::parse(&self.target).ok()?;
            let host = url.host_str()?;
            let port = url.port_or_known_default().unwrap_or(80);
            return Some(format!("{}:{}", host, port));
        }
        let host = self.host()?.trim();
        if host.is_empty() {
            return None;
        }
        if host.rsplit_once(':').is_some_and(|(_, port)| port.parse::<u16>().is_ok()) {
            Some(host.to_string())
        } else {
            Some(format!("{}:80", host))
        }
    }
}

/// Strip any leading `scheme://host[:port]` from a request target.
///
/// Returns the path and query only, `/` when nothing is left.
pub fn origin_form(target: &str) -> &str {
    let Some(idx) = target.find("://") else {
        return target;
    };
    let rest = &target[idx + 3..];
    match rest.find(|c| c == '/' || c == '?') {
        Some(start) => &rest[start..],
        None => "/",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(target: &str, headers: &[(&str, &str)]) -> RequestHeader {
        RequestHeader::new("GET", target, headers.iter().copied().collect())
    }

    #[test]
    fn origin_form_strips_scheme_and_authority() {
        assert_eq!(
            origin_form("http://www.example.test:5000/api/auth/digest?x=1"),
            "/api/auth/digest?x=1"
        );
        assert_eq!(origin_form("http://localhost:5000"), "/");
        assert_eq!(origin_form("/already/origin-form"), "/already/origin-form");
    }

    #[test]
    fn authority_prefers_absolute_target() {
        let req = request("http://localhost:5000/api", &[("Host", "other:1")]);
        assert_eq!(req.authority().as_deref(), Some("localhost:5000"));
    }

    #[test]
    fn authority_from_host_defaults_port() {
        let req = request("/api", &[("Host", "example.test")]);
        assert_eq!(req.authority().as_deref(), Some("example.test:80"));

        let req = request("/api", &[("Host", "example.test:8080")]);
        assert_eq!(req.authority().as_deref(), Some("example.test:8080"));

        let req = request("/api", &[]);
        assert_eq!(req.authority(), None);
    }

    #[test]
    fn set_authorization_reserializes() {
        let raw = b"GET http://h:1/ HTTP/1.1\r\nHost:h:1\r\n\r\n".to_vec();
        let headers: HeaderList = [("Host", "h:1")].into_iter().collect();
        let mut req = RequestHeader::from_wire("GET".into(), "http://h:1/".into(), 1, headers, raw.clone());

        assert!(!req.is_modified());
        assert_eq!(req.to_bytes().as_ref(), raw.as_slice());

        req.set_authorization("Digest abc");
        assert!(req.is_modified());
        assert_eq!(
            req.to_bytes().as_ref(),
            b"GET http://h:1/ HTTP/1.1\r\nHost: h:1\r\nAuthorization: Digest abc\r\n\r\n".as_slice()
        );
    }

    #[test]
    fn framing_from_headers() {
        assert_eq!(request("/", &[]).framing(), BodyFraming::Empty);
        assert_eq!(
            request("/", &[("Content-Length", "5")]).framing(),
            BodyFraming::Length(5)
        );
        assert_eq!(
            request("/", &[("Transfer-Encoding", "chunked")]).framing(),
            BodyFraming::Chunked
        );
    }

    #[test]
    fn http10_closes_by_default() {
        let headers: HeaderList = HeaderList::new();
        let req = RequestHeader::from_wire("GET".into(), "/".into(), 0, headers, Vec::new());
        assert!(req.wants_close());
        assert!(!request("/", &[]).wants_close());
        assert!(request("/", &[("Proxy-Connection", "close")]).wants_close());
    }
}
