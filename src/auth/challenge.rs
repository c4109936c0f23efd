//! Challenge selection from a composite `WWW-Authenticate` value.
//!
//! Origins that offer several schemes send one `WWW-Authenticate` header per
//! scheme. The response model joins them with CRLF; this module picks the line
//! belonging to the scheme being driven.

use crate::auth::AuthError;

/// Select the challenge line for `marker` from a CRLF-joined composite value.
///
/// Returns the first non-empty line that starts with `marker`. Fails with
/// [`AuthError::SchemeNotOffered`] when `marker` does not occur anywhere in the
/// composite. When it occurs, but not at the start of any line, the result is an
/// empty string rather than an error; callers branch on that distinction.
pub fn select(composite: &str, marker: &str) -> Result<String, AuthError> {
    if !composite.contains(marker) {
        return Err(AuthError::SchemeNotOffered {
            marker: marker.to_string(),
            offered: composite.replace("\r\n", ", "),
        });
    }

    Ok(composite
        .split("\r\n")
        .filter(|line| !line.is_empty())
        .find(|line| line.starts_with(marker))
        .unwrap_or_default()
        .to_string())
}

/// Token following `marker` on the first line of the form `"<marker> <token>"`.
///
/// Used on intermediate handshake responses, where a bare `"<marker>"` line
/// (an initial offer) does not count as a challenge.
pub fn token<'a>(composite: &'a str, marker: &str) -> Option<&'a str> {
    composite
        .split("\r\n")
        .filter_map(|line| line.strip_prefix(marker))
        .filter_map(|rest| rest.strip_prefix(' '))
        .map(str::trim)
        .find(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_matching_line_among_several() {
        let composite = "Digest realm=\"Digest Auth Realm\", nonce=\"abc\"\r\nBasic realm=\"Basic Auth Realm\"";
        assert_eq!(
            select(composite, "Digest").unwrap(),
            "Digest realm=\"Digest Auth Realm\", nonce=\"abc\""
        );
        assert_eq!(select(composite, "Basic").unwrap(), "Basic realm=\"Basic Auth Realm\"");
    }

    #[test]
    fn skips_empty_lines() {
        let composite = "\r\n\r\nNegotiate\r\n\r\nNTLM\r\n";
        assert_eq!(select(composite, "NTLM").unwrap(), "NTLM");
    }

    #[test]
    fn absent_marker_is_an_error() {
        let err = select("Negotiate\r\nBasic realm=\"x\"", "Digest").unwrap_err();
        match err {
            AuthError::SchemeNotOffered { marker, offered } => {
                assert_eq!(marker, "Digest");
                assert_eq!(offered, "Negotiate, Basic realm=\"x\"");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn marker_not_at_line_start_yields_empty() {
        let composite = "Basic realm=\"NTLM users\"";
        assert_eq!(select(composite, "NTLM").unwrap(), "");
    }

    #[test]
    fn marker_is_case_sensitive() {
        assert!(select("digest realm=\"x\"", "Digest").is_err());
    }

    #[test]
    fn token_requires_payload() {
        assert_eq!(token("Negotiate\r\nNTLM", "NTLM"), None);
        assert_eq!(token("NTLM ", "NTLM"), None);
        assert_eq!(token("Negotiate abc\r\nNTLM TlRMTVNT", "NTLM"), Some("TlRMTVNT"));
        assert_eq!(token("NTLMX abc", "NTLM"), None);
    }
}
