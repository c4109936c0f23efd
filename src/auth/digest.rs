//! HTTP Digest access authentication (single round).
//!
//! Challenge parsing and the response computation (RFC 2069, RFC 2617 and the
//! SHA-256 algorithms of RFC 7616) come from `digest_auth`. This module selects
//! the inputs and keeps the result a pure function of them: the client nonce is
//! derived from the challenge and request instead of being drawn at random, so
//! the same inputs always produce the same header value.

use digest_auth::{AuthContext, HttpMethod};
use md5::{Digest, Md5};

use crate::auth::AuthError;

/// Scheme marker at the start of a Digest challenge line.
pub const MARKER: &str = "Digest";

/// Compute the `Authorization` value answering `challenge`.
///
/// `uri` must be the path and query only, without `scheme://host[:port]`.
pub fn authorization(
    username: &str,
    password: &str,
    method: &str,
    uri: &str,
    challenge: &str,
) -> Result<String, AuthError> {
    let prompt = digest_auth::parse(challenge).map_err(malformed)?;
    let cnonce = derive_cnonce(&prompt.nonce, username, method, uri);
    respond(prompt, username, password, method, uri, &cnonce)
}

fn respond(
    mut prompt: digest_auth::WwwAuthenticateHeader,
    username: &str,
    password: &str,
    method: &str,
    uri: &str,
    cnonce: &str,
) -> Result<String, AuthError> {
    let mut context = AuthContext::new_with_method(username, password, uri, None::<&[u8]>, HttpMethod::from(method));
    context.set_custom_cnonce(cnonce);
    let answer = prompt.respond(&context).map_err(malformed)?;
    Ok(answer.to_string())
}

fn derive_cnonce(nonce: &str, username: &str, method: &str, uri: &str) -> String {
    let digest = Md5::digest(format!("{}:{}:{}:{}", nonce, username, method, uri).as_bytes());
    hex::encode(&digest[..8])
}

fn malformed(err: digest_auth::Error) -> AuthError {
    AuthError::MalformedChallenge {
        scheme: MARKER,
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn respond_with(challenge: &str, username: &str, password: &str, cnonce: &str) -> String {
        let prompt = digest_auth::parse(challenge).unwrap();
        respond(prompt, username, password, "GET", "/dir/index.html", cnonce).unwrap()
    }

    #[test]
    fn rfc2069_vector() {
        let challenge = r#"Digest realm="testrealm@host.com", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#;
        let value = authorization("Mufasa", "CircleOfLife", "GET", "/dir/index.html", challenge).unwrap();
        assert!(value.starts_with(r#"Digest username="Mufasa""#), "{value}");
        assert!(value.contains(r#"uri="/dir/index.html""#), "{value}");
        assert!(value.contains(r#"response="1949323746fe6a43ef61f9606e7febea""#), "{value}");
        assert!(value.contains(r#"opaque="5ccc069c403ebaf9f0171e9517f40e41""#), "{value}");
        assert!(!value.contains("qop="), "{value}");
    }

    #[test]
    fn rfc2617_vector() {
        let challenge = r#"Digest realm="testrealm@host.com", qop="auth,auth-int", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#;
        let value = respond_with(challenge, "Mufasa", "Circle Of Life", "0a4f113b");
        assert!(value.contains(r#"response="6629fae49393a05397450978507c4ef1""#), "{value}");
        assert!(value.contains("qop=auth, nc=00000001, cnonce=\"0a4f113b\""), "{value}");
    }

    #[test]
    fn rfc7616_md5_and_sha256_vectors() {
        let cnonce = "f2/wE4q74E6zIJEtWaHKaf5wv/H5QzzpXusqGemxURZJ";
        let base = r#"realm="http-auth@example.org", qop="auth, auth-int", nonce="7ypf/xlj9XXwfDPEoM4URrv/xwf94BcCAzFZH4GiTo0v", opaque="FQhe/qaU925kfnzjCev0ciny7QMkPqMAFRtzCUYo5tdS""#;

        let value = respond_with(&format!("Digest algorithm=MD5, {}", base), "Mufasa", "Circle of Life", cnonce);
        assert!(value.contains(r#"response="8ca523f5e9506fed4657c9700eebdbec""#), "{value}");

        let value = respond_with(&format!("Digest algorithm=SHA-256, {}", base), "Mufasa", "Circle of Life", cnonce);
        assert!(
            value.contains(r#"response="753927fa0e85d155564e2e272a28d1802ca10daf4496794697cf8db5856cb6c1""#),
            "{value}"
        );
        assert!(value.contains("algorithm=SHA-256"), "{value}");
    }

    #[test]
    fn identical_inputs_identical_output() {
        let challenge = r#"Digest realm="Digest Auth Realm", nonce="MTUzMDg0NjQ2", qop="auth""#;
        let first = authorization("leela", "Nibbler", "GET", "/api/auth/digest", challenge).unwrap();
        let second = authorization("leela", "Nibbler", "GET", "/api/auth/digest", challenge).unwrap();
        assert_eq!(first, second);

        let other_uri = authorization("leela", "Nibbler", "GET", "/api/other", challenge).unwrap();
        assert_ne!(first, other_uri);
    }

    #[test]
    fn method_enters_the_hash() {
        let challenge = r#"Digest realm="r", nonce="n", qop="auth""#;
        let get = authorization("u", "p", "GET", "/", challenge).unwrap();
        let post = authorization("u", "p", "POST", "/", challenge).unwrap();
        assert_ne!(get, post);
    }

    #[test]
    fn missing_nonce_is_malformed() {
        let err = authorization("u", "p", "GET", "/", r#"Digest realm="x""#).unwrap_err();
        assert!(matches!(err, AuthError::MalformedChallenge { scheme: "Digest", .. }));
    }

    #[test]
    fn empty_line_is_malformed() {
        let err = authorization("u", "p", "GET", "/", "").unwrap_err();
        assert!(matches!(err, AuthError::MalformedChallenge { scheme: "Digest", .. }));
    }

    #[test]
    fn unknown_algorithm_is_malformed() {
        let err = authorization("u", "p", "GET", "/", r#"Digest realm="x", nonce="y", algorithm=ROT13"#).unwrap_err();
        assert!(matches!(err, AuthError::MalformedChallenge { .. }));
    }

    #[test]
    fn quoted_commas_survive_parsing() {
        let value = authorization("u", "p", "GET", "/", r#"Digest realm="a, b", nonce="n""#).unwrap();
        assert!(value.contains(r#"realm="a, b""#), "{value}");
        assert!(value.contains(r#"nonce="n""#), "{value}");
    }
}
