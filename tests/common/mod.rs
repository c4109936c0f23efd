//! Shared utilities for the relay integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use auth_relay::config::{RelayConfig, SchemeKind};
use auth_relay::http::codec;
use auth_relay::lifecycle::Shutdown;
use auth_relay::ProxyServer;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use md5::Md5;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

pub const HOSTNAME: &str = "www.seleniumhq-test.test";
pub const PORT: u16 = 5000;

/// A request as the origin saw it.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    /// Index of the origin connection it arrived on.
    pub connection: usize,
    /// Position of the request on that connection.
    pub index: usize,
    pub method: String,
    pub target: String,
    pub host: Option<String>,
    pub authorization: Option<String>,
    /// Header block bytes exactly as received.
    pub raw: Vec<u8>,
    pub body: Vec<u8>,
}

/// Raw-TCP origin answering each request with whatever the script returns.
///
/// A script returning `None` leaves the request unanswered (the connection is
/// held open for a while, then dropped). An empty reply closes the connection
/// at once without answering.
pub struct ScriptedOrigin {
    pub addr: SocketAddr,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    connections: Arc<AtomicUsize>,
}

impl ScriptedOrigin {
    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

pub async fn start_scripted_origin<F>(script: F) -> ScriptedOrigin
where
    F: Fn(&SeenRequest) -> Option<String> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let connections = Arc::new(AtomicUsize::new(0));
    let script = Arc::new(script);

    let origin = ScriptedOrigin {
        addr,
        seen: seen.clone(),
        connections: connections.clone(),
    };

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let connection = connections.fetch_add(1, Ordering::SeqCst);
            let seen = seen.clone();
            let script = script.clone();
            tokio::spawn(async move {
                let mut stream = BufReader::new(socket);
                for index in 0.. {
                    let Ok(Some(request)) = codec::read_request_header(&mut stream, 64 * 1024).await else {
                        break;
                    };
                    let Ok(body) = codec::read_body(&mut stream, request.framing(), 1 << 20).await else {
                        break;
                    };
                    let record = SeenRequest {
                        connection,
                        index,
                        method: request.method().to_string(),
                        target: request.target().to_string(),
                        host: request.host().map(str::to_string),
                        authorization: request.authorization().map(str::to_string),
                        raw: request.to_bytes().into_owned(),
                        body,
                    };
                    seen.lock().unwrap().push(record.clone());

                    match script(&record) {
                        Some(reply) if reply.is_empty() => {
                            let _ = stream.get_mut().shutdown().await;
                            break;
                        }
                        Some(reply) => {
                            if stream.get_mut().write_all(reply.as_bytes()).await.is_err() {
                                break;
                            }
                            if reply.to_ascii_lowercase().contains("connection: close") {
                                let _ = stream.get_mut().shutdown().await;
                                break;
                            }
                        }
                        None => {
                            tokio::time::sleep(Duration::from_secs(10)).await;
                            break;
                        }
                    }
                }
            });
        }
    });

    origin
}

/// Start a relay whose every connection is sent to `origin`.
pub async fn start_relay(scheme: SchemeKind, origin: SocketAddr) -> (SocketAddr, Shutdown) {
    let mut config = RelayConfig::default();
    config.auth.scheme = scheme;
    config.origin.address = Some(origin.to_string());
    start_relay_with(config).await
}

pub async fn start_relay_with(config: RelayConfig) -> (SocketAddr, Shutdown) {
    let server = ProxyServer::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = Shutdown::new();
    tokio::spawn(server.run(shutdown.clone()));
    (addr, shutdown)
}

/// reqwest client routing plain-HTTP requests through the relay.
pub fn proxied_client(relay: SocketAddr) -> reqwest::Client {
    reqwest::Client::builder()
        .proxy(reqwest::Proxy::http(format!("http://{}", relay)).unwrap())
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Send raw bytes to the relay and collect everything it returns until it closes.
pub async fn raw_exchange(relay: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(relay).await.unwrap();
    stream.write_all(request).await.unwrap();
    let mut received = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut received))
        .await
        .expect("relay did not close the connection")
        .ok();
    received
}

/// `Content-Length` framed response text.
pub fn response(status: &str, headers: &[(&str, &str)], body: &str) -> String {
    let mut out = format!("HTTP/1.1 {}\r\n", status);
    for (name, value) in headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    out.push_str(&format!("Content-Length: {}\r\n\r\n{}", body.len(), body));
    out
}

/// Parse `key="value"` pairs of a Digest `Authorization` value.
pub fn digest_params(value: &str) -> Vec<(String, String)> {
    value
        .trim_start_matches("Digest")
        .split(',')
        .filter_map(|part| part.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().trim_matches('"').to_string()))
        .collect()
}

pub fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn md5_hex(data: &str) -> String {
    use md5::Digest;
    hex::encode(Md5::digest(data.as_bytes()))
}

/// Server-side check of an RFC 2617 `qop=auth` MD5 Digest response.
pub fn digest_is_valid(value: &str, method: &str, password: &str) -> bool {
    let params = digest_params(value);
    let (Some(username), Some(realm), Some(nonce), Some(uri), Some(response)) = (
        param(&params, "username"),
        param(&params, "realm"),
        param(&params, "nonce"),
        param(&params, "uri"),
        param(&params, "response"),
    ) else {
        return false;
    };
    let ha1 = md5_hex(&format!("{}:{}:{}", username, realm, password));
    let ha2 = md5_hex(&format!("{}:{}", method, uri));
    let expected = match (param(&params, "qop"), param(&params, "nc"), param(&params, "cnonce")) {
        (Some(qop), Some(nc), Some(cnonce)) => {
            md5_hex(&format!("{}:{}:{}:{}:{}:{}", ha1, nonce, nc, cnonce, qop, ha2))
        }
        _ => md5_hex(&format!("{}:{}:{}", ha1, nonce, ha2)),
    };
    expected == response
}

fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|c| c.to_le_bytes()).collect()
}

fn security_buffer(out: &mut Vec<u8>, len: usize, offset: usize) {
    out.extend_from_slice(&(len as u16).to_le_bytes());
    out.extend_from_slice(&(len as u16).to_le_bytes());
    out.extend_from_slice(&(offset as u32).to_le_bytes());
}

fn buffer_at(message: &[u8], at: usize) -> &[u8] {
    let len = u16::from_le_bytes([message[at], message[at + 1]]) as usize;
    let offset = u32::from_le_bytes([message[at + 4], message[at + 5], message[at + 6], message[at + 7]]) as usize;
    &message[offset..offset + len]
}

/// `NTLM <base64>` Type 2 challenge with the given server challenge.
pub fn ntlm_challenge_header(server_challenge: [u8; 8]) -> String {
    let mut info = Vec::new();
    let domain = utf16le("TESTDOMAIN");
    info.extend_from_slice(&2u16.to_le_bytes());
    info.extend_from_slice(&(domain.len() as u16).to_le_bytes());
    info.extend_from_slice(&domain);
    info.extend_from_slice(&[0, 0, 0, 0]);

    let flags: u32 = 0x0000_0001 | 0x0000_0200 | 0x0008_0000 | 0x0080_0000;
    let mut msg = Vec::new();
    msg.extend_from_slice(b"NTLMSSP\0");
    msg.extend_from_slice(&2u32.to_le_bytes());
    security_buffer(&mut msg, domain.len(), 48);
    msg.extend_from_slice(&flags.to_le_bytes());
    msg.extend_from_slice(&server_challenge);
    msg.extend_from_slice(&[0u8; 8]);
    security_buffer(&mut msg, info.len(), 48 + domain.len());
    msg.extend_from_slice(&domain);
    msg.extend_from_slice(&info);
    format!("NTLM {}", STANDARD.encode(msg))
}

/// Decoded message type of an `NTLM <base64>` header value.
pub fn ntlm_message_type(value: &str) -> Option<u32> {
    let data = STANDARD.decode(value.strip_prefix("NTLM ")?).ok()?;
    if data.len() < 12 || &data[0..8] != b"NTLMSSP\0" {
        return None;
    }
    Some(u32::from_le_bytes([data[8], data[9], data[10], data[11]]))
}

/// Server-side check of an NTLMv2 Type 3 message.
pub fn ntlm_authenticate_is_valid(value: &str, server_challenge: [u8; 8], username: &str, password: &str) -> bool {
    let Some(token) = value.strip_prefix("NTLM ") else {
        return false;
    };
    let Ok(data) = STANDARD.decode(token) else {
        return false;
    };
    if ntlm_message_type(value) != Some(3) || data.len() < 64 {
        return false;
    }
    let domain = String::from_utf16_lossy(
        &buffer_at(&data, 28)
            .chunks_exact(2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .collect::<Vec<_>>(),
    );
    let user = buffer_at(&data, 36);
    if user != utf16le(username).as_slice() {
        return false;
    }
    let nt_response = buffer_at(&data, 20);
    if nt_response.len() <= 16 {
        return false;
    }
    let (proof, blob) = nt_response.split_at(16);

    let key = auth_relay::auth::ntlm::ntowf_v2(password, username, &domain);
    let mut mac = <Hmac<Md5> as Mac>::new_from_slice(&key).unwrap();
    mac.update(&server_challenge);
    mac.update(blob);
    mac.verify_slice(proof).is_ok()
}
