//! NTLM message construction.
//!
//! The three messages of the HTTP NTLM handshake:
//!   Type 1 – Negotiate    (client → server)
//!   Type 2 – Challenge    (server → client)
//!   Type 3 – Authenticate (client → server)
//!
//! The Type 3 message carries an NTLMv2 response (HMAC-MD5 over the server
//! challenge and a client blob echoing the server's target information).

use std::time::{SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use md4::{Digest, Md4};
use md5::Md5;

use crate::auth::AuthError;

/// Scheme marker at the start of an NTLM challenge line.
pub const MARKER: &str = "NTLM";

// NTLM flag bits (subset)
pub const NEGOTIATE_UNICODE: u32 = 0x0000_0001;
pub const NEGOTIATE_OEM: u32 = 0x0000_0002;
pub const REQUEST_TARGET: u32 = 0x0000_0004;
pub const NEGOTIATE_NTLM: u32 = 0x0000_0200;
pub const NEGOTIATE_ALWAYS_SIGN: u32 = 0x0000_8000;
pub const NEGOTIATE_EXTENDED_SESSIONSECURITY: u32 = 0x0008_0000;
pub const NEGOTIATE_TARGET_INFO: u32 = 0x0080_0000;

/// Flags sent in the negotiate message.
pub const DEFAULT_NEGOTIATE_FLAGS: u32 = NEGOTIATE_UNICODE
    | NEGOTIATE_OEM
    | REQUEST_TARGET
    | NEGOTIATE_NTLM
    | NEGOTIATE_ALWAYS_SIGN
    | NEGOTIATE_EXTENDED_SESSIONSECURITY;

const SIGNATURE: &[u8; 8] = b"NTLMSSP\0";
const AUTHENTICATE_HEADER_LEN: u32 = 64;
const AV_EOL: u16 = 0;
const AV_TIMESTAMP: u16 = 7;
/// Seconds between 1601-01-01 (Windows epoch) and 1970-01-01.
const WINDOWS_EPOCH_OFFSET_SECS: u64 = 11_644_473_600;

type HmacMd5 = Hmac<Md5>;

/// Account used for the authenticate message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NtlmCredentials {
    pub username: String,
    pub password: String,
    pub domain: String,
    pub workstation: String,
}

/// Build a Type 1 (Negotiate) message. Domain and workstation are not supplied.
pub fn negotiate_message(flags: u32) -> Vec<u8> {
    let mut msg = Vec::with_capacity(32);
    msg.extend_from_slice(SIGNATURE);
    msg.extend_from_slice(&1u32.to_le_bytes());
    msg.extend_from_slice(&flags.to_le_bytes());
    // DomainNameFields, WorkstationFields: empty, pointing past the header
    write_security_buffer(&mut msg, 0, 32);
    write_security_buffer(&mut msg, 0, 32);
    msg
}

/// Parsed Type 2 (Challenge) message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeMessage {
    pub flags: u32,
    pub server_challenge: [u8; 8],
    pub target_name: String,
    /// Raw AV_PAIR list, echoed back inside the NTLMv2 client blob.
    pub target_info: Vec<u8>,
}

impl ChallengeMessage {
    /// Parse the base64 token of a `WWW-Authenticate: NTLM <token>` line.
    pub fn from_token(token: &str) -> Result<Self, AuthError> {
        let data = STANDARD
            .decode(token.trim())
            .map_err(|e| malformed(format!("invalid base64: {}", e)))?;
        Self::parse(&data)
    }

    /// Parse a raw Type 2 message.
    pub fn parse(data: &[u8]) -> Result<Self, AuthError> {
        if data.len() < 32 {
            return Err(malformed(format!("challenge too short: {} bytes", data.len())));
        }
        if &data[0..8] != SIGNATURE {
            return Err(malformed("invalid signature".into()));
        }
        let msg_type = read_u32(data, 8);
        if msg_type != 2 {
            return Err(malformed(format!("expected message type 2, got {}", msg_type)));
        }

        let flags = read_u32(data, 20);
        let mut server_challenge = [0u8; 8];
        server_challenge.copy_from_slice(&data[24..32]);

        let target_name = read_security_buffer(data, 12)
            .map(|raw| {
                if flags & NEGOTIATE_UNICODE != 0 {
                    from_utf16le(raw)
                } else {
                    String::from_utf8_lossy(raw).into_owned()
                }
            })
            .unwrap_or_default();

        let target_info = if data.len() >= 48 {
            read_security_buffer(data, 40).map(<[u8]>::to_vec).unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(Self {
            flags,
            server_challenge,
            target_name,
            target_info,
        })
    }

    /// `MsvAvTimestamp` from the target information, if the server sent one.
    pub fn timestamp(&self) -> Option<u64> {
        let info = &self.target_info;
        let mut pos = 0usize;
        while pos + 4 <= info.len() {
            let id = u16::from_le_bytes([info[pos], info[pos + 1]]);
            let len = u16::from_le_bytes([info[pos + 2], info[pos + 3]]) as usize;
            let value = info.get(pos + 4..pos + 4 + len)?;
            match id {
                AV_EOL => return None,
                AV_TIMESTAMP if len == 8 => {
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(value);
                    return Some(u64::from_le_bytes(raw));
                }
                _ => pos += 4 + len,
            }
        }
        None
    }
}

/// Build a Type 3 (Authenticate) message with an NTLMv2 response.
///
/// `client_challenge` and `timestamp` (Windows FILETIME) are inputs so the
/// result is reproducible; [`crate::auth::handshake`] supplies fresh values.
/// Fails when a field does not fit a 16-bit security buffer, which happens when
/// the server's target info is close to 64 KiB.
pub fn authenticate_message(
    challenge: &ChallengeMessage,
    credentials: &NtlmCredentials,
    client_challenge: [u8; 8],
    timestamp: u64,
) -> Result<Vec<u8>, AuthError> {
    let ntowf = ntowf_v2(&credentials.password, &credentials.username, &credentials.domain);

    let mut blob = Vec::with_capacity(32 + challenge.target_info.len());
    blob.extend_from_slice(&[0x01, 0x01, 0x00, 0x00]);
    blob.extend_from_slice(&[0u8; 4]);
    blob.extend_from_slice(&timestamp.to_le_bytes());
    blob.extend_from_slice(&client_challenge);
    blob.extend_from_slice(&[0u8; 4]);
    blob.extend_from_slice(&challenge.target_info);
    blob.extend_from_slice(&[0u8; 4]);

    let nt_proof = hmac_md5(&ntowf, &[&challenge.server_challenge, &blob]);
    let mut nt_response = nt_proof.to_vec();
    nt_response.extend_from_slice(&blob);

    let mut lm_response = hmac_md5(&ntowf, &[&challenge.server_challenge, &client_challenge]).to_vec();
    lm_response.extend_from_slice(&client_challenge);

    let domain = to_utf16le(&credentials.domain);
    let username = to_utf16le(&credentials.username);
    let workstation = to_utf16le(&credentials.workstation);

    let lm_len = buffer_len("LM response", &lm_response)?;
    let nt_len = buffer_len("NT response", &nt_response)?;
    let domain_len = buffer_len("domain", &domain)?;
    let username_len = buffer_len("user name", &username)?;
    let workstation_len = buffer_len("workstation", &workstation)?;

    let lm_offset = AUTHENTICATE_HEADER_LEN;
    let nt_offset = lm_offset + lm_response.len() as u32;
    let domain_offset = nt_offset + nt_response.len() as u32;
    let username_offset = domain_offset + domain.len() as u32;
    let workstation_offset = username_offset + username.len() as u32;
    let end_offset = workstation_offset + workstation.len() as u32;

    let flags = NEGOTIATE_UNICODE
        | NEGOTIATE_NTLM
        | (challenge.flags
            & (REQUEST_TARGET
                | NEGOTIATE_ALWAYS_SIGN
                | NEGOTIATE_EXTENDED_SESSIONSECURITY
                | NEGOTIATE_TARGET_INFO));

    let mut msg = Vec::with_capacity(end_offset as usize);
    msg.extend_from_slice(SIGNATURE);
    msg.extend_from_slice(&3u32.to_le_bytes());
    write_security_buffer(&mut msg, lm_len, lm_offset);
    write_security_buffer(&mut msg, nt_len, nt_offset);
    write_security_buffer(&mut msg, domain_len, domain_offset);
    write_security_buffer(&mut msg, username_len, username_offset);
    write_security_buffer(&mut msg, workstation_len, workstation_offset);
    // EncryptedRandomSessionKeyFields (no key exchange)
    write_security_buffer(&mut msg, 0, end_offset);
    msg.extend_from_slice(&flags.to_le_bytes());

    msg.extend_from_slice(&lm_response);
    msg.extend_from_slice(&nt_response);
    msg.extend_from_slice(&domain);
    msg.extend_from_slice(&username);
    msg.extend_from_slice(&workstation);
    Ok(msg)
}

/// `NTLM <base64>` header value for a raw message.
pub fn header_value(message: &[u8]) -> String {
    format!("{} {}", MARKER, STANDARD.encode(message))
}

/// Current time as a Windows FILETIME (100ns ticks since 1601).
pub fn filetime_now() -> u64 {
    let since_unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (since_unix.as_secs() + WINDOWS_EPOCH_OFFSET_SECS) * 10_000_000 + u64::from(since_unix.subsec_nanos() / 100)
}

/// NTOWFv2 = HMAC-MD5(MD4(UTF-16LE(password)), UTF-16LE(UPPER(user) + domain)).
pub fn ntowf_v2(password: &str, username: &str, domain: &str) -> [u8; 16] {
    let mut nt_hash = [0u8; 16];
    nt_hash.copy_from_slice(&Md4::digest(to_utf16le(password)));
    let identity = to_utf16le(&format!("{}{}", username.to_uppercase(), domain));
    hmac_md5(&nt_hash, &[&identity])
}

fn hmac_md5(key: &[u8], parts: &[&[u8]]) -> [u8; 16] {
    let mut mac = <HmacMd5 as Mac>::new_from_slice(key).expect("HMAC accepts keys of any length");
    for part in parts {
        mac.update(part);
    }
    let mut out = [0u8; 16];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

fn to_utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|c| c.to_le_bytes()).collect()
}

fn from_utf16le(raw: &[u8]) -> String {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

fn buffer_len(field: &str, data: &[u8]) -> Result<u16, AuthError> {
    u16::try_from(data.len())
        .map_err(|_| malformed(format!("{} of {} bytes does not fit a security buffer", field, data.len())))
}

fn write_security_buffer(buf: &mut Vec<u8>, length: u16, offset: u32) {
    buf.extend_from_slice(&length.to_le_bytes());
    buf.extend_from_slice(&length.to_le_bytes()); // MaxLength == Length
    buf.extend_from_slice(&offset.to_le_bytes());
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

/// Payload referenced by the security buffer at `at`, if it lies within `data`.
fn read_security_buffer(data: &[u8], at: usize) -> Option<&[u8]> {
    let len = u16::from_le_bytes([*data.get(at)?, *data.get(at + 1)?]) as usize;
    if len == 0 {
        return None;
    }
    let offset = u32::from_le_bytes([
        *data.get(at + 4)?,
        *data.get(at + 5)?,
        *data.get(at + 6)?,
        *data.get(at + 7)?,
    ]) as usize;
    data.get(offset..offset.checked_add(len)?)
}

fn malformed(reason: String) -> AuthError {
    AuthError::MalformedChallenge {
        scheme: MARKER,
        reason,
    }
}
