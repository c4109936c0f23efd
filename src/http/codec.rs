//! HTTP/1.1 message codec over async byte streams.
//!
//! # Responsibilities
//! - Read request and response header blocks (parsed with `httparse`)
//! - Move message bodies according to their framing
//! - Write requests and responses back out
//!
//! Every function borrows the stream, so the same connection can be read and
//! written any number of times. Bodies are moved as raw wire bytes (chunk
//! framing included), which keeps pass-through traffic byte-identical.

use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::http::headers::HeaderList;
use crate::http::request::RequestHeader;
use crate::http::response::ResponseHeader;

/// Upper bound on header fields in one message.
const MAX_HEADERS: usize = 128;

/// Errors produced while reading or writing HTTP messages.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("connection closed before a complete message was received")]
    UnexpectedEof,

    #[error("message header exceeds {0} bytes")]
    HeaderTooLarge(usize),

    #[error("message body exceeds {0} bytes")]
    BodyTooLarge(u64),

    #[error("malformed message: {0}")]
    Malformed(String),
}

/// How a message body is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// No body.
    Empty,
    /// Exactly this many bytes (`Content-Length`).
    Length(u64),
    /// `Transfer-Encoding: chunked`.
    Chunked,
    /// Body runs until the peer closes the connection (responses only).
    UntilClose,
}

/// Read one request header.
///
/// Returns `Ok(None)` when the peer closed the connection cleanly between requests.
pub async fn read_request_header<R>(
    reader: &mut R,
    max_bytes: usize,
) -> Result<Option<RequestHeader>, CodecError>
where
    R: AsyncBufRead + Unpin,
{
    let Some(raw) = read_head(reader, max_bytes).await? else {
        return Ok(None);
    };

    let (method, target, version, headers) = {
        let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut slots);
        match req.parse(&raw) {
            Ok(httparse::Status::Complete(_)) => {}
            Ok(httparse::Status::Partial) => {
                return Err(CodecError::Malformed("incomplete request header".into()))
            }
            Err(e) => return Err(CodecError::Malformed(format!("request header: {}", e))),
        }
        let method = req
            .method
            .ok_or_else(|| CodecError::Malformed("missing method".into()))?
            .to_string();
        let target = req
            .path
            .ok_or_else(|| CodecError::Malformed("missing request target".into()))?
            .to_string();
        let version = req.version.unwrap_or(1);
        (method, target, version, collect_headers(req.headers))
    };

    Ok(Some(RequestHeader::from_wire(method, target, version, headers, raw)))
}

/// Read one response header. End of stream is an error here.
pub async fn read_response_header<R>(
    reader: &mut R,
    max_bytes: usize,
) -> Result<ResponseHeader, CodecError>
where
    R: AsyncBufRead + Unpin,
{
    let raw = read_head(reader, max_bytes)
        .await?
        .ok_or(CodecError::UnexpectedEof)?;

    let (version, status, reason, headers) = {
        let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut resp = httparse::Response::new(&mut slots);
        match resp.parse(&raw) {
            Ok(httparse::Status::Complete(_)) => {}
            Ok(httparse::Status::Partial) => {
                return Err(CodecError::Malformed("incomplete response header".into()))
            }
            Err(e) => return Err(CodecError::Malformed(format!("response header: {}", e))),
        }
        let status = resp
            .code
            .ok_or_else(|| CodecError::Malformed("missing status code".into()))?;
        let reason = resp.reason.unwrap_or_default().to_string();
        let version = resp.version.unwrap_or(1);
        (version, status, reason, collect_headers(resp.headers))
    };

    Ok(ResponseHeader::from_wire(version, status, reason, headers, raw))
}

/// Read a whole body into memory, keeping its wire framing.
pub async fn read_body<R>(reader: &mut R, framing: BodyFraming, limit: u64) -> Result<Vec<u8>, CodecError>
where
    R: AsyncBufRead + Unpin,
{
    if let BodyFraming::Length(len) = framing {
        if len > limit {
            return Err(CodecError::BodyTooLarge(limit));
        }
    }
    let mut body = Vec::new();
    transfer(reader, &mut body, framing, Some(limit)).await?;
    Ok(body)
}

/// Stream a body from `reader` to `writer` unchanged. Returns the bytes moved.
pub async fn copy_body<R, W>(reader: &mut R, writer: &mut W, framing: BodyFraming) -> Result<u64, CodecError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    transfer(reader, writer, framing, None).await
}

/// Consume and discard a body so the stream is positioned at the next message.
pub async fn drain_body<R>(reader: &mut R, framing: BodyFraming) -> Result<u64, CodecError>
where
    R: AsyncBufRead + Unpin,
{
    transfer(reader, &mut io::sink(), framing, None).await
}

/// Write a request header followed by its (already framed) body, then flush.
pub async fn write_request<W>(writer: &mut W, header: &RequestHeader, body: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&header.to_bytes()).await?;
    if !body.is_empty() {
        writer.write_all(body).await?;
    }
    writer.flush().await
}

/// Write a response header block exactly as it was received.
pub async fn write_response_header<W>(writer: &mut W, header: &ResponseHeader) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(header.raw()).await
}

/// Write a complete response with an in-memory body, then flush.
pub async fn write_response<W>(writer: &mut W, header: &ResponseHeader, body: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(header.raw()).await?;
    writer.write_all(body).await?;
    writer.flush().await
}

/// Read raw header bytes up to and including the blank line.
async fn read_head<R>(reader: &mut R, max_bytes: usize) -> Result<Option<Vec<u8>>, CodecError>
where
    R: AsyncBufRead + Unpin,
{
    let mut raw = Vec::with_capacity(1024);
    let mut line = Vec::with_capacity(256);
    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line).await?;
        if n == 0 {
            return if raw.is_empty() {
                Ok(None)
            } else {
                Err(CodecError::UnexpectedEof)
            };
        }
        let blank = line == b"\r\n" || line == b"\n";
        // Stray line breaks between messages are tolerated (RFC 9112 §2.2).
        if blank && raw.is_empty() {
            continue;
        }
        raw.extend_from_slice(&line);
        if raw.len() > max_bytes {
            return Err(CodecError::HeaderTooLarge(max_bytes));
        }
        if blank {
            return Ok(Some(raw));
        }
    }
}

fn collect_headers(parsed: &[httparse::Header<'_>]) -> HeaderList {
    parsed
        .iter()
        .filter(|h| !h.name.is_empty())
        .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).into_owned()))
        .collect()
}

async fn transfer<R, W>(
    reader: &mut R,
    writer: &mut W,
    framing: BodyFraming,
    limit: Option<u64>,
) -> Result<u64, CodecError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    match framing {
        BodyFraming::Empty => Ok(0),
        BodyFraming::Length(len) => copy_exact(reader, writer, len).await,
        BodyFraming::UntilClose => {
            let copied = match limit {
                Some(limit) => io::copy(&mut (&mut *reader).take(limit + 1), writer).await?,
                None => io::copy(reader, writer).await?,
            };
            if limit.is_some_and(|limit| copied > limit) {
                return Err(CodecError::BodyTooLarge(copied - 1));
            }
            Ok(copied)
        }
        BodyFraming::Chunked => copy_chunked(reader, writer, limit).await,
    }
}

async fn copy_exact<R, W>(reader: &mut R, writer: &mut W, len: u64) -> Result<u64, CodecError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let copied = io::copy(&mut (&mut *reader).take(len), writer).await?;
    if copied < len {
        return Err(CodecError::UnexpectedEof);
    }
    Ok(copied)
}

async fn copy_chunked<R, W>(reader: &mut R, writer: &mut W, limit: Option<u64>) -> Result<u64, CodecError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut total = 0u64;
    let mut line = Vec::with_capacity(64);
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Err(CodecError::UnexpectedEof);
        }
        writer.write_all(&line).await?;
        total += line.len() as u64;

        let size = parse_chunk_size(&line)?;
        if size == 0 {
            break;
        }
        // chunk data plus its trailing CRLF
        let framed = size
            .checked_add(2)
            .ok_or_else(|| CodecError::Malformed(format!("chunk size {:x} out of range", size)))?;
        if let Some(limit) = limit {
            if total.checked_add(size).map_or(true, |end| end > limit) {
                return Err(CodecError::BodyTooLarge(limit));
            }
        }
        total += copy_exact(reader, writer, framed).await?;
    }

    // trailer section, terminated by a blank line
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Err(CodecError::UnexpectedEof);
        }
        writer.write_all(&line).await?;
        total += line.len() as u64;
        if line == b"\r\n" || line == b"\n" {
            return Ok(total);
        }
    }
}

fn parse_chunk_size(line: &[u8]) -> Result<u64, CodecError> {
    let text = std::str::from_utf8(line)
        .map_err(|_| CodecError::Malformed("non-ASCII chunk size".into()))?;
    let size = text.split(';').next().unwrap_or_default().trim();
    u64::from_str_radix(size, 16)
        .map_err(|_| CodecError::Malformed(format!("invalid chunk size {:?}", size)))
}
