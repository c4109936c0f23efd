//! Timeout enforcement on origin I/O.
//!
//! # Responsibilities
//! - Bound the time spent dialling an origin
//! - Bound each read/write on an origin stream once interception begins
//!
//! # Design Decisions
//! - Uses Tokio's timer; a deadline starts when an operation first returns `Pending`
//! - Expiry surfaces as `io::ErrorKind::TimedOut`, distinct from resets and EOF
//! - The deadline is switchable at runtime: pass-through traffic runs without one

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::Sleep;

/// Dial `authority` (`host:port`) within `limit`.
pub async fn connect(authority: &str, limit: Duration) -> io::Result<TcpStream> {
    match tokio::time::timeout(limit, TcpStream::connect(authority)).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("connect to {} timed out after {:?}", authority, limit),
        )),
    }
}

/// Stream wrapper enforcing a per-operation read/write deadline.
///
/// Equivalent to socket read/write timeouts: every read, write or flush that
/// stays pending for longer than the configured duration fails with `TimedOut`.
#[derive(Debug)]
pub struct IoTimeout<S> {
    inner: S,
    timeout: Option<Duration>,
    read_deadline: Option<Pin<Box<Sleep>>>,
    write_deadline: Option<Pin<Box<Sleep>>>,
}

impl<S> IoTimeout<S> {
    /// Wrap a stream with no deadline set.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            timeout: None,
            read_deadline: None,
            write_deadline: None,
        }
    }

    /// Set or clear the per-operation deadline.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
        self.read_deadline = None;
        self.write_deadline = None;
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Poll `deadline`, arming it on first use. Returns the timeout error when it fired.
fn poll_deadline(
    slot: &mut Option<Pin<Box<Sleep>>>,
    timeout: Option<Duration>,
    cx: &mut Context<'_>,
    op: &str,
) -> Option<io::Error> {
    let timeout = timeout?;
    let sleep = slot.get_or_insert_with(|| Box::pin(tokio::time::sleep(timeout)));
    if sleep.as_mut().poll(cx).is_ready() {
        *slot = None;
        return Some(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("origin {} timed out after {:?}", op, timeout),
        ));
    }
    None
}

impl<S: AsyncRead + Unpin> AsyncRead for IoTimeout<S> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(result) => {
                this.read_deadline = None;
                Poll::Ready(result)
            }
            Poll::Pending => match poll_deadline(&mut this.read_deadline, this.timeout, cx, "read") {
                Some(err) => Poll::Ready(Err(err)),
                None => Poll::Pending,
            },
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for IoTimeout<S> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_write(cx, buf) {
            Poll::Ready(result) => {
                this.write_deadline = None;
                Poll::Ready(result)
            }
            Poll::Pending => match poll_deadline(&mut this.write_deadline, this.timeout, cx, "write") {
                Some(err) => Poll::Ready(Err(err)),
                None => Poll::Pending,
            },
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_flush(cx) {
            Poll::Ready(result) => {
                this.write_deadline = None;
                Poll::Ready(result)
            }
            Poll::Pending => match poll_deadline(&mut this.write_deadline, this.timeout, cx, "flush") {
                Some(err) => Poll::Ready(Err(err)),
                None => Poll::Pending,
            },
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn read_times_out_when_peer_is_silent() {
        let (near, _far) = tokio::io::duplex(64);
        let mut stream = IoTimeout::new(near);
        stream.set_timeout(Some(Duration::from_millis(50)));

        let mut buf = [0u8; 8];
        let err = stream.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn no_deadline_until_enabled() {
        let (near, mut far) = tokio::io::duplex(64);
        let mut stream = IoTimeout::new(near);
        assert_eq!(stream.timeout(), None);

        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            far.write_all(b"late").await.unwrap();
            far
        });

        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"late");
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn deadline_resets_after_progress() {
        let (near, mut far) = tokio::io::duplex(64);
        let mut stream = IoTimeout::new(near);
        stream.set_timeout(Some(Duration::from_millis(200)));

        let writer = tokio::spawn(async move {
            for chunk in [b"ab", b"cd", b"ef"] {
                tokio::time::sleep(Duration::from_millis(120)).await;
                far.write_all(chunk).await.unwrap();
            }
            far
        });

        let mut buf = [0u8; 6];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"abcdef");
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn connect_refused_is_an_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = connect(&addr.to_string(), Duration::from_secs(1)).await;
        assert!(result.is_err());
    }
}
