//! Connection handed back by the dialer.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

/// A fully dialed stream: raw, or wrapped in a completed TLS session.
#[derive(Debug)]
pub enum DialedStream<S> {
    Plain(S),
    Tls(Box<TlsStream<S>>),
}

/// Stream type produced by the TCP dial primitive.
pub type Connection = DialedStream<TcpStream>;

impl<S> DialedStream<S> {
    pub fn is_tls(&self) -> bool {
        matches!(self, DialedStream::Tls(_))
    }

    /// Underlying transport stream.
    pub fn get_ref(&self) -> &S {
        match self {
            DialedStream::Plain(stream) => stream,
            DialedStream::Tls(stream) => stream.get_ref().0,
        }
    }

    /// Unwrap to the transport stream, discarding any TLS session.
    pub fn into_inner(self) -> S {
        match self {
            DialedStream::Plain(stream) => stream,
            DialedStream::Tls(stream) => stream.into_inner().0,
        }
    }

    /// Negotiated ALPN protocol, if TLS is on and one was agreed.
    pub fn alpn_protocol(&self) -> Option<&[u8]> {
        match self {
            DialedStream::Plain(_) => None,
            DialedStream::Tls(stream) => stream.get_ref().1.alpn_protocol(),
        }
    }

    /// Whether the TLS handshake has finished. Always false for plain streams.
    pub fn is_handshake_complete(&self) -> bool {
        match self {
            DialedStream::Plain(_) => false,
            DialedStream::Tls(stream) => !stream.get_ref().1.is_handshaking(),
        }
    }
}

impl Connection {
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.get_ref().peer_addr()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.get_ref().local_addr()
    }
}

impl<S> AsyncRead for DialedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            DialedStream::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            DialedStream::Tls(stream) => Pin::new(&mut **stream).poll_read(cx, buf),
        }
    }
}

impl<S> AsyncWrite for DialedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            DialedStream::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            DialedStream::Tls(stream) => Pin::new(&mut **stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            DialedStream::Plain(stream) => Pin::new(stream).poll_flush(cx),
            DialedStream::Tls(stream) => Pin::new(&mut **stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            DialedStream::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            DialedStream::Tls(stream) => Pin::new(&mut **stream).poll_shutdown(cx),
        }
    }
}
