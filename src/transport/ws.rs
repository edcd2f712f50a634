use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;
use url::{Host, Url};

use super::frame::{Frame, MAX_FRAME_PAYLOAD, OpCode};
use super::handshake::{
    HandshakeResponse, MAX_RESPONSE_SIZE, find_header_end, generate_key, upgrade_request,
};
use super::{Connection, Transport};
use crate::error::{Error, Result};

const READ_CHUNK: usize = 4096;
const CLOSE_NORMAL: u16 = 1000;

/// Generate a random seed for mask generation.
/// Falls back to system time if getrandom fails.
fn random_mask_seed() -> u32 {
    let mut buf = [0u8; 4];
    if getrandom::getrandom(&mut buf).is_ok() {
        u32::from_le_bytes(buf)
    } else {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u32)
            .unwrap_or(0x1234_5678)
    }
}

/// Dials plain `ws://` endpoints over TCP.
///
/// Messages are sent as text frames unless [`WsTransport::binary`] is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WsTransport {
    opcode: OpCode,
}

impl Default for WsTransport {
    fn default() -> Self {
        Self {
            opcode: OpCode::Text,
        }
    }
}

impl WsTransport {
    /// Transport sending text frames.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport sending binary frames.
    #[must_use]
    pub const fn binary() -> Self {
        Self {
            opcode: OpCode::Binary,
        }
    }

    async fn connect(&self, url: &str, origin: &str) -> Result<WsConnection<TcpStream>> {
        let url = Url::parse(url)?;
        if url.scheme() != "ws" {
            return Err(Error::InvalidUrl(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }
        let port = url.port_or_known_default().unwrap_or(80);

        // IPv6 literals must not reach the resolver with their brackets.
        let stream = match url.host() {
            Some(Host::Domain(domain)) => TcpStream::connect((domain, port)).await?,
            Some(Host::Ipv4(ip)) => TcpStream::connect(SocketAddr::from((ip, port))).await?,
            Some(Host::Ipv6(ip)) => TcpStream::connect(SocketAddr::from((ip, port))).await?,
            None => return Err(Error::InvalidUrl(format!("missing host in {}", url))),
        };
        stream.set_nodelay(true)?;
        WsConnection::handshake(stream, &url, origin, self.opcode).await
    }
}

#[async_trait]
impl Transport for WsTransport {
    type Conn = WsConnection<TcpStream>;

    async fn dial(&self, url: &str, origin: &str) -> Result<Self::Conn> {
        self.connect(url, origin).await.map_err(|e| match e {
            Error::Connection(_) => e,
            other => Error::Connection(format!("{}: {}", url, other)),
        })
    }
}

/// Client end of an upgraded WebSocket stream.
///
/// Each [`Connection::write`] sends one unfragmented, masked data frame.
/// [`Connection::read`] hands out the next data message; whatever does not
/// fit the caller's buffer is kept and served by the following reads. Pings
/// are answered and skipped, pongs are skipped, a close frame ends the
/// connection with `Error::Transport`.
pub struct WsConnection<S> {
    io: S,
    read_buf: BytesMut,
    write_buf: BytesMut,
    pending: BytesMut,
    opcode: OpCode,
    max_message_size: usize,
    mask_counter: u32,
    closed: bool,
}

impl<S> std::fmt::Debug for WsConnection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsConnection")
            .field("opcode", &self.opcode)
            .field("max_message_size", &self.max_message_size)
            .field("buffered", &self.read_buf.len())
            .field("pending", &self.pending.len())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<S> WsConnection<S> {
    /// Wrap a stream whose upgrade handshake has already completed.
    ///
    /// `read_buf` holds any bytes received after the response headers.
    #[must_use]
    pub fn from_upgraded(io: S, read_buf: BytesMut, opcode: OpCode) -> Self {
        Self {
            io,
            read_buf,
            write_buf: BytesMut::with_capacity(READ_CHUNK),
            pending: BytesMut::new(),
            opcode,
            max_message_size: MAX_FRAME_PAYLOAD,
            mask_counter: random_mask_seed(),
            closed: false,
        }
    }

    /// Limit the size of a reassembled message.
    ///
    /// Default: [`MAX_FRAME_PAYLOAD`]
    #[must_use]
    pub const fn with_max_message_size(mut self, limit: usize) -> Self {
        self.max_message_size = limit;
        self
    }

    fn check_message_size(&self, size: usize) -> Result<()> {
        if size > self.max_message_size {
            Err(Error::Frame(format!(
                "message of {} bytes exceeds {}",
                size, self.max_message_size
            )))
        } else {
            Ok(())
        }
    }

    /// Whether [`Connection::close`] ran or the peer closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    fn generate_mask(&mut self) -> [u8; 4] {
        self.mask_counter = self.mask_counter.wrapping_add(0x9E37_79B9);
        let a = self.mask_counter;
        let b = a.wrapping_mul(0x85EB_CA6B);
        let c = b ^ (b >> 13);
        let d = c.wrapping_mul(0xC2B2_AE35);
        d.to_le_bytes()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::Transport("connection already closed".into()))
        } else {
            Ok(())
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> WsConnection<S> {
    /// Run the opening handshake on `io` and return the upgraded connection.
    ///
    /// ## Errors
    ///
    /// - `Error::Handshake` if the response is malformed, too large, or
    ///   carries the wrong accept key
    /// - `Error::Transport` on I/O failure
    pub async fn handshake(mut io: S, url: &Url, origin: &str, opcode: OpCode) -> Result<Self> {
        let key = generate_key()?;
        let request = upgrade_request(url, origin, &key)?;
        io.write_all(request.as_bytes()).await?;
        io.flush().await?;

        let mut buf = BytesMut::with_capacity(1024);
        let header_end = loop {
            if let Some(end) = find_header_end(&buf) {
                break end;
            }
            if buf.len() > MAX_RESPONSE_SIZE {
                return Err(Error::Handshake(format!(
                    "response headers exceed {} bytes",
                    MAX_RESPONSE_SIZE
                )));
            }
            if io.read_buf(&mut buf).await? == 0 {
                return Err(Error::Handshake(
                    "connection closed during handshake".into(),
                ));
            }
        };

        let head = buf.split_to(header_end);
        HandshakeResponse::parse(&head)?.verify(&key)?;
        debug!(%url, "handshake complete");
        Ok(Self::from_upgraded(io, buf, opcode))
    }

    /// Send a ping frame.
    ///
    /// ## Errors
    ///
    /// `Error::Frame` if `data` exceeds the control frame limit,
    /// `Error::Transport` if the connection is closed or broken.
    pub async fn ping(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        if data.len() > super::frame::MAX_CONTROL_FRAME_PAYLOAD {
            return Err(Error::Frame(format!(
                "ping payload of {} bytes",
                data.len()
            )));
        }
        self.write_frame(&Frame::ping(data)).await
    }

    /// Receive the next complete data message, answering control frames.
    ///
    /// ## Errors
    ///
    /// - `Error::Transport` on EOF, I/O failure, or a close frame
    /// - `Error::Frame` on protocol violations by the server or a message
    ///   larger than the configured limit
    pub async fn recv_message(&mut self) -> Result<Vec<u8>> {
        self.ensure_open()?;
        let mut message: Option<Vec<u8>> = None;

        loop {
            let frame = self.read_frame().await?;
            if frame.masked {
                return Err(Error::Frame("server frame must not be masked".into()));
            }

            match frame.opcode {
                OpCode::Ping => self.write_frame(&Frame::pong(frame.payload)).await?,
                OpCode::Pong => {}
                OpCode::Close => {
                    if let Err(e) = self.write_frame(&Frame::close(CLOSE_NORMAL)).await {
                        debug!(error = %e, "close reply failed");
                    }
                    self.closed = true;
                    return Err(Error::Transport(match frame.close_code() {
                        Some(code) => format!("peer closed connection with code {}", code),
                        None => "peer closed connection".into(),
                    }));
                }
                OpCode::Text | OpCode::Binary => {
                    if message.is_some() {
                        return Err(Error::Frame(
                            "data frame inside a fragmented message".into(),
                        ));
                    }
                    self.check_message_size(frame.payload.len())?;
                    if frame.fin {
                        return Ok(frame.payload);
                    }
                    message = Some(frame.payload);
                }
                OpCode::Continuation => match message.as_mut() {
                    Some(buf) => {
                        self.check_message_size(buf.len() + frame.payload.len())?;
                        buf.extend_from_slice(&frame.payload);
                        if frame.fin {
                            return Ok(std::mem::take(buf));
                        }
                    }
                    None => {
                        return Err(Error::Frame("unexpected continuation frame".into()));
                    }
                },
            }
        }
    }

    /// Consume the connection and return the underlying stream.
    #[must_use]
    pub fn into_inner(self) -> S {
        self.io
    }

    async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some((frame, consumed)) = Frame::parse(&self.read_buf)? {
                self.read_buf.advance(consumed);
                return Ok(frame);
            }

            self.read_buf.reserve(READ_CHUNK);
            if self.io.read_buf(&mut self.read_buf).await? == 0 {
                self.closed = true;
                return Err(Error::Transport("connection closed by peer".into()));
            }
        }
    }

    async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let mask = self.generate_mask();
        self.write_buf.clear();
        frame.write_to(&mut self.write_buf, Some(mask));
        self.io.write_all(&self.write_buf).await?;
        self.io.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl<S: AsyncRead + AsyncWrite + Unpin + Send> Connection for WsConnection<S> {
    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.ensure_open()?;
        let frame = Frame::new(self.opcode, data.to_vec());
        self.write_frame(&frame).await?;
        Ok(data.len())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pending.is_empty() {
            let message = self.recv_message().await?;
            self.pending.extend_from_slice(&message);
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.write_frame(&Frame::close(CLOSE_NORMAL)).await?;
        self.io.shutdown().await?;
        Ok(())
    }
}
