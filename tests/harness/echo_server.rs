//! WebSocket echo server for end-to-end tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use wsbench::transport::handshake::{compute_accept_key, find_header_end};
use wsbench::transport::{Frame, OpCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Echo,
    Reject,
}

/// Echo server bound to an ephemeral localhost port.
pub struct EchoServer {
    addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl EchoServer {
    /// Server echoing every data message back unmasked.
    pub async fn spawn() -> Self {
        Self::start(Mode::Echo).await
    }

    /// Server answering every upgrade request with `403 Forbidden`.
    pub async fn spawn_rejecting() -> Self {
        Self::start(Mode::Reject).await
    }

    async fn start(mode: Mode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let _ = serve(stream, mode).await;
                });
            }
        });

        Self {
            addr,
            accepted,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn origin(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn shutdown(self) {
        self.handle.abort();
    }
}

async fn serve(mut stream: TcpStream, mode: Mode) -> std::io::Result<()> {
    let mut buf = BytesMut::with_capacity(4096);
    let end = loop {
        if let Some(end) = find_header_end(&buf) {
            break end;
        }
        if stream.read_buf(&mut buf).await? == 0 {
            return Ok(());
        }
    };
    let head = String::from_utf8_lossy(&buf.split_to(end)).into_owned();

    if mode == Mode::Reject {
        stream
            .write_all(b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n")
            .await?;
        return Ok(());
    }

    let key = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("sec-websocket-key")
                .then(|| value.trim().to_string())
        })
        .unwrap_or_default();
    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\r\n",
        compute_accept_key(&key)
    );
    stream.write_all(response.as_bytes()).await?;

    let mut out = BytesMut::with_capacity(4096);
    loop {
        let frame = match Frame::parse(&buf) {
            Ok(Some((frame, consumed))) => {
                buf.advance(consumed);
                frame
            }
            Ok(None) => {
                if stream.read_buf(&mut buf).await? == 0 {
                    return Ok(());
                }
                continue;
            }
            Err(_) => return Ok(()),
        };

        let reply = match frame.opcode {
            OpCode::Text | OpCode::Binary => Frame::new(frame.opcode, frame.payload),
            OpCode::Ping => Frame::pong(frame.payload),
            OpCode::Close => Frame::new(OpCode::Close, frame.payload),
            OpCode::Pong | OpCode::Continuation => continue,
        };
        let closing = reply.opcode == OpCode::Close;

        out.clear();
        reply.write_to(&mut out, None);
        stream.write_all(&out).await?;
        if closing {
            return Ok(());
        }
    }
}
