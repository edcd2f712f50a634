//! Transport collaborator consumed by the session worker.
//!
//! The driver and worker only see the [`Transport`] and [`Connection`]
//! traits. [`WsTransport`] is the bundled RFC 6455 client used by the
//! `wsbench` binary; tests plug in in-memory fakes.
//!
//! ## Example
//!
//! ```rust,ignore
//! use wsbench::transport::{Connection, Transport, WsTransport};
//!
//! let mut conn = WsTransport::new()
//!     .dial("ws://localhost:9898/ws", "http://localhost:9898/")
//!     .await?;
//! conn.write(b"hello").await?;
//! let mut buf = [0u8; 128];
//! let n = conn.read(&mut buf).await?;
//! conn.close().await?;
//! ```

pub mod frame;
pub mod handshake;
mod ws;

pub use frame::{Frame, OpCode};
pub use ws::{WsConnection, WsTransport};

use async_trait::async_trait;

use crate::error::Result;

/// One open, full-duplex session connection.
#[async_trait]
pub trait Connection: Send {
    /// Send `data` as one message.
    ///
    /// Returns the number of payload bytes written.
    ///
    /// ## Errors
    ///
    /// [`Error::Transport`](crate::Error::Transport) on a broken or closed
    /// connection.
    async fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Read the next message (or the rest of a partially read one) into `buf`.
    ///
    /// Returns the number of bytes placed in `buf`.
    ///
    /// ## Errors
    ///
    /// [`Error::Transport`](crate::Error::Transport) on a broken connection
    /// or when the peer closes.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Close the connection. Calling it more than once is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// Factory for session connections.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Connection type produced by [`dial`](Transport::dial).
    type Conn: Connection + 'static;

    /// Open a connection to `url`, presenting `origin`.
    ///
    /// ## Errors
    ///
    /// [`Error::Connection`](crate::Error::Connection) if the target is
    /// unreachable or rejects the handshake.
    async fn dial(&self, url: &str, origin: &str) -> Result<Self::Conn>;
}
