//! Test harness shared by the integration tests.
//!
//! - [`FakeTransport`]: in-memory echo transport with counters for dials,
//!   open connections, and round trips
//! - [`EchoServer`]: a real TCP WebSocket echo server on a random port

#![allow(dead_code)]

mod echo_server;
mod fake;

pub use echo_server::EchoServer;
pub use fake::{FakeBehavior, FakeTransport};
