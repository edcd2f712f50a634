//! # wsbench - Bounded-concurrency WebSocket load generator
//!
//! `wsbench` opens many concurrent client sessions against a WebSocket
//! endpoint. Each session performs a planned number of request/response
//! round trips; the driver sums completed requests across sessions and stops
//! once the total exceeds a target, reporting throughput.
//!
//! ## Features
//!
//! - **Hard concurrency ceiling** enforced by admission tokens
//! - **Single-owner aggregation** of completion reports over one channel
//! - **Fail fast**: any dial or transport error ends the run
//! - **Pluggable transport and workload** for deterministic testing
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wsbench::{BenchConfig, Driver, WsTransport};
//!
//! let config = BenchConfig::new()
//!     .with_url("ws://localhost:9898/ws")
//!     .with_concurrency(100)
//!     .with_target_total(4_000_000);
//! let summary = Driver::new(WsTransport::new(), config).run().await?;
//! println!("{}", summary);
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod transport;
pub mod worker;
pub mod workload;

pub use config::{BenchConfig, ReleaseOrder};
pub use driver::{AdmissionToken, Driver, StopSignal, Summary};
pub use error::{Error, Result};
pub use transport::{Connection, Transport, WsConnection, WsTransport};
pub use worker::CompletionReport;
pub use workload::{CountPolicy, FixedWorkload, RandomWorkload, SizePolicy, Workload};
