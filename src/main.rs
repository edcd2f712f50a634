//! `wsbench` command-line entry point.
//!
//! Run a WebSocket echo server, then:
//! `wsbench -c 100 -n 4000000 -m 512 --url ws://localhost:9898/ws`

use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use wsbench::config::{DEFAULT_ORIGIN, DEFAULT_URL};
use wsbench::{BenchConfig, CountPolicy, Driver, ReleaseOrder, SizePolicy, WsTransport};

/// Bounded-concurrency WebSocket round-trip benchmark.
#[derive(Debug, Parser)]
#[command(name = "wsbench", version, about)]
struct Args {
    /// Maximum number of concurrent sessions.
    #[arg(short = 'c', long, default_value_t = 100)]
    concurrency: usize,

    /// Stop once more than this many requests have completed.
    #[arg(short = 'n', long, default_value_t = 4_000_000)]
    total: u64,

    /// Fixed message size in bytes; omit to randomize the size of every message.
    #[arg(short = 'm', long)]
    message_size: Option<usize>,

    /// Smallest randomized message size (inclusive).
    #[arg(long, default_value_t = 20)]
    min_size: usize,

    /// Largest randomized message size (exclusive).
    #[arg(long, default_value_t = 40)]
    max_size: usize,

    /// Fewest round trips per session (inclusive).
    #[arg(long, default_value_t = 2000)]
    min_requests: u64,

    /// Most round trips per session (exclusive).
    #[arg(long, default_value_t = 12000)]
    max_requests: u64,

    /// Fixed round trips per session, overriding the range.
    #[arg(long)]
    requests: Option<u64>,

    /// Target endpoint.
    #[arg(long, default_value = DEFAULT_URL)]
    url: String,

    /// Origin header sent with the upgrade request.
    #[arg(long, default_value = DEFAULT_ORIGIN)]
    origin: String,

    /// Free a session's slot only after its count has been reported.
    #[arg(long)]
    release_after_report: bool,

    /// Send binary frames instead of text frames.
    #[arg(long)]
    binary: bool,
}

impl Args {
    fn to_config(&self) -> BenchConfig {
        let count = match self.requests {
            Some(n) => CountPolicy::Fixed(n),
            None => CountPolicy::Uniform {
                min: self.min_requests,
                max: self.max_requests,
            },
        };
        let size = match self.message_size {
            Some(n) => SizePolicy::Fixed(n),
            None => SizePolicy::Uniform {
                min: self.min_size,
                max: self.max_size,
            },
        };
        let release_order = if self.release_after_report {
            ReleaseOrder::AfterReport
        } else {
            ReleaseOrder::BeforeReport
        };

        BenchConfig::new()
            .with_concurrency(self.concurrency)
            .with_target_total(self.total)
            .with_url(self.url.as_str())
            .with_origin(self.origin.as_str())
            .with_count(count)
            .with_size(size)
            .with_release_order(release_order)
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "wsbench=info".into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    let config = args.to_config();

    let transport = if args.binary {
        WsTransport::binary()
    } else {
        WsTransport::new()
    };

    match Driver::new(transport, config).run().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
