//! One-shot protocol smoke test.
//!
//! Dials the server, sends one text message, prints the reply, sends a ping,
//! tries one more read, then closes.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use wsbench::{Connection, Result, Transport, WsTransport};

const GREETING: &[u8] = b"\"hello, world!\"\n";
const PING_PAYLOAD: &[u8] = b"1";
const PING_REPLY_WAIT: Duration = Duration::from_secs(2);

/// Send one message and one ping to a WebSocket server.
#[derive(Debug, Parser)]
#[command(name = "ws-smoke", version, about)]
struct Args {
    /// Target endpoint.
    #[arg(long, default_value = "ws://localhost:9899/ws")]
    url: String,

    /// Origin header sent with the upgrade request.
    #[arg(long, default_value = "http://localhost:9899/")]
    origin: String,
}

async fn smoke(args: &Args) -> Result<()> {
    let mut conn = WsTransport::new().dial(&args.url, &args.origin).await?;

    conn.write(GREETING).await?;
    let mut buf = [0u8; 512];
    let n = conn.read(&mut buf).await?;
    println!("Received: {}.", String::from_utf8_lossy(&buf[..n]));

    conn.ping(PING_PAYLOAD).await?;
    info!(bytes = PING_PAYLOAD.len(), "ping sent");
    match tokio::time::timeout(PING_REPLY_WAIT, conn.read(&mut buf)).await {
        Ok(Ok(n)) => println!("Received: {}.", String::from_utf8_lossy(&buf[..n])),
        Ok(Err(e)) => warn!(error = %e, "no reply after ping"),
        Err(_) => warn!("no data message within {:?} of ping", PING_REPLY_WAIT),
    }

    conn.close().await
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "ws_smoke=info".into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let args = Args::parse();
    match smoke(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
