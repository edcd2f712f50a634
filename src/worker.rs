//! Session worker.
//!
//! A worker owns one connection for its whole life: it dials, performs the
//! planned number of strictly sequential round trips, closes the connection,
//! then frees its admission slot and reports its count to the aggregator.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ReleaseOrder;
use crate::driver::AdmissionToken;
use crate::error::Result;
use crate::transport::{Connection, Transport};
use crate::workload::Workload;

/// Byte used to fill outgoing messages.
pub const FILLER: u8 = b'A';

/// Completed-request count of one finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionReport {
    /// Admission slot number of the session.
    pub slot: u64,
    /// Round trips the session completed.
    pub completed: u64,
}

/// Everything a worker needs besides its admission token.
pub struct SessionContext<T> {
    /// Connection factory.
    pub transport: Arc<T>,
    /// Per-session parameter strategy.
    pub workload: Arc<dyn Workload>,
    /// Endpoint to dial.
    pub url: Arc<str>,
    /// `Origin` presented on dial.
    pub origin: Arc<str>,
    /// Channel into the aggregator.
    pub reports: mpsc::Sender<CompletionReport>,
    /// Order of slot release and report delivery.
    pub release_order: ReleaseOrder,
}

impl<T> Clone for SessionContext<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            workload: Arc::clone(&self.workload),
            url: Arc::clone(&self.url),
            origin: Arc::clone(&self.origin),
            reports: self.reports.clone(),
            release_order: self.release_order,
        }
    }
}

impl<T> SessionContext<T> {
    async fn deliver(&self, report: CompletionReport) {
        if self.reports.send(report).await.is_err() {
            debug!(slot = report.slot, "aggregator stopped, report dropped");
        }
    }
}

/// Run one session to completion.
///
/// The planned count is drawn from the workload before dialing. The
/// connection is closed whether the round trips succeed or not; a failing
/// close is logged and otherwise ignored.
///
/// ## Errors
///
/// The first dial, write, or read error is returned unchanged. The token is
/// dropped with the error, but the driver treats any error as fatal to the
/// whole run.
pub async fn run_session<T: Transport>(
    ctx: SessionContext<T>,
    token: AdmissionToken,
) -> Result<CompletionReport> {
    let slot = token.slot();
    let planned = ctx.workload.planned_count();

    let mut conn = ctx.transport.dial(&ctx.url, &ctx.origin).await?;
    let outcome = round_trips(&mut conn, planned, ctx.workload.as_ref(), slot).await;
    if let Err(e) = conn.close().await {
        debug!(slot, error = %e, "close failed");
    }
    let completed = outcome?;

    let report = CompletionReport { slot, completed };
    match ctx.release_order {
        ReleaseOrder::BeforeReport => {
            token.release();
            ctx.deliver(report).await;
        }
        ReleaseOrder::AfterReport => {
            ctx.deliver(report).await;
            token.release();
        }
    }

    info!(slot, completed, "#{} finished {} requests", slot, completed);
    Ok(report)
}

/// Perform exactly `planned` write/read pairs on `conn`.
///
/// A read whose length differs from the preceding write is logged as a size
/// mismatch and the loop continues.
///
/// ## Errors
///
/// The first write or read error ends the loop and is returned.
pub async fn round_trips<C: Connection + ?Sized>(
    conn: &mut C,
    planned: u64,
    workload: &dyn Workload,
    slot: u64,
) -> Result<u64> {
    let mut buf = vec![0u8; workload.read_buffer_size()];
    let mut message = Vec::with_capacity(workload.max_message_size());

    for _ in 0..planned {
        let size = workload.message_size();
        message.clear();
        message.resize(size, FILLER);

        let written = conn.write(&message).await?;
        let read = conn.read(&mut buf).await?;
        if read != written {
            warn!(
                slot,
                expected = written,
                actual = read,
                "expected length {}, actual {}",
                written,
                read
            );
        }
    }

    Ok(planned)
}
