//! Load driver: admission, spawning, and termination.
//!
//! ## Run Lifecycle
//!
//! 1. **Admit** - wait for a free slot under the concurrency ceiling
//! 2. **Spawn** - start one session worker holding that slot
//! 3. **Aggregate** - workers report counts to the aggregator task
//! 4. **Stop** - the aggregator's [`StopSignal`] fires once the total exceeds
//!    the target; the driver returns and in-flight sessions are abandoned
//!
//! Any session error ends the run immediately with that error.
//!
//! ## Example
//!
//! ```rust,ignore
//! use wsbench::{BenchConfig, Driver, WsTransport};
//!
//! let config = BenchConfig::new().with_concurrency(50).with_target_total(100_000);
//! let summary = Driver::new(WsTransport::new(), config).run().await?;
//! println!("{}", summary);
//! ```

mod admission;
mod aggregator;

pub use admission::{Admission, AdmissionToken};
pub use aggregator::{AggregateOutcome, Aggregator, RunState, StopSignal, Summary};

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::config::BenchConfig;
use crate::error::Result;
use crate::transport::Transport;
use crate::worker::{SessionContext, run_session};
use crate::workload::Workload;

/// Drives sessions against a transport until the target is exceeded.
pub struct Driver<T> {
    transport: Arc<T>,
    config: BenchConfig,
    workload: Arc<dyn Workload>,
}

impl<T: Transport> Driver<T> {
    /// Create a driver using the workload described by `config`.
    #[must_use]
    pub fn new(transport: T, config: BenchConfig) -> Self {
        let workload = Arc::new(config.workload());
        Self {
            transport: Arc::new(transport),
            config,
            workload,
        }
    }

    /// Replace the workload strategy.
    #[must_use]
    pub fn with_workload(mut self, workload: impl Workload + 'static) -> Self {
        self.workload = Arc::new(workload);
        self
    }

    /// The run configuration.
    #[must_use]
    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Run until the stop condition fires.
    ///
    /// Returns the summary produced by the aggregator. Sessions still in
    /// flight at that point are aborted without being drained.
    ///
    /// ## Errors
    ///
    /// - `Error::Config` / `Error::InvalidUrl` if the configuration is rejected
    /// - the first error of any session (`Error::Connection`,
    ///   `Error::Transport`, ...), after aborting all other sessions
    /// - `Error::Aborted` if a session task panicked
    pub async fn run(self) -> Result<Summary> {
        self.config.validate()?;

        let (reports, rx) = mpsc::channel(self.config.report_buffer);
        let state = RunState::new(
            self.config.target_total,
            self.workload.fixed_message_size(),
        );
        let mut stop = Aggregator::new(state, rx).spawn();
        let mut admission = Admission::new(self.config.concurrency);
        let ctx = SessionContext {
            transport: self.transport,
            workload: self.workload,
            url: Arc::from(self.config.url.as_str()),
            origin: Arc::from(self.config.origin.as_str()),
            reports,
            release_order: self.config.release_order,
        };
        let mut sessions = JoinSet::new();

        info!(
            concurrency = self.config.concurrency,
            target_total = self.config.target_total,
            url = %self.config.url,
            count = ?self.config.count,
            size = ?self.config.size,
            release_order = ?self.config.release_order,
            "starting benchmark"
        );

        loop {
            tokio::select! {
                biased;

                summary = stop.raised() => {
                    info!(
                        admitted = admission.admitted(),
                        in_flight = sessions.len(),
                        "stopping, abandoning in-flight sessions"
                    );
                    return summary;
                }

                Some(joined) = sessions.join_next() => {
                    if let Err(e) = joined? {
                        error!(error = %e, "session failed, aborting run");
                        return Err(e);
                    }
                }

                token = admission.acquire() => {
                    sessions.spawn(run_session(ctx.clone(), token?));
                }
            }
        }
    }
}
