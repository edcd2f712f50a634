//! Completion aggregation and the stop condition.
//!
//! The aggregator task is the only owner of [`RunState`]. Reports reach it
//! through one channel and are absorbed one at a time, so the threshold
//! check always sees a total that includes every report before it and none
//! after it.

use std::fmt;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::{Error, Result};
use crate::worker::CompletionReport;

const MEGABYTE: f64 = 1024.0 * 1024.0;

/// Accumulated progress of a run.
#[derive(Debug, Clone)]
pub struct RunState {
    total_completed: u64,
    target_total: u64,
    reports: u64,
    started_at: Instant,
    message_size: Option<usize>,
}

impl RunState {
    /// Start tracking a run that stops once more than `target_total`
    /// requests have completed. `message_size` enables byte throughput.
    #[must_use]
    pub fn new(target_total: u64, message_size: Option<usize>) -> Self {
        Self {
            total_completed: 0,
            target_total,
            reports: 0,
            started_at: Instant::now(),
            message_size,
        }
    }

    /// Add one report. Returns `true` if the total now exceeds the target.
    pub fn absorb(&mut self, report: &CompletionReport) -> bool {
        self.total_completed = self.total_completed.saturating_add(report.completed);
        self.reports += 1;
        self.total_completed > self.target_total
    }

    /// Sum of all absorbed reports.
    #[must_use]
    pub const fn total_completed(&self) -> u64 {
        self.total_completed
    }

    /// Number of absorbed reports.
    #[must_use]
    pub const fn reports(&self) -> u64 {
        self.reports
    }

    /// Configured target.
    #[must_use]
    pub const fn target_total(&self) -> u64 {
        self.target_total
    }

    /// Build the summary as of now.
    #[must_use]
    pub fn summary(&self) -> Summary {
        Summary::new(
            self.target_total,
            self.total_completed,
            self.started_at.elapsed(),
            self.message_size,
        )
    }
}

/// Throughput summary printed when the run stops.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Configured target total.
    pub target_total: u64,
    /// Requests actually counted when the threshold was crossed.
    pub completed: u64,
    /// Wall-clock time since the driver started.
    pub elapsed: Duration,
    /// `target_total / elapsed`.
    pub requests_per_sec: f64,
    /// `requests_per_sec * message_size` in MiB/s, when the size is fixed.
    pub megabytes_per_sec: Option<f64>,
}

impl Summary {
    /// Derive throughput figures from raw counts.
    #[must_use]
    pub fn new(
        target_total: u64,
        completed: u64,
        elapsed: Duration,
        message_size: Option<usize>,
    ) -> Self {
        let secs = elapsed.as_secs_f64();
        let requests_per_sec = if secs > 0.0 {
            target_total as f64 / secs
        } else {
            0.0
        };
        let megabytes_per_sec =
            message_size.map(|size| requests_per_sec * size as f64 / MEGABYTE);

        Self {
            target_total,
            completed,
            elapsed,
            requests_per_sec,
            megabytes_per_sec,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "exit, total {}, per seconds {:.2}",
            self.target_total, self.requests_per_sec
        )?;
        if let Some(mbps) = self.megabytes_per_sec {
            write!(f, ", {:.2} MB/s", mbps)?;
        }
        Ok(())
    }
}

/// How an aggregator run ended.
#[derive(Debug)]
pub enum AggregateOutcome {
    /// The threshold was crossed.
    Stopped(Summary),
    /// Every report sender went away first.
    Closed(RunState),
}

/// Single consumer of completion reports.
#[derive(Debug)]
pub struct Aggregator {
    state: RunState,
    reports: mpsc::Receiver<CompletionReport>,
}

impl Aggregator {
    /// Create an aggregator over `reports`.
    #[must_use]
    pub fn new(state: RunState, reports: mpsc::Receiver<CompletionReport>) -> Self {
        Self { state, reports }
    }

    /// Absorb reports until the threshold is crossed or the channel closes.
    pub async fn run(mut self) -> AggregateOutcome {
        while let Some(report) = self.reports.recv().await {
            if self.state.absorb(&report) {
                let summary = self.state.summary();
                info!(
                    total = summary.target_total,
                    completed = summary.completed,
                    elapsed_ms = summary.elapsed.as_millis() as u64,
                    "{}",
                    summary
                );
                return AggregateOutcome::Stopped(summary);
            }
        }
        AggregateOutcome::Closed(self.state)
    }

    /// Run on its own task; the returned signal fires when it stops.
    #[must_use]
    pub fn spawn(self) -> StopSignal {
        StopSignal {
            handle: tokio::spawn(self.run()),
        }
    }
}

/// Raised once, when the aggregator sees the total exceed the target.
///
/// Dropping the signal aborts the aggregator task.
#[derive(Debug)]
pub struct StopSignal {
    handle: JoinHandle<AggregateOutcome>,
}

impl StopSignal {
    /// Wait for the aggregator to stop.
    ///
    /// Cancel-safe, but must not be polled again once it has returned.
    ///
    /// # Errors
    ///
    /// Returns `Error::Aborted` if the report channel closed before the
    /// threshold or the aggregator task failed.
    pub async fn raised(&mut self) -> Result<Summary> {
        match (&mut self.handle).await? {
            AggregateOutcome::Stopped(summary) => Ok(summary),
            AggregateOutcome::Closed(state) => Err(Error::Aborted(format!(
                "report stream ended at {} of {} requests",
                state.total_completed(),
                state.target_total()
            ))),
        }
    }
}

impl Drop for StopSignal {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
