//! Run configuration for the load driver.

use tokio::sync::Semaphore;
use url::Url;

use crate::error::{Error, Result};
use crate::workload::{CountPolicy, RandomWorkload, SizePolicy};

/// Default benchmark target.
pub const DEFAULT_URL: &str = "ws://localhost:9898/ws";

/// Default `Origin` header sent with the upgrade request.
pub const DEFAULT_ORIGIN: &str = "http://localhost:9898/";

/// Order of the two final actions of a session.
///
/// Releasing first lets the driver admit a replacement session before the
/// aggregator has seen this session's count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleaseOrder {
    /// Free the admission slot, then emit the completion report.
    #[default]
    BeforeReport,
    /// Emit the completion report, then free the admission slot.
    AfterReport,
}

/// Benchmark run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
    /// Maximum number of sessions holding an admission token at once.
    ///
    /// Default: 100
    pub concurrency: usize,

    /// The run stops once the completed-request total exceeds this.
    ///
    /// Default: 4,000,000
    pub target_total: u64,

    /// WebSocket endpoint every session dials.
    pub url: String,

    /// `Origin` header for the upgrade request.
    pub origin: String,

    /// Round trips per session.
    pub count: CountPolicy,

    /// Payload size per round trip.
    pub size: SizePolicy,

    /// Whether the admission slot is freed before or after reporting.
    pub release_order: ReleaseOrder,

    /// Capacity of the report channel between workers and the aggregator.
    ///
    /// Default: 10
    pub report_buffer: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            concurrency: 100,
            target_total: 4_000_000,
            url: DEFAULT_URL.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            count: CountPolicy::default(),
            size: SizePolicy::default(),
            release_order: ReleaseOrder::default(),
            report_buffer: 10,
        }
    }
}

impl BenchConfig {
    /// Create a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the concurrency ceiling.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the completed-request target.
    #[must_use]
    pub const fn with_target_total(mut self, total: u64) -> Self {
        self.target_total = total;
        self
    }

    /// Set the endpoint URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the `Origin` header.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Set the per-session round-trip policy.
    #[must_use]
    pub const fn with_count(mut self, count: CountPolicy) -> Self {
        self.count = count;
        self
    }

    /// Set the message size policy.
    #[must_use]
    pub const fn with_size(mut self, size: SizePolicy) -> Self {
        self.size = size;
        self
    }

    /// Set the release/report ordering.
    #[must_use]
    pub const fn with_release_order(mut self, order: ReleaseOrder) -> Self {
        self.release_order = order;
        self
    }

    /// Set the report channel capacity.
    #[must_use]
    pub const fn with_report_buffer(mut self, capacity: usize) -> Self {
        self.report_buffer = capacity;
        self
    }

    /// Build the random workload described by this configuration.
    #[must_use]
    pub const fn workload(&self) -> RandomWorkload {
        RandomWorkload::new(self.count, self.size)
    }

    /// Check that the configuration can drive a run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero or oversized concurrency ceiling, a zero report
    /// buffer, or an empty count/size range, and [`Error::InvalidUrl`] if the
    /// URL does not parse or is not a `ws://` URL.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".into()));
        }
        if self.concurrency > Semaphore::MAX_PERMITS {
            return Err(Error::Config(format!(
                "concurrency {} exceeds the limit of {}",
                self.concurrency,
                Semaphore::MAX_PERMITS
            )));
        }
        if self.report_buffer == 0 {
            return Err(Error::Config("report buffer must be at least 1".into()));
        }
        if let CountPolicy::Uniform { min, max } = self.count {
            if min >= max {
                return Err(Error::Config(format!(
                    "empty request range [{}, {})",
                    min, max
                )));
            }
        }
        if let SizePolicy::Uniform { min, max } = self.size {
            if min >= max {
                return Err(Error::Config(format!(
                    "empty message size range [{}, {})",
                    min, max
                )));
            }
        }

        let url = Url::parse(&self.url)?;
        if url.scheme() != "ws" {
            return Err(Error::InvalidUrl(format!(
                "unsupported scheme '{}' (only ws:// is supported)",
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(Error::InvalidUrl(format!("missing host in {}", self.url)));
        }
        Ok(())
    }
}
