//! Instrumented in-memory transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use wsbench::{Connection, Error, Result, Transport};

/// How fake connections misbehave.
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeBehavior {
    /// Every dial fails with `Error::Connection`.
    pub fail_dial: bool,
    /// Every read returns this many bytes fewer than the last write.
    pub short_by: usize,
    /// The n-th write (1-based, per connection) fails.
    pub fail_write_at: Option<u64>,
    /// Yield to the scheduler on every read so sessions interleave.
    pub yield_on_read: bool,
}

#[derive(Debug, Default)]
struct Counters {
    dials: AtomicUsize,
    open: AtomicUsize,
    max_open: AtomicUsize,
    closes: AtomicUsize,
    writes: AtomicU64,
    reads: AtomicU64,
}

/// Echo transport whose clones share one set of counters.
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    behavior: FakeBehavior,
    counters: Arc<Counters>,
}

impl FakeTransport {
    pub fn echo() -> Self {
        Self::default()
    }

    pub fn with_behavior(behavior: FakeBehavior) -> Self {
        Self {
            behavior,
            counters: Arc::default(),
        }
    }

    pub fn dials(&self) -> usize {
        self.counters.dials.load(Ordering::SeqCst)
    }

    pub fn open(&self) -> usize {
        self.counters.open.load(Ordering::SeqCst)
    }

    pub fn max_open(&self) -> usize {
        self.counters.max_open.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> u64 {
        self.counters.writes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> u64 {
        self.counters.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    type Conn = FakeConnection;

    async fn dial(&self, url: &str, _origin: &str) -> Result<FakeConnection> {
        self.counters.dials.fetch_add(1, Ordering::SeqCst);
        if self.behavior.fail_dial {
            return Err(Error::Connection(format!("{}: connection refused", url)));
        }

        let open = self.counters.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_open.fetch_max(open, Ordering::SeqCst);
        Ok(FakeConnection {
            behavior: self.behavior,
            counters: Arc::clone(&self.counters),
            last_written: 0,
            writes: 0,
            closed: false,
        })
    }
}

pub struct FakeConnection {
    behavior: FakeBehavior,
    counters: Arc<Counters>,
    last_written: usize,
    writes: u64,
    closed: bool,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.writes += 1;
        if self.behavior.fail_write_at == Some(self.writes) {
            return Err(Error::Transport("broken pipe".into()));
        }
        self.counters.writes.fetch_add(1, Ordering::SeqCst);
        self.last_written = data.len();
        Ok(data.len())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.behavior.yield_on_read {
            tokio::task::yield_now().await;
        }
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        let n = self
            .last_written
            .saturating_sub(self.behavior.short_by)
            .min(buf.len());
        buf[..n].fill(b'A');
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.counters.open.fetch_sub(1, Ordering::SeqCst);
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
