//! Per-session workload parameters.
//!
//! The worker never decides how many round trips to run or how large a
//! message is; it asks a [`Workload`]. The binary uses [`RandomWorkload`],
//! tests inject [`FixedWorkload`] for deterministic runs.

use rand::Rng;

/// Smallest read buffer handed to a connection, regardless of message size.
pub const MIN_READ_BUFFER: usize = 128;

/// Strategy deciding the shape of each session.
pub trait Workload: Send + Sync {
    /// Number of round trips the next session should perform.
    fn planned_count(&self) -> u64;

    /// Payload size for the next outgoing message.
    fn message_size(&self) -> usize;

    /// Largest size [`message_size`](Workload::message_size) can return.
    fn max_message_size(&self) -> usize;

    /// The message size when it does not vary, used for byte throughput.
    fn fixed_message_size(&self) -> Option<usize>;

    /// Read buffer length able to hold any expected response.
    fn read_buffer_size(&self) -> usize {
        self.max_message_size().max(MIN_READ_BUFFER)
    }
}

/// How many round trips each session performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountPolicy {
    /// Every session performs exactly this many.
    Fixed(u64),
    /// Uniformly random in `[min, max)`, chosen once per session.
    Uniform {
        /// Inclusive lower bound.
        min: u64,
        /// Exclusive upper bound.
        max: u64,
    },
}

impl Default for CountPolicy {
    fn default() -> Self {
        CountPolicy::Uniform {
            min: 2000,
            max: 12000,
        }
    }
}

/// How large each outgoing message is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizePolicy {
    /// Every message carries this many bytes.
    Fixed(usize),
    /// Uniformly random in `[min, max)`, chosen once per round trip.
    Uniform {
        /// Inclusive lower bound.
        min: usize,
        /// Exclusive upper bound.
        max: usize,
    },
}

impl Default for SizePolicy {
    fn default() -> Self {
        SizePolicy::Uniform { min: 20, max: 40 }
    }
}

impl SizePolicy {
    /// Largest size this policy produces.
    #[must_use]
    pub const fn max_size(&self) -> usize {
        match *self {
            SizePolicy::Fixed(n) => n,
            SizePolicy::Uniform { max, .. } => max.saturating_sub(1),
        }
    }
}

/// Workload drawing its parameters from the thread-local RNG.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RandomWorkload {
    count: CountPolicy,
    size: SizePolicy,
}

impl RandomWorkload {
    /// Create a workload from the given policies.
    ///
    /// Ranges are expected to be non-empty; `BenchConfig::validate` rejects
    /// empty ones before a workload is built.
    #[must_use]
    pub const fn new(count: CountPolicy, size: SizePolicy) -> Self {
        Self { count, size }
    }

    /// The session count policy.
    #[must_use]
    pub const fn count_policy(&self) -> CountPolicy {
        self.count
    }

    /// The message size policy.
    #[must_use]
    pub const fn size_policy(&self) -> SizePolicy {
        self.size
    }
}

impl Workload for RandomWorkload {
    fn planned_count(&self) -> u64 {
        match self.count {
            CountPolicy::Fixed(n) => n,
            CountPolicy::Uniform { min, max } if min < max => {
                rand::thread_rng().gen_range(min..max)
            }
            CountPolicy::Uniform { min, .. } => min,
        }
    }

    fn message_size(&self) -> usize {
        match self.size {
            SizePolicy::Fixed(n) => n,
            SizePolicy::Uniform { min, max } if min < max => {
                rand::thread_rng().gen_range(min..max)
            }
            SizePolicy::Uniform { min, .. } => min,
        }
    }

    fn max_message_size(&self) -> usize {
        self.size.max_size()
    }

    fn fixed_message_size(&self) -> Option<usize> {
        match self.size {
            SizePolicy::Fixed(n) => Some(n),
            SizePolicy::Uniform { .. } => None,
        }
    }
}

/// Deterministic workload: same count and size every time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedWorkload {
    /// Round trips per session.
    pub count: u64,
    /// Bytes per message.
    pub size: usize,
}

impl FixedWorkload {
    /// Create a fixed workload.
    #[must_use]
    pub const fn new(count: u64, size: usize) -> Self {
        Self { count, size }
    }
}

impl Workload for FixedWorkload {
    fn planned_count(&self) -> u64 {
        self.count
    }

    fn message_size(&self) -> usize {
        self.size
    }

    fn max_message_size(&self) -> usize {
        self.size
    }

    fn fixed_message_size(&self) -> Option<usize> {
        Some(self.size)
    }
}
