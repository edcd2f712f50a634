//! Admission control: the concurrency ceiling.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{Error, Result};

/// One occupied slot of the concurrency ceiling.
///
/// Dropping the token frees the slot; [`release`](AdmissionToken::release)
/// makes the point of release explicit.
#[derive(Debug)]
pub struct AdmissionToken {
    slot: u64,
    _permit: OwnedSemaphorePermit,
}

impl AdmissionToken {
    /// Sequence number of the admission, used in session logs.
    #[must_use]
    pub const fn slot(&self) -> u64 {
        self.slot
    }

    /// Free the slot.
    pub fn release(self) {
        drop(self);
    }
}

/// Hands out at most `concurrency` tokens at a time.
#[derive(Debug)]
pub struct Admission {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    next_slot: u64,
}

impl Admission {
    /// Create a ceiling of `concurrency` slots.
    #[must_use]
    pub fn new(concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            next_slot: 0,
        }
    }

    /// Wait for a free slot and occupy it.
    ///
    /// Cancel-safe: a cancelled call neither occupies a slot nor consumes a
    /// slot number.
    ///
    /// # Errors
    ///
    /// Returns `Error::Aborted` if the ceiling was closed.
    pub async fn acquire(&mut self) -> Result<AdmissionToken> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| Error::Aborted("admission closed".into()))?;
        let slot = self.next_slot;
        self.next_slot += 1;
        Ok(AdmissionToken {
            slot,
            _permit: permit,
        })
    }

    /// Number of tokens currently outstanding.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.concurrency - self.semaphore.available_permits()
    }

    /// Total tokens handed out so far.
    #[must_use]
    pub const fn admitted(&self) -> u64 {
        self.next_slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_slots_are_sequential() {
        let mut admission = Admission::new(3);
        let a = admission.acquire().await.unwrap();
        let b = admission.acquire().await.unwrap();
        assert_eq!(a.slot(), 0);
        assert_eq!(b.slot(), 1);
        assert_eq!(admission.in_use(), 2);
        assert_eq!(admission.admitted(), 2);
    }

    #[tokio::test]
    async fn test_acquire_blocks_at_ceiling() {
        let mut admission = Admission::new(1);
        let token = admission.acquire().await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(20), admission.acquire()).await;
        assert!(blocked.is_err());
        assert_eq!(admission.admitted(), 1);

        token.release();
        assert_eq!(admission.in_use(), 0);
        let next = admission.acquire().await.unwrap();
        assert_eq!(next.slot(), 1);
    }
}
