// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Process-wide bound on concurrent OCR jobs.
//
// OCR is CPU- and memory-heavy, so at most `capacity` jobs run at once.
// Waiters are served in arrival order (Tokio's semaphore is fair) and there
// is no wait timeout: a request holds its connection until a slot frees up.
// A permit is released exactly once, when it is dropped, on every exit path.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use cniwerk_core::error::{CniError, Result};

/// Waits longer than this are logged as a starvation warning.
const STARVATION_WARN_AFTER: Duration = Duration::from_secs(30);

/// Bounded FIFO admission for OCR jobs.
#[derive(Debug, Clone)]
pub struct JobLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    waiting: Arc<AtomicUsize>,
    warn_after: Duration,
}

/// Proof of admission.  The slot is released when this is dropped.
#[derive(Debug)]
pub struct JobPermit {
    _permit: OwnedSemaphorePermit,
    acquired_at: Instant,
}

/// Decrements the waiting counter even if the acquiring future is dropped.
struct WaitingGuard<'a>(&'a AtomicUsize);

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

impl JobLimiter {
    /// A limiter admitting at most `capacity` jobs at once (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            waiting: Arc::new(AtomicUsize::new(0)),
            warn_after: STARVATION_WARN_AFTER,
        }
    }

    /// Override the starvation warning threshold.
    pub fn with_starvation_warning(mut self, after: Duration) -> Self {
        self.warn_after = after;
        self
    }

    /// Wait for a free slot.
    ///
    /// Only fails once [`close`](Self::close) has been called.
    pub async fn acquire(&self) -> Result<JobPermit> {
        let queued_at = Instant::now();
        self.waiting.fetch_add(1, Ordering::Relaxed);
        let guard = WaitingGuard(&self.waiting);

        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| CniError::ShuttingDown)?;
        drop(guard);

        let waited = queued_at.elapsed();
        if waited >= self.warn_after {
            warn!(
                waited_ms = waited.as_millis() as u64,
                in_flight = self.in_flight(),
                waiting = self.waiting(),
                "OCR job waited unusually long for a slot"
            );
        } else {
            debug!(waited_ms = waited.as_millis() as u64, "OCR slot acquired");
        }

        Ok(JobPermit {
            _permit: permit,
            acquired_at: Instant::now(),
        })
    }

    /// Jobs currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.capacity
            .saturating_sub(self.semaphore.available_permits())
    }

    /// Requests queued for a slot.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Refuse new admissions.  Jobs already running keep their slots.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

impl JobPermit {
    /// Release the slot now rather than at end of scope.
    pub fn release(self) {
        debug!(
            held_ms = self.acquired_at.elapsed().as_millis() as u64,
            "OCR slot released"
        );
    }

    /// How long this permit has been held.
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
