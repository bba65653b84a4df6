//! Admission control
//!
//! Requests are admitted before any routing happens. A semaphore bounds how
//! many requests are in flight, and a keyed GCRA limiter bounds how often
//! one caller may submit. Both reject immediately instead of queueing.

use crate::types::{AppError, Result};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// Caller key for requests that carry no `user_id`
pub const ANONYMOUS_CALLER: &str = "anonymous";

pub struct Admission {
    slots: Arc<Semaphore>,
    max_concurrent: usize,
    /// None when per-caller limiting is switched off
    limiter: Option<DefaultKeyedRateLimiter<String>>,
}

impl Admission {
    /// `requests_per_hour == 0` disables the per-caller limit
    pub fn new(max_concurrent: usize, requests_per_hour: u32) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            slots: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            limiter: NonZeroU32::new(requests_per_hour)
                .map(|per_hour| RateLimiter::keyed(Quota::per_hour(per_hour))),
        }
    }

    /// Admit one request from `caller`. The permit holds a concurrency slot
    /// until it is dropped.
    pub fn admit(&self, caller: &str) -> Result<OwnedSemaphorePermit> {
        if let Some(limiter) = &self.limiter {
            if limiter.check_key(&caller.to_string()).is_err() {
                return Err(AppError::RateLimited(format!(
                    "Rate limit exceeded for caller '{}'",
                    caller
                )));
            }
        }

        Arc::clone(&self.slots)
            .try_acquire_owned()
            .map_err(|e| match e {
                TryAcquireError::NoPermits => AppError::Overloaded(format!(
                    "{} requests already in progress",
                    self.max_concurrent
                )),
                TryAcquireError::Closed => {
                    AppError::Unavailable("Request admission is closed".into())
                }
            })
    }

    /// Requests currently being processed
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.slots.available_permits()
    }
}
