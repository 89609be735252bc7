// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Resilience utilities: redelivery backoff and per-entity single-flight.
//!
//! - [`RedeliveryPolicy`]: bounded exponential backoff around a whole
//!   pipeline invocation
//! - [`SingleFlight`]: one-permit semaphore per entity type, used when
//!   `sync.singleFlight` is on
//!
//! # Example
//!
//! ```rust
//! use integration_engine::resilience::RedeliveryPolicy;
//! use std::time::Duration;
//!
//! let policy = RedeliveryPolicy::default();
//! assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(5));
//! assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(10));
//! ```

use crate::config::IntegrationConfig;
use crate::model::EntityType;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Redelivery pacing for a failed invocation.
///
/// `max_attempts` counts every attempt, the first one included. After
/// attempt `n` fails (and `n < max_attempts`) the pipeline sleeps
/// `delay_for_attempt(n)` before attempt `n + 1`.
#[derive(Debug, Clone)]
pub struct RedeliveryPolicy {
    /// Total attempts, first one included.
    pub max_attempts: u32,

    /// Delay before the second attempt.
    pub initial_delay: Duration,

    /// Ceiling for exponential backoff.
    pub max_delay: Duration,

    /// Backoff multiplier (2.0 = double delay each retry).
    pub backoff_factor: f64,
}

impl Default for RedeliveryPolicy {
    /// Three attempts, waiting 5s then 10s.
    ///
    /// ```text
    /// Attempt failed  Wait before next
    /// --------------  ----------------
    /// 1               5s
    /// 2               10s
    /// 3               (exhausted, dead-lettered)
    /// ```
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
            backoff_factor: 2.0,
        }
    }
}

impl RedeliveryPolicy {
    /// Policy from a config snapshot.
    ///
    /// The attempt cap comes from `frappe.retryAttempts`; a value of zero is
    /// treated as one so every job is tried at least once.
    pub fn from_config(config: &IntegrationConfig) -> Self {
        Self {
            max_attempts: config.frappe.retry_attempts.max(1),
            initial_delay: config.redelivery.initial_delay(),
            max_delay: config.redelivery.max_delay(),
            backoff_factor: config.redelivery.backoff_multiplier,
        }
    }

    /// Fast policy for tests.
    pub fn testing() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
        }
    }

    /// Delay after the given failed attempt (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.initial_delay;
        }

        let exponent = (attempt - 1).min(i32::MAX as u32) as i32;
        let multiplier = self.backoff_factor.powi(exponent);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        if !delay_secs.is_finite() || delay_secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }

        std::cmp::min(Duration::from_secs_f64(delay_secs), self.max_delay)
    }

    /// Whether another attempt follows `attempt`.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

// =============================================================================
// Single-flight
// =============================================================================

/// Per-entity guard admitting at most one invocation at a time.
///
/// Acquisition never waits: a busy entity yields `None` and the caller
/// skips the invocation.
///
/// ```rust
/// use integration_engine::resilience::SingleFlight;
/// use integration_engine::model::EntityType;
///
/// let guard = SingleFlight::new();
/// let permit = guard.try_acquire(EntityType::Payroll);
/// assert!(permit.is_some());
/// assert!(guard.try_acquire(EntityType::Payroll).is_none());
/// assert!(guard.try_acquire(EntityType::Employee).is_some());
/// drop(permit);
/// assert!(guard.try_acquire(EntityType::Payroll).is_some());
/// ```
#[derive(Debug)]
pub struct SingleFlight {
    slots: HashMap<EntityType, Arc<Semaphore>>,
}

impl Default for SingleFlight {
    fn default() -> Self {
        Self::new()
    }
}

impl SingleFlight {
    pub fn new() -> Self {
        let slots = EntityType::ALL
            .into_iter()
            .map(|entity| (entity, Arc::new(Semaphore::new(1))))
            .collect();
        Self { slots }
    }

    /// Claim the entity's slot. The slot is released when the permit drops.
    pub fn try_acquire(&self, entity: EntityType) -> Option<OwnedSemaphorePermit> {
        self.slots.get(&entity)?.clone().try_acquire_owned().ok()
    }

    /// Whether an invocation for `entity` currently holds the slot.
    pub fn is_busy(&self, entity: EntityType) -> bool {
        self.slots
            .get(&entity)
            .map(|s| s.available_permits() == 0)
            .unwrap_or(false)
    }
}
