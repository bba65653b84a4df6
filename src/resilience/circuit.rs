//! Per-agent circuit breaker
//!
//! Each agent id owns one [`CircuitEntry`] behind its own mutex, so state
//! transitions for one agent never contend with traffic to another. The
//! entries live in a [`CircuitStateStore`] that is injected into the
//! breaker; tests build a fresh store to stay isolated.
//!
//! # States
//!
//! - **Closed**: calls pass through; consecutive transient failures are
//!   counted and reaching the threshold opens the circuit.
//! - **Open**: calls are rejected with [`AgentError::CircuitOpen`] until the
//!   cooldown has elapsed since opening.
//! - **HalfOpen**: exactly one probe call is admitted; its outcome alone
//!   decides between Closed and Open. Any failure of the probe, transient
//!   or permanent, re-opens the circuit.

use crate::types::AgentError;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Configuration for circuit breaking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive transient failures that open the circuit (default: 5)
    pub failure_threshold: u32,

    /// Time an open circuit waits before admitting a probe (default: 60 seconds)
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cooldown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Point-in-time view of one circuit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    pub agent: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub last_transition: DateTime<Utc>,
    /// Number of times this circuit has opened
    pub trips: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_remaining_ms: Option<u64>,
}

#[derive(Debug)]
struct CircuitEntry {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
    last_transition: DateTime<Utc>,
    trips: u64,
}

impl CircuitEntry {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            probe_in_flight: false,
            last_transition: Utc::now(),
            trips: 0,
        }
    }

    fn transition(&mut self, to: CircuitState) {
        if self.state != to {
            self.state = to;
            self.last_transition = Utc::now();
        }
    }

    fn open(&mut self) {
        self.transition(CircuitState::Open);
        self.opened_at = Some(Instant::now());
        self.probe_in_flight = false;
        self.trips += 1;
    }

    fn close(&mut self) {
        self.transition(CircuitState::Closed);
        self.consecutive_failures = 0;
        self.opened_at = None;
        self.probe_in_flight = false;
    }

    fn snapshot(&self, agent: &str, cooldown: Duration) -> CircuitSnapshot {
        let cooldown_remaining_ms = match (self.state, self.opened_at) {
            (CircuitState::Open, Some(opened_at)) => {
                Some(cooldown.saturating_sub(opened_at.elapsed()).as_millis() as u64)
            }
            _ => None,
        };

        CircuitSnapshot {
            agent: agent.to_string(),
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            last_transition: self.last_transition,
            trips: self.trips,
            cooldown_remaining_ms,
        }
    }
}

/// Process-wide store of circuit state, keyed by agent id
#[derive(Debug, Default)]
pub struct CircuitStateStore {
    circuits: RwLock<HashMap<String, Arc<Mutex<CircuitEntry>>>>,
}

impl CircuitStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, agent: &str) -> Arc<Mutex<CircuitEntry>> {
        if let Some(entry) = self.circuits.read().get(agent) {
            return Arc::clone(entry);
        }

        let mut circuits = self.circuits.write();
        Arc::clone(
            circuits
                .entry(agent.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(CircuitEntry::new()))),
        )
    }

    fn existing(&self, agent: &str) -> Option<Arc<Mutex<CircuitEntry>>> {
        self.circuits.read().get(agent).cloned()
    }

    /// Agent ids that have a circuit, sorted
    pub fn agents(&self) -> Vec<String> {
        let mut agents: Vec<String> = self.circuits.read().keys().cloned().collect();
        agents.sort();
        agents
    }
}

/// Circuit breaker over a shared [`CircuitStateStore`]
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    store: Arc<CircuitStateStore>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig, store: Arc<CircuitStateStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<CircuitStateStore> {
        &self.store
    }

    /// Ask to call `agent`. Returns a permit that must be settled with the
    /// outcome, or [`AgentError::CircuitOpen`] when the call must not happen.
    pub fn acquire(&self, agent: &str) -> Result<CircuitPermit, AgentError> {
        let entry = self.store.entry(agent);
        let probe = {
            let mut circuit = entry.lock();
            match circuit.state {
                CircuitState::Closed => false,
                CircuitState::Open => {
                    let cooled = circuit
                        .opened_at
                        .map(|opened_at| opened_at.elapsed() >= self.config.cooldown)
                        .unwrap_or(true);
                    if !cooled {
                        return Err(AgentError::CircuitOpen(agent.to_string()));
                    }
                    circuit.transition(CircuitState::HalfOpen);
                    circuit.probe_in_flight = true;
                    info!(agent, "Circuit half-open, admitting probe call");
                    true
                }
                CircuitState::HalfOpen => {
                    if circuit.probe_in_flight {
                        return Err(AgentError::CircuitOpen(agent.to_string()));
                    }
                    circuit.probe_in_flight = true;
                    true
                }
            }
        };

        Ok(CircuitPermit {
            agent: agent.to_string(),
            entry,
            config: self.config,
            probe,
            settled: false,
        })
    }

    /// Current state of `agent`'s circuit (Closed if it has never been called)
    pub fn state(&self, agent: &str) -> CircuitState {
        self.store
            .existing(agent)
            .map(|entry| entry.lock().state)
            .unwrap_or(CircuitState::Closed)
    }

    pub fn snapshot_of(&self, agent: &str) -> Option<CircuitSnapshot> {
        self.store
            .existing(agent)
            .map(|entry| entry.lock().snapshot(agent, self.config.cooldown))
    }

    /// Snapshots of every known circuit, sorted by agent id
    pub fn snapshot(&self) -> Vec<CircuitSnapshot> {
        self.store
            .agents()
            .into_iter()
            .filter_map(|agent| self.snapshot_of(&agent))
            .collect()
    }

    /// Force `agent`'s circuit closed. Returns false if the agent has no circuit.
    pub fn reset(&self, agent: &str) -> bool {
        match self.store.existing(agent) {
            Some(entry) => {
                entry.lock().close();
                info!(agent, "Circuit manually reset");
                true
            }
            None => false,
        }
    }
}

/// Admission to call an agent, settled with the call's outcome
///
/// Dropping an unsettled probe permit (e.g. on cancellation) re-opens the
/// circuit with its original open timestamp so the next call can probe.
#[derive(Debug)]
pub struct CircuitPermit {
    agent: String,
    entry: Arc<Mutex<CircuitEntry>>,
    config: CircuitBreakerConfig,
    probe: bool,
    settled: bool,
}

impl CircuitPermit {
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    /// The agent answered. Resets the failure streak and closes a half-open circuit.
    pub fn record_success(mut self) {
        self.settled = true;
        let mut circuit = self.entry.lock();
        match circuit.state {
            CircuitState::HalfOpen if self.probe => {
                circuit.close();
                info!(agent = %self.agent, "Probe succeeded, circuit closed");
            }
            CircuitState::Closed => circuit.consecutive_failures = 0,
            // Another caller opened the circuit meanwhile; only a probe may close it
            _ => {}
        }
    }

    /// The agent answered with a permanent error.
    ///
    /// A failing probe re-opens the circuit. While closed the streak of
    /// transient failures is left as it is, neither reset nor extended.
    pub fn record_permanent_failure(mut self) {
        self.settled = true;
        let mut circuit = self.entry.lock();
        if circuit.state == CircuitState::HalfOpen && self.probe {
            circuit.open();
            warn!(agent = %self.agent, "Probe failed permanently, circuit re-opened");
        }
    }

    /// The call failed transiently.
    pub fn record_failure(mut self) {
        self.settled = true;
        let mut circuit = self.entry.lock();
        circuit.consecutive_failures = circuit.consecutive_failures.saturating_add(1);
        match circuit.state {
            CircuitState::HalfOpen if self.probe => {
                circuit.open();
                warn!(agent = %self.agent, "Probe failed, circuit re-opened");
            }
            CircuitState::Closed
                if circuit.consecutive_failures >= self.config.failure_threshold =>
            {
                circuit.open();
                warn!(
                    agent = %self.agent,
                    failures = circuit.consecutive_failures,
                    cooldown_secs = self.config.cooldown.as_secs_f64(),
                    "Circuit opened"
                );
            }
            _ => {}
        }
    }
}

impl Drop for CircuitPermit {
    fn drop(&mut self) {
        if self.settled || !self.probe {
            return;
        }
        let mut circuit = self.entry.lock();
        if circuit.state == CircuitState::HalfOpen {
            circuit.probe_in_flight = false;
            circuit.transition(CircuitState::Open);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cooldown_secs: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            CircuitBreakerConfig::new(threshold, Duration::from_secs(cooldown_secs)),
            Arc::new(CircuitStateStore::new()),
        )
    }

    fn fail(breaker: &CircuitBreaker, agent: &str, times: u32) {
        for _ in 0..times {
            breaker.acquire(agent).unwrap().record_failure();
        }
    }

    #[test]
    fn test_default_config() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.cooldown, Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold() {
        let breaker = breaker(3, 60);
        fail(&breaker, "seo-optimizer", 2);
        assert_eq!(breaker.state("seo-optimizer"), CircuitState::Closed);

        fail(&breaker, "seo-optimizer", 1);
        assert_eq!(breaker.state("seo-optimizer"), CircuitState::Open);
        assert!(matches!(
            breaker.acquire("seo-optimizer"),
            Err(AgentError::CircuitOpen(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_streak() {
        let breaker = breaker(3, 60);
        fail(&breaker, "social-media", 2);
        breaker.acquire("social-media").unwrap().record_success();
        fail(&breaker, "social-media", 2);
        assert_eq!(breaker.state("social-media"), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_probe_after_cooldown() {
        let breaker = breaker(1, 10);
        fail(&breaker, "a", 1);

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(breaker.acquire("a").is_err());

        tokio::time::advance(Duration::from_secs(2)).await;
        let probe = breaker.acquire("a").unwrap();
        assert!(probe.is_probe());
        assert_eq!(breaker.state("a"), CircuitState::HalfOpen);

        // Only one probe at a time
        assert!(breaker.acquire("a").is_err());

        probe.record_success();
        assert_eq!(breaker.state("a"), CircuitState::Closed);
        assert!(!breaker.acquire("a").unwrap().is_probe());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_restarts_cooldown() {
        let breaker = breaker(1, 10);
        fail(&breaker, "a", 1);
        tokio::time::advance(Duration::from_secs(10)).await;

        breaker.acquire("a").unwrap().record_failure();
        assert_eq!(breaker.state("a"), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(breaker.acquire("a").is_err());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(breaker.acquire("a").unwrap().is_probe());
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_probe_failure_reopens() {
        let breaker = breaker(1, 10);
        fail(&breaker, "a", 1);
        tokio::time::advance(Duration::from_secs(10)).await;

        breaker.acquire("a").unwrap().record_permanent_failure();
        assert_eq!(breaker.state("a"), CircuitState::Open);
        assert_eq!(breaker.snapshot_of("a").unwrap().trips, 2);
        assert!(breaker.acquire("a").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_keeps_closed_streak() {
        let breaker = breaker(3, 60);
        fail(&breaker, "a", 2);
        breaker.acquire("a").unwrap().record_permanent_failure();
        assert_eq!(breaker.state("a"), CircuitState::Closed);
        assert_eq!(breaker.snapshot_of("a").unwrap().consecutive_failures, 2);

        fail(&breaker, "a", 1);
        assert_eq!(breaker.state("a"), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_probe_reopens() {
        let breaker = breaker(1, 10);
        fail(&breaker, "a", 1);
        tokio::time::advance(Duration::from_secs(10)).await;

        let probe = breaker.acquire("a").unwrap();
        drop(probe);
        assert_eq!(breaker.state("a"), CircuitState::Open);

        // Cooldown already elapsed, so the next caller may probe immediately
        assert!(breaker.acquire("a").unwrap().is_probe());
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuits_are_independent() {
        let breaker = breaker(1, 60);
        fail(&breaker, "a", 1);
        assert_eq!(breaker.state("a"), CircuitState::Open);
        assert_eq!(breaker.state("b"), CircuitState::Closed);
        assert!(breaker.acquire("b").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_and_reset() {
        let breaker = breaker(2, 60);
        fail(&breaker, "b", 2);
        breaker.acquire("a").unwrap().record_success();

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].agent, "a");
        assert_eq!(snapshot[1].state, CircuitState::Open);
        assert_eq!(snapshot[1].trips, 1);
        assert_eq!(snapshot[1].cooldown_remaining_ms, Some(60_000));

        assert!(breaker.reset("b"));
        assert_eq!(breaker.state("b"), CircuitState::Closed);
        assert!(!breaker.reset("unknown"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_store_is_isolated() {
        let first = breaker(1, 60);
        fail(&first, "a", 1);
        let second = breaker(1, 60);
        assert_eq!(second.state("a"), CircuitState::Closed);
    }
}
