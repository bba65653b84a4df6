//! Fault-tolerant agent invocation
//!
//! [`FaultTolerantInvoker::invoke`] is the only path through which the
//! orchestrator reaches an agent. It resolves the handle from the
//! [`AgentRegistry`], checks the circuit before every attempt, bounds each
//! attempt with a timeout, retries transient failures with exponential
//! backoff and substitutes fallback payloads where the policy allows. It
//! always produces an [`AgentResult`]; nothing escapes as an error.

use crate::agents::fallback::fallback_payload;
use crate::agents::registry::{AgentRegistry, HandleKind};
use crate::resilience::circuit::CircuitBreaker;
use crate::resilience::classify::classify;
use crate::resilience::retry::RetryPolicy;
use crate::types::{
    AgentError, AgentOutcome, AgentPayload, AgentResult, AppError, ErrorClass, FailureKind,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Reason recorded when the end-to-end deadline cancels a call
pub const DEADLINE_EXCEEDED: &str = "request deadline exceeded";

pub struct FaultTolerantInvoker {
    registry: Arc<AgentRegistry>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl FaultTolerantInvoker {
    pub fn new(
        registry: Arc<AgentRegistry>,
        breaker: CircuitBreaker,
        retry: RetryPolicy,
        call_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            breaker,
            retry,
            call_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Invoke `agent_id` under the circuit, retry and timeout policy.
    ///
    /// `cancel` is the request-wide deadline token; once it fires the call
    /// is abandoned and recorded as a permanent timeout.
    pub async fn invoke(
        &self,
        agent_id: &str,
        payload: &AgentPayload,
        cancel: &CancellationToken,
    ) -> AgentResult {
        let started = Instant::now();
        let call = CallRecord {
            agent: agent_id,
            started,
        };

        let loaded = tokio::select! {
            biased;
            _ = cancel.cancelled() => return call.cancelled(0),
            loaded = self.registry.load(agent_id) => loaded,
        };

        let handle = match loaded {
            Ok(handle) => handle,
            Err(AppError::NotFound(msg)) => {
                return call.failed(ErrorClass::Permanent, FailureKind::UnsupportedIntent, msg, 0)
            }
            Err(e) => {
                return call.failed(ErrorClass::Permanent, FailureKind::Unavailable, e.to_string(), 0)
            }
        };

        // Agents that never initialized answer through their fallback without touching the circuit
        if let HandleKind::Fallback { reason } = handle.kind() {
            let fallback = handle
                .agent()
                .handle_request(payload)
                .await
                .unwrap_or_else(|_| fallback_payload(agent_id, reason));
            return call.degraded(
                ErrorClass::Permanent,
                FailureKind::Initialization,
                reason.clone(),
                fallback,
                0,
            );
        }

        let mut attempts: u32 = 0;
        loop {
            let permit = match self.breaker.acquire(agent_id) {
                Ok(permit) => permit,
                Err(rejected) => {
                    debug!(agent = agent_id, attempts, "Circuit open, call short-circuited");
                    return call.fallback(ErrorClass::CircuitOpen, &rejected, attempts);
                }
            };

            attempts += 1;
            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = timeout(self.call_timeout, handle.agent().handle_request(payload)) => Some(result),
            };

            let error = match attempt {
                // Dropping the permit unsettled releases a half-open probe slot
                None => {
                    drop(permit);
                    return call.cancelled(attempts);
                }
                Some(Ok(Ok(output))) => {
                    permit.record_success();
                    return call.finish(AgentOutcome::Succeeded { output }, attempts);
                }
                Some(Ok(Err(error))) => error,
                Some(Err(_)) => AgentError::Timeout(format!(
                    "no response within {}ms",
                    self.call_timeout.as_millis()
                )),
            };

            match classify(&error) {
                ErrorClass::Transient => {
                    permit.record_failure();
                    if !self.retry.allows_another(attempts) {
                        warn!(
                            agent = agent_id,
                            attempts,
                            error = %error,
                            "Transient failures exhausted retries, using fallback"
                        );
                        return call.fallback(ErrorClass::Transient, &error, attempts);
                    }

                    let delay = self.retry.delay_after(attempts);
                    debug!(
                        agent = agent_id,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Transient failure, backing off"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return call.cancelled(attempts),
                        _ = sleep(delay) => {}
                    }
                }
                ErrorClass::Permanent => {
                    permit.record_permanent_failure();
                    debug!(agent = agent_id, error = %error, "Permanent failure, not retried");
                    return call.failed(ErrorClass::Permanent, error.kind(), error.to_string(), attempts);
                }
                ErrorClass::CircuitOpen => {
                    drop(permit);
                    return call.fallback(ErrorClass::CircuitOpen, &error, attempts);
                }
            }
        }
    }
}

struct CallRecord<'a> {
    agent: &'a str,
    started: Instant,
}

impl CallRecord<'_> {
    fn finish(&self, outcome: AgentOutcome, attempts: u32) -> AgentResult {
        AgentResult {
            agent: self.agent.to_string(),
            outcome,
            latency_ms: self.started.elapsed().as_millis() as u64,
            attempts,
        }
    }

    fn failed(&self, error: ErrorClass, kind: FailureKind, reason: String, attempts: u32) -> AgentResult {
        self.finish(AgentOutcome::Failed { error, kind, reason }, attempts)
    }

    fn degraded(
        &self,
        error: ErrorClass,
        kind: FailureKind,
        reason: String,
        fallback: serde_json::Value,
        attempts: u32,
    ) -> AgentResult {
        self.finish(
            AgentOutcome::Degraded {
                error,
                kind,
                reason,
                fallback,
            },
            attempts,
        )
    }

    fn fallback(&self, error: ErrorClass, cause: &AgentError, attempts: u32) -> AgentResult {
        let reason = cause.to_string();
        let fallback = fallback_payload(self.agent, &reason);
        self.degraded(error, cause.kind(), reason, fallback, attempts)
    }

    fn cancelled(&self, attempts: u32) -> AgentResult {
        self.failed(
            ErrorClass::Permanent,
            FailureKind::Timeout,
            DEADLINE_EXCEEDED.to_string(),
            attempts,
        )
    }
}
