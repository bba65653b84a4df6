//! Fault-tolerance integration tests
//!
//! Drives the invoker against scripted agents with paused time, so retry
//! backoff and circuit cooldowns elapse instantly.

mod common;

use atlas::resilience::invoker::DEADLINE_EXCEEDED;
use atlas::resilience::{CircuitBreakerConfig, CircuitState};
use atlas::types::{AgentError, AgentPayload, ErrorClass, FailureKind, Request};
use atlas::RetryPolicy;
use common::mocks::{fast_retry, invoker, registry_with, ScriptedAgent};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SEO: &str = "seo-optimizer";

fn payload() -> AgentPayload {
    AgentPayload::from_request(&Request::new("website for my bakery"), Default::default())
}

fn circuit(threshold: u32) -> CircuitBreakerConfig {
    CircuitBreakerConfig::new(threshold, Duration::from_secs(60))
}

fn io_error() -> Result<serde_json::Value, AgentError> {
    Err(AgentError::Io("connection reset".into()))
}

// =============================================================================
// Retry
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried_until_success() {
    let agent = ScriptedAgent::new(SEO).then(io_error()).then(io_error());
    let invoker = invoker(
        registry_with(&[&agent]),
        circuit(5),
        fast_retry(),
        Duration::from_secs(1),
    );

    let result = invoker.invoke(SEO, &payload(), &CancellationToken::new()).await;

    assert!(result.is_success());
    assert_eq!(result.attempts, 3);
    assert_eq!(agent.calls(), 3);

    // The final success wipes the failure streak
    let snapshot = invoker.breaker().snapshot_of(SEO).unwrap();
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_fall_back() {
    let agent = ScriptedAgent::new(SEO).always(Err(AgentError::Unavailable("503".into())));
    let invoker = invoker(
        registry_with(&[&agent]),
        circuit(5),
        fast_retry(),
        Duration::from_secs(1),
    );

    let result = invoker.invoke(SEO, &payload(), &CancellationToken::new()).await;

    assert!(result.is_degraded());
    assert_eq!(result.error_class(), Some(ErrorClass::Transient));
    assert_eq!(result.failure_kind(), Some(FailureKind::Unavailable));
    assert_eq!(result.attempts, 3);
    assert_eq!(agent.calls(), 3);

    let fallback = result.usable_payload().unwrap();
    assert_eq!(fallback["fallback"], true);
    assert_eq!(fallback["agent"], SEO);
    assert_eq!(fallback["family"], "website");

    let snapshot = invoker.breaker().snapshot_of(SEO).unwrap();
    assert_eq!(snapshot.consecutive_failures, 3);
    assert_eq!(snapshot.state, CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_waits_between_attempts() {
    let agent = ScriptedAgent::new(SEO).always(io_error());
    let retry = RetryPolicy::new(3, Duration::from_millis(200), Duration::from_secs(5));
    let invoker = invoker(registry_with(&[&agent]), circuit(5), retry, Duration::from_secs(1));

    let started = tokio::time::Instant::now();
    invoker.invoke(SEO, &payload(), &CancellationToken::new()).await;

    // 200ms after the first failure, 400ms after the second
    assert!(started.elapsed() >= Duration::from_millis(600));
}

#[tokio::test(start_paused = true)]
async fn test_permanent_failure_is_not_retried() {
    let agent =
        ScriptedAgent::new(SEO).always(Err(AgentError::InvalidInput("no business type".into())));
    let invoker = invoker(
        registry_with(&[&agent]),
        circuit(1),
        fast_retry(),
        Duration::from_secs(1),
    );

    let result = invoker.invoke(SEO, &payload(), &CancellationToken::new()).await;

    assert!(result.is_failed());
    assert_eq!(result.error_class(), Some(ErrorClass::Permanent));
    assert_eq!(result.failure_kind(), Some(FailureKind::InvalidInput));
    assert_eq!(result.attempts, 1);
    assert_eq!(agent.calls(), 1);
    assert!(result.usable_payload().is_none());

    // Even with a threshold of one the circuit stays closed
    assert_eq!(invoker.breaker().state(SEO), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_slow_attempt_times_out_as_transient() {
    let agent = ScriptedAgent::new(SEO).with_delay(Duration::from_secs(10));
    let invoker = invoker(
        registry_with(&[&agent]),
        circuit(5),
        RetryPolicy::no_retry(),
        Duration::from_secs(1),
    );

    let result = invoker.invoke(SEO, &payload(), &CancellationToken::new()).await;

    assert!(result.is_degraded());
    assert_eq!(result.error_class(), Some(ErrorClass::Transient));
    assert_eq!(result.failure_kind(), Some(FailureKind::Timeout));
    assert_eq!(result.attempts, 1);
}

// =============================================================================
// Circuit breaking
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_open_circuit_short_circuits_to_fallback() {
    let agent = ScriptedAgent::new(SEO).then(io_error()).then(io_error());
    let invoker = invoker(
        registry_with(&[&agent]),
        circuit(2),
        RetryPolicy::no_retry(),
        Duration::from_secs(1),
    );
    let cancel = CancellationToken::new();

    invoker.invoke(SEO, &payload(), &cancel).await;
    invoker.invoke(SEO, &payload(), &cancel).await;
    assert_eq!(invoker.breaker().state(SEO), CircuitState::Open);

    let rejected = invoker.invoke(SEO, &payload(), &cancel).await;
    assert!(rejected.is_degraded());
    assert_eq!(rejected.error_class(), Some(ErrorClass::CircuitOpen));
    assert_eq!(rejected.attempts, 0);
    assert_eq!(agent.calls(), 2);

    // After the cooldown one probe goes through and closes the circuit
    tokio::time::advance(Duration::from_secs(61)).await;
    let probed = invoker.invoke(SEO, &payload(), &cancel).await;
    assert!(probed.is_success());
    assert_eq!(agent.calls(), 3);
    assert_eq!(invoker.breaker().state(SEO), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_failed_probe_reopens_circuit() {
    let agent = ScriptedAgent::new(SEO).always(io_error());
    let invoker = invoker(
        registry_with(&[&agent]),
        circuit(1),
        RetryPolicy::no_retry(),
        Duration::from_secs(1),
    );
    let cancel = CancellationToken::new();

    invoker.invoke(SEO, &payload(), &cancel).await;
    tokio::time::advance(Duration::from_secs(61)).await;
    let probed = invoker.invoke(SEO, &payload(), &cancel).await;

    assert!(probed.is_degraded());
    assert_eq!(agent.calls(), 2);
    let snapshot = invoker.breaker().snapshot_of(SEO).unwrap();
    assert_eq!(snapshot.state, CircuitState::Open);
    assert_eq!(snapshot.trips, 2);
}

#[tokio::test(start_paused = true)]
async fn test_permanently_failing_probe_keeps_agent_isolated() {
    let agent = ScriptedAgent::new(SEO)
        .then(io_error())
        .always(Err(AgentError::Internal("template engine crashed".into())));
    let invoker = invoker(
        registry_with(&[&agent]),
        CircuitBreakerConfig::new(1, Duration::from_secs(10)),
        RetryPolicy::no_retry(),
        Duration::from_secs(1),
    );
    let cancel = CancellationToken::new();

    invoker.invoke(SEO, &payload(), &cancel).await;
    assert_eq!(invoker.breaker().state(SEO), CircuitState::Open);

    tokio::time::advance(Duration::from_secs(11)).await;
    let probed = invoker.invoke(SEO, &payload(), &cancel).await;
    assert!(probed.is_failed());
    assert_eq!(probed.failure_kind(), Some(FailureKind::Internal));
    assert_eq!(invoker.breaker().state(SEO), CircuitState::Open);

    // Within the new cooldown nothing reaches the agent
    for _ in 0..3 {
        let rejected = invoker.invoke(SEO, &payload(), &cancel).await;
        assert_eq!(rejected.error_class(), Some(ErrorClass::CircuitOpen));
    }
    assert_eq!(agent.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_permanent_failure_does_not_reset_transient_streak() {
    let agent = ScriptedAgent::new(SEO)
        .then(io_error())
        .then(io_error())
        .then(Err(AgentError::InvalidInput("missing location".into())))
        .always(io_error());
    let invoker = invoker(
        registry_with(&[&agent]),
        circuit(3),
        RetryPolicy::no_retry(),
        Duration::from_secs(1),
    );
    let cancel = CancellationToken::new();

    for _ in 0..3 {
        invoker.invoke(SEO, &payload(), &cancel).await;
    }
    let snapshot = invoker.breaker().snapshot_of(SEO).unwrap();
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.consecutive_failures, 2);

    invoker.invoke(SEO, &payload(), &cancel).await;
    assert_eq!(invoker.breaker().state(SEO), CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_circuit_opening_mid_retry_stops_retrying() {
    let agent = ScriptedAgent::new(SEO).always(io_error());
    let invoker = invoker(
        registry_with(&[&agent]),
        circuit(2),
        fast_retry(),
        Duration::from_secs(1),
    );

    let result = invoker.invoke(SEO, &payload(), &CancellationToken::new()).await;

    assert!(result.is_degraded());
    assert_eq!(result.error_class(), Some(ErrorClass::CircuitOpen));
    assert_eq!(result.failure_kind(), Some(FailureKind::CircuitOpen));
    assert_eq!(result.attempts, 2);
    assert_eq!(agent.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_agent_reported_circuit_open_leaves_breaker_alone() {
    let agent = ScriptedAgent::new(SEO).always(Err(AgentError::CircuitOpen("upstream-api".into())));
    let invoker = invoker(
        registry_with(&[&agent]),
        circuit(1),
        fast_retry(),
        Duration::from_secs(1),
    );

    let result = invoker.invoke(SEO, &payload(), &CancellationToken::new()).await;

    assert!(result.is_degraded());
    assert_eq!(result.error_class(), Some(ErrorClass::CircuitOpen));
    assert_eq!(result.attempts, 1);

    let snapshot = invoker.breaker().snapshot_of(SEO).unwrap();
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_circuits_are_independent_per_agent() {
    let flaky = ScriptedAgent::new(SEO).always(io_error());
    let healthy = ScriptedAgent::new("content-manager");
    let invoker = invoker(
        registry_with(&[&flaky, &healthy]),
        circuit(1),
        RetryPolicy::no_retry(),
        Duration::from_secs(1),
    );
    let cancel = CancellationToken::new();

    invoker.invoke(SEO, &payload(), &cancel).await;
    let result = invoker.invoke("content-manager", &payload(), &cancel).await;

    assert!(result.is_success());
    assert_eq!(invoker.breaker().state(SEO), CircuitState::Open);
    assert_eq!(invoker.breaker().state("content-manager"), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_manual_reset_closes_circuit() {
    let agent = ScriptedAgent::new(SEO).then(io_error());
    let invoker = invoker(
        registry_with(&[&agent]),
        circuit(1),
        RetryPolicy::no_retry(),
        Duration::from_secs(1),
    );
    let cancel = CancellationToken::new();

    invoker.invoke(SEO, &payload(), &cancel).await;
    assert_eq!(invoker.breaker().state(SEO), CircuitState::Open);

    assert!(invoker.breaker().reset(SEO));
    assert!(invoker.invoke(SEO, &payload(), &cancel).await.is_success());
    assert!(!invoker.breaker().reset("never-called"));
}

// =============================================================================
// Loading and cancellation
// =============================================================================

#[tokio::test]
async fn test_failed_initialization_serves_fallback_without_calls() {
    let agent = ScriptedAgent::new("social-media").failing_init();
    let invoker = invoker(
        registry_with(&[&agent]),
        circuit(5),
        fast_retry(),
        Duration::from_secs(1),
    );

    let result = invoker
        .invoke("social-media", &payload(), &CancellationToken::new())
        .await;

    assert!(result.is_degraded());
    assert_eq!(result.error_class(), Some(ErrorClass::Permanent));
    assert_eq!(result.failure_kind(), Some(FailureKind::Initialization));
    assert_eq!(result.attempts, 0);
    assert_eq!(agent.calls(), 0);
    assert_eq!(result.usable_payload().unwrap()["fallback"], true);

    // Fallback handles never create a circuit
    assert!(invoker.breaker().snapshot_of("social-media").is_none());
}

#[tokio::test]
async fn test_unknown_agent_fails_permanently() {
    let invoker = invoker(
        registry_with(&[]),
        circuit(5),
        fast_retry(),
        Duration::from_secs(1),
    );

    let result = invoker
        .invoke("payroll", &payload(), &CancellationToken::new())
        .await;

    assert!(result.is_failed());
    assert_eq!(result.failure_kind(), Some(FailureKind::UnsupportedIntent));
    assert_eq!(result.attempts, 0);
}

#[tokio::test]
async fn test_closed_registry_fails_calls() {
    let invoker = invoker(
        registry_with(&[]),
        circuit(5),
        fast_retry(),
        Duration::from_secs(1),
    );
    invoker.registry().shutdown().await;

    let result = invoker.invoke(SEO, &payload(), &CancellationToken::new()).await;

    assert!(result.is_failed());
    assert_eq!(result.failure_kind(), Some(FailureKind::Unavailable));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_abandons_call() {
    let agent = ScriptedAgent::new(SEO).with_delay(Duration::from_secs(30));
    let invoker = invoker(
        registry_with(&[&agent]),
        circuit(5),
        fast_retry(),
        Duration::from_secs(60),
    );
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let result = invoker.invoke(SEO, &payload(), &cancel).await;

    assert!(result.is_failed());
    assert_eq!(result.failure_kind(), Some(FailureKind::Timeout));
    assert_eq!(result.attempts, 1);
    match &result.outcome {
        atlas::types::AgentOutcome::Failed { reason, .. } => assert_eq!(reason, DEADLINE_EXCEEDED),
        other => panic!("unexpected outcome: {:?}", other),
    }

    // A cancelled call is neither a success nor a failure for the circuit
    let snapshot = invoker.breaker().snapshot_of(SEO).unwrap();
    assert_eq!(snapshot.consecutive_failures, 0);
    assert_eq!(snapshot.state, CircuitState::Closed);
}
