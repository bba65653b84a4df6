//! Mock implementations for testing.
//!
//! This module provides a scriptable agent and builders for registries,
//! invokers and orchestrators that can be used across different test files
//! without duplication.

use async_trait::async_trait;
use atlas::agents::{Agent, AgentRegistry, AgentRegistryBuilder};
use atlas::resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitStateStore};
use atlas::types::{AgentError, AgentPayload};
use atlas::{FaultTolerantInvoker, Orchestrator, OrchestratorConfig, RetryPolicy, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Reply = Result<Value, AgentError>;

/// Agent whose replies are scripted ahead of time.
///
/// Queued replies are used in order; once the queue is empty every call gets
/// the default reply. Clones share the queue and counters, so the handle
/// kept by a test observes the instance the registry created.
///
/// # Examples
///
/// ```
/// use tests::common::mocks::ScriptedAgent;
///
/// // Fails twice with an I/O error, then succeeds
/// let agent = ScriptedAgent::new("seo-optimizer")
///     .then(Err(AgentError::Io("reset".into())))
///     .then(Err(AgentError::Io("reset".into())));
///
/// // Never finishes initialization
/// let agent = ScriptedAgent::new("social-media").failing_init();
/// ```
#[derive(Clone)]
pub struct ScriptedAgent {
    id: String,
    script: Arc<Mutex<VecDeque<Reply>>>,
    default: Reply,
    delay: Option<Duration>,
    fail_init: bool,
    fail_shutdown: bool,
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<AgentPayload>>>,
}

impl ScriptedAgent {
    /// Create an agent that answers `{"agent": id, "ok": true}` by default.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            script: Arc::new(Mutex::new(VecDeque::new())),
            default: Ok(json!({ "agent": id, "ok": true })),
            delay: None,
            fail_init: false,
            fail_shutdown: false,
            calls: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue one reply.
    pub fn then(self, reply: Reply) -> Self {
        self.script.lock().push_back(reply);
        self
    }

    /// Reply used once the queue is empty.
    pub fn always(mut self, reply: Reply) -> Self {
        self.default = reply;
        self
    }

    /// Sleep before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn failing_shutdown(mut self) -> Self {
        self.fail_shutdown = true;
        self
    }

    /// Number of `handle_request` calls that reached this agent.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Payloads received so far, in call order.
    pub fn payloads(&self) -> Vec<AgentPayload> {
        self.seen.lock().clone()
    }

    /// Factory suitable for [`AgentRegistryBuilder::with_agent`].
    pub fn factory(&self) -> impl Fn() -> Box<dyn Agent> + Send + Sync + 'static {
        let agent = self.clone();
        move || -> Box<dyn Agent> { Box::new(agent.clone()) }
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn id(&self) -> &str {
        &self.id
    }

    async fn initialize(&self) -> Result<(), AgentError> {
        if self.fail_init {
            return Err(AgentError::Initialization(format!(
                "{} could not reach its backend",
                self.id
            )));
        }
        Ok(())
    }

    async fn handle_request(&self, payload: &AgentPayload) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(payload.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self.script.lock().pop_front();
        queued.unwrap_or_else(|| self.default.clone())
    }

    async fn shutdown(&self) -> Result<(), AgentError> {
        if self.fail_shutdown {
            return Err(AgentError::Internal(format!("{} failed to flush", self.id)));
        }
        Ok(())
    }
}

/// Agent that panics inside `handle_request`.
pub struct PanickingAgent;

#[async_trait]
impl Agent for PanickingAgent {
    fn id(&self) -> &str {
        "panicking"
    }

    async fn handle_request(&self, _payload: &AgentPayload) -> Reply {
        panic!("agent bug");
    }
}

// ============= Builders =============

/// Retry policy with short delays: 3 attempts, 10ms base, 100ms cap.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(100))
}

/// Registry with the built-in catalog, with the given scripted agents
/// replacing built-ins of the same id.
pub fn registry_with(agents: &[&ScriptedAgent]) -> Arc<AgentRegistry> {
    let mut builder = AgentRegistryBuilder::new().with_builtin_agents();
    for agent in agents {
        builder = builder.with_agent(agent.id.clone(), agent.factory());
    }
    builder.build_arc()
}

/// Invoker over a fresh circuit state store.
pub fn invoker(
    registry: Arc<AgentRegistry>,
    circuit: CircuitBreakerConfig,
    retry: RetryPolicy,
    call_timeout: Duration,
) -> FaultTolerantInvoker {
    let breaker = CircuitBreaker::new(circuit, Arc::new(CircuitStateStore::new()));
    FaultTolerantInvoker::new(registry, breaker, retry, call_timeout)
}

/// Orchestrator with the default routing table and a fresh circuit store.
pub fn orchestrator_with(
    agents: &[&ScriptedAgent],
    retry: RetryPolicy,
    request_timeout: Duration,
) -> Orchestrator {
    let invoker = invoker(
        registry_with(agents),
        CircuitBreakerConfig::default(),
        retry,
        Duration::from_secs(5),
    );
    Orchestrator::new(
        Router::default(),
        invoker,
        OrchestratorConfig {
            request_timeout,
            ..Default::default()
        },
    )
    .expect("default routing table only names built-in agents")
}
