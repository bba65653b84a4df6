//! Request orchestration
//!
//! [`Orchestrator::process`] validates a request, asks the [`Router`] for a
//! plan and runs it stage by stage. Agents inside a stage run as separate
//! tasks and the stage is a join point; a stage only starts when earlier
//! stages produced at least one usable payload. The whole request runs
//! under one deadline, propagated to every call through a
//! [`CancellationToken`].

use crate::agents::admission::{Admission, ANONYMOUS_CALLER};
use crate::agents::registry::{AgentRegistry, AgentRegistryBuilder};
use crate::agents::router::{AgentPlan, Router, Stage};
use crate::resilience::invoker::FaultTolerantInvoker;
use crate::resilience::{CircuitBreaker, CircuitStateStore};
use crate::utils::toml_config::AppConfig;
use crate::types::{
    AgentOutcome, AgentPayload, AgentResult, AggregatedResponse, AppError, ErrorClass,
    FailureKind, Request, ResponseStatus, Result,
};
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn, Instrument};

/// Maximum accepted length of the intent text, in characters
pub const MAX_INTENT_CHARS: usize = 4000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// End-to-end deadline for one request (default: 30 seconds)
    pub request_timeout: Duration,

    /// Requests processed at once; more are rejected (default: 10)
    pub max_concurrent_requests: usize,

    /// Requests accepted per caller per hour, 0 for no limit (default: 100)
    pub requests_per_hour: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_concurrent_requests: 10,
            requests_per_hour: 100,
        }
    }
}

// ============= Statistics =============

#[derive(Debug, Default)]
pub struct OrchestratorStats {
    requests: AtomicU64,
    succeeded: AtomicU64,
    degraded: AtomicU64,
    partial: AtomicU64,
    rejected: AtomicU64,
    throttled: AtomicU64,
    agents: Mutex<BTreeMap<String, AgentCounters>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorStatsSnapshot {
    pub requests: u64,
    pub succeeded: u64,
    pub degraded: u64,
    pub partial: u64,
    /// Failed validation
    pub rejected: u64,
    /// Turned away by rate or concurrency limits
    pub throttled: u64,
}

#[derive(Debug, Default)]
struct AgentCounters {
    calls: u64,
    succeeded: u64,
    degraded: u64,
    failed: u64,
    total_latency_ms: u64,
    last_error: Option<String>,
}

/// Call statistics for one agent since startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub calls: u64,
    pub succeeded: u64,
    pub degraded: u64,
    pub failed: u64,
    /// Share of calls that did not succeed, 0.0 to 1.0
    pub error_rate: f64,
    pub mean_latency_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl AgentCounters {
    fn record(&mut self, result: &AgentResult) {
        self.calls += 1;
        self.total_latency_ms += result.latency_ms;
        match &result.outcome {
            AgentOutcome::Succeeded { .. } => self.succeeded += 1,
            AgentOutcome::Degraded { reason, .. } => {
                self.degraded += 1;
                self.last_error = Some(reason.clone());
            }
            AgentOutcome::Failed { reason, .. } => {
                self.failed += 1;
                self.last_error = Some(reason.clone());
            }
        }
    }

    fn metrics(&self) -> AgentMetrics {
        let calls = self.calls.max(1) as f64;
        AgentMetrics {
            calls: self.calls,
            succeeded: self.succeeded,
            degraded: self.degraded,
            failed: self.failed,
            error_rate: (self.degraded + self.failed) as f64 / calls,
            mean_latency_ms: self.total_latency_ms as f64 / calls,
            last_error: self.last_error.clone(),
        }
    }
}

impl OrchestratorStats {
    fn record(&self, status: ResponseStatus) {
        let counter = match status {
            ResponseStatus::Succeeded => &self.succeeded,
            ResponseStatus::Degraded => &self.degraded,
            ResponseStatus::Partial => &self.partial,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_agents<'a>(&self, results: impl IntoIterator<Item = &'a AgentResult>) {
        let mut agents = self.agents.lock();
        for result in results {
            agents.entry(result.agent.clone()).or_default().record(result);
        }
    }

    pub fn snapshot(&self) -> OrchestratorStatsSnapshot {
        OrchestratorStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
            partial: self.partial.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
        }
    }

    /// Per-agent call statistics, keyed by agent id
    pub fn agent_metrics(&self) -> BTreeMap<String, AgentMetrics> {
        self.agents
            .lock()
            .iter()
            .map(|(agent, counters)| (agent.clone(), counters.metrics()))
            .collect()
    }
}

// ============= Validation =============

fn is_locale(locale: &str) -> bool {
    let mut parts = locale.split(['-', '_']);
    let language_ok = parts
        .next()
        .map(|lang| (2..=3).contains(&lang.len()) && lang.chars().all(|c| c.is_ascii_alphabetic()))
        .unwrap_or(false);
    let region_ok = match parts.next() {
        None => true,
        Some(region) => {
            (region.len() == 2 && region.chars().all(|c| c.is_ascii_alphabetic()))
                || (region.len() == 3 && region.chars().all(|c| c.is_ascii_digit()))
        }
    };
    language_ok && region_ok && parts.next().is_none()
}

/// Check request shape before any agent is involved
pub fn validate_request(request: &Request) -> Result<()> {
    if request.intent.trim().is_empty() {
        return Err(AppError::Validation("intent must not be empty".into()));
    }
    let length = request.intent.chars().count();
    if length > MAX_INTENT_CHARS {
        return Err(AppError::Validation(format!(
            "intent is {} characters long, the limit is {}",
            length, MAX_INTENT_CHARS
        )));
    }
    if request.correlation_id.trim().is_empty() {
        return Err(AppError::Validation(
            "correlation_id must not be empty".into(),
        ));
    }
    if let Some(locale) = request.metadata.locale.as_deref() {
        if !is_locale(locale) {
            return Err(AppError::Validation(format!(
                "locale '{}' is not a language tag like 'en' or 'hi-IN'",
                locale
            )));
        }
    }
    Ok(())
}

// ============= Orchestrator =============

struct StageOutcome {
    results: Vec<AgentResult>,
    timed_out: bool,
}

pub struct Orchestrator {
    router: Router,
    invoker: Arc<FaultTolerantInvoker>,
    config: OrchestratorConfig,
    admission: Admission,
    stats: OrchestratorStats,
}

impl Orchestrator {
    /// Build an orchestrator. Fails when the routing table names an agent
    /// the registry does not know.
    pub fn new(
        router: Router,
        invoker: FaultTolerantInvoker,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        let registry = invoker.registry();
        let mut unknown: Vec<&str> = router
            .table()
            .agent_ids()
            .filter(|id| !registry.contains(id))
            .collect();
        unknown.sort_unstable();
        unknown.dedup();
        if !unknown.is_empty() {
            return Err(AppError::Configuration(format!(
                "Routing table references unregistered agents: {}",
                unknown.join(", ")
            )));
        }

        Ok(Self {
            router,
            invoker: Arc::new(invoker),
            admission: Admission::new(config.max_concurrent_requests, config.requests_per_hour),
            config,
            stats: OrchestratorStats::default(),
        })
    }

    /// Assemble the built-in agents, resilience policy and routing table
    /// described by `config`, with a fresh circuit state store
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let registry = AgentRegistryBuilder::new()
            .with_builtin_agents()
            .with_agent_settings(&config.agents)
            .build_arc();
        let breaker = CircuitBreaker::new(
            config.circuit_breaker(),
            Arc::new(CircuitStateStore::new()),
        );
        let invoker = FaultTolerantInvoker::new(
            registry,
            breaker,
            config.retry_policy(),
            config.call_timeout(),
        );
        let table = config
            .routing_table()
            .map_err(|e| AppError::Configuration(e.to_string()))?;

        Self::new(Router::new(table), invoker, config.orchestrator_config())
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        self.invoker.registry()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        self.invoker.breaker()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn stats(&self) -> OrchestratorStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn agent_metrics(&self) -> BTreeMap<String, AgentMetrics> {
        self.stats.agent_metrics()
    }

    /// Requests currently being processed
    pub fn in_flight(&self) -> usize {
        self.admission.in_flight()
    }

    /// Validate and route without running anything
    pub fn plan(&self, request: &Request) -> Result<AgentPlan> {
        validate_request(request)?;
        Ok(self.router.route(request))
    }

    /// Run a request end to end
    ///
    /// Only admission and validation failures are returned as errors.
    /// Agent failures, fallbacks and the deadline are reported inside the
    /// response.
    #[instrument(skip(self, request), fields(correlation_id = %request.correlation_id))]
    pub async fn process(&self, request: Request) -> Result<AggregatedResponse> {
        let started = Instant::now();
        self.stats.requests.fetch_add(1, Ordering::Relaxed);

        let caller = request.user_id.as_deref().unwrap_or(ANONYMOUS_CALLER);
        let _slot = match self.admission.admit(caller) {
            Ok(slot) => slot,
            Err(e) => {
                self.stats.throttled.fetch_add(1, Ordering::Relaxed);
                warn!(caller, error = %e, "Request not admitted");
                return Err(e);
            }
        };

        if let Err(e) = validate_request(&request) {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "Request rejected");
            return Err(e);
        }

        let plan = self.router.route(&request);
        let deadline = started + self.config.request_timeout;
        let cancel = CancellationToken::new();

        let mut results: BTreeMap<String, AgentResult> = BTreeMap::new();
        let mut upstream: BTreeMap<String, serde_json::Value> = BTreeMap::new();
        let mut skipped: Vec<String> = Vec::new();
        let mut stages_completed = 0;
        let mut timed_out = false;

        for (index, stage) in plan.stages.iter().enumerate() {
            if !timed_out && Instant::now() >= deadline {
                timed_out = true;
            }
            let starved = index > 0 && upstream.is_empty();
            if timed_out || starved {
                if starved && !timed_out {
                    warn!(
                        stage = %stage.intent,
                        "No usable output from earlier stages, skipping stage"
                    );
                }
                skipped.extend(stage.agents.iter().cloned());
                continue;
            }

            let payload = Arc::new(AgentPayload::from_request(&request, upstream.clone()));
            let outcome = self.run_stage(stage, payload, deadline, &cancel).await;
            self.stats.record_agents(&outcome.results);

            for result in outcome.results {
                if let Some(output) = result.usable_payload() {
                    upstream.insert(result.agent.clone(), output.clone());
                }
                results.insert(result.agent.clone(), result);
            }

            if outcome.timed_out {
                timed_out = true;
            } else {
                stages_completed += 1;
            }
        }

        let status = ResponseStatus::evaluate(results.values(), !skipped.is_empty(), timed_out);
        self.stats.record(status);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            status = %status,
            agents = results.len(),
            skipped = skipped.len(),
            stages_completed,
            stages_planned = plan.len(),
            elapsed_ms,
            "Request processed"
        );

        Ok(AggregatedResponse {
            correlation_id: request.correlation_id.clone(),
            status,
            intents: plan.intents.iter().map(|i| i.to_string()).collect(),
            results,
            skipped,
            stages_completed,
            stages_planned: plan.len(),
            timed_out,
            elapsed_ms,
            completed_at: Utc::now(),
        })
    }

    async fn run_stage(
        &self,
        stage: &Stage,
        payload: Arc<AgentPayload>,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> StageOutcome {
        let mut set = JoinSet::new();
        for agent in &stage.agents {
            let invoker = Arc::clone(&self.invoker);
            let payload = Arc::clone(&payload);
            let cancel = cancel.clone();
            let agent = agent.clone();
            set.spawn(
                async move { invoker.invoke(&agent, &payload, &cancel).await }.in_current_span(),
            );
        }

        let mut results = Vec::with_capacity(stage.agents.len());
        let mut timed_out = false;
        let expiry = sleep_until(deadline);
        tokio::pin!(expiry);

        loop {
            tokio::select! {
                joined = set.join_next() => match joined {
                    None => break,
                    Some(Ok(result)) => results.push(result),
                    Some(Err(e)) => warn!(stage = %stage.intent, error = %e, "Agent task aborted"),
                },
                _ = &mut expiry, if !timed_out => {
                    timed_out = true;
                    warn!(
                        stage = %stage.intent,
                        outstanding = set.len(),
                        "Request deadline reached, cancelling outstanding agents"
                    );
                    cancel.cancel();
                }
            }
        }

        // A task that panicked leaves no result behind; record it as failed
        let reported: HashSet<String> = results.iter().map(|r| r.agent.clone()).collect();
        for agent in stage.agents.iter().filter(|a| !reported.contains(*a)) {
            results.push(AgentResult {
                agent: agent.clone(),
                outcome: AgentOutcome::Failed {
                    error: ErrorClass::Permanent,
                    kind: FailureKind::Internal,
                    reason: "agent task aborted".to_string(),
                },
                latency_ms: 0,
                attempts: 0,
            });
        }

        StageOutcome { results, timed_out }
    }
}
