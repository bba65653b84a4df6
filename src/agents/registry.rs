//! Agent Registry and Loader
//!
//! Resolves agent identifiers to initialized handles. Each agent id owns a
//! `OnceCell`, so initialization runs at most once per id and two ids never
//! wait on each other.
//!
//! ## Fallback substitution
//!
//! When an agent's `initialize()` fails, the registry hands out a
//! [`FallbackAgent`] for that id instead. The substitution is logged once
//! and kept for the rest of the process; the real agent is not retried.

use crate::agents::builtin::BuiltinAgent;
use crate::agents::fallback::FallbackAgent;
use crate::agents::{Agent, AgentFamily, BUILTIN_AGENTS};
use crate::types::{AgentError, AgentPayload, AppError, Result};
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Creates a fresh, uninitialized agent instance
pub type AgentFactory = Arc<dyn Fn() -> Box<dyn Agent> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleKind {
    Live,
    Fallback { reason: String },
}

/// An initialized agent ready to take requests
pub struct AgentHandle {
    id: String,
    agent: Box<dyn Agent>,
    kind: HandleKind,
}

impl AgentHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn agent(&self) -> &dyn Agent {
        self.agent.as_ref()
    }

    pub fn kind(&self) -> &HandleKind {
        &self.kind
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.kind, HandleKind::Fallback { .. })
    }
}

impl std::fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    NotLoaded,
    Live,
    Fallback,
}

/// Operator view of one registered agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: String,
    pub family: AgentFamily,
    pub status: AgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

/// Outcome of [`AgentRegistry::initialize_all`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadReport {
    pub live: Vec<String>,
    pub fallback: Vec<String>,
}

/// Outcome of [`AgentRegistry::shutdown`]
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    pub stopped: Vec<String>,
    pub errors: Vec<(String, AgentError)>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

struct Slot {
    factory: AgentFactory,
    handle: OnceCell<Arc<AgentHandle>>,
}

/// Registry of agent factories and their lazily initialized handles
pub struct AgentRegistry {
    slots: BTreeMap<String, Slot>,
    closed: AtomicBool,
}

impl AgentRegistry {
    pub fn builder() -> AgentRegistryBuilder {
        AgentRegistryBuilder::new()
    }

    /// Registered agent ids, sorted
    pub fn agent_ids(&self) -> Vec<String> {
        self.slots.keys().cloned().collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn status(&self, id: &str) -> Option<AgentStatus> {
        self.slots.get(id).map(|slot| match slot.handle.get() {
            None => AgentStatus::NotLoaded,
            Some(handle) if handle.is_fallback() => AgentStatus::Fallback,
            Some(_) => AgentStatus::Live,
        })
    }

    pub fn describe(&self) -> Vec<AgentInfo> {
        self.slots
            .iter()
            .map(|(id, slot)| {
                let handle = slot.handle.get();
                let fallback_reason = handle.and_then(|h| match h.kind() {
                    HandleKind::Fallback { reason } => Some(reason.clone()),
                    HandleKind::Live => None,
                });
                AgentInfo {
                    id: id.clone(),
                    family: AgentFamily::of(id),
                    status: self.status(id).unwrap_or(AgentStatus::NotLoaded),
                    fallback_reason,
                }
            })
            .collect()
    }

    /// Return the initialized handle for `id`, initializing it on first use
    pub async fn load(&self, id: &str) -> Result<Arc<AgentHandle>> {
        if self.is_closed() {
            return Err(AppError::Unavailable(format!(
                "Agent registry is shut down, cannot load '{}'",
                id
            )));
        }

        let slot = self
            .slots
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("Agent '{}' is not registered", id)))?;

        let handle = slot
            .handle
            .get_or_init(|| Self::instantiate(id, &slot.factory))
            .await;

        Ok(Arc::clone(handle))
    }

    async fn instantiate(id: &str, factory: &AgentFactory) -> Arc<AgentHandle> {
        let agent = factory();
        match agent.initialize().await {
            Ok(()) => {
                info!(agent = id, "Agent initialized");
                Arc::new(AgentHandle {
                    id: id.to_string(),
                    agent,
                    kind: HandleKind::Live,
                })
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(agent = id, error = %reason, "Agent failed to initialize, substituting fallback");
                Arc::new(AgentHandle {
                    id: id.to_string(),
                    agent: Box::new(FallbackAgent::new(id, reason.clone())),
                    kind: HandleKind::Fallback { reason },
                })
            }
        }
    }

    /// Load every registered agent concurrently
    pub async fn initialize_all(&self) -> Result<LoadReport> {
        let ids = self.agent_ids();
        let loaded = join_all(ids.iter().map(|id| self.load(id))).await;

        let mut report = LoadReport::default();
        for (id, handle) in ids.into_iter().zip(loaded) {
            if handle?.is_fallback() {
                report.fallback.push(id);
            } else {
                report.live.push(id);
            }
        }

        info!(
            live = report.live.len(),
            fallback = report.fallback.len(),
            "Agent registry initialized"
        );
        Ok(report)
    }

    /// Shut down every loaded agent. Individual failures are collected, not
    /// propagated. Later calls return an empty report.
    pub async fn shutdown(&self) -> ShutdownReport {
        if self.closed.swap(true, Ordering::AcqRel) {
            return ShutdownReport::default();
        }

        let loaded: Vec<Arc<AgentHandle>> = self
            .slots
            .values()
            .filter_map(|slot| slot.handle.get().cloned())
            .collect();

        let outcomes = join_all(loaded.iter().map(|handle| async move {
            let outcome = match handle.kind() {
                HandleKind::Live => handle.agent().shutdown().await,
                HandleKind::Fallback { .. } => Ok(()),
            };
            (handle.id().to_string(), outcome)
        }))
        .await;

        let mut report = ShutdownReport::default();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => report.stopped.push(id),
                Err(e) => {
                    warn!(agent = %id, error = %e, "Agent shutdown failed");
                    report.errors.push((id, e));
                }
            }
        }

        info!(
            stopped = report.stopped.len(),
            errors = report.errors.len(),
            "Agent registry shut down"
        );
        report
    }
}

/// Stand-in produced for agents disabled in configuration
struct DisabledAgent {
    id: String,
}

#[async_trait]
impl Agent for DisabledAgent {
    fn id(&self) -> &str {
        &self.id
    }

    async fn initialize(&self) -> std::result::Result<(), AgentError> {
        Err(AgentError::Initialization(format!(
            "agent '{}' is disabled by configuration",
            self.id
        )))
    }

    async fn handle_request(
        &self,
        _payload: &AgentPayload,
    ) -> std::result::Result<serde_json::Value, AgentError> {
        Err(AgentError::Unavailable(format!("agent '{}' is disabled", self.id)))
    }
}

/// Builder for creating AgentRegistry with fluent API
pub struct AgentRegistryBuilder {
    factories: BTreeMap<String, AgentFactory>,
    disabled: HashSet<String>,
}

impl AgentRegistryBuilder {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
            disabled: HashSet::new(),
        }
    }

    /// Register the built-in agent catalog
    pub fn with_builtin_agents(mut self) -> Self {
        for id in BUILTIN_AGENTS {
            let factory: AgentFactory = Arc::new(move || -> Box<dyn Agent> {
                match BuiltinAgent::new(id) {
                    Some(agent) => Box::new(agent),
                    None => Box::new(DisabledAgent { id: id.to_string() }),
                }
            });
            self.factories.insert(id.to_string(), factory);
        }
        self
    }

    /// Register (or replace) an agent factory
    pub fn with_agent<F>(mut self, id: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Agent> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
        self
    }

    /// Mark an agent as disabled; it will resolve to its fallback
    pub fn disable(mut self, id: impl Into<String>) -> Self {
        self.disabled.insert(id.into());
        self
    }

    /// Apply `[agents.<id>] enabled = false` entries
    pub fn with_agent_settings<'a>(
        mut self,
        settings: impl IntoIterator<Item = (&'a String, &'a crate::utils::toml_config::AgentSettings)>,
    ) -> Self {
        for (id, agent) in settings {
            if !agent.enabled {
                self.disabled.insert(id.clone());
            }
        }
        self
    }

    pub fn build(self) -> AgentRegistry {
        let disabled = self.disabled;
        let slots = self
            .factories
            .into_iter()
            .map(|(id, factory)| {
                let factory = if disabled.contains(&id) {
                    let disabled_id = id.clone();
                    Arc::new(move || -> Box<dyn Agent> {
                        Box::new(DisabledAgent {
                            id: disabled_id.clone(),
                        })
                    }) as AgentFactory
                } else {
                    factory
                };
                (
                    id,
                    Slot {
                        factory,
                        handle: OnceCell::new(),
                    },
                )
            })
            .collect();

        AgentRegistry {
            slots,
            closed: AtomicBool::new(false),
        }
    }

    pub fn build_arc(self) -> Arc<AgentRegistry> {
        Arc::new(self.build())
    }
}

impl Default for AgentRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
