//! # Atlas - business automation orchestrator
//!
//! Atlas coordinates specialized business-automation agents (website,
//! content, SEO, marketing, analytics, customer communication, quality
//! control) behind one orchestration layer. A request is routed to ordered
//! stages of agents, every agent call runs behind a circuit breaker with
//! bounded retries and fallbacks, and the outputs are merged into one
//! structured response.
//!
//! Atlas can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `atlas-server` binary
//! 2. **As a library** - Embed the [`Orchestrator`] in your own service
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use atlas::{AppConfig, Orchestrator, Request};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::from_config(&AppConfig::default())?;
//!
//!     let response = orchestrator
//!         .process(Request::new("I need a website and marketing for my shop"))
//!         .await?;
//!
//!     println!("{} ({} agents)", response.status, response.results.len());
//!     Ok(())
//! }
//! ```
//!
//! ### Custom agents
//!
//! ```rust,ignore
//! use atlas::{AgentRegistryBuilder, CircuitBreaker, CircuitStateStore, FaultTolerantInvoker};
//! use std::sync::Arc;
//!
//! let registry = AgentRegistryBuilder::new()
//!     .with_builtin_agents()
//!     .with_agent("website-builder", || Box::new(MyWebsiteBuilder::default()))
//!     .build_arc();
//! let breaker = CircuitBreaker::new(Default::default(), Arc::new(CircuitStateStore::new()));
//! let invoker = FaultTolerantInvoker::new(registry, breaker, Default::default(), timeout);
//! ```
//!
//! ## Modules
//!
//! - [`agents`] - Agent trait, registry/loader, router and orchestrator
//! - [`resilience`] - Circuit breaker, retry policy and fault-tolerant invoker
//! - [`api`] - REST API handlers and routes
//! - [`cli`] - Command-line interface
//! - [`types`] - Requests, results, responses and errors
//! - [`utils`] - TOML configuration

#![warn(rustdoc::missing_crate_level_docs)]

/// Agents, registry, router and orchestrator.
pub mod agents;
/// HTTP API handlers and routes.
pub mod api;
/// Command-line interface.
pub mod cli;
/// Circuit breaking, retries and fallbacks around agent calls.
pub mod resilience;
/// Core types (requests, results, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;

// Re-export commonly used types
pub use agents::{
    Agent, AgentPlan, AgentRegistry, AgentRegistryBuilder, Orchestrator, OrchestratorConfig,
    Router, RoutingTable,
};
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitStateStore, FaultTolerantInvoker, RetryPolicy,
};
pub use types::{
    AgentError, AgentResult, AggregatedResponse, AppError, BusinessMetadata, Request,
    ResponseStatus, Result,
};
pub use utils::toml_config::AppConfig;

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub config: Arc<AppConfig>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, config: Arc<AppConfig>) -> Self {
        Self {
            orchestrator,
            config,
            started_at: Utc::now(),
        }
    }
}
