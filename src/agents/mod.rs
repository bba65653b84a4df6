pub mod admission;
pub mod builtin;
pub mod fallback;
pub mod orchestrator;
pub mod registry;
pub mod router;

use crate::types::{AgentError, AgentPayload};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use fallback::FallbackAgent;
pub use orchestrator::{AgentMetrics, Orchestrator, OrchestratorConfig};
pub use registry::{AgentHandle, AgentRegistry, AgentRegistryBuilder, AgentStatus};
pub use router::{AgentPlan, Intent, Router, RoutingTable, Stage};

// ============= Agent Identifiers =============

pub const WEBSITE_BUILDER: &str = "website-builder";
pub const CONTENT_MANAGER: &str = "content-manager";
pub const SEO_OPTIMIZER: &str = "seo-optimizer";
pub const CAMPAIGN_MANAGER: &str = "campaign-manager";
pub const SOCIAL_MEDIA: &str = "social-media";
pub const LOCAL_MARKETING: &str = "local-marketing";
pub const DATA_COLLECTOR: &str = "data-collector";
pub const INSIGHTS_ENGINE: &str = "insights-engine";
pub const REPORT_GENERATOR: &str = "report-generator";
pub const CUSTOMER_COMMUNICATION: &str = "customer-communication";
pub const QUALITY_CONTROL: &str = "quality-control";

/// Every agent shipped with the server
pub const BUILTIN_AGENTS: &[&str] = &[
    WEBSITE_BUILDER,
    CONTENT_MANAGER,
    SEO_OPTIMIZER,
    CAMPAIGN_MANAGER,
    SOCIAL_MEDIA,
    LOCAL_MARKETING,
    DATA_COLLECTOR,
    INSIGHTS_ENGINE,
    REPORT_GENERATOR,
    CUSTOMER_COMMUNICATION,
    QUALITY_CONTROL,
];

/// Business area an agent works in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentFamily {
    Website,
    Marketing,
    Analytics,
    Communication,
    /// Reviews the outputs of the other families
    Quality,
    General,
}

impl AgentFamily {
    pub fn of(agent_id: &str) -> Self {
        match agent_id {
            WEBSITE_BUILDER | CONTENT_MANAGER | SEO_OPTIMIZER => AgentFamily::Website,
            CAMPAIGN_MANAGER | SOCIAL_MEDIA | LOCAL_MARKETING => AgentFamily::Marketing,
            DATA_COLLECTOR | INSIGHTS_ENGINE | REPORT_GENERATOR => AgentFamily::Analytics,
            CUSTOMER_COMMUNICATION => AgentFamily::Communication,
            QUALITY_CONTROL => AgentFamily::Quality,
            _ => AgentFamily::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentFamily::Website => "website",
            AgentFamily::Marketing => "marketing",
            AgentFamily::Analytics => "analytics",
            AgentFamily::Communication => "communication",
            AgentFamily::Quality => "quality",
            AgentFamily::General => "general",
        }
    }
}

/// A worker performing one business-automation task
///
/// The registry drives the lifecycle: `initialize` runs once before the
/// first request, `shutdown` once when the registry closes.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable identifier, e.g. `"seo-optimizer"`
    fn id(&self) -> &str;

    async fn initialize(&self) -> Result<(), AgentError> {
        Ok(())
    }

    /// Handle one request and return the agent's structured output
    async fn handle_request(&self, payload: &AgentPayload) -> Result<serde_json::Value, AgentError>;

    async fn shutdown(&self) -> Result<(), AgentError> {
        Ok(())
    }
}
