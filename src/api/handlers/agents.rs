use crate::{
    agents::{registry::AgentInfo, AgentMetrics},
    AppState,
};
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct AgentView {
    #[serde(flatten)]
    pub info: AgentInfo,
    /// Zeroed until the agent has been called
    pub metrics: AgentMetrics,
}

/// List every registered agent with its family, load status and call metrics
pub async fn list_agents(State(state): State<AppState>) -> Json<Vec<AgentView>> {
    let orchestrator = &state.orchestrator;
    let mut metrics = orchestrator.agent_metrics();
    let agents = orchestrator
        .registry()
        .describe()
        .into_iter()
        .map(|info| AgentView {
            metrics: metrics.remove(&info.id).unwrap_or_default(),
            info,
        })
        .collect();
    Json(agents)
}
