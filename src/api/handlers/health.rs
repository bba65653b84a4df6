use crate::{
    agents::orchestrator::OrchestratorStatsSnapshot,
    resilience::CircuitState,
    utils::toml_config::{OrchestratorSettings, ResilienceSettings},
    AppState,
};
use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: i64,
    pub agents: usize,
    pub open_circuits: usize,
    pub in_flight: usize,
    pub requests: OrchestratorStatsSnapshot,
    /// Effective limits and deadlines
    pub orchestrator: OrchestratorSettings,
    pub resilience: ResilienceSettings,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let orchestrator = &state.orchestrator;
    let open_circuits = orchestrator
        .breaker()
        .snapshot()
        .iter()
        .filter(|circuit| circuit.state != CircuitState::Closed)
        .count();

    let status = if orchestrator.registry().is_closed() {
        "shutting_down"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        agents: orchestrator.registry().agent_ids().len(),
        open_circuits,
        in_flight: orchestrator.in_flight(),
        requests: orchestrator.stats(),
        orchestrator: state.config.orchestrator.clone(),
        resilience: state.config.resilience.clone(),
    })
}
