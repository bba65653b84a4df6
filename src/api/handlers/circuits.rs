//! Circuit breaker operator endpoints

use crate::{
    resilience::CircuitSnapshot,
    types::{AppError, Result},
    AppState,
};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

pub async fn list_circuits(State(state): State<AppState>) -> Json<Vec<CircuitSnapshot>> {
    Json(state.orchestrator.breaker().snapshot())
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub agent: String,
    /// False when the agent had never been called, so there was nothing to reset
    pub reset: bool,
}

/// Force an agent's circuit closed
pub async fn reset_circuit(
    State(state): State<AppState>,
    Path(agent): Path<String>,
) -> Result<Json<ResetResponse>> {
    if !state.orchestrator.registry().contains(&agent) {
        return Err(AppError::NotFound(format!("Agent '{}' not found", agent)));
    }

    let reset = state.orchestrator.breaker().reset(&agent);
    Ok(Json(ResetResponse { agent, reset }))
}
