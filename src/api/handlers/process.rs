//! Request processing handlers
//!
//! Both endpoints take the same JSON body as the library's [`Request`].
//! A body that does not deserialize is reported as a validation error.

use crate::{
    agents::AgentPlan,
    types::{AggregatedResponse, AppError, Request, Result},
    AppState,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

fn accept(body: std::result::Result<Json<Request>, JsonRejection>) -> Result<Request> {
    body.map(|Json(request)| request)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

/// Run a request through the orchestrator
pub async fn process(
    State(state): State<AppState>,
    body: std::result::Result<Json<Request>, JsonRejection>,
) -> Result<Json<AggregatedResponse>> {
    let request = accept(body)?;
    let response = state.orchestrator.process(request).await?;
    Ok(Json(response))
}

/// Return the agent plan for a request without invoking any agent
pub async fn plan(
    State(state): State<AppState>,
    body: std::result::Result<Json<Request>, JsonRejection>,
) -> Result<Json<AgentPlan>> {
    let request = accept(body)?;
    Ok(Json(state.orchestrator.plan(&request)?))
}
