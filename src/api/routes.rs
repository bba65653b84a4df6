use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/process", post(crate::api::handlers::process::process))
        .route("/plan", post(crate::api::handlers::process::plan))
        .route("/agents", get(crate::api::handlers::agents::list_agents))
        .route(
            "/circuits",
            get(crate::api::handlers::circuits::list_circuits),
        )
        .route(
            "/circuits/{agent}/reset",
            post(crate::api::handlers::circuits::reset_circuit),
        )
        .route("/health", get(crate::api::handlers::health::health))
}

/// Full application: API routes under `/api` with tracing and CORS layers
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", create_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
