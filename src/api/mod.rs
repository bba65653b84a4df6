//! HTTP API Handlers and Routes
//!
//! The REST layer for Atlas, built on the Axum web framework. Every
//! endpoint maps onto one orchestrator or registry operation.
//!
//! # API Endpoints
//!
//! - `POST /api/process` - Run a request through the orchestrator
//! - `POST /api/plan` - Show the agent plan for a request without running it
//! - `GET /api/agents` - List registered agents and their load status
//! - `GET /api/circuits` - Circuit breaker state per agent
//! - `POST /api/circuits/{agent}/reset` - Force an agent's circuit closed
//! - `GET /api/health` - Health check with request counters
//!
//! Errors are returned as `{"error": "..."}` with a matching status code.

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;
