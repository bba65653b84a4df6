use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ============= Request Types =============

/// Business metadata attached to an automation request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessMetadata {
    /// Kind of business ("bakery", "clinic", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_type: Option<String>,
    /// Explicit request type ("website", "marketing_campaign", ...)
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub request_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// A business automation request as accepted at ingress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Free-form description of what the business needs
    pub intent: String,
    #[serde(default)]
    pub metadata: BusinessMetadata,
    #[serde(default = "new_correlation_id")]
    pub correlation_id: String,
    /// Caller the request is rate limited under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

impl Request {
    /// Create a request with a fresh correlation id and empty metadata
    pub fn new(intent: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            metadata: BusinessMetadata::default(),
            correlation_id: new_correlation_id(),
            user_id: None,
        }
    }

    pub fn with_metadata(mut self, metadata: BusinessMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = id.into();
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Input handed to a single agent invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPayload {
    pub correlation_id: String,
    pub intent: String,
    pub metadata: BusinessMetadata,
    /// Usable outputs of earlier stages keyed by agent id
    #[serde(default)]
    pub upstream: BTreeMap<String, serde_json::Value>,
}

impl AgentPayload {
    pub fn from_request(request: &Request, upstream: BTreeMap<String, serde_json::Value>) -> Self {
        Self {
            correlation_id: request.correlation_id.clone(),
            intent: request.intent.clone(),
            metadata: request.metadata.clone(),
            upstream,
        }
    }
}

// ============= Agent Result Types =============

/// Classification that drives retry and circuit decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Transient,
    Permanent,
    CircuitOpen,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::Transient => write!(f, "transient"),
            ErrorClass::Permanent => write!(f, "permanent"),
            ErrorClass::CircuitOpen => write!(f, "circuit_open"),
        }
    }
}

/// Concrete failure behind a non-successful agent result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Io,
    Unavailable,
    InvalidInput,
    UnsupportedIntent,
    Initialization,
    CircuitOpen,
    Internal,
}

/// Outcome of one agent invocation after the fault-tolerance policy ran
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentOutcome {
    Succeeded {
        output: serde_json::Value,
    },
    /// A fallback payload stands in for the real output
    Degraded {
        error: ErrorClass,
        kind: FailureKind,
        reason: String,
        fallback: serde_json::Value,
    },
    Failed {
        error: ErrorClass,
        kind: FailureKind,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent: String,
    #[serde(flatten)]
    pub outcome: AgentOutcome,
    pub latency_ms: u64,
    pub attempts: u32,
}

impl AgentResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AgentOutcome::Succeeded { .. })
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.outcome, AgentOutcome::Degraded { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, AgentOutcome::Failed { .. })
    }

    /// Output a later stage can consume: the real output or the fallback payload
    pub fn usable_payload(&self) -> Option<&serde_json::Value> {
        match &self.outcome {
            AgentOutcome::Succeeded { output } => Some(output),
            AgentOutcome::Degraded { fallback, .. } => Some(fallback),
            AgentOutcome::Failed { .. } => None,
        }
    }

    pub fn error_class(&self) -> Option<ErrorClass> {
        match &self.outcome {
            AgentOutcome::Succeeded { .. } => None,
            AgentOutcome::Degraded { error, .. } | AgentOutcome::Failed { error, .. } => {
                Some(*error)
            }
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.outcome {
            AgentOutcome::Succeeded { .. } => None,
            AgentOutcome::Degraded { kind, .. } | AgentOutcome::Failed { kind, .. } => Some(*kind),
        }
    }
}

// ============= Aggregated Response Types =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// Every planned agent succeeded without fallback substitution
    Succeeded,
    /// All planned work produced a usable payload, some of it from fallbacks
    Degraded,
    /// Some planned work produced nothing usable
    Partial,
}

impl ResponseStatus {
    pub fn evaluate<'a>(
        results: impl IntoIterator<Item = &'a AgentResult>,
        skipped_any: bool,
        timed_out: bool,
    ) -> Self {
        if skipped_any || timed_out {
            return ResponseStatus::Partial;
        }

        let mut degraded = false;
        for result in results {
            match result.outcome {
                AgentOutcome::Failed { .. } => return ResponseStatus::Partial,
                AgentOutcome::Degraded { .. } => degraded = true,
                AgentOutcome::Succeeded { .. } => {}
            }
        }

        if degraded {
            ResponseStatus::Degraded
        } else {
            ResponseStatus::Succeeded
        }
    }
}

impl std::fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseStatus::Succeeded => write!(f, "succeeded"),
            ResponseStatus::Degraded => write!(f, "degraded"),
            ResponseStatus::Partial => write!(f, "partial"),
        }
    }
}

/// The single structured answer to a request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedResponse {
    pub correlation_id: String,
    pub status: ResponseStatus,
    /// Intents the router matched, in stage order
    pub intents: Vec<String>,
    pub results: BTreeMap<String, AgentResult>,
    /// Agents of stages that never ran
    #[serde(default)]
    pub skipped: Vec<String>,
    pub stages_completed: usize,
    pub stages_planned: usize,
    #[serde(default)]
    pub timed_out: bool,
    pub elapsed_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl AggregatedResponse {
    pub fn result(&self, agent: &str) -> Option<&AgentResult> {
        self.results.get(agent)
    }
}

// ============= Error Types =============

/// Raw failure reported by an agent or by the machinery around it
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    #[error("Agent timed out: {0}")]
    Timeout(String),

    #[error("Transient I/O failure: {0}")]
    Io(String),

    #[error("Agent temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported intent: {0}")]
    UnsupportedIntent(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Circuit open for agent '{0}'")]
    CircuitOpen(String),

    #[error("Internal agent error: {0}")]
    Internal(String),
}

impl AgentError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AgentError::Timeout(_) => FailureKind::Timeout,
            AgentError::Io(_) => FailureKind::Io,
            AgentError::Unavailable(_) => FailureKind::Unavailable,
            AgentError::InvalidInput(_) => FailureKind::InvalidInput,
            AgentError::UnsupportedIntent(_) => FailureKind::UnsupportedIntent,
            AgentError::Initialization(_) => FailureKind::Initialization,
            AgentError::CircuitOpen(_) => FailureKind::CircuitOpen,
            AgentError::Internal(_) => FailureKind::Internal,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Overloaded: {0}")]
    Overloaded(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::Validation(msg) => (axum::http::StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (axum::http::StatusCode::NOT_FOUND, msg),
            AppError::Configuration(msg) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Unavailable(msg) => (axum::http::StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::RateLimited(msg) => (axum::http::StatusCode::TOO_MANY_REQUESTS, msg),
            AppError::Overloaded(msg) => (axum::http::StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
