//! Error classification
//!
//! Retry and circuit decisions are made on the class, never on the raw
//! error, so an agent implementation can change its failure modes without
//! touching the policy.

use crate::types::{AgentError, ErrorClass};

/// Classify a raw agent failure. Total over every [`AgentError`] variant.
pub fn classify(error: &AgentError) -> ErrorClass {
    match error {
        AgentError::Timeout(_) | AgentError::Io(_) | AgentError::Unavailable(_) => {
            ErrorClass::Transient
        }
        AgentError::InvalidInput(_)
        | AgentError::UnsupportedIntent(_)
        | AgentError::Initialization(_)
        | AgentError::Internal(_) => ErrorClass::Permanent,
        AgentError::CircuitOpen(_) => ErrorClass::CircuitOpen,
    }
}

/// Map a free-text failure message from an agent backend onto an [`AgentError`].
///
/// Used by agents that wrap foreign errors they cannot type precisely.
/// Connection-level trouble is transient, anything else is permanent.
pub fn from_message(message: impl Into<String>) -> AgentError {
    let message = message.into();
    let lower = message.to_lowercase();

    if lower.contains("timeout") || lower.contains("timed out") {
        AgentError::Timeout(message)
    } else if lower.contains("connection") || lower.contains("broken pipe") {
        AgentError::Io(message)
    } else if lower.contains("service unavailable") || lower.contains("rate limit") {
        AgentError::Unavailable(message)
    } else if lower.contains("validation") || lower.contains("invalid") || lower.contains("missing") {
        AgentError::InvalidInput(message)
    } else {
        AgentError::Internal(message)
    }
}
