//! Fallback agent and generic fallback payloads
//!
//! Every fallback payload carries `"fallback": true`, the agent id and the
//! reason so callers can tell substituted output from real output.

use crate::agents::{Agent, AgentFamily};
use crate::types::{AgentError, AgentPayload};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Generic payload standing in for `agent`'s real output
pub fn fallback_payload(agent: &str, reason: &str) -> Value {
    let family = AgentFamily::of(agent);
    let body = match family {
        AgentFamily::Website => json!({
            "message": "Baseline website package applied",
            "pages": ["home", "about", "services", "contact"],
            "seo": { "technical_baseline": true },
        }),
        AgentFamily::Marketing => json!({
            "message": "Baseline marketing framework applied",
            "channels": ["social", "local_listings"],
            "schedule": "weekly",
        }),
        AgentFamily::Analytics => json!({
            "message": "Baseline analytics tracking applied",
            "metrics": ["visits", "enquiries", "conversions"],
        }),
        AgentFamily::Communication => json!({
            "message": "Your request has been received. Our team will get back to you shortly.",
            "channel": "email",
        }),
        AgentFamily::Quality => json!({
            "message": "Automated quality review unavailable; outputs were passed through unreviewed",
            "reviewed": false,
        }),
        AgentFamily::General => json!({
            "message": format!("{} is temporarily running in degraded mode", agent),
        }),
    };

    let mut payload = json!({
        "fallback": true,
        "agent": agent,
        "family": family.as_str(),
        "reason": reason,
    });
    if let (Some(target), Value::Object(extra)) = (payload.as_object_mut(), body) {
        target.extend(extra);
    }
    payload
}

/// Stand-in for an agent whose initialization failed
///
/// Handed out by the registry in place of the real agent. It never fails
/// and always answers with [`fallback_payload`].
pub struct FallbackAgent {
    id: String,
    reason: String,
}

impl FallbackAgent {
    pub fn new(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[async_trait]
impl Agent for FallbackAgent {
    fn id(&self) -> &str {
        &self.id
    }

    async fn handle_request(&self, _payload: &AgentPayload) -> Result<Value, AgentError> {
        Ok(fallback_payload(&self.id, &self.reason))
    }
}
