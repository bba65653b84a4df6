//! Handlers for the non-server CLI commands

use crate::agents::registry::AgentStatus;
use crate::agents::{AgentRegistry, Orchestrator};
use crate::cli::output::Output;
use crate::types::{AppError, Request, ResponseStatus, Result};
use crate::utils::toml_config::AppConfig;
use std::path::Path;

/// Run one request and print the aggregated response
pub async fn process(
    output: &Output,
    orchestrator: &Orchestrator,
    request: Request,
    json: bool,
) -> Result<ResponseStatus> {
    let response = orchestrator.process(request).await?;

    if json {
        let text = serde_json::to_string_pretty(&response)
            .map_err(|e| AppError::Internal(format!("Failed to serialize response: {}", e)))?;
        println!("{}", text);
        return Ok(response.status);
    }

    output.header("Request");
    output.kv("correlation id", &response.correlation_id);
    output.kv("intents", &response.intents.join(", "));
    output.kv(
        "stages",
        &format!("{}/{}", response.stages_completed, response.stages_planned),
    );
    output.kv("elapsed", &format!("{}ms", response.elapsed_ms));

    output.subheader("Agents");
    for result in response.results.values() {
        output.agent_result(result);
    }
    if !response.skipped.is_empty() {
        output.warning(&format!("Skipped: {}", response.skipped.join(", ")));
    }
    if response.timed_out {
        output.warning("Request deadline reached before all agents finished");
    }

    output.status(response.status);
    Ok(response.status)
}

/// Print the agent plan for a request
pub fn plan(output: &Output, orchestrator: &Orchestrator, request: &Request) -> Result<()> {
    let plan = orchestrator.plan(request)?;

    output.header("Agent Plan");
    let intents: Vec<String> = plan.intents.iter().map(|i| i.to_string()).collect();
    output.kv("intents", &intents.join(", "));

    for (index, stage) in plan.stages.iter().enumerate() {
        output.subheader(&format!("Stage {} ({})", index + 1, stage.intent));
        for agent in &stage.agents {
            output.list_item(agent);
        }
    }
    Ok(())
}

/// Print every registered agent with its load status
pub fn list_agents(output: &Output, registry: &AgentRegistry) {
    output.header("Agents");
    output.table_header(&["Agent", "Family", "Status"]);

    let agents = registry.describe();
    for agent in &agents {
        let status = match agent.status {
            AgentStatus::NotLoaded => "not loaded",
            AgentStatus::Live => "live",
            AgentStatus::Fallback => "fallback",
        };
        output.table_row(&[agent.id.as_str(), agent.family.as_str(), status]);
    }

    for agent in agents.iter().filter(|a| a.status == AgentStatus::Fallback) {
        if let Some(reason) = &agent.fallback_reason {
            output.warning(&format!("{}: {}", agent.id, reason));
        }
    }
}

/// Print the effective configuration, optionally with validation warnings
pub fn show_config(
    output: &Output,
    config: &AppConfig,
    source: Option<&Path>,
    validate: bool,
) -> Result<()> {
    output.header("Configuration");
    output.kv(
        "source",
        &source
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "built-in defaults".to_string()),
    );

    output.subheader("Server");
    output.kv("address", &config.bind_address());
    output.kv("log level", &config.server.log_level);
    output.kv("log format", &config.server.log_format);

    output.subheader("Resilience");
    let resilience = &config.resilience;
    output.kv("failure threshold", &resilience.failure_threshold.to_string());
    output.kv("cooldown", &format!("{}s", resilience.cooldown_secs));
    output.kv("max attempts", &resilience.max_attempts.to_string());
    output.kv(
        "backoff",
        &format!("{}ms .. {}ms", resilience.base_delay_ms, resilience.max_delay_ms),
    );
    output.kv("call timeout", &format!("{}ms", resilience.call_timeout_ms));
    output.kv(
        "request timeout",
        &format!("{}ms", config.orchestrator.request_timeout_ms),
    );

    output.subheader("Admission");
    let orchestrator = &config.orchestrator;
    output.kv(
        "max concurrent requests",
        &orchestrator.max_concurrent_requests.to_string(),
    );
    let rate = match orchestrator.requests_per_hour {
        0 => "unlimited".to_string(),
        n => format!("{}/hour per caller", n),
    };
    output.kv("rate limit", &rate);

    let disabled: Vec<&str> = config.disabled_agents().collect();
    if !disabled.is_empty() {
        output.kv("disabled agents", &disabled.join(", "));
    }

    if validate {
        let warnings = config
            .validate_with_warnings()
            .map_err(|e| AppError::Configuration(e.to_string()))?;
        output.newline();
        if warnings.is_empty() {
            output.success("Configuration is valid");
        } else {
            for warning in &warnings {
                output.warning(&warning.to_string());
            }
            output.success(&format!(
                "Configuration is valid with {} warning(s)",
                warnings.len()
            ));
        }
    }
    Ok(())
}
