//! Built-in agent catalog
//!
//! Each built-in agent turns the request metadata, and the upstream outputs
//! of earlier stages, into a small structured plan for its area. They are
//! deterministic so the orchestration core can be exercised end to end.

use crate::agents::{
    Agent, AgentFamily, CAMPAIGN_MANAGER, CONTENT_MANAGER, CUSTOMER_COMMUNICATION, DATA_COLLECTOR,
    INSIGHTS_ENGINE, LOCAL_MARKETING, QUALITY_CONTROL, REPORT_GENERATOR, SEO_OPTIMIZER,
    SOCIAL_MEDIA, WEBSITE_BUILDER,
};
use crate::types::{AgentError, AgentPayload};
use async_trait::async_trait;
use serde_json::{json, Value};

pub struct BuiltinAgent {
    id: &'static str,
}

impl BuiltinAgent {
    /// Look up a built-in agent by id
    pub fn new(id: &str) -> Option<Self> {
        crate::agents::BUILTIN_AGENTS
            .iter()
            .find(|known| **known == id)
            .map(|known| Self { id: known })
    }

    pub fn family(&self) -> AgentFamily {
        AgentFamily::of(self.id)
    }
}

#[async_trait]
impl Agent for BuiltinAgent {
    fn id(&self) -> &str {
        self.id
    }

    async fn handle_request(&self, payload: &AgentPayload) -> Result<Value, AgentError> {
        let ctx = Context::from(payload);
        let output = match self.id {
            WEBSITE_BUILDER => website_builder(&ctx),
            CONTENT_MANAGER => content_manager(&ctx),
            SEO_OPTIMIZER => seo_optimizer(&ctx),
            CAMPAIGN_MANAGER => campaign_manager(&ctx, payload),
            SOCIAL_MEDIA => social_media(&ctx),
            LOCAL_MARKETING => local_marketing(&ctx),
            DATA_COLLECTOR => data_collector(&ctx, payload),
            INSIGHTS_ENGINE => insights_engine(&ctx, payload),
            REPORT_GENERATOR => report_generator(&ctx, payload),
            CUSTOMER_COMMUNICATION => customer_communication(&ctx),
            QUALITY_CONTROL => quality_control(payload),
            other => return Err(AgentError::UnsupportedIntent(other.to_string())),
        };
        Ok(output)
    }
}

struct Context<'a> {
    business_type: &'a str,
    location: Option<&'a str>,
    language: &'a str,
    indian_market: bool,
}

impl<'a> From<&'a AgentPayload> for Context<'a> {
    fn from(payload: &'a AgentPayload) -> Self {
        let locale = payload.metadata.locale.as_deref().unwrap_or("en");
        let language = locale.split(['-', '_']).next().unwrap_or("en");
        let region = locale.split(['-', '_']).nth(1).unwrap_or("");
        Self {
            business_type: payload
                .metadata
                .business_type
                .as_deref()
                .unwrap_or("business"),
            location: payload.metadata.location.as_deref(),
            language,
            indian_market: language.eq_ignore_ascii_case("hi") || region.eq_ignore_ascii_case("in"),
        }
    }
}

fn slug(text: &str) -> String {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

// ============= Website =============

fn website_builder(ctx: &Context) -> Value {
    let mut pages = vec!["home", "about", "services", "contact"];
    if matches!(ctx.business_type, "restaurant" | "cafe" | "bakery") {
        pages.insert(2, "menu");
    }
    json!({
        "site": {
            "template": format!("{}-starter", slug(ctx.business_type)),
            "pages": pages,
            "language": ctx.language,
            "mobile_first": true,
        },
        "domain_suggestion": format!("{}.example", slug(&format!("{} {}", ctx.business_type, ctx.location.unwrap_or("")))),
    })
}

fn content_manager(ctx: &Context) -> Value {
    let tone = if ctx.indian_market { "warm" } else { "professional" };
    json!({
        "sections": ["hero", "services", "testimonials", "call_to_action"],
        "tone": tone,
        "language": ctx.language,
        "bilingual": ctx.indian_market && ctx.language != "en",
    })
}

fn seo_optimizer(ctx: &Context) -> Value {
    let mut keywords = vec![ctx.business_type.to_string()];
    if let Some(location) = ctx.location {
        keywords.push(format!("{} in {}", ctx.business_type, location));
        keywords.push(format!("best {} near {}", ctx.business_type, location));
    }
    json!({
        "keywords": keywords,
        "meta_description": format!("Trusted {} serving local customers", ctx.business_type),
        "technical": { "sitemap": true, "structured_data": true },
    })
}

// ============= Marketing =============

fn campaign_manager(ctx: &Context, payload: &AgentPayload) -> Value {
    let landing_page = payload
        .upstream
        .get(WEBSITE_BUILDER)
        .and_then(|site| site.get("domain_suggestion"))
        .cloned()
        .unwrap_or(Value::Null);
    let occasion = if ctx.indian_market { "festival_season" } else { "seasonal" };
    json!({
        "campaign": {
            "name": format!("{} {} campaign", ctx.business_type, occasion.replace('_', " ")),
            "occasion": occasion,
            "duration_days": 14,
            "landing_page": landing_page,
        },
        "upstream_inputs": payload.upstream.keys().collect::<Vec<_>>(),
    })
}

fn social_media(ctx: &Context) -> Value {
    let platforms = if ctx.indian_market {
        vec!["whatsapp", "instagram", "facebook"]
    } else {
        vec!["instagram", "facebook", "linkedin"]
    };
    json!({
        "platforms": platforms,
        "posts_per_week": 3,
        "language": ctx.language,
    })
}

fn local_marketing(ctx: &Context) -> Value {
    json!({
        "location": ctx.location,
        "listings": ["google_business_profile", "local_directories"],
        "radius_km": if ctx.location.is_some() { 5 } else { 0 },
    })
}

// ============= Analytics =============

fn data_collector(_ctx: &Context, payload: &AgentPayload) -> Value {
    let mut sources: Vec<String> = payload
        .upstream
        .keys()
        .map(|agent| format!("{}_events", agent.replace('-', "_")))
        .collect();
    if sources.is_empty() {
        sources.push("website_traffic".to_string());
    }
    json!({
        "sources": sources,
        "retention_days": 90,
    })
}

fn insights_engine(ctx: &Context, payload: &AgentPayload) -> Value {
    let tracked = payload.upstream.len();
    json!({
        "insights": [
            format!("Track enquiries per channel for your {}", ctx.business_type),
            "Compare weekday and weekend traffic",
        ],
        "based_on_outputs": tracked,
    })
}

fn report_generator(ctx: &Context, payload: &AgentPayload) -> Value {
    json!({
        "report": {
            "title": format!("Monthly {} performance", ctx.business_type),
            "frequency": "monthly",
            "sections": ["traffic", "campaigns", "customer_feedback"],
            "language": ctx.language,
        },
        "upstream_inputs": payload.upstream.keys().collect::<Vec<_>>(),
    })
}

// ============= Communication =============

fn customer_communication(ctx: &Context) -> Value {
    let channel = if ctx.indian_market { "whatsapp" } else { "email" };
    let reply = if ctx.language == "hi" {
        "धन्यवाद! हम जल्द ही आपसे संपर्क करेंगे।"
    } else {
        "Thank you! We will get back to you shortly."
    };
    json!({
        "channel": channel,
        "reply": reply,
        "auto_responder": true,
    })
}

// ============= Quality Control =============

/// Score one upstream output: real output 100, fallback 50, empty 0
fn review_score(output: &Value) -> f64 {
    let empty = match output {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if empty {
        0.0
    } else if output.get("fallback").and_then(Value::as_bool) == Some(true) {
        50.0
    } else {
        100.0
    }
}

fn grade(score: f64) -> &'static str {
    if score >= 90.0 {
        "excellent"
    } else if score >= 75.0 {
        "good"
    } else if score >= 60.0 {
        "acceptable"
    } else {
        "needs_improvement"
    }
}

fn quality_control(payload: &AgentPayload) -> Value {
    let scores: serde_json::Map<String, Value> = payload
        .upstream
        .iter()
        .map(|(agent, output)| (agent.clone(), json!(review_score(output))))
        .collect();
    let reviewed = scores.len();
    let overall = if reviewed == 0 {
        0.0
    } else {
        let total: f64 = scores.values().filter_map(Value::as_f64).sum();
        (total / reviewed as f64 * 10.0).round() / 10.0
    };

    let recommendations: Vec<String> = payload
        .upstream
        .iter()
        .filter(|(_, output)| review_score(output) < 100.0)
        .map(|(agent, _)| format!("Re-run {} once it has recovered", agent))
        .collect();

    json!({
        "reviewed": reviewed,
        "overall_score": overall,
        "grade": if reviewed == 0 { "nothing_to_review" } else { grade(overall) },
        "agent_scores": scores,
        "recommendations": recommendations,
        "ready_to_publish": reviewed > 0 && overall >= 85.0,
    })
}
