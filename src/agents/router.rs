//! Intent router
//!
//! Turns a request into an [`AgentPlan`]: ordered stages of agents, where
//! agents inside a stage may run concurrently. Routing is a pure function
//! of the request content and the routing table.
//!
//! An explicit `metadata.type` wins over keyword detection. Keywords are
//! matched as whole words or whole phrases of the lower-cased intent text.

use crate::agents::{
    CAMPAIGN_MANAGER, CONTENT_MANAGER, CUSTOMER_COMMUNICATION, DATA_COLLECTOR, INSIGHTS_ENGINE,
    LOCAL_MARKETING, QUALITY_CONTROL, REPORT_GENERATOR, SEO_OPTIMIZER, SOCIAL_MEDIA,
    WEBSITE_BUILDER,
};
use crate::types::Request;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Website,
    Marketing,
    Analytics,
    Communication,
    /// Review of everything produced by earlier stages
    Quality,
    /// Website, marketing and analytics together, followed by a quality review
    Combined,
}

impl Intent {
    /// Intents that own a stage template, in stage order
    pub const STAGE_ORDER: [Intent; 5] = [
        Intent::Website,
        Intent::Marketing,
        Intent::Analytics,
        Intent::Communication,
        Intent::Quality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Website => "website",
            Intent::Marketing => "marketing",
            Intent::Analytics => "analytics",
            Intent::Communication => "communication",
            Intent::Quality => "quality",
            Intent::Combined => "combined",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "website" => Some(Intent::Website),
            "marketing" => Some(Intent::Marketing),
            "analytics" => Some(Intent::Analytics),
            "communication" => Some(Intent::Communication),
            "quality" => Some(Intent::Quality),
            "combined" => Some(Intent::Combined),
            _ => None,
        }
    }

    /// Stage-owning intents this intent expands to
    fn expand(self) -> &'static [Intent] {
        match self {
            Intent::Website => &[Intent::Website],
            Intent::Marketing => &[Intent::Marketing],
            Intent::Analytics => &[Intent::Analytics],
            Intent::Communication => &[Intent::Communication],
            Intent::Quality => &[Intent::Quality],
            Intent::Combined => &[
                Intent::Website,
                Intent::Marketing,
                Intent::Analytics,
                Intent::Quality,
            ],
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============= Keyword Tables =============

const WEBSITE_KEYWORDS: &[&str] = &[
    "website", "websites", "site", "web", "online", "webpage", "homepage",
    "वेबसाइट", "साइट",
    "create website", "build site", "develop web",
];

const MARKETING_KEYWORDS: &[&str] = &[
    "marketing", "advertise", "advertising", "promote", "promotion", "campaign", "campaigns",
    "social media", "festival", "diwali", "holi",
    "मार्केटिंग", "विज्ञापन", "प्रचार", "अभियान",
];

const ANALYTICS_KEYWORDS: &[&str] = &[
    "analytics", "report", "reports", "reporting", "data", "insights", "dashboard", "statistics",
    "एनालिटिक्स", "रिपोर्ट", "डेटा", "जानकारी",
];

const COMMUNICATION_KEYWORDS: &[&str] = &[
    "whatsapp", "communication", "customer", "customers", "support", "chat",
    "व्हाट्सएप", "संचार", "ग्राहक", "सहायता",
];

const COMBINED_KEYWORDS: &[&str] = &[
    "complete", "full", "everything", "start business", "full automation",
    "पूरा", "सब कुछ", "व्यापार शुरू", "संपूर्ण",
];

/// Map an explicit `metadata.type` value to intents
fn intents_for_request_type(request_type: &str) -> Option<Vec<Intent>> {
    let intents = match request_type.trim().to_lowercase().as_str() {
        "website" | "website_creation" | "web_development" => vec![Intent::Website],
        "marketing" | "marketing_campaign" | "social_media" => vec![Intent::Marketing],
        "analytics" | "analytics_setup" | "reporting" => vec![Intent::Analytics],
        "communication" | "support" => vec![Intent::Communication],
        "quality" | "quality_control" | "review" => vec![Intent::Quality],
        "ecommerce" | "online_store" | "shop_setup" => {
            vec![Intent::Website, Intent::Marketing, Intent::Analytics]
        }
        "combined" | "complete" | "full" | "complete_setup" | "full_automation" | "everything" => {
            vec![Intent::Combined]
        }
        _ => return None,
    };
    Some(intents)
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '।' || (c.is_ascii_punctuation() && c != '_'))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn contains_keyword(tokens: &[String], keyword: &str) -> bool {
    let phrase: Vec<&str> = keyword.split_whitespace().collect();
    match phrase.len() {
        0 => false,
        1 => tokens.iter().any(|token| token == phrase[0]),
        n => tokens
            .windows(n)
            .any(|window| window.iter().zip(&phrase).all(|(token, word)| token == word)),
    }
}

fn matches_any(tokens: &[String], keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| contains_keyword(tokens, keyword))
}

// ============= Plan Types =============

/// A set of agents that may run concurrently
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub intent: Intent,
    pub agents: Vec<String>,
}

/// Ordered stages for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPlan {
    /// Classified intents, before expansion of `combined`
    pub intents: Vec<Intent>,
    pub stages: Vec<Stage>,
}

impl AgentPlan {
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Every agent id in stage order
    pub fn agent_ids(&self) -> impl Iterator<Item = &str> {
        self.stages
            .iter()
            .flat_map(|stage| stage.agents.iter().map(String::as_str))
    }
}

// ============= Routing Table =============

/// Stage template per intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    templates: BTreeMap<Intent, Vec<String>>,
}

impl Default for RoutingTable {
    fn default() -> Self {
        let template = |ids: &[&str]| ids.iter().map(|id| id.to_string()).collect::<Vec<_>>();
        let mut templates = BTreeMap::new();
        templates.insert(
            Intent::Website,
            template(&[WEBSITE_BUILDER, CONTENT_MANAGER, SEO_OPTIMIZER]),
        );
        templates.insert(
            Intent::Marketing,
            template(&[CAMPAIGN_MANAGER, SOCIAL_MEDIA, LOCAL_MARKETING]),
        );
        templates.insert(
            Intent::Analytics,
            template(&[DATA_COLLECTOR, INSIGHTS_ENGINE, REPORT_GENERATOR]),
        );
        templates.insert(Intent::Communication, template(&[CUSTOMER_COMMUNICATION]));
        templates.insert(Intent::Quality, template(&[QUALITY_CONTROL]));
        Self { templates }
    }
}

impl RoutingTable {
    /// Replace the template of a stage-owning intent
    pub fn with_template(mut self, intent: Intent, agents: Vec<String>) -> Self {
        if intent != Intent::Combined {
            self.templates.insert(intent, agents);
        }
        self
    }

    pub fn template(&self, intent: Intent) -> &[String] {
        self.templates
            .get(&intent)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every agent id referenced by any template
    pub fn agent_ids(&self) -> impl Iterator<Item = &str> {
        self.templates
            .values()
            .flat_map(|agents| agents.iter().map(String::as_str))
    }
}

// ============= Router =============

#[derive(Debug, Clone, Default)]
pub struct Router {
    table: RoutingTable,
}

impl Router {
    pub fn new(table: RoutingTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Classify a request into intents, in stage order
    pub fn classify(&self, request: &Request) -> Vec<Intent> {
        if let Some(intents) = request
            .metadata
            .request_type
            .as_deref()
            .and_then(intents_for_request_type)
        {
            return intents;
        }

        let tokens = tokenize(&request.intent);
        let mut intents = Vec::new();

        if matches_any(&tokens, COMBINED_KEYWORDS) {
            intents.push(Intent::Combined);
        } else {
            if matches_any(&tokens, WEBSITE_KEYWORDS) {
                intents.push(Intent::Website);
            }
            if matches_any(&tokens, MARKETING_KEYWORDS) {
                intents.push(Intent::Marketing);
            }
            if matches_any(&tokens, ANALYTICS_KEYWORDS) {
                intents.push(Intent::Analytics);
            }
        }
        if matches_any(&tokens, COMMUNICATION_KEYWORDS) {
            intents.push(Intent::Communication);
        }

        // General enquiries go to customer communication
        if intents.is_empty() {
            intents.push(Intent::Communication);
        }
        intents
    }

    /// Build the agent plan for a request
    pub fn route(&self, request: &Request) -> AgentPlan {
        let intents = self.classify(request);

        let mut wanted: HashSet<Intent> = HashSet::new();
        for intent in &intents {
            wanted.extend(intent.expand().iter().copied());
        }

        let mut seen: HashSet<&str> = HashSet::new();
        let mut stages = Vec::new();
        for intent in Intent::STAGE_ORDER {
            if !wanted.contains(&intent) {
                continue;
            }
            let agents: Vec<String> = self
                .table
                .template(intent)
                .iter()
                .filter(|agent| seen.insert(agent.as_str()))
                .cloned()
                .collect();
            if !agents.is_empty() {
                stages.push(Stage { intent, agents });
            }
        }

        debug!(
            correlation_id = %request.correlation_id,
            intents = ?intents,
            stages = stages.len(),
            "Request routed"
        );

        AgentPlan { intents, stages }
    }
}
